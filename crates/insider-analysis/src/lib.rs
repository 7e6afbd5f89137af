//! Insider transaction merging and the role-weighted insider signal.

pub mod dedup;
pub mod signal;

pub use dedup::dedupe_transactions;
pub use signal::{compute_insider_signal, role_weight};
