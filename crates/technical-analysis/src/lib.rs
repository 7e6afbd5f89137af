pub mod context;
pub mod history;
pub mod indicators;
pub mod regime;

#[cfg(test)]
mod indicators_tests;

pub use context::*;
pub use history::*;
pub use indicators::*;
pub use regime::*;
