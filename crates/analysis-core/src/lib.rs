pub mod config;
pub mod error;
pub mod metrics;
pub mod stats;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use metrics::*;
pub use traits::*;
pub use types::*;
