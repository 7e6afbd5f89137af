use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Computation undefined: {0}")]
    ComputationUndefined(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// Explicit "no value" marker returned when a formula precondition fails.
///
/// Scorers and valuation functions hand this back instead of a fabricated
/// number so callers can show the reason next to a missing figure.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("unavailable: {reason}")]
pub struct Unavailable {
    pub reason: String,
}

impl Unavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl From<Unavailable> for AnalysisError {
    fn from(u: Unavailable) -> Self {
        AnalysisError::ComputationUndefined(u.reason)
    }
}
