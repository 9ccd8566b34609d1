//! Error taxonomy shared by every simulation crate

use thiserror::Error;

/// Errors raised by simulation components
///
/// Every variant is raised at the boundary of the offending call.
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid parameter shape or sign detected at construction or in a setter
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Call-time precondition not met
    #[error("state error: {0}")]
    State(String),

    /// Shape or size mismatch between cooperating inputs
    #[error("validation error: {what} (expected {expected}, got {actual})")]
    Validation {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// Persisted group is missing a field or holds a malformed one
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn validation(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::Validation {
            what: what.into(),
            expected,
            actual,
        }
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }
}

/// Result type for simulation operations
pub type SimResult<T> = Result<T, SimError>;
