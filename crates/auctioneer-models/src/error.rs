//! Model error types.

use thiserror::Error;

/// Result type for model construction and validation.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building or validating model values.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid bid rule: {0}")]
    InvalidRule(String),

    #[error("Invalid selection criteria: {0}")]
    InvalidSelection(String),

    #[error("Unexpected record: {0}")]
    InvalidRecord(String),

    #[error("Invalid run outcome: {0}")]
    InvalidOutcome(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    pub fn invalid_rule(msg: impl Into<String>) -> Self {
        Self::InvalidRule(msg.into())
    }

    pub fn invalid_selection(msg: impl Into<String>) -> Self {
        Self::InvalidSelection(msg.into())
    }

    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }
}
