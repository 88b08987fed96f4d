//! Gateway error types.

use serde_json::Value;
use thiserror::Error;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur while talking to the ad platform.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport not authorized, or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Malformed request parameters.
    #[error("Invalid request payload: {0}")]
    PayloadError(String),

    /// Response shape did not match the expected contract.
    #[error("Unexpected result: {0}")]
    UnexpectedResult(String),

    /// Soft-error retry budget exhausted.
    #[error("Max retries ({attempts}) exceeded with error {last_error}")]
    MaxRetry { attempts: u32, last_error: Value },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A pooled request was lost before producing a result.
    #[error("Worker pool failure: {0}")]
    PoolFailed(String),
}

impl GatewayError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn payload_error(msg: impl Into<String>) -> Self {
        Self::PayloadError(msg.into())
    }

    pub fn unexpected_result(msg: impl Into<String>) -> Self {
        Self::UnexpectedResult(msg.into())
    }

    /// Check if error is retryable at the transport layer.
    ///
    /// Timeouts, connection failures and request send failures are; body
    /// decoding and redirect errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            _ => false,
        }
    }

    /// Soft-error code carried by a `MaxRetry` error.
    pub fn soft_error_code(&self) -> Option<i64> {
        match self {
            GatewayError::MaxRetry { last_error, .. } => crate::retry::error_code(last_error),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
