//! Adapter error types

use std::time::Duration;

/// Adapter error types.
///
/// `Clone` because one fetch result is handed to every caller waiting on the
/// same in-flight request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    // Transport errors
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("device error ({status}): {message}")]
    Api { status: u16, message: String },

    // Data errors
    #[error("decode error: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A spawned fetch task panicked or was aborted before producing a value.
    #[error("background task failed: {0}")]
    Task(String),
}

impl AdapterError {
    /// Whether the error is worth retrying.
    ///
    /// Transport failures and device-reported HTTP errors are transient;
    /// malformed payloads and caller mistakes are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdapterError::Timeout(_)
                | AdapterError::Http(_)
                | AdapterError::Api { .. }
                | AdapterError::Task(_)
        )
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        AdapterError::Http(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AdapterError {
    fn from(err: tokio::task::JoinError) -> Self {
        AdapterError::Task(err.to_string())
    }
}

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, AdapterError>;
