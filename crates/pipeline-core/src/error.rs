use std::time::Duration;

use thiserror::Error;

/// Failure of a non-critical collaborator (scanner source, sentiment
/// service, risk assessor). Always recovered by the caller with a
/// documented default.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CollaboratorError {
    /// Transport-level failures are worth another attempt; malformed
    /// payloads and local I/O are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CollaboratorError::Request(_)
                | CollaboratorError::ServiceUnavailable(_)
                | CollaboratorError::Timeout(_)
        )
    }
}

/// Failure of a single instrument's prediction. Never aborts a batch.
#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Model error: {0}")]
    Model(String),

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Prediction task aborted: {0}")]
    Aborted(String),
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Model registry I/O error for {symbol}: {source}")]
    Io {
        symbol: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Model registry unavailable: {0}")]
    Unavailable(String),
}
