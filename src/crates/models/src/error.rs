//! Error types for model operations

use thiserror::Error;

/// Errors that can occur when talking to the inference backend
#[derive(Debug, Error)]
pub enum ModelError {
    /// HTTP request failed at the transport layer
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request exceeded its time budget
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Could not reach the backend
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Model is not known to the backend
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Backend is up but returned a server error
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Response body could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl ModelError {
    /// Whether this error is a transport fault worth retrying
    ///
    /// 4xx and model-not-found errors are permanent and fail immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::Connection(_) | ModelError::ServiceUnavailable(_) => true,
            ModelError::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ModelError::Connection("refused".into()).is_retryable());
        assert!(ModelError::ServiceUnavailable("503".into()).is_retryable());

        assert!(!ModelError::Timeout("120s".into()).is_retryable());
        assert!(!ModelError::ModelNotFound("ghost:7b".into()).is_retryable());
        assert!(!ModelError::InvalidResponse("bad json".into()).is_retryable());
        assert!(!ModelError::Other("misc".into()).is_retryable());
    }
}
