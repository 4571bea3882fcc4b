//! Error types for the cluster client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the cluster
#[derive(Debug, Error)]
pub enum ClientError {
    /// Request to the API server could not be completed
    #[error("Kubernetes API error: {0}")]
    Api(#[source] kube::Error),

    /// Exec session could not be drained
    #[error("exec stream failed: {0}")]
    Stream(String),

    /// Patch body does not match its declared format
    #[error("invalid patch document: {0}")]
    InvalidPatch(String),

    /// API returned a structured failure status
    #[error("API error (status {status}): {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },
}

impl From<kube::Error> for ClientError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => ClientError::Status {
                status: resp.code,
                message: resp.message,
            },
            other => ClientError::Api(other),
        }
    }
}
