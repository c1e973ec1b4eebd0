// error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatalogError {
    /// The device answered the manifest request with the empty-object
    /// sentinel: its firmware predates data-set support.
    #[error("device firmware does not support data sets")]
    VersionMismatch,

    #[error("I/O error: {message} (context: {context})")]
    Io { message: String, context: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Server error: {status} ({url})")]
    Server { status: u16, url: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DatalogError {
    /// Returns true if the error is likely transient and the operation can be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::VersionMismatch => false,
            Self::Io { .. } => true,
            Self::InvalidRequest(_) => false,
            Self::Server { status, .. } => matches!(status, 502 | 503 | 504),
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Json(_) => false,
        }
    }

    /// Returns true if the error indicates a problem with the request itself
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_) | Self::Json(_))
    }

    /// Creates a new Io error with a short context tag
    pub fn io_error<T: Into<String>>(message: T, context: T) -> Self {
        Self::Io {
            message: message.into(),
            context: context.into(),
        }
    }
}

/// Result type alias for DatalogError
pub type Result<T> = std::result::Result<T, DatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_is_retryable() {
        let err = DatalogError::io_error("stream download failed", "loadMore");
        assert!(err.is_retryable());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_server_error_retryability() {
        let err = DatalogError::Server {
            status: 503,
            url: "logger.json?id=temperature1".into(),
        };
        assert!(err.is_retryable());

        let err = DatalogError::Server {
            status: 404,
            url: "logger.json?id=temperature1".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_version_mismatch_is_final() {
        let err = DatalogError::VersionMismatch;
        assert!(!err.is_retryable());
    }
}
