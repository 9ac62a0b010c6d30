//! Error handling and custom error types
//!
//! Provides unified error handling across the crate using thiserror. Every
//! variant maps onto one of three kinds (configuration, invalid input, IO)
//! so callers can log failures distinctly without matching on variants.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),

    #[error("Invariant violation: {0}")]
    Invariant(String),
}

/// Coarse classification used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    InvalidInput,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) | Error::EnvVar(_) => ErrorKind::Configuration,
            Error::InvalidInput(_) | Error::NotFound(_) => ErrorKind::InvalidInput,
            Error::Io(_)
            | Error::Serialization(_)
            | Error::Http(_)
            | Error::Timeout(_)
            | Error::Backend(_)
            | Error::Upload(_)
            | Error::Invariant(_) => ErrorKind::Io,
        }
    }

    /// Wrap a transport failure, keeping timeouts distinguishable.
    pub(crate) fn from_request(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(format!("{}: {}", context, err))
        } else {
            Error::Http(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            Error::Configuration("missing".to_string()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::InvalidInput("empty".to_string()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(Error::Timeout("slow".to_string()).kind(), ErrorKind::Io);
        assert_eq!(
            Error::Io(std::io::Error::other("disk full")).kind(),
            ErrorKind::Io
        );
    }

    #[tokio::test]
    async fn test_from_request_keeps_connection_failures_as_http() {
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:1/")
            .send()
            .await
            .unwrap_err();

        let mapped = Error::from_request("Health check failed", err);
        assert!(matches!(mapped, Error::Http(_)), "{:?}", mapped);
        assert_eq!(mapped.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_display_includes_message() {
        let err = Error::Configuration("BLOB_READ_WRITE_TOKEN is not set".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: BLOB_READ_WRITE_TOKEN is not set"
        );
        assert_eq!(err.kind().to_string(), "configuration");
    }
}
