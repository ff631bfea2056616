//! Error types for musache-api

use std::time::Duration;

use thiserror::Error;

/// Result type alias using musache-api Error
pub type Result<T> = std::result::Result<T, Error>;

/// Why a document was rejected before upload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// File is larger than the upload ceiling
    #[error("File size must be less than {}", crate::format_file_size(*limit))]
    TooLarge { size: u64, limit: u64 },

    /// Extension is not one of the accepted document types
    #[error("Only PDF and TXT files are allowed (got {extension:?})")]
    UnsupportedType { extension: String },
}

/// Errors that can occur when talking to the document API
#[derive(Error, Debug)]
pub enum Error {
    /// The file failed local validation; nothing was sent
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The server did not answer within the call's time budget
    #[error("Request timeout after {0:?} - the server is taking too long to respond")]
    Timeout(Duration),

    /// DNS failure, refused connection or no network
    #[error("Unable to connect to the server: {0}")]
    NetworkUnavailable(String),

    /// Server answered with a non-success status
    #[error("{detail}")]
    Server { status: u16, detail: String },

    /// Response body was not the JSON we expected
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The document could not be read from disk
    #[error("Cannot read document: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a server error from a status code and detail message
    pub fn server(status: u16, detail: impl Into<String>) -> Self {
        Self::Server {
            status,
            detail: detail.into(),
        }
    }

    /// Classify a reqwest failure. `timeout` is the budget the call ran with.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return Error::Timeout(timeout);
        }
        if let Some(status) = err.status() {
            return Error::server(status.as_u16(), generic_status_message(status));
        }
        if err.is_decode() {
            return Error::InvalidResponse(err.to_string());
        }
        Error::NetworkUnavailable(err.to_string())
    }

    /// Whether a later identical request could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Timeout(_) | Error::NetworkUnavailable(_) => true,
            Error::Server { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }

    /// HTTP status code, when the server produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// "HTTP 503: Service Unavailable", or "HTTP 599" for codes without a reason phrase
pub(crate) fn generic_status_message(status: reqwest::StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {}: {}", status.as_u16(), reason),
        None => format!("HTTP {}", status.as_u16()),
    }
}
