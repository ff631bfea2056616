//! Error types for musache-session

use thiserror::Error;

/// Result type alias using musache-session Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the session controllers
#[derive(Error, Debug)]
pub enum Error {
    /// Validation or transport failure from the API layer
    #[error(transparent)]
    Api(#[from] musache_api::Error),

    /// The server never reported ready within the attempt budget
    #[error("Document processing did not finish after {attempts} status checks")]
    ReadinessTimeout { attempts: u32 },

    /// Too many status checks in a row failed at the transport level
    #[error("Server unreachable after {consecutive_failures} failed status checks: {last_error}")]
    Unreachable {
        consecutive_failures: u32,
        last_error: String,
    },

    /// An upload lifecycle is already running on this controller
    #[error("An upload is already in progress")]
    AlreadyInProgress,

    /// This controller already holds an ingested document
    #[error("A document is already loaded; start a new session to upload another")]
    DocumentAlreadyReady,

    /// A question is still waiting for its answer
    #[error("Wait for the previous answer to finish")]
    Busy,

    /// Nothing to ask
    #[error("Question is empty")]
    EmptyQuestion,
}

impl Error {
    /// Guard rejections never reach the network and leave state untouched
    pub fn is_guard_rejection(&self) -> bool {
        matches!(
            self,
            Error::AlreadyInProgress
                | Error::DocumentAlreadyReady
                | Error::Busy
                | Error::EmptyQuestion
        )
    }

    /// Whether this is a local validation failure of the document
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Api(musache_api::Error::Validation(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use musache_api::ValidationError;

    #[test]
    fn test_guard_rejections() {
        assert!(Error::Busy.is_guard_rejection());
        assert!(Error::AlreadyInProgress.is_guard_rejection());
        assert!(Error::DocumentAlreadyReady.is_guard_rejection());
        assert!(!Error::ReadinessTimeout { attempts: 20 }.is_guard_rejection());
    }

    #[test]
    fn test_api_errors_pass_through_display() {
        let e: Error = musache_api::Error::server(500, "internal").into();
        assert_eq!(e.to_string(), "internal");

        let e: Error = musache_api::Error::from(ValidationError::UnsupportedType {
            extension: ".png".into(),
        })
        .into();
        assert!(e.is_validation());
    }
}
