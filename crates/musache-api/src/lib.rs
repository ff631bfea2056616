//! musache-api: HTTP client for a document question-answering service
//!
//! Wraps the service's REST endpoints (health, status, upload, ask, history,
//! debug), validates documents before upload and normalizes failures into a
//! small error taxonomy.

pub mod client;
pub mod document;
pub mod error;
pub mod progress;
pub mod types;

pub use client::{ApiClient, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, EndpointCall};
pub use document::{DocumentFile, MAX_FILE_SIZE, format_file_size, validate};
pub use error::{Error, Result, ValidationError};
pub use progress::ProgressFn;
pub use types::*;
