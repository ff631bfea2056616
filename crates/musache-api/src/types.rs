//! Wire types for the document API

use serde::{Deserialize, Deserializer, Serialize};

/// Ingestion state reported by `GET /status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemState {
    NotReady,
    Ready,
    Error,
    /// Any state string this client does not know about
    #[serde(other)]
    Unknown,
}

impl SystemState {
    pub fn is_ready(self) -> bool {
        self == SystemState::Ready
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SystemState::NotReady => "not_ready",
            SystemState::Ready => "ready",
            SystemState::Error => "error",
            SystemState::Unknown => "unknown",
        }
    }
}

/// Payload of `GET /status`. Produced by the server, never mutated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    #[serde(rename = "status", alias = "state")]
    pub state: SystemState,
    #[serde(default, alias = "totalChunks")]
    pub total_chunks: u64,
}

impl SystemStatus {
    pub fn new(state: SystemState, total_chunks: u64) -> Self {
        Self {
            state,
            total_chunks,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }
}

/// Body of `POST /ask`
#[derive(Debug, Clone, Serialize)]
pub struct AskRequest<'a> {
    pub question: &'a str,
}

/// Payload of `POST /ask`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default)]
    pub context_chunks: Vec<String>,
    #[serde(
        default,
        rename = "response_time",
        alias = "response_time_seconds",
        deserialize_with = "deserialize_seconds"
    )]
    pub response_time_seconds: f64,
    /// Server-side timestamp, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// One item of `GET /history`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// What the server sends back from `POST /upload-document`. Every field is optional
/// because the endpoint only promises a 2xx with some JSON object.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct UploadResponse {
    #[serde(default, alias = "file_name", alias = "acceptedFileName")]
    pub filename: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Outcome of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Name the server accepted the document under
    pub file_name: String,
    /// Bytes sent
    pub accepted_size: u64,
    /// Optional human-readable confirmation from the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Accepts `1.42`, `"1.42"` and `"1.42s"`
fn deserialize_seconds<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(0.0),
        Some(Raw::Number(n)) => Ok(n),
        Some(Raw::Text(s)) => s
            .trim()
            .trim_end_matches('s')
            .trim()
            .parse::<f64>()
            .map_err(serde::de::Error::custom),
    }
}
