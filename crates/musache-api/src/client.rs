//! REST client for the document question-answering service

use std::time::Duration;

use reqwest::{Method, header::CONTENT_TYPE, multipart};
use serde::de::DeserializeOwned;

use crate::{
    document::{DocumentFile, validate},
    error::{Error, Result, generic_status_message},
    progress::{ProgressFn, progress_body},
    types::{AskRequest, AskResponse, HistoryEntry, SystemStatus, UploadReceipt, UploadResponse},
};

/// Deployed API root
pub const DEFAULT_BASE_URL: &str = "https://rag-musache.onrender.com/api/v1";

/// Default bound on a single call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One outbound call. Built per request, never reused.
#[derive(Debug, Clone)]
pub struct EndpointCall {
    pub method: Method,
    /// Path relative to the base URL, including any query string
    pub path: String,
    pub body: Option<serde_json::Value>,
    /// Overrides the client's default timeout
    pub timeout: Option<Duration>,
}

impl EndpointCall {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
            timeout: None,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP client for the document API. Cheap to clone; clones share a connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    /// Create a client for the given API root (e.g. `https://host/api/v1`)
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!(
                "base URL must start with http:// or https://, got {:?}",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Set the default per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Perform a JSON call and decode the response body.
    ///
    /// No retries happen here; callers decide whether a failure is worth repeating.
    pub async fn request<T: DeserializeOwned>(&self, call: EndpointCall) -> Result<T> {
        let timeout = call.timeout.unwrap_or(self.timeout);
        let url = self.url(&call.path);
        tracing::debug!(method = %call.method, %url, "API request");

        let mut builder = self
            .client
            .request(call.method.clone(), &url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(timeout);
        if let Some(ref body) = call.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            let err = Error::from_reqwest(e, timeout);
            tracing::warn!(method = %call.method, %url, error = %err, "API request failed");
            err
        })?;

        read_json(response, timeout).await
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<serde_json::Value> {
        self.request(EndpointCall::get("/health")).await
    }

    /// `GET /status`
    pub async fn status(&self) -> Result<SystemStatus> {
        self.request(EndpointCall::get("/status")).await
    }

    /// `POST /ask`
    pub async fn ask(&self, question: &str) -> Result<AskResponse> {
        let body = serde_json::to_value(AskRequest { question })
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        self.request(EndpointCall::post("/ask", body)).await
    }

    /// `GET /history?limit=N`, most recent first
    pub async fn history(&self, limit: u32) -> Result<Vec<HistoryEntry>> {
        self.request(EndpointCall::get(format!("/history?limit={}", limit)))
            .await
    }

    /// `GET /debug`. The payload is opaque to this client.
    pub async fn debug(&self) -> Result<serde_json::Value> {
        self.request(EndpointCall::get("/debug")).await
    }

    /// `POST /upload-document` as multipart, reporting progress while the body streams.
    ///
    /// The file is validated first; an invalid file fails without sending anything.
    pub async fn upload_document(
        &self,
        file: &DocumentFile,
        progress: Option<ProgressFn>,
    ) -> Result<UploadReceipt> {
        validate(file)?;

        let url = self.url("/upload-document");
        let total = file.size();
        tracing::debug!(%url, file = %file.name, bytes = total, "uploading document");

        let part = multipart::Part::stream_with_length(
            progress_body(file.bytes.clone(), progress.clone()),
            total,
        )
        .file_name(file.name.clone())
        .mime_str(file.content_type())
        .map_err(|e| Error::InvalidConfig(format!("bad MIME type: {}", e)))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                let err = Error::from_reqwest(e, self.timeout);
                tracing::warn!(file = %file.name, error = %err, "upload failed");
                err
            })?;

        let wire: UploadResponse = read_json(response, self.timeout).await?;
        if let Some(report) = &progress {
            report(100.0);
        }

        tracing::info!(file = %file.name, bytes = total, "upload accepted");
        Ok(UploadReceipt {
            file_name: wire.filename.unwrap_or_else(|| file.name.clone()),
            accepted_size: total,
            message: wire.message,
        })
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response, timeout: Duration) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let detail = error_detail(&text).unwrap_or_else(|| generic_status_message(status));
        tracing::warn!(status = status.as_u16(), %detail, "API returned error status");
        return Err(Error::server(status.as_u16(), detail));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::from_reqwest(e, timeout))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::warn!(status = status.as_u16(), error = %e, "undecodable response body");
        Error::InvalidResponse(e.to_string())
    })
}

/// Pull `detail` out of an error body. Strings are used verbatim; structured
/// details (e.g. validation error lists) are kept as compact JSON.
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
