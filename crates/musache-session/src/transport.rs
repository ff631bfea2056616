//! Seam between the controllers and the network

use async_trait::async_trait;
use musache_api::{
    ApiClient, AskResponse, DocumentFile, HistoryEntry, ProgressFn, Result, SystemStatus,
    UploadReceipt,
};

/// Everything the controllers need from the document service.
///
/// `ApiClient` is the production implementation; tests substitute scripted fakes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Liveness probe
    async fn health(&self) -> Result<serde_json::Value>;

    /// Current ingestion state
    async fn status(&self) -> Result<SystemStatus>;

    /// Upload a document, reporting body progress
    async fn upload(&self, file: &DocumentFile, progress: Option<ProgressFn>)
    -> Result<UploadReceipt>;

    /// Ask a question about the ingested document
    async fn ask(&self, question: &str) -> Result<AskResponse>;

    /// Server-persisted history, most recent first, at most `limit` entries
    async fn history(&self, limit: u32) -> Result<Vec<HistoryEntry>>;

    /// Opaque diagnostics
    async fn debug(&self) -> Result<serde_json::Value>;
}

#[async_trait]
impl Transport for ApiClient {
    async fn health(&self) -> Result<serde_json::Value> {
        ApiClient::health(self).await
    }

    async fn status(&self) -> Result<SystemStatus> {
        ApiClient::status(self).await
    }

    async fn upload(
        &self,
        file: &DocumentFile,
        progress: Option<ProgressFn>,
    ) -> Result<UploadReceipt> {
        self.upload_document(file, progress).await
    }

    async fn ask(&self, question: &str) -> Result<AskResponse> {
        ApiClient::ask(self, question).await
    }

    async fn history(&self, limit: u32) -> Result<Vec<HistoryEntry>> {
        ApiClient::history(self, limit).await
    }

    async fn debug(&self) -> Result<serde_json::Value> {
        ApiClient::debug(self).await
    }
}
