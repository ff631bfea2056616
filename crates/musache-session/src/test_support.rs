//! Scripted transport shared by the controller tests

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use musache_api::{
    AskResponse, DocumentFile, Error, HistoryEntry, ProgressFn, Result, SystemState, SystemStatus,
    UploadReceipt,
};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::transport::Transport;

/// A transport whose answers are queued up front. Once a queue runs dry the
/// fallback answer is used: `not_ready` for status, an echo for ask.
#[derive(Default)]
pub struct MockTransport {
    statuses: Mutex<VecDeque<Result<SystemStatus>>>,
    upload_result: Mutex<Option<Result<UploadReceipt>>>,
    answers: Mutex<VecDeque<Result<AskResponse>>>,
    history: Mutex<Vec<HistoryEntry>>,
    health_ok: Mutex<bool>,
    ask_gate: Option<Arc<Notify>>,
    pub status_calls: AtomicU32,
    pub upload_calls: AtomicU32,
    pub ask_calls: AtomicU32,
    pub health_calls: AtomicU32,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            health_ok: Mutex::new(true),
            ..Default::default()
        }
    }

    pub fn with_statuses(self, statuses: Vec<Result<SystemStatus>>) -> Self {
        *self.statuses.lock() = statuses.into();
        self
    }

    pub fn with_upload(self, result: Result<UploadReceipt>) -> Self {
        *self.upload_result.lock() = Some(result);
        self
    }

    pub fn with_answers(self, answers: Vec<Result<AskResponse>>) -> Self {
        *self.answers.lock() = answers.into();
        self
    }

    pub fn with_history(self, history: Vec<HistoryEntry>) -> Self {
        *self.history.lock() = history;
        self
    }

    pub fn with_health(self, ok: bool) -> Self {
        *self.health_ok.lock() = ok;
        self
    }

    /// Make every `ask` wait until the returned notify is signalled
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.ask_gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn statuses(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn asks(&self) -> u32 {
        self.ask_calls.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> u32 {
        self.upload_calls.load(Ordering::SeqCst)
    }
}

pub fn ready(total_chunks: u64) -> Result<SystemStatus> {
    Ok(SystemStatus::new(SystemState::Ready, total_chunks))
}

pub fn not_ready() -> Result<SystemStatus> {
    Ok(SystemStatus::new(SystemState::NotReady, 0))
}

pub fn unreachable() -> Result<SystemStatus> {
    Err(Error::NetworkUnavailable("connection refused".into()))
}

pub fn answer(text: &str) -> Result<AskResponse> {
    Ok(AskResponse {
        answer: text.to_string(),
        context_chunks: vec![format!("context for {}", text)],
        response_time_seconds: 1.5,
        timestamp: None,
    })
}

#[async_trait]
impl Transport for MockTransport {
    async fn health(&self) -> Result<serde_json::Value> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        if *self.health_ok.lock() {
            Ok(serde_json::json!({"status": "healthy"}))
        } else {
            Err(Error::NetworkUnavailable("offline".into()))
        }
    }

    async fn status(&self) -> Result<SystemStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses.lock().pop_front().unwrap_or_else(not_ready)
    }

    async fn upload(
        &self,
        file: &DocumentFile,
        progress: Option<ProgressFn>,
    ) -> Result<UploadReceipt> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        musache_api::validate(file)?;
        if let Some(report) = &progress {
            for p in [25.0, 50.0, 100.0] {
                report(p);
            }
        }
        self.upload_result.lock().take().unwrap_or_else(|| {
            Ok(UploadReceipt {
                file_name: file.name.clone(),
                accepted_size: file.size(),
                message: None,
            })
        })
    }

    async fn ask(&self, question: &str) -> Result<AskResponse> {
        self.ask_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.ask_gate {
            gate.notified().await;
        }
        let scripted = self.answers.lock().pop_front();
        scripted.unwrap_or_else(|| answer(&format!("answer to {}", question)))
    }

    async fn history(&self, limit: u32) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .history
            .lock()
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn debug(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({"documents": 1}))
    }
}
