//! Upload lifecycle: validate, upload, wait for ingestion

use std::sync::Arc;

use musache_api::{DocumentFile, ProgressFn, SystemStatus, UploadReceipt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    clock::Clock,
    error::{Error, Result},
    events::{ErrorOrigin, EventBus, SessionEvent},
    poller::{PollConfig, ReadinessPoller},
    transport::Transport,
};

/// `Idle -> Validating -> Uploading -> AwaitingReadiness -> Ready`; failures return to `Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Idle,
    Validating,
    Uploading,
    AwaitingReadiness,
    Ready,
}

impl UploadState {
    /// Between accepting a file and reaching a final outcome
    pub fn is_active(self) -> bool {
        matches!(
            self,
            UploadState::Validating | UploadState::Uploading | UploadState::AwaitingReadiness
        )
    }
}

/// A document the server has ingested and can answer questions about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadyDocument {
    pub receipt: UploadReceipt,
    pub status: SystemStatus,
}

impl ReadyDocument {
    pub fn total_chunks(&self) -> u64 {
        self.status.total_chunks
    }
}

/// Runs one upload lifecycle at a time. `Ready` is terminal: a new document
/// needs a new controller.
pub struct UploadController {
    transport: Arc<dyn Transport>,
    poller: ReadinessPoller,
    events: EventBus,
    state: Mutex<UploadState>,
    document: Mutex<Option<ReadyDocument>>,
}

impl UploadController {
    pub fn new(
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        poll: PollConfig,
        events: EventBus,
    ) -> Self {
        let poller =
            ReadinessPoller::new(Arc::clone(&transport), clock, poll).with_events(events.clone());
        Self {
            transport,
            poller,
            events,
            state: Mutex::new(UploadState::Idle),
            document: Mutex::new(None),
        }
    }

    pub fn state(&self) -> UploadState {
        *self.state.lock()
    }

    /// The ingested document, once the lifecycle reached `Ready`
    pub fn document(&self) -> Option<ReadyDocument> {
        self.document.lock().clone()
    }

    /// Validate, upload and wait for ingestion.
    ///
    /// Rejected without side effects unless the controller is `Idle`:
    /// `AlreadyInProgress` mid-lifecycle, `DocumentAlreadyReady` once `Ready`.
    pub async fn submit(&self, file: DocumentFile) -> Result<ReadyDocument> {
        {
            let mut state = self.state.lock();
            match *state {
                UploadState::Idle => {}
                UploadState::Ready => {
                    tracing::warn!(file = %file.name, "upload rejected, a document is already loaded");
                    return Err(Error::DocumentAlreadyReady);
                }
                _ => {
                    tracing::warn!(state = ?*state, file = %file.name, "upload rejected, another is in progress");
                    return Err(Error::AlreadyInProgress);
                }
            }
            *state = UploadState::Validating;
        }
        self.events.emit(SessionEvent::UploadStateChanged {
            state: UploadState::Validating,
        });

        match self.run(&file).await {
            Ok(document) => {
                *self.document.lock() = Some(document.clone());
                self.transition(UploadState::Ready);
                self.events.emit(SessionEvent::DocumentReady {
                    file_name: document.receipt.file_name.clone(),
                    total_chunks: document.total_chunks(),
                });
                Ok(document)
            }
            Err(e) => {
                self.transition(UploadState::Idle);
                let message = match &e {
                    Error::ReadinessTimeout { .. } | Error::Unreachable { .. } => {
                        format!("Error processing document: {}", e)
                    }
                    _ => e.to_string(),
                };
                tracing::warn!(file = %file.name, error = %e, "upload lifecycle failed");
                self.events.error(ErrorOrigin::Upload, message);
                Err(e)
            }
        }
    }

    async fn run(&self, file: &DocumentFile) -> Result<ReadyDocument> {
        musache_api::validate(file).map_err(musache_api::Error::from)?;

        self.transition(UploadState::Uploading);
        let receipt = self
            .transport
            .upload(file, Some(self.progress_forwarder()))
            .await?;

        self.transition(UploadState::AwaitingReadiness);
        let status = self.poller.wait_until_ready().await?;

        Ok(ReadyDocument { receipt, status })
    }

    fn transition(&self, next: UploadState) {
        *self.state.lock() = next;
        tracing::info!(state = ?next, "upload state changed");
        self.events
            .emit(SessionEvent::UploadStateChanged { state: next });
    }

    /// Forwards progress as events, clamped to [0, 100] and never going backwards
    fn progress_forwarder(&self) -> ProgressFn {
        let events = self.events.clone();
        let last = Mutex::new(None::<f64>);
        Arc::new(move |percent: f64| {
            let percent = percent.clamp(0.0, 100.0);
            let mut last = last.lock();
            if last.is_some_and(|prev| percent <= prev) {
                return;
            }
            *last = Some(percent);
            events.emit(SessionEvent::UploadProgress { percent });
        })
    }
}
