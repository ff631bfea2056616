//! Events emitted to whatever front end is attached

use musache_api::SystemState;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::conversation::Turn;
use crate::health::ConnectionState;
use crate::upload::UploadState;

/// Which controller an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorOrigin {
    Upload,
    Conversation,
}

/// Events emitted while a session runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The upload lifecycle moved to a new state
    UploadStateChanged { state: UploadState },

    /// Upload body progress, 0 to 100
    UploadProgress { percent: f64 },

    /// One readiness poll finished. `state` is `None` when the check itself failed.
    ReadinessCheck {
        attempt: u32,
        max_attempts: u32,
        state: Option<SystemState>,
    },

    /// Ingestion finished; the document can be queried
    DocumentReady { file_name: String, total_chunks: u64 },

    /// A question was accepted and is on its way
    QuestionSent { question: String },

    /// An answer arrived and was appended to the transcript
    AnswerReceived { turn: Turn },

    /// The transcript was reset
    TranscriptCleared,

    /// Periodic connectivity report
    SystemStatus {
        connection: ConnectionState,
        total_chunks: Option<u64>,
    },

    /// Something failed; shown to the user once
    Error { origin: ErrorOrigin, message: String },
}

impl SessionEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, SessionEvent::Error { .. })
    }
}

/// Fan-out channel shared by the controllers of one session. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Send to every current subscriber. Having none is fine.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    pub(crate) fn error(&self, origin: ErrorOrigin, message: impl Into<String>) {
        self.emit(SessionEvent::Error {
            origin,
            message: message.into(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain everything currently buffered on a receiver
#[cfg(test)]
pub(crate) fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.emit(SessionEvent::TranscriptCleared);
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(SessionEvent::UploadProgress { percent: 10.0 });
        bus.error(ErrorOrigin::Upload, "boom");

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], SessionEvent::UploadProgress { percent } if percent == 10.0));
        assert!(events[1].is_error());
    }

    #[test]
    fn test_events_serialize_tagged() {
        let json = serde_json::to_value(SessionEvent::DocumentReady {
            file_name: "a.pdf".into(),
            total_chunks: 42,
        })
        .unwrap();
        assert_eq!(json["type"], "document_ready");
        assert_eq!(json["total_chunks"], 42);
    }
}
