//! One document, one conversation: the controllers wired to a shared event bus

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::{
    clock::Clock,
    conversation::Conversation,
    error::Result,
    events::{EventBus, SessionEvent},
    health::{DEFAULT_HEALTH_INTERVAL, HealthMonitor, SystemSnapshot, check_system},
    poller::PollConfig,
    transport::Transport,
    upload::UploadController,
};

/// Session tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub poll: PollConfig,
    /// Pause between background health checks
    pub health_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            health_interval: DEFAULT_HEALTH_INTERVAL,
        }
    }
}

/// Collaborators are injected so tests can swap in fakes for the network and time.
/// Uploading a different document means building a new session.
pub struct Session {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    events: EventBus,
    upload: UploadController,
    conversation: Conversation,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>, clock: Arc<dyn Clock>, config: SessionConfig) -> Self {
        let events = EventBus::new();
        let upload = UploadController::new(
            Arc::clone(&transport),
            Arc::clone(&clock),
            config.poll.clone(),
            events.clone(),
        );
        let conversation = Conversation::new(Arc::clone(&transport), Arc::clone(&clock), events.clone());
        Self {
            transport,
            clock,
            config,
            events,
            upload,
            conversation,
        }
    }

    /// A new session over the same transport, clock and tuning, with its own
    /// event bus. Used to load another document once this one is ready.
    pub fn fresh(&self) -> Self {
        Self::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.clock),
            self.config.clone(),
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn upload(&self) -> &UploadController {
        &self.upload
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// One-shot health and status check
    pub async fn check_system(&self) -> Result<SystemSnapshot> {
        check_system(self.transport.as_ref()).await
    }

    /// Opaque server diagnostics
    pub async fn debug_info(&self) -> Result<serde_json::Value> {
        Ok(self.transport.debug().await?)
    }

    /// Start periodic health checks on this session's event bus
    pub fn start_health_monitor(&self) -> HealthMonitor {
        HealthMonitor::spawn(
            Arc::clone(&self.transport),
            Arc::clone(&self.clock),
            self.events.clone(),
            self.config.health_interval,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::drain;
    use crate::test_support::{MockTransport, not_ready, ready};
    use crate::upload::UploadState;
    use musache_api::DocumentFile;

    fn session(transport: Arc<MockTransport>) -> Session {
        Session::new(
            transport,
            Arc::new(ManualClock::default()),
            SessionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_upload_then_chat_share_one_bus() {
        let transport = Arc::new(MockTransport::new().with_statuses(vec![not_ready(), ready(42)]));
        let session = session(transport);
        let mut rx = session.subscribe();

        let doc = session
            .upload()
            .submit(DocumentFile::new("paper.pdf", vec![1; 1024]))
            .await
            .unwrap();
        assert_eq!(doc.total_chunks(), 42);
        assert_eq!(session.upload().state(), UploadState::Ready);

        let turn = session.conversation().send("What is it about?").await.unwrap();
        assert_eq!(turn.id, 0);

        let events = drain(&mut rx);
        let ready_at = events
            .iter()
            .position(|e| matches!(e, SessionEvent::DocumentReady { .. }))
            .unwrap();
        let answer_at = events
            .iter()
            .position(|e| matches!(e, SessionEvent::AnswerReceived { .. }))
            .unwrap();
        assert!(ready_at < answer_at);
    }

    #[tokio::test]
    async fn test_fresh_session_accepts_next_document() {
        let transport = Arc::new(MockTransport::new().with_statuses(vec![ready(42), ready(7)]));
        let first = session(transport.clone());
        first
            .upload()
            .submit(DocumentFile::new("a.pdf", vec![1; 10]))
            .await
            .unwrap();
        first.conversation().send("first?").await.unwrap();

        let err = first
            .upload()
            .submit(DocumentFile::new("b.txt", b"next".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::DocumentAlreadyReady));

        let second = first.fresh();
        let mut rx = second.subscribe();
        assert_eq!(second.upload().state(), UploadState::Idle);
        assert!(second.conversation().is_empty());

        let doc = second
            .upload()
            .submit(DocumentFile::new("b.txt", b"next".to_vec()))
            .await
            .unwrap();
        assert_eq!(doc.total_chunks(), 7);
        assert_eq!(doc.receipt.file_name, "b.txt");
        assert_eq!(transport.uploads(), 2);
        assert_eq!(first.conversation().len(), 1);
        assert!(
            drain(&mut rx)
                .iter()
                .any(|e| matches!(e, SessionEvent::DocumentReady { total_chunks: 7, .. }))
        );
    }

    #[tokio::test]
    async fn test_check_system_and_debug() {
        let transport = Arc::new(MockTransport::new().with_statuses(vec![ready(3)]));
        let session = session(transport);

        let snapshot = session.check_system().await.unwrap();
        assert_eq!(snapshot.status.total_chunks, 3);
        assert_eq!(session.debug_info().await.unwrap()["documents"], 1);
    }

    #[test]
    fn test_default_config() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.poll.max_attempts, 20);
        assert_eq!(cfg.health_interval, Duration::from_secs(30));
    }
}
