//! musache-session: client-side orchestration for document question answering
//!
//! Owns the upload lifecycle (validate, upload, wait for ingestion), the
//! readiness poller, the conversation transcript and periodic health checks.
//! Network access and time are injected through the [`Transport`] and
//! [`Clock`] traits; progress and results are published as [`SessionEvent`]s.

pub mod clock;
pub mod conversation;
pub mod error;
pub mod events;
pub mod health;
pub mod poller;
pub mod session;
pub mod transport;
pub mod upload;

#[cfg(test)]
mod test_support;

pub use clock::{Clock, ManualClock, SystemClock};
pub use conversation::{Conversation, ConversationSummary, TranscriptEntry, Turn};
pub use error::{Error, Result};
pub use events::{ErrorOrigin, EventBus, SessionEvent};
pub use health::{ConnectionState, HealthMonitor, SystemSnapshot, check_system};
pub use poller::{PollConfig, PollState, ReadinessPoller};
pub use session::{Session, SessionConfig};
pub use transport::Transport;
pub use upload::{ReadyDocument, UploadController, UploadState};
