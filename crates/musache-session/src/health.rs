//! Connectivity checks: one-shot and periodic

use std::sync::Arc;
use std::time::Duration;

use musache_api::{SystemState, SystemStatus};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::{
    clock::Clock,
    error::Result,
    events::{EventBus, SessionEvent},
    transport::Transport,
};

/// Default pause between background checks
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);

/// Coarse connection indicator for a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Reachable and a document is ingested
    Ready,
    /// Reachable, nothing queryable yet
    Connected,
    /// Unreachable or reporting an error
    Error,
}

impl ConnectionState {
    pub fn from_status(status: &SystemStatus) -> Self {
        match status.state {
            SystemState::Ready => ConnectionState::Ready,
            SystemState::NotReady => ConnectionState::Connected,
            SystemState::Error | SystemState::Unknown => ConnectionState::Error,
        }
    }
}

/// Result of a full health check
#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    pub health: serde_json::Value,
    pub status: SystemStatus,
    pub connection: ConnectionState,
}

/// `GET /health` followed by `GET /status`
pub async fn check_system(transport: &dyn Transport) -> Result<SystemSnapshot> {
    let health = transport.health().await?;
    let status = transport.status().await?;
    let connection = ConnectionState::from_status(&status);
    tracing::debug!(
        state = status.state.as_str(),
        total_chunks = status.total_chunks,
        "system status"
    );
    Ok(SystemSnapshot {
        health,
        status,
        connection,
    })
}

/// Background task re-running `check_system` on a fixed interval and emitting
/// `SystemStatus` events. Stops when dropped.
pub struct HealthMonitor {
    handle: JoinHandle<()>,
}

impl HealthMonitor {
    pub fn spawn(
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        events: EventBus,
        interval: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                clock.sleep(interval).await;
                let event = match check_system(transport.as_ref()).await {
                    Ok(snapshot) => SessionEvent::SystemStatus {
                        connection: snapshot.connection,
                        total_chunks: Some(snapshot.status.total_chunks),
                    },
                    Err(e) => {
                        // Expected while the server sleeps
                        tracing::debug!(error = %e, "periodic health check failed");
                        SessionEvent::SystemStatus {
                            connection: ConnectionState::Error,
                            total_chunks: None,
                        }
                    }
                };
                events.emit(event);
            }
        });
        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
