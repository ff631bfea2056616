//! Readiness polling: ask for status until the server reports ready or the budget runs out

use std::sync::Arc;
use std::time::Duration;

use musache_api::{SystemState, SystemStatus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    clock::Clock,
    error::{Error, Result},
    events::{EventBus, SessionEvent},
    transport::Transport,
};

/// Polling budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Status checks before giving up
    pub max_attempts: u32,
    /// Fixed pause between checks; there is no backoff
    pub interval: Duration,
    /// Give up early after this many transport failures in a row.
    /// `None` treats every failure as "not ready yet".
    pub max_consecutive_failures: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval: Duration::from_millis(3000),
            max_consecutive_failures: None,
        }
    }
}

impl PollConfig {
    /// Longest the poller can spend sleeping: one interval between each pair of checks
    pub fn worst_case_wait(&self) -> Duration {
        self.interval * self.max_attempts.max(1).saturating_sub(1)
    }
}

/// Where the poller is in its `Polling -> Ready | Exhausted` progression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PollState {
    Polling { attempt: u32 },
    Ready,
    Exhausted,
}

/// Repeatedly queries `/status` until it reports `ready`.
///
/// A failed status call counts as a not-ready attempt, which rides out servers
/// that are asleep or restarting.
pub struct ReadinessPoller {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    config: PollConfig,
    events: Option<EventBus>,
    state: Mutex<PollState>,
}

impl ReadinessPoller {
    pub fn new(transport: Arc<dyn Transport>, clock: Arc<dyn Clock>, config: PollConfig) -> Self {
        Self {
            transport,
            clock,
            config,
            events: None,
            state: Mutex::new(PollState::Polling { attempt: 0 }),
        }
    }

    /// Emit a `ReadinessCheck` event per attempt on this bus
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn state(&self) -> PollState {
        *self.state.lock()
    }

    /// Poll until ready. Fails with `ReadinessTimeout` after `max_attempts` checks,
    /// or `Unreachable` when the consecutive-failure cap is hit.
    pub async fn wait_until_ready(&self) -> Result<SystemStatus> {
        let max_attempts = self.config.max_attempts.max(1);
        let failure_cap = self.config.max_consecutive_failures.filter(|c| *c > 0);
        let mut attempts = 0u32;
        let mut consecutive_failures = 0u32;

        *self.state.lock() = PollState::Polling { attempt: 0 };

        loop {
            let outcome = self.transport.status().await;
            self.emit_check(attempts + 1, max_attempts, &outcome);

            match outcome {
                Ok(status) if status.is_ready() => {
                    *self.state.lock() = PollState::Ready;
                    tracing::info!(
                        attempts = attempts + 1,
                        total_chunks = status.total_chunks,
                        "system ready"
                    );
                    return Ok(status);
                }
                Ok(status) => {
                    consecutive_failures = 0;
                    if status.state == SystemState::Error {
                        tracing::warn!("server reports ingestion error, still waiting");
                    } else {
                        tracing::debug!(state = status.state.as_str(), "system not ready yet, waiting");
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        attempt = attempts + 1,
                        consecutive_failures,
                        error = %e,
                        "error checking status"
                    );
                    if let Some(cap) = failure_cap {
                        if consecutive_failures >= cap {
                            *self.state.lock() = PollState::Exhausted;
                            return Err(Error::Unreachable {
                                consecutive_failures,
                                last_error: e.to_string(),
                            });
                        }
                    }
                }
            }

            attempts += 1;
            *self.state.lock() = PollState::Polling { attempt: attempts };

            if attempts >= max_attempts {
                *self.state.lock() = PollState::Exhausted;
                tracing::warn!(attempts, "system did not become ready within the expected time");
                return Err(Error::ReadinessTimeout { attempts });
            }

            self.clock.sleep(self.config.interval).await;
        }
    }

    fn emit_check(
        &self,
        attempt: u32,
        max_attempts: u32,
        outcome: &musache_api::Result<SystemStatus>,
    ) {
        if let Some(events) = &self.events {
            events.emit(SessionEvent::ReadinessCheck {
                attempt,
                max_attempts,
                state: outcome.as_ref().ok().map(|s| s.state),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::drain;
    use crate::test_support::{MockTransport, not_ready, ready, unreachable};

    fn poller(
        transport: Arc<MockTransport>,
        clock: Arc<ManualClock>,
        config: PollConfig,
    ) -> ReadinessPoller {
        ReadinessPoller::new(transport, clock, config)
    }

    fn config(max_attempts: u32) -> PollConfig {
        PollConfig {
            max_attempts,
            interval: Duration::from_secs(3),
            max_consecutive_failures: None,
        }
    }

    #[tokio::test]
    async fn test_never_ready_exhausts_after_max_attempts() {
        let transport = Arc::new(MockTransport::new());
        let clock = Arc::new(ManualClock::default());
        let p = poller(transport.clone(), clock.clone(), config(5));

        let err = p.wait_until_ready().await.unwrap_err();

        assert!(matches!(err, Error::ReadinessTimeout { attempts: 5 }), "{err:?}");
        assert_eq!(transport.statuses(), 5);
        assert_eq!(clock.sleeps().len(), 4);
        assert_eq!(clock.total_slept(), Duration::from_secs(12));
        assert_eq!(p.state(), PollState::Exhausted);
    }

    #[tokio::test]
    async fn test_ready_on_third_call_stops_there() {
        let transport = Arc::new(
            MockTransport::new().with_statuses(vec![not_ready(), not_ready(), ready(42), ready(42)]),
        );
        let clock = Arc::new(ManualClock::default());
        let p = poller(transport.clone(), clock.clone(), config(20));

        let status = p.wait_until_ready().await.unwrap();

        assert_eq!(status.total_chunks, 42);
        assert_eq!(transport.statuses(), 3);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(3); 2]);
        assert_eq!(p.state(), PollState::Ready);
    }

    #[tokio::test]
    async fn test_transport_failures_count_as_not_ready() {
        let transport = Arc::new(
            MockTransport::new().with_statuses(vec![unreachable(), unreachable(), ready(7)]),
        );
        let clock = Arc::new(ManualClock::default());
        let p = poller(transport.clone(), clock, config(20));

        let status = p.wait_until_ready().await.unwrap();
        assert_eq!(status.total_chunks, 7);
        assert_eq!(transport.statuses(), 3);
    }

    #[tokio::test]
    async fn test_failures_exhaust_attempt_budget_without_cap() {
        let transport = Arc::new(MockTransport::new().with_statuses(
            (0..10).map(|_| unreachable()).collect(),
        ));
        let clock = Arc::new(ManualClock::default());
        let p = poller(transport.clone(), clock, config(4));

        let err = p.wait_until_ready().await.unwrap_err();
        assert!(matches!(err, Error::ReadinessTimeout { attempts: 4 }));
        assert_eq!(transport.statuses(), 4);
    }

    #[tokio::test]
    async fn test_consecutive_failure_cap() {
        let transport = Arc::new(MockTransport::new().with_statuses(
            (0..10).map(|_| unreachable()).collect(),
        ));
        let clock = Arc::new(ManualClock::default());
        let cfg = PollConfig {
            max_consecutive_failures: Some(3),
            ..config(20)
        };
        let p = poller(transport.clone(), clock.clone(), cfg);

        let err = p.wait_until_ready().await.unwrap_err();
        match err {
            Error::Unreachable {
                consecutive_failures,
                last_error,
            } => {
                assert_eq!(consecutive_failures, 3);
                assert!(last_error.contains("connection refused"));
            }
            other => panic!("expected Unreachable, got {:?}", other),
        }
        assert_eq!(transport.statuses(), 3);
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_cap_resets_on_any_answer() {
        let transport = Arc::new(MockTransport::new().with_statuses(vec![
            unreachable(),
            unreachable(),
            not_ready(),
            unreachable(),
            unreachable(),
            ready(1),
        ]));
        let clock = Arc::new(ManualClock::default());
        let cfg = PollConfig {
            max_consecutive_failures: Some(3),
            ..config(20)
        };
        let p = poller(transport.clone(), clock, cfg);

        assert!(p.wait_until_ready().await.is_ok());
        assert_eq!(transport.statuses(), 6);
    }

    #[tokio::test]
    async fn test_default_budget() {
        let cfg = PollConfig::default();
        assert_eq!(cfg.max_attempts, 20);
        assert_eq!(cfg.interval, Duration::from_millis(3000));
        assert_eq!(cfg.worst_case_wait(), Duration::from_secs(57));

        let transport = Arc::new(MockTransport::new());
        let clock = Arc::new(ManualClock::default());
        let p = poller(transport.clone(), clock.clone(), cfg);
        assert!(p.wait_until_ready().await.is_err());
        assert_eq!(transport.statuses(), 20);
        assert_eq!(clock.total_slept(), Duration::from_secs(57));
    }

    #[tokio::test]
    async fn test_emits_check_events() {
        let transport = Arc::new(
            MockTransport::new().with_statuses(vec![unreachable(), not_ready(), ready(3)]),
        );
        let clock = Arc::new(ManualClock::default());
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let p = poller(transport, clock, config(10)).with_events(bus);

        p.wait_until_ready().await.unwrap();

        let checks: Vec<_> = drain(&mut rx)
            .into_iter()
            .map(|e| match e {
                SessionEvent::ReadinessCheck { attempt, state, .. } => (attempt, state),
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(
            checks,
            vec![
                (1, None),
                (2, Some(SystemState::NotReady)),
                (3, Some(SystemState::Ready))
            ]
        );
    }
}
