//! Conversation state: the in-memory transcript and the single in-flight question

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use musache_api::HistoryEntry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    clock::Clock,
    error::{Error, Result},
    events::{ErrorOrigin, EventBus, SessionEvent},
    transport::Transport,
};

/// One question/answer exchange. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: u64,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    pub context_chunks: Vec<String>,
    pub response_time_seconds: f64,
}

/// Exported form of a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub answer: String,
    pub response_time_seconds: f64,
}

impl From<&Turn> for TranscriptEntry {
    fn from(turn: &Turn) -> Self {
        Self {
            timestamp: turn.created_at,
            question: turn.question.clone(),
            answer: turn.answer.clone(),
            response_time_seconds: turn.response_time_seconds,
        }
    }
}

/// Aggregate numbers over the current transcript
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub total_questions: usize,
    pub average_response_time_seconds: Option<f64>,
    pub first_turn_at: Option<DateTime<Utc>>,
    pub last_turn_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Transcript {
    turns: Vec<Turn>,
    next_id: u64,
}

/// Clears the in-flight flag however `send` exits
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sends questions one at a time and keeps the ordered transcript of answers.
pub struct Conversation {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    transcript: Mutex<Transcript>,
    in_flight: AtomicBool,
}

impl Conversation {
    pub fn new(transport: Arc<dyn Transport>, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self {
            transport,
            clock,
            events,
            transcript: Mutex::new(Transcript::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Whether a question is waiting for its answer
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Ask a question and append the answer to the transcript.
    ///
    /// Fails with `Busy` without touching the network while another question is
    /// in flight. On transport failure the transcript is left as it was.
    pub async fn send(&self, question: &str) -> Result<Turn> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::EmptyQuestion);
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("question rejected, previous answer still pending");
            self.events
                .error(ErrorOrigin::Conversation, Error::Busy.to_string());
            return Err(Error::Busy);
        }
        let _in_flight = InFlight(&self.in_flight);

        self.events.emit(SessionEvent::QuestionSent {
            question: question.to_string(),
        });

        let response = match self.transport.ask(question).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "ask failed");
                self.events.error(ErrorOrigin::Conversation, e.to_string());
                return Err(e.into());
            }
        };

        let turn = {
            let mut transcript = self.transcript.lock();
            let turn = Turn {
                id: transcript.next_id,
                question: question.to_string(),
                answer: response.answer,
                created_at: self.clock.now(),
                context_chunks: response.context_chunks,
                response_time_seconds: response.response_time_seconds,
            };
            transcript.next_id += 1;
            transcript.turns.push(turn.clone());
            turn
        };

        tracing::info!(
            id = turn.id,
            response_time = turn.response_time_seconds,
            chunks = turn.context_chunks.len(),
            "answer received"
        );
        self.events
            .emit(SessionEvent::AnswerReceived { turn: turn.clone() });
        Ok(turn)
    }

    /// Server-persisted exchanges from earlier sessions, most recent first.
    /// Never merged into the transcript.
    pub async fn history(&self, limit: u32) -> Result<Vec<HistoryEntry>> {
        let entries = self.transport.history(limit).await.map_err(|e| {
            tracing::debug!(error = %e, "no previous history available");
            Error::from(e)
        })?;
        Ok(entries)
    }

    /// Snapshot of the transcript in chronological order
    pub fn turns(&self) -> Vec<Turn> {
        self.transcript.lock().turns.clone()
    }

    pub fn len(&self) -> usize {
        self.transcript.lock().turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializable copy of the transcript. No side effects.
    pub fn export_transcript(&self) -> Vec<TranscriptEntry> {
        self.transcript
            .lock()
            .turns
            .iter()
            .map(TranscriptEntry::from)
            .collect()
    }

    /// The exported transcript as pretty-printed JSON
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.export_transcript())
    }

    /// Drop every turn and restart ids at zero
    pub fn reset(&self) {
        {
            let mut transcript = self.transcript.lock();
            transcript.turns.clear();
            transcript.next_id = 0;
        }
        tracing::info!("transcript cleared");
        self.events.emit(SessionEvent::TranscriptCleared);
    }

    pub fn summary(&self) -> ConversationSummary {
        let transcript = self.transcript.lock();
        let turns = &transcript.turns;
        let average = if turns.is_empty() {
            None
        } else {
            Some(turns.iter().map(|t| t.response_time_seconds).sum::<f64>() / turns.len() as f64)
        };
        ConversationSummary {
            total_questions: turns.len(),
            average_response_time_seconds: average,
            first_turn_at: turns.first().map(|t| t.created_at),
            last_turn_at: turns.last().map(|t| t.created_at),
        }
    }

    /// Turns whose question or answer contains `query`, ignoring case
    pub fn search(&self, query: &str) -> Vec<Turn> {
        let needle = query.to_lowercase();
        self.transcript
            .lock()
            .turns
            .iter()
            .filter(|t| {
                t.question.to_lowercase().contains(&needle)
                    || t.answer.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }
}
