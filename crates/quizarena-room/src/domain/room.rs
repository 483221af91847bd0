//! The question room state machine.
//!
//! Pure state: every operation takes the server time explicitly and returns
//! the event to broadcast, leaving delivery to the application layer.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use quizarena_core::clock::elapsed_ms;
use quizarena_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::fraud::{FraudFlag, FraudReason, FraudSeverity};
use super::response::{ResponsePayload, TournamentResponse};

/// Responses faster than this are accepted but flagged.
pub const SUSPICIOUS_LATENCY_MS: u64 = 500;

/// Reason broadcast when a room is closed without one.
pub const DEFAULT_CLOSE_REASON: &str = "tournament_room_closed";

/// A question to activate. `opened_at` defaults to the server time.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    /// Question identifier.
    pub id: String,
    /// Prompt shown to players.
    pub prompt: String,
    /// End of the submission window.
    pub deadline: DateTime<Utc>,
    /// Start of the submission window.
    #[serde(default)]
    pub opened_at: Option<DateTime<Utc>>,
}

/// The question currently accepting responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveQuestion {
    /// Question identifier.
    pub id: String,
    /// Prompt shown to players.
    pub prompt: String,
    /// Start of the submission window, inclusive.
    pub opened_at: DateTime<Utc>,
    /// End of the submission window, inclusive.
    pub deadline: DateTime<Utc>,
}

/// An event delivered to room subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    /// A question became active.
    Question {
        /// The active question.
        question: ActiveQuestion,
    },
    /// The room stopped accepting responses.
    Closed {
        /// Why it closed.
        reason: String,
    },
    /// Keep-alive with no state.
    Heartbeat {
        /// When it was sent.
        at: DateTime<Utc>,
    },
}

impl RoomEvent {
    /// Stream event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Question { .. } => "question",
            Self::Closed { .. } => "closed",
            Self::Heartbeat { .. } => "heartbeat",
        }
    }
}

/// Snapshot of a room for status reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    /// Whether submissions are refused.
    pub closed: bool,
    /// The active question, if any.
    pub current_question: Option<ActiveQuestion>,
    /// Why the room closed, while closed.
    pub close_reason: Option<String>,
}

/// One tournament's question room.
#[derive(Debug, Default)]
pub struct QuestionRoom {
    current_question: Option<ActiveQuestion>,
    closed: bool,
    close_reason: Option<String>,
    responses: Vec<TournamentResponse>,
    response_keys: HashSet<String>,
    fraud_flags: Vec<FraudFlag>,
}

impl QuestionRoom {
    /// Creates an empty, open room with no active question.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Activates a question, reopening the room and clearing responses.
    /// The fraud log is kept.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the deadline precedes the
    /// opening time or the id is blank.
    pub fn set_active_question(
        &mut self,
        question: NewQuestion,
        now: DateTime<Utc>,
    ) -> Result<RoomEvent, DomainError> {
        if question.id.trim().is_empty() {
            return Err(DomainError::Validation(
                "question id must not be empty".to_owned(),
            ));
        }
        let opened_at = question.opened_at.unwrap_or(now);
        if question.deadline < opened_at {
            return Err(DomainError::Validation(format!(
                "deadline {} is before openedAt {}",
                question.deadline.to_rfc3339(),
                opened_at.to_rfc3339()
            )));
        }

        let active = ActiveQuestion {
            id: question.id,
            prompt: question.prompt,
            opened_at,
            deadline: question.deadline,
        };
        self.current_question = Some(active.clone());
        self.closed = false;
        self.close_reason = None;
        self.responses.clear();
        self.response_keys.clear();
        Ok(RoomEvent::Question { question: active })
    }

    /// Closes the room to submissions.
    pub fn close(&mut self, reason: Option<String>) -> RoomEvent {
        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CLOSE_REASON.to_owned());
        self.closed = true;
        self.close_reason = Some(reason.clone());
        RoomEvent::Closed { reason }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> RoomStatus {
        RoomStatus {
            closed: self.closed,
            current_question: self.current_question.clone(),
            close_reason: self.close_reason.clone(),
        }
    }

    /// Events that bring a new subscriber up to date: the active question,
    /// then the closed state.
    #[must_use]
    pub fn replay(&self) -> Vec<RoomEvent> {
        let mut events = Vec::new();
        if let Some(question) = &self.current_question {
            events.push(RoomEvent::Question {
                question: question.clone(),
            });
        }
        if self.closed {
            events.push(RoomEvent::Closed {
                reason: self
                    .close_reason
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CLOSE_REASON.to_owned()),
            });
        }
        events
    }

    /// Copy of the fraud log.
    #[must_use]
    pub fn fraud_flags(&self) -> Vec<FraudFlag> {
        self.fraud_flags.clone()
    }

    /// Copy of the responses accepted for the active question.
    #[must_use]
    pub fn responses(&self) -> Vec<TournamentResponse> {
        self.responses.clone()
    }

    /// Validates and records a response received at `now`.
    ///
    /// Every rejection appends a blocked flag. An accepted response faster
    /// than [`SUSPICIOUS_LATENCY_MS`] appends a warning flag.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` with no active question, a closed
    /// room, or a receipt time outside the window; `DomainError::Validation`
    /// when the question id is not the active one; `DomainError::Conflict`
    /// for a second response from the same participant.
    pub fn submit_response(
        &mut self,
        payload: ResponsePayload,
        now: DateTime<Utc>,
    ) -> Result<TournamentResponse, DomainError> {
        let Some(active) = self.current_question.clone() else {
            self.block(
                FraudReason::UnknownQuestion,
                &payload,
                "attempted to answer without an active question".to_owned(),
                now,
            );
            return Err(DomainError::InvalidState(
                "there is no active question at the moment".to_owned(),
            ));
        };

        if self.closed {
            self.block(
                FraudReason::OutsideWindow,
                &payload,
                "room is closed for submissions".to_owned(),
                now,
            );
            return Err(DomainError::InvalidState(
                "tournament room is closed".to_owned(),
            ));
        }

        if payload.question_id != active.id {
            self.block(
                FraudReason::UnknownQuestion,
                &payload,
                "question id does not match the active one".to_owned(),
                now,
            );
            return Err(DomainError::Validation(
                "submitted question does not match the active question".to_owned(),
            ));
        }

        if now < active.opened_at || now > active.deadline {
            self.block(
                FraudReason::OutsideWindow,
                &payload,
                format!(
                    "submission received outside of the active window ({} - {})",
                    active.opened_at.to_rfc3339(),
                    active.deadline.to_rfc3339()
                ),
                now,
            );
            return Err(DomainError::InvalidState(
                "submission outside of the allowed window".to_owned(),
            ));
        }

        let key = format!("{}:{}", payload.question_id, payload.participant_id);
        if self.response_keys.contains(&key) {
            self.block(
                FraudReason::DuplicateSubmission,
                &payload,
                "duplicate submission detected for participant and question".to_owned(),
                now,
            );
            return Err(DomainError::Conflict(
                "duplicate submission detected".to_owned(),
            ));
        }

        let latency_ms = elapsed_ms(active.opened_at, now);
        let suspicious = latency_ms < SUSPICIOUS_LATENCY_MS;
        let nonce = payload
            .nonce
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let response = TournamentResponse::sealed(payload, nonce, now, latency_ms, suspicious);

        if suspicious {
            self.fraud_flags.push(FraudFlag::new(
                FraudSeverity::Warning,
                FraudReason::SuspiciousLatency,
                &response.participant_id,
                &response.question_id,
                format!("latency too low ({latency_ms}ms)"),
                now,
            ));
        }
        self.response_keys.insert(key);
        self.responses.push(response.clone());
        Ok(response)
    }

    fn block(
        &mut self,
        reason: FraudReason,
        payload: &ResponsePayload,
        detail: String,
        now: DateTime<Utc>,
    ) {
        self.fraud_flags.push(FraudFlag::new(
            FraudSeverity::Blocked,
            reason,
            &payload.participant_id,
            &payload.question_id,
            detail,
            now,
        ));
    }
}
