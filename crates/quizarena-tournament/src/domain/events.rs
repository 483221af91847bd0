//! Domain events for the Tournament context.

use std::fmt;

use chrono::{DateTime, Utc};
use quizarena_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle phase of a tournament. Ordered; a tournament only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentState {
    /// Created, not yet accepting joins.
    Scheduled,
    /// Accepting joins.
    Open,
    /// Joins closed, about to start.
    Locked,
    /// Questions are being asked.
    InProgress,
    /// Last question timed out; awaiting settlement.
    Finished,
    /// Payouts computed.
    Settled,
}

impl TournamentState {
    /// Stable string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Open => "open",
            Self::Locked => "locked",
            Self::InProgress => "in_progress",
            Self::Finished => "finished",
            Self::Settled => "settled",
        }
    }
}

impl fmt::Display for TournamentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A vetted trivia question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Question identifier.
    pub id: String,
    /// Prompt shown to players.
    pub text: String,
    /// Answer options, in display order.
    pub options: Vec<String>,
    /// Index of the correct option.
    pub correct_option: u32,
    /// Answer window; the default window applies when absent.
    pub timeout_seconds: Option<u32>,
}

/// An accepted answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Tournament answered in.
    pub tournament_id: Uuid,
    /// Question answered.
    pub question_id: String,
    /// Who answered.
    pub participant_id: String,
    /// Chosen option.
    pub option_index: u32,
    /// When the answer arrived.
    pub submitted_at: DateTime<Utc>,
    /// Milliseconds since the question started.
    pub latency_ms: u64,
}

/// A settled prize with the stats that earned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentPayout {
    /// Recipient.
    pub participant_id: String,
    /// Amount in the smallest currency unit.
    pub amount: u64,
    /// Ranking position.
    pub rank: u32,
    /// Correct answers.
    pub correct_count: u32,
    /// Integer mean latency in milliseconds.
    pub average_latency_ms: u64,
}

/// Emitted once when a tournament is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentCreated {
    /// The tournament identifier.
    pub tournament_id: Uuid,
    /// Display name.
    pub name: String,
    /// Default contribution per player.
    pub entry_fee: u64,
    /// Operator rake in basis points.
    pub rake_bps: u32,
    /// When the tournament was announced.
    pub scheduled_at: DateTime<Utc>,
    /// When joins open.
    pub open_at: DateTime<Utc>,
    /// When joins close and play starts.
    pub start_at: DateTime<Utc>,
    /// Question set, in play order.
    pub questions: Vec<Question>,
}

/// Emitted on every phase transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseChanged {
    /// The tournament identifier.
    pub tournament_id: Uuid,
    /// Previous phase.
    pub from: TournamentState,
    /// New phase.
    pub to: TournamentState,
    /// When the transition was observed.
    pub at: DateTime<Utc>,
}

/// Emitted when a question becomes active. Never carries the correct option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionStarted {
    /// The tournament identifier.
    pub tournament_id: Uuid,
    /// Zero-based position in the question set.
    pub index: usize,
    /// Question identifier.
    pub question_id: String,
    /// Prompt shown to players.
    pub text: String,
    /// Answer options.
    pub options: Vec<String>,
    /// When the question opened.
    pub started_at: DateTime<Utc>,
    /// When its window closes.
    pub deadline: DateTime<Utc>,
}

/// Emitted when a participant joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerJoined {
    /// The tournament identifier.
    pub tournament_id: Uuid,
    /// Who joined.
    pub participant_id: String,
    /// Amount added to the pot.
    pub contribution: u64,
    /// When they joined.
    pub joined_at: DateTime<Utc>,
}

/// Emitted when a participant's entry is removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerWithdrawn {
    /// The tournament identifier.
    pub tournament_id: Uuid,
    /// Who left.
    pub participant_id: String,
    /// Amount taken back out of the pot.
    pub contribution: u64,
}

/// Emitted when an answer is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecorded {
    /// The accepted answer.
    pub answer: Answer,
}

/// Emitted once settlement has produced payouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentSettled {
    /// The tournament identifier.
    pub tournament_id: Uuid,
    /// Payouts by rank.
    pub payouts: Vec<TournamentPayout>,
    /// Merkle root over the final ranking.
    pub merkle_root: String,
    /// When settlement completed.
    pub settled_at: DateTime<Utc>,
}

/// Event payload variants for the Tournament context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TournamentEventKind {
    /// A tournament was created.
    TournamentCreated(TournamentCreated),
    /// The tournament moved to a new phase.
    PhaseChanged(PhaseChanged),
    /// A question became active.
    QuestionStarted(QuestionStarted),
    /// A participant joined.
    PlayerJoined(PlayerJoined),
    /// A participant's entry was removed.
    PlayerWithdrawn(PlayerWithdrawn),
    /// An answer was accepted.
    AnswerRecorded(AnswerRecorded),
    /// Settlement completed.
    TournamentSettled(TournamentSettled),
}

/// Domain event envelope for the Tournament context.
#[derive(Debug, Clone)]
pub struct TournamentEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: TournamentEventKind,
}

impl TournamentEventKind {
    /// Routing name of this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TournamentCreated(_) => "tournament.created",
            Self::PhaseChanged(_) => "tournament.phase_changed",
            Self::QuestionStarted(_) => "tournament.question_started",
            Self::PlayerJoined(_) => "tournament.player_joined",
            Self::PlayerWithdrawn(_) => "tournament.player_withdrawn",
            Self::AnswerRecorded(_) => "tournament.answer_recorded",
            Self::TournamentSettled(_) => "tournament.settled",
        }
    }
}

impl DomainEvent for TournamentEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(&self.kind).unwrap_or_default()
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
