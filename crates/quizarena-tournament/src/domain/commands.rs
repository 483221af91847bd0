//! Commands for the Tournament context.

use chrono::{DateTime, Utc};
use quizarena_core::command::Command;
use uuid::Uuid;

use super::events::Question;

/// Command to create a tournament from a vetted question set.
#[derive(Debug, Clone)]
pub struct CreateTournament {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Display name.
    pub name: String,
    /// Default contribution per player.
    pub entry_fee: u64,
    /// Operator rake in basis points.
    pub rake_bps: u32,
    /// When the tournament is announced.
    pub scheduled_at: DateTime<Utc>,
    /// When joins open.
    pub open_at: DateTime<Utc>,
    /// When joins close and play starts.
    pub start_at: DateTime<Utc>,
    /// Question set, in play order.
    pub questions: Vec<Question>,
}

impl Command for CreateTournament {
    fn command_type(&self) -> &'static str {
        "tournament.create"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to join a tournament.
#[derive(Debug, Clone)]
pub struct JoinTournament {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tournament to join.
    pub tournament_id: Uuid,
    /// Who is joining.
    pub participant_id: String,
    /// Amount added to the pot; defaults to the entry fee.
    pub contribution: Option<u64>,
}

impl Command for JoinTournament {
    fn command_type(&self) -> &'static str {
        "tournament.join"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to answer the active question.
#[derive(Debug, Clone)]
pub struct SubmitAnswer {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tournament being played.
    pub tournament_id: Uuid,
    /// Who is answering.
    pub participant_id: String,
    /// Chosen option.
    pub option_index: u32,
}

impl Command for SubmitAnswer {
    fn command_type(&self) -> &'static str {
        "tournament.submit_answer"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to remove a participant's entry before play starts.
#[derive(Debug, Clone)]
pub struct WithdrawEntry {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tournament to leave.
    pub tournament_id: Uuid,
    /// Who is leaving.
    pub participant_id: String,
}

impl Command for WithdrawEntry {
    fn command_type(&self) -> &'static str {
        "tournament.withdraw_entry"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
