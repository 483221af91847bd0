//! Settlement persistence abstraction.
//!
//! Rows exchanged with the durable store that backs settlement: the finished
//! tournament snapshot, the locked pot, the ranking, and payout records.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// One answer given by a participant, as seen by settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryAnswer {
    /// Question answered.
    pub question_id: String,
    /// Option chosen.
    pub option_index: u32,
    /// Milliseconds between the question opening and the answer arriving.
    pub latency_ms: u64,
}

/// A participant's entry in a finished tournament.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentEntry {
    /// Participant identifier.
    pub participant_id: String,
    /// Every answer the participant gave.
    pub answers: Vec<EntryAnswer>,
}

/// Snapshot of a tournament handed to settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentRecord {
    /// Tournament identifier.
    pub id: Uuid,
    /// Entry price in the smallest currency unit.
    pub buy_in: u64,
    /// Operator rake in basis points.
    pub rake_bps: u32,
    /// Entries, one per participant.
    pub entries: Vec<TournamentEntry>,
}

/// Locked pot for a tournament.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotBreakdown {
    /// Number of paid entries.
    pub total_entries: u64,
    /// `total_entries × buy_in`.
    pub gross_pot: u64,
    /// Operator rake in basis points.
    pub rake_bps: u32,
    /// `floor(gross_pot × rake_bps / 10_000)`.
    pub rake: u64,
    /// `gross_pot − rake`.
    pub prize_pool: u64,
}

/// One row of the final ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingRow {
    /// Participant identifier.
    pub participant_id: String,
    /// Number of correct answers.
    pub correct_count: u32,
    /// Integer mean response latency in milliseconds.
    pub average_latency_ms: u64,
    /// Dense 1-based position.
    pub position: u32,
}

/// Lifecycle of a payout row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Allocated, transfer not attempted.
    Pending,
    /// Transfer submitted to the executor.
    Submitted,
    /// Transfer confirmed out of band.
    Confirmed,
    /// Transfer failed; needs an out-of-band retry.
    Failed,
}

impl PayoutStatus {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }

    /// Whether a payout may move from `self` to `next`.
    ///
    /// `pending → submitted → confirmed`, `pending | submitted → failed`, and
    /// `failed → submitted` for a retry.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending | Self::Failed, Self::Submitted)
                | (Self::Submitted, Self::Confirmed)
                | (Self::Pending | Self::Submitted, Self::Failed)
        )
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayoutStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "submitted" => Ok(Self::Submitted),
            "confirmed" => Ok(Self::Confirmed),
            "failed" => Ok(Self::Failed),
            other => Err(DomainError::Validation(format!(
                "unknown payout status: {other}"
            ))),
        }
    }
}

/// A prize payout to one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRecord {
    /// Idempotent payout identifier (`payout_<uuid>`).
    pub id: String,
    /// Tournament the payout belongs to.
    pub tournament_id: Uuid,
    /// Recipient.
    pub participant_id: String,
    /// Ranking position.
    pub rank: u32,
    /// Amount in the smallest currency unit.
    pub amount: u64,
    /// Transfer transaction hash, once submitted.
    pub tx_hash: Option<String>,
    /// Merkle inclusion proof of the recipient's ranking row.
    pub merkle_proof: Vec<String>,
    /// Current status.
    pub status: PayoutStatus,
    /// Explorer link for `tx_hash`.
    pub explorer_url: Option<String>,
}

/// Durable store for tournament, pot, ranking, and payout rows.
#[async_trait]
pub trait SettlementRepository: Send + Sync {
    /// Stores (or replaces) the snapshot of a finished tournament.
    async fn save_tournament(&self, record: &TournamentRecord) -> Result<(), DomainError>;

    /// Loads a tournament snapshot by id.
    async fn load_tournament(
        &self,
        tournament_id: Uuid,
    ) -> Result<Option<TournamentRecord>, DomainError>;

    /// Stores (or replaces) the locked pot.
    async fn persist_pot(&self, tournament_id: Uuid, pot: &PotBreakdown)
    -> Result<(), DomainError>;

    /// Appends ranking rows.
    async fn save_ranking(
        &self,
        tournament_id: Uuid,
        ranking: &[RankingRow],
    ) -> Result<(), DomainError>;

    /// Inserts payout rows.
    async fn create_payouts(&self, payouts: &[PayoutRecord]) -> Result<(), DomainError>;

    /// Lists payouts for a tournament ordered by rank.
    async fn list_payouts(&self, tournament_id: Uuid) -> Result<Vec<PayoutRecord>, DomainError>;

    /// Loads a single payout.
    async fn load_payout(&self, payout_id: &str) -> Result<Option<PayoutRecord>, DomainError>;

    /// Updates a payout's status, keeping an existing transaction hash when
    /// `tx_hash` is `None`.
    async fn mark_payout_status(
        &self,
        payout_id: &str,
        status: PayoutStatus,
        tx_hash: Option<&str>,
        explorer_url: Option<&str>,
    ) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payout_status_allows_forward_transitions() {
        assert!(PayoutStatus::Pending.can_transition_to(PayoutStatus::Submitted));
        assert!(PayoutStatus::Submitted.can_transition_to(PayoutStatus::Confirmed));
        assert!(PayoutStatus::Pending.can_transition_to(PayoutStatus::Failed));
        assert!(PayoutStatus::Failed.can_transition_to(PayoutStatus::Submitted));
    }

    #[test]
    fn test_payout_status_rejects_backward_transitions() {
        assert!(!PayoutStatus::Confirmed.can_transition_to(PayoutStatus::Pending));
        assert!(!PayoutStatus::Confirmed.can_transition_to(PayoutStatus::Failed));
        assert!(!PayoutStatus::Submitted.can_transition_to(PayoutStatus::Pending));
        assert!(!PayoutStatus::Failed.can_transition_to(PayoutStatus::Confirmed));
    }

    #[test]
    fn test_payout_status_parses_storage_form() {
        for status in [
            PayoutStatus::Pending,
            PayoutStatus::Submitted,
            PayoutStatus::Confirmed,
            PayoutStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<PayoutStatus>().unwrap(), status);
        }
        assert!("settled".parse::<PayoutStatus>().is_err());
    }
}
