//! Append-only fraud log entries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Why a flag was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudReason {
    /// A second response for the same participant and question.
    DuplicateSubmission,
    /// Received while the room was closed or outside the window.
    OutsideWindow,
    /// No active question, or the question id did not match it.
    UnknownQuestion,
    /// Accepted, but faster than a human plausibly answers.
    SuspiciousLatency,
}

/// Whether the flagged action was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudSeverity {
    /// Accepted but noted.
    Warning,
    /// Rejected.
    Blocked,
}

/// An audit record of a rejected or suspicious response. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudFlag {
    /// Flag identifier.
    pub id: Uuid,
    /// When the flag was raised.
    pub created_at: DateTime<Utc>,
    /// Warning or blocked.
    pub severity: FraudSeverity,
    /// Reason code.
    pub reason: FraudReason,
    /// Participant who submitted, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    /// Question referenced by the submission, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    /// Free-text detail.
    pub detail: String,
}

impl FraudFlag {
    pub(crate) fn new(
        severity: FraudSeverity,
        reason: FraudReason,
        participant_id: &str,
        question_id: &str,
        detail: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            severity,
            reason,
            participant_id: non_empty(participant_id),
            question_id: non_empty(question_id),
            detail,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}
