//! Accepted responses and their integrity hash.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

/// A participant's submission as received from the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    /// Question being answered.
    pub question_id: String,
    /// Who is answering.
    pub participant_id: String,
    /// Answer text.
    pub answer: String,
    /// Client-chosen nonce; generated when absent.
    #[serde(default)]
    pub nonce: Option<String>,
    /// Client-reported send time, stored as given.
    #[serde(default)]
    pub client_timestamp: Option<String>,
}

/// A recorded response. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentResponse {
    /// `questionId:participantId`.
    pub id: String,
    /// Question answered.
    pub question_id: String,
    /// Who answered.
    pub participant_id: String,
    /// Answer text.
    pub answer: String,
    /// Nonce mixed into the hash.
    pub nonce: String,
    /// Client-reported send time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_timestamp: Option<String>,
    /// Server receipt time.
    pub received_at: DateTime<Utc>,
    /// Milliseconds from the question opening to receipt.
    pub latency_ms: u64,
    /// Whether the latency was under the suspicious threshold.
    pub suspicious_latency: bool,
    /// SHA-256 hex over the canonical encoding of the fields above.
    pub hash: String,
}

impl TournamentResponse {
    /// Builds a response and seals it with its integrity hash.
    #[must_use]
    pub fn sealed(
        payload: ResponsePayload,
        nonce: String,
        received_at: DateTime<Utc>,
        latency_ms: u64,
        suspicious_latency: bool,
    ) -> Self {
        let mut response = Self {
            id: format!("{}:{}", payload.question_id, payload.participant_id),
            question_id: payload.question_id,
            participant_id: payload.participant_id,
            answer: payload.answer,
            nonce,
            client_timestamp: payload.client_timestamp,
            received_at,
            latency_ms,
            suspicious_latency,
            hash: String::new(),
        };
        response.hash = response.integrity_hash();
        response
    }

    /// Recomputes the hash from the stored fields.
    #[must_use]
    pub fn integrity_hash(&self) -> String {
        // serde_json objects keep keys sorted, which makes this canonical.
        let canonical = json!({
            "questionId": self.question_id,
            "participantId": self.participant_id,
            "answer": self.answer,
            "nonce": self.nonce,
            "clientTimestamp": self.client_timestamp,
            "receivedAt": self.received_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "latencyMs": self.latency_ms,
        });
        hex::encode(Sha256::digest(canonical.to_string().as_bytes()))
    }

    /// Returns `true` when no hashed field was altered after acceptance.
    #[must_use]
    pub fn verify_integrity(&self) -> bool {
        self.hash == self.integrity_hash()
    }
}
