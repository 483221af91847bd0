//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
///
/// Each variant corresponds to one class of failure the HTTP boundary maps to
/// a distinct client-facing response.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A tournament, join, payout, or other entity was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// Malformed or missing input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The operation is not valid in the current phase.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Duplicate join, duplicate response, or an already-pending payment.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Payment details disagree with the recorded intent.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// A payment gateway or transfer executor failed.
    #[error("external service error: {0}")]
    External(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Shorthand for a `NotFound` error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
