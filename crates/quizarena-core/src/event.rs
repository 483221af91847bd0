//! Domain event abstractions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope fields shared by every domain event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Dotted type name, e.g. `tournament.phase_changed`.
    pub event_type: String,
    /// Aggregate the event belongs to.
    pub aggregate_id: Uuid,
    /// 1-based position in the aggregate's history.
    pub sequence_number: i64,
    /// The command or scheduler tick that produced the event.
    pub correlation_id: Uuid,
    /// Server time the event was recorded.
    pub occurred_at: DateTime<Utc>,
}

/// Trait that all domain events implement.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// The event body as JSON, without the envelope.
    fn to_payload(&self) -> serde_json::Value;

    /// Returns the envelope.
    fn metadata(&self) -> &EventMetadata;

    /// Shorthand for the owning aggregate.
    fn aggregate_id(&self) -> Uuid {
        self.metadata().aggregate_id
    }
}
