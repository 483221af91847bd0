//! Command abstractions.

use uuid::Uuid;

/// A request to change an aggregate. Handlers record `command_type` and
/// `correlation_id` on their tracing span, and every event the command
/// produces carries the same correlation id.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Dotted name, e.g. `tournament.join`.
    fn command_type(&self) -> &'static str;

    /// Id shared by the command's span and its events.
    fn correlation_id(&self) -> Uuid;
}
