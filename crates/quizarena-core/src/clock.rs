//! Clock abstraction for determinism.

use chrono::{DateTime, Utc};

/// Abstraction over system time for deterministic behavior.
///
/// Phase transitions, submission windows, and audit timestamps are all
/// computed from the instant returned here, never from `Utc::now()` directly.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Milliseconds elapsed from `since` to `until`, clamped at zero.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn elapsed_ms(since: DateTime<Utc>, until: DateTime<Utc>) -> u64 {
    (until - since).num_milliseconds().max(0) as u64
}
