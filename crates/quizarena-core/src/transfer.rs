//! Custodial transfer abstraction.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::repository::PayoutRecord;

/// Executes a single prize transfer and returns its transaction hash.
///
/// Implementations may block on external I/O; callers treat each payout
/// independently.
#[async_trait]
pub trait TransferExecutor: Send + Sync {
    /// Sends `payout.amount` to `payout.participant_id`.
    async fn transfer(&self, payout: &PayoutRecord) -> Result<String, DomainError>;
}

/// Executor used when no custodial wallet is configured. Every transfer fails,
/// leaving payouts in `failed` for an out-of-band retry.
#[derive(Debug, Clone, Copy)]
pub struct UnconfiguredTransferExecutor;

#[async_trait]
impl TransferExecutor for UnconfiguredTransferExecutor {
    async fn transfer(&self, payout: &PayoutRecord) -> Result<String, DomainError> {
        Err(DomainError::External(format!(
            "no custodial transfer executor configured for payout {}",
            payout.id
        )))
    }
}
