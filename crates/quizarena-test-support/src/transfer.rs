//! Test transfer executors.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use quizarena_core::error::DomainError;
use quizarena_core::repository::PayoutRecord;
use quizarena_core::transfer::TransferExecutor;

/// A transfer executor that records every payout it is asked to send and
/// returns `0x<payout id>` as the transaction hash. Participants listed in
/// `failing` get an external error instead.
#[derive(Debug, Default)]
pub struct RecordingTransferExecutor {
    failing: HashSet<String>,
    sent: Mutex<Vec<PayoutRecord>>,
}

impl RecordingTransferExecutor {
    /// Create an executor where every transfer succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an executor that fails transfers to the given participants.
    #[must_use]
    pub fn failing_for(participants: &[&str]) -> Self {
        Self {
            failing: participants.iter().map(|p| (*p).to_owned()).collect(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of every payout passed to `transfer`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn sent(&self) -> Vec<PayoutRecord> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransferExecutor for RecordingTransferExecutor {
    async fn transfer(&self, payout: &PayoutRecord) -> Result<String, DomainError> {
        self.sent.lock().unwrap().push(payout.clone());
        if self.failing.contains(&payout.participant_id) {
            return Err(DomainError::External(format!(
                "transfer to {} rejected",
                payout.participant_id
            )));
        }
        Ok(format!("0x{}", payout.id))
    }
}

/// A transfer executor that always fails.
#[derive(Debug)]
pub struct FailingTransferExecutor;

#[async_trait]
impl TransferExecutor for FailingTransferExecutor {
    async fn transfer(&self, _payout: &PayoutRecord) -> Result<String, DomainError> {
        Err(DomainError::External("rpc unavailable".into()))
    }
}
