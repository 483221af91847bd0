//! Test repositories — mock `SettlementRepository` implementations for tests.

use async_trait::async_trait;
use quizarena_core::error::DomainError;
use quizarena_core::repository::{
    PayoutRecord, PayoutStatus, PotBreakdown, RankingRow, SettlementRepository, TournamentRecord,
};
use uuid::Uuid;

/// A settlement repository that always returns an infrastructure error.
/// Useful for testing error-handling paths.
#[derive(Debug)]
pub struct FailingSettlementRepository;

fn refused() -> DomainError {
    DomainError::Infrastructure("connection refused".into())
}

#[async_trait]
impl SettlementRepository for FailingSettlementRepository {
    async fn save_tournament(&self, _record: &TournamentRecord) -> Result<(), DomainError> {
        Err(refused())
    }

    async fn load_tournament(
        &self,
        _tournament_id: Uuid,
    ) -> Result<Option<TournamentRecord>, DomainError> {
        Err(refused())
    }

    async fn persist_pot(
        &self,
        _tournament_id: Uuid,
        _pot: &PotBreakdown,
    ) -> Result<(), DomainError> {
        Err(refused())
    }

    async fn save_ranking(
        &self,
        _tournament_id: Uuid,
        _ranking: &[RankingRow],
    ) -> Result<(), DomainError> {
        Err(refused())
    }

    async fn create_payouts(&self, _payouts: &[PayoutRecord]) -> Result<(), DomainError> {
        Err(refused())
    }

    async fn list_payouts(&self, _tournament_id: Uuid) -> Result<Vec<PayoutRecord>, DomainError> {
        Err(refused())
    }

    async fn load_payout(&self, _payout_id: &str) -> Result<Option<PayoutRecord>, DomainError> {
        Err(refused())
    }

    async fn mark_payout_status(
        &self,
        _payout_id: &str,
        _status: PayoutStatus,
        _tx_hash: Option<&str>,
        _explorer_url: Option<&str>,
    ) -> Result<(), DomainError> {
        Err(refused())
    }
}
