//! In-memory `SettlementRepository` for single-process deployments and tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use quizarena_core::error::DomainError;
use quizarena_core::repository::{
    PayoutRecord, PayoutStatus, PotBreakdown, RankingRow, SettlementRepository, TournamentRecord,
};

#[derive(Debug, Default)]
struct Tables {
    tournaments: HashMap<Uuid, TournamentRecord>,
    pots: HashMap<Uuid, PotBreakdown>,
    rankings: HashMap<Uuid, Vec<RankingRow>>,
    payouts: Vec<PayoutRecord>,
}

/// Settlement repository holding every row in process memory.
#[derive(Debug, Default)]
pub struct InMemorySettlementRepository {
    tables: Mutex<Tables>,
}

impl InMemorySettlementRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, DomainError> {
        self.tables
            .lock()
            .map_err(|_| DomainError::Infrastructure("in-memory store lock poisoned".into()))
    }

    /// Returns the persisted pot for a tournament, if any.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store lock is poisoned.
    pub fn pot(&self, tournament_id: Uuid) -> Result<Option<PotBreakdown>, DomainError> {
        Ok(self.tables()?.pots.get(&tournament_id).copied())
    }

    /// Returns every ranking row appended for a tournament.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store lock is poisoned.
    pub fn ranking(&self, tournament_id: Uuid) -> Result<Vec<RankingRow>, DomainError> {
        Ok(self
            .tables()?
            .rankings
            .get(&tournament_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl SettlementRepository for InMemorySettlementRepository {
    async fn save_tournament(&self, record: &TournamentRecord) -> Result<(), DomainError> {
        self.tables()?.tournaments.insert(record.id, record.clone());
        Ok(())
    }

    async fn load_tournament(
        &self,
        tournament_id: Uuid,
    ) -> Result<Option<TournamentRecord>, DomainError> {
        Ok(self.tables()?.tournaments.get(&tournament_id).cloned())
    }

    async fn persist_pot(
        &self,
        tournament_id: Uuid,
        pot: &PotBreakdown,
    ) -> Result<(), DomainError> {
        self.tables()?.pots.insert(tournament_id, *pot);
        Ok(())
    }

    async fn save_ranking(
        &self,
        tournament_id: Uuid,
        ranking: &[RankingRow],
    ) -> Result<(), DomainError> {
        self.tables()?
            .rankings
            .entry(tournament_id)
            .or_default()
            .extend_from_slice(ranking);
        Ok(())
    }

    async fn create_payouts(&self, payouts: &[PayoutRecord]) -> Result<(), DomainError> {
        let mut tables = self.tables()?;
        if let Some(duplicate) = payouts
            .iter()
            .find(|p| tables.payouts.iter().any(|existing| existing.id == p.id))
        {
            return Err(DomainError::Conflict(format!(
                "payout {} already exists",
                duplicate.id
            )));
        }
        tables.payouts.extend_from_slice(payouts);
        Ok(())
    }

    async fn list_payouts(&self, tournament_id: Uuid) -> Result<Vec<PayoutRecord>, DomainError> {
        let mut payouts: Vec<PayoutRecord> = self
            .tables()?
            .payouts
            .iter()
            .filter(|p| p.tournament_id == tournament_id)
            .cloned()
            .collect();
        payouts.sort_by_key(|p| p.rank);
        Ok(payouts)
    }

    async fn load_payout(&self, payout_id: &str) -> Result<Option<PayoutRecord>, DomainError> {
        Ok(self
            .tables()?
            .payouts
            .iter()
            .find(|p| p.id == payout_id)
            .cloned())
    }

    async fn mark_payout_status(
        &self,
        payout_id: &str,
        status: PayoutStatus,
        tx_hash: Option<&str>,
        explorer_url: Option<&str>,
    ) -> Result<(), DomainError> {
        let mut tables = self.tables()?;
        let payout = tables
            .payouts
            .iter_mut()
            .find(|p| p.id == payout_id)
            .ok_or_else(|| DomainError::not_found("payout", payout_id))?;
        payout.status = status;
        if let Some(hash) = tx_hash {
            payout.tx_hash = Some(hash.to_owned());
        }
        if let Some(url) = explorer_url {
            payout.explorer_url = Some(url.to_owned());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payout(tournament_id: Uuid, id: &str, rank: u32) -> PayoutRecord {
        PayoutRecord {
            id: id.to_owned(),
            tournament_id,
            participant_id: format!("player-{rank}"),
            rank,
            amount: 10,
            tx_hash: None,
            merkle_proof: Vec::new(),
            status: PayoutStatus::Pending,
            explorer_url: None,
        }
    }

    #[tokio::test]
    async fn test_list_payouts_returns_rows_for_tournament_ordered_by_rank() {
        // Arrange
        let repo = InMemorySettlementRepository::new();
        let tournament_id = Uuid::new_v4();
        let other_id = Uuid::new_v4();
        repo.create_payouts(&[
            payout(tournament_id, "payout_b", 2),
            payout(other_id, "payout_x", 1),
            payout(tournament_id, "payout_a", 1),
        ])
        .await
        .unwrap();

        // Act
        let listed = repo.list_payouts(tournament_id).await.unwrap();

        // Assert
        let ids: Vec<&str> = listed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["payout_a", "payout_b"]);
    }

    #[tokio::test]
    async fn test_create_payouts_rejects_duplicate_ids() {
        let repo = InMemorySettlementRepository::new();
        let tournament_id = Uuid::new_v4();
        repo.create_payouts(&[payout(tournament_id, "payout_a", 1)])
            .await
            .unwrap();

        let result = repo
            .create_payouts(&[payout(tournament_id, "payout_a", 1)])
            .await;

        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_mark_payout_status_keeps_existing_hash_when_none_given() {
        // Arrange
        let repo = InMemorySettlementRepository::new();
        let tournament_id = Uuid::new_v4();
        repo.create_payouts(&[payout(tournament_id, "payout_a", 1)])
            .await
            .unwrap();
        repo.mark_payout_status("payout_a", PayoutStatus::Submitted, Some("0xabc"), None)
            .await
            .unwrap();

        // Act
        repo.mark_payout_status("payout_a", PayoutStatus::Confirmed, None, None)
            .await
            .unwrap();

        // Assert
        let stored = repo.load_payout("payout_a").await.unwrap().unwrap();
        assert_eq!(stored.status, PayoutStatus::Confirmed);
        assert_eq!(stored.tx_hash.as_deref(), Some("0xabc"));
    }

    #[tokio::test]
    async fn test_mark_payout_status_returns_not_found_for_unknown_payout() {
        let repo = InMemorySettlementRepository::new();

        let result = repo
            .mark_payout_status("payout_missing", PayoutStatus::Failed, None, None)
            .await;

        match result {
            Err(DomainError::NotFound { entity, id }) => {
                assert_eq!(entity, "payout");
                assert_eq!(id, "payout_missing");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
