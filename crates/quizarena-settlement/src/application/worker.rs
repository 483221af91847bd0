//! Settlement worker.
//!
//! Orchestrates one tournament's settlement against the repository: lock the
//! pot, rank, allocate, persist pending payouts, transfer, record outcomes.

use std::sync::Arc;

use quizarena_core::error::DomainError;
use quizarena_core::repository::{
    PayoutRecord, PayoutStatus, PotBreakdown, RankingRow, SettlementRepository,
};
use quizarena_core::transfer::TransferExecutor;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::application::transfers::{explorer_link, submit_custodial_transfers};
use crate::domain::allocation::allocate_prize;
use crate::domain::merkle::{merkle_proof, merkle_root_from_ranking};
use crate::domain::pot::calculate_pot;
use crate::domain::ranking::{TournamentResults, evaluate_ranking};

/// Inputs for settling a single tournament.
#[derive(Debug, Clone)]
pub struct SettlementInputs {
    /// Tournament to settle; its snapshot must already be in the repository.
    pub tournament_id: Uuid,
    /// Answer key.
    pub results: TournamentResults,
    /// Entry price.
    pub buy_in: u64,
    /// Operator rake in basis points.
    pub rake_bps: u32,
}

/// Everything settlement produced for a tournament.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementOutcome {
    /// Locked pot.
    pub pot: PotBreakdown,
    /// Final ranking.
    pub ranking: Vec<RankingRow>,
    /// Payouts after the transfer step.
    pub payouts: Vec<PayoutRecord>,
    /// Merkle root over `ranking`.
    pub merkle_root: String,
}

/// Settles finished tournaments and manages payout status afterwards.
#[derive(Clone)]
pub struct SettlementWorker {
    repository: Arc<dyn SettlementRepository>,
    explorer_base_url: String,
}

impl std::fmt::Debug for SettlementWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementWorker")
            .field("explorer_base_url", &self.explorer_base_url)
            .finish_non_exhaustive()
    }
}

impl SettlementWorker {
    /// Creates a worker over `repository`, linking transactions under
    /// `explorer_base_url`.
    #[must_use]
    pub fn new(repository: Arc<dyn SettlementRepository>, explorer_base_url: String) -> Self {
        Self {
            repository,
            explorer_base_url,
        }
    }

    /// The repository this worker writes to.
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn SettlementRepository> {
        &self.repository
    }

    /// Computes the pot for `entry_count` entries and persists it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an invalid rake or overflowing
    /// pot, or the repository's error if persisting fails.
    pub async fn lock_pot_and_persist(
        &self,
        tournament_id: Uuid,
        buy_in: u64,
        rake_bps: u32,
        entry_count: u64,
    ) -> Result<PotBreakdown, DomainError> {
        let pot = calculate_pot(entry_count, buy_in, rake_bps)?;
        self.repository.persist_pot(tournament_id, &pot).await?;
        Ok(pot)
    }

    /// Settles a tournament.
    ///
    /// Payouts are stored as `pending` before any transfer runs. If payouts
    /// already exist for the tournament (a previous attempt stopped part way)
    /// they are reused and only the still-pending ones are transferred.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the tournament snapshot is missing,
    /// or any repository error. Transfer failures are not errors; they leave
    /// the payout `failed`.
    #[instrument(skip(self, inputs, transfer), fields(tournament_id = %inputs.tournament_id))]
    pub async fn settle(
        &self,
        inputs: &SettlementInputs,
        transfer: &dyn TransferExecutor,
    ) -> Result<SettlementOutcome, DomainError> {
        let tournament = self
            .repository
            .load_tournament(inputs.tournament_id)
            .await?
            .ok_or_else(|| DomainError::not_found("tournament", inputs.tournament_id))?;

        let entry_count = u64::try_from(tournament.entries.len())
            .map_err(|_| DomainError::Validation("too many entries".to_owned()))?;
        let pot = self
            .lock_pot_and_persist(inputs.tournament_id, inputs.buy_in, inputs.rake_bps, entry_count)
            .await?;

        let ranking = evaluate_ranking(&tournament.entries, &inputs.results);
        let merkle_root = merkle_root_from_ranking(&ranking);

        let existing = self.repository.list_payouts(inputs.tournament_id).await?;
        let payouts = if existing.is_empty() {
            self.repository
                .save_ranking(inputs.tournament_id, &ranking)
                .await?;
            let mut allocated = allocate_prize(inputs.tournament_id, pot.prize_pool, &ranking);
            for payout in &mut allocated {
                let index = usize::try_from(payout.rank.saturating_sub(1)).unwrap_or(usize::MAX);
                payout.merkle_proof = merkle_proof(&ranking, index);
            }
            self.repository.create_payouts(&allocated).await?;
            allocated
        } else {
            warn!(
                payouts = existing.len(),
                "resuming settlement with previously created payouts"
            );
            existing
        };

        let (pending, settled): (Vec<PayoutRecord>, Vec<PayoutRecord>) = payouts
            .into_iter()
            .partition(|p| p.status == PayoutStatus::Pending);
        let submitted =
            submit_custodial_transfers(pending, transfer, &self.explorer_base_url).await;
        for payout in &submitted {
            self.repository
                .mark_payout_status(
                    &payout.id,
                    payout.status,
                    payout.tx_hash.as_deref(),
                    payout.explorer_url.as_deref(),
                )
                .await?;
        }

        let mut payouts: Vec<PayoutRecord> = settled.into_iter().chain(submitted).collect();
        payouts.sort_by_key(|p| p.rank);

        info!(
            gross_pot = pot.gross_pot,
            prize_pool = pot.prize_pool,
            ranked = ranking.len(),
            payouts = payouts.len(),
            merkle_root = %merkle_root,
            "tournament settled"
        );

        Ok(SettlementOutcome {
            pot,
            ranking,
            payouts,
            merkle_root,
        })
    }

    /// Lists payouts for a tournament, ordered by rank.
    ///
    /// # Errors
    ///
    /// Returns the repository's error.
    pub async fn list_payouts(&self, tournament_id: Uuid) -> Result<Vec<PayoutRecord>, DomainError> {
        self.repository.list_payouts(tournament_id).await
    }

    async fn load_payout(&self, payout_id: &str) -> Result<PayoutRecord, DomainError> {
        self.repository
            .load_payout(payout_id)
            .await?
            .ok_or_else(|| DomainError::not_found("payout", payout_id))
    }

    /// Moves a payout to `status`, recording `tx_hash` when given.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown payout and
    /// `DomainError::InvalidState` for a transition the payout lifecycle does
    /// not allow.
    #[instrument(skip(self))]
    pub async fn update_payout_status(
        &self,
        payout_id: &str,
        status: PayoutStatus,
        tx_hash: Option<&str>,
    ) -> Result<PayoutRecord, DomainError> {
        let mut payout = self.load_payout(payout_id).await?;
        if !payout.status.can_transition_to(status) {
            return Err(DomainError::InvalidState(format!(
                "payout {payout_id} cannot move from {} to {status}",
                payout.status
            )));
        }

        let explorer_url = tx_hash.map(|hash| explorer_link(&self.explorer_base_url, hash));
        self.repository
            .mark_payout_status(payout_id, status, tx_hash, explorer_url.as_deref())
            .await?;

        info!(from = %payout.status, to = %status, "payout status updated");
        payout.status = status;
        if let Some(hash) = tx_hash {
            payout.tx_hash = Some(hash.to_owned());
            payout.explorer_url = explorer_url;
        }
        Ok(payout)
    }

    /// Re-submits a `failed` payout through `transfer`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` unless the payout is `failed`, or
    /// the executor's `DomainError::External` when the transfer fails again
    /// (the payout stays `failed`).
    #[instrument(skip(self, transfer))]
    pub async fn retry_payout(
        &self,
        payout_id: &str,
        transfer: &dyn TransferExecutor,
    ) -> Result<PayoutRecord, DomainError> {
        let payout = self.load_payout(payout_id).await?;
        if payout.status != PayoutStatus::Failed {
            return Err(DomainError::InvalidState(format!(
                "only failed payouts can be retried; payout {payout_id} is {}",
                payout.status
            )));
        }

        let tx_hash = transfer.transfer(&payout).await?;
        self.update_payout_status(payout_id, PayoutStatus::Submitted, Some(&tx_hash))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::merkle::verify_merkle_proof;
    use quizarena_core::repository::{EntryAnswer, TournamentEntry, TournamentRecord};
    use quizarena_store::InMemorySettlementRepository;
    use quizarena_test_support::{
        FailingSettlementRepository, FailingTransferExecutor, RecordingTransferExecutor,
    };

    const EXPLORER: &str = "https://worldchain.explorer/tx/";

    fn answers(correct: usize, total: usize, latency: u64) -> Vec<EntryAnswer> {
        (0..total)
            .map(|i| EntryAnswer {
                question_id: format!("q{i}"),
                option_index: if i < correct { 0 } else { 1 },
                latency_ms: latency,
            })
            .collect()
    }

    /// Ten entries: three scorers with correct counts [5, 4, 4] and
    /// latencies [100, 150, 120], plus seven with nothing right.
    fn scenario_a_record(id: Uuid) -> TournamentRecord {
        let mut entries = vec![
            TournamentEntry {
                participant_id: "first".to_owned(),
                answers: answers(5, 5, 100),
            },
            TournamentEntry {
                participant_id: "slow".to_owned(),
                answers: answers(4, 5, 150),
            },
            TournamentEntry {
                participant_id: "quick".to_owned(),
                answers: answers(4, 5, 120),
            },
        ];
        for i in 0..7 {
            entries.push(TournamentEntry {
                participant_id: format!("rest{i}"),
                answers: answers(0, 5, 200),
            });
        }
        TournamentRecord {
            id,
            buy_in: 10,
            rake_bps: 1_000,
            entries,
        }
    }

    fn scenario_a_inputs(id: Uuid) -> SettlementInputs {
        SettlementInputs {
            tournament_id: id,
            results: TournamentResults {
                correct_options: (0..5).map(|i| (format!("q{i}"), 0)).collect(),
            },
            buy_in: 10,
            rake_bps: 1_000,
        }
    }

    async fn seeded(id: Uuid) -> (Arc<InMemorySettlementRepository>, SettlementWorker) {
        let repo = Arc::new(InMemorySettlementRepository::new());
        repo.save_tournament(&scenario_a_record(id)).await.unwrap();
        let worker = SettlementWorker::new(repo.clone(), EXPLORER.to_owned());
        (repo, worker)
    }

    #[tokio::test]
    async fn test_settle_scenario_a_pot_ranking_and_payouts() {
        // Arrange
        let id = Uuid::new_v4();
        let (repo, worker) = seeded(id).await;
        let executor = RecordingTransferExecutor::new();

        // Act
        let outcome = worker.settle(&scenario_a_inputs(id), &executor).await.unwrap();

        // Assert
        assert_eq!(outcome.pot.gross_pot, 100);
        assert_eq!(outcome.pot.rake, 10);
        assert_eq!(outcome.pot.prize_pool, 90);

        let top: Vec<(&str, u32)> = outcome.ranking[..3]
            .iter()
            .map(|r| (r.participant_id.as_str(), r.position))
            .collect();
        assert_eq!(top, vec![("first", 1), ("quick", 2), ("slow", 3)]);

        let amounts: Vec<(&str, u64)> = outcome
            .payouts
            .iter()
            .map(|p| (p.participant_id.as_str(), p.amount))
            .collect();
        assert_eq!(amounts, vec![("first", 45), ("quick", 27), ("slow", 18)]);
        assert!(outcome.payouts.iter().map(|p| p.amount).sum::<u64>() <= 90);

        assert_eq!(repo.pot(id).unwrap().unwrap().prize_pool, 90);
        assert_eq!(repo.ranking(id).unwrap().len(), 10);
        assert_eq!(outcome.merkle_root, merkle_root_from_ranking(&outcome.ranking));
    }

    #[tokio::test]
    async fn test_settle_persists_submitted_payouts_with_explorer_links() {
        let id = Uuid::new_v4();
        let (repo, worker) = seeded(id).await;

        let outcome = worker
            .settle(&scenario_a_inputs(id), &RecordingTransferExecutor::new())
            .await
            .unwrap();

        let stored = repo.list_payouts(id).await.unwrap();
        assert_eq!(stored.len(), 3);
        for (payout, returned) in stored.iter().zip(&outcome.payouts) {
            assert_eq!(payout.status, PayoutStatus::Submitted);
            assert_eq!(payout.id, returned.id);
            let hash = payout.tx_hash.as_deref().unwrap();
            assert_eq!(
                payout.explorer_url.as_deref(),
                Some(format!("{EXPLORER}{hash}").as_str())
            );
        }
    }

    #[tokio::test]
    async fn test_settle_attaches_verifiable_merkle_proofs() {
        let id = Uuid::new_v4();
        let (_repo, worker) = seeded(id).await;

        let outcome = worker
            .settle(&scenario_a_inputs(id), &RecordingTransferExecutor::new())
            .await
            .unwrap();

        for payout in &outcome.payouts {
            let index = usize::try_from(payout.rank - 1).unwrap();
            let row = &outcome.ranking[index];
            assert!(verify_merkle_proof(
                row,
                &payout.merkle_proof,
                index,
                &outcome.merkle_root
            ));
        }
    }

    #[tokio::test]
    async fn test_settle_isolates_failed_transfers() {
        // Arrange
        let id = Uuid::new_v4();
        let (repo, worker) = seeded(id).await;
        let executor = RecordingTransferExecutor::failing_for(&["quick"]);

        // Act
        let outcome = worker.settle(&scenario_a_inputs(id), &executor).await.unwrap();

        // Assert
        let statuses: Vec<(&str, PayoutStatus)> = outcome
            .payouts
            .iter()
            .map(|p| (p.participant_id.as_str(), p.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("first", PayoutStatus::Submitted),
                ("quick", PayoutStatus::Failed),
                ("slow", PayoutStatus::Submitted),
            ]
        );
        let stored = repo.list_payouts(id).await.unwrap();
        assert_eq!(stored[1].status, PayoutStatus::Failed);
    }

    #[tokio::test]
    async fn test_settle_resumes_with_existing_payouts_without_reallocating() {
        // Arrange
        let id = Uuid::new_v4();
        let (repo, worker) = seeded(id).await;
        let first = worker
            .settle(&scenario_a_inputs(id), &FailingTransferExecutor)
            .await
            .unwrap();
        let executor = RecordingTransferExecutor::new();

        // Act
        let second = worker.settle(&scenario_a_inputs(id), &executor).await.unwrap();

        // Assert
        assert!(executor.sent().is_empty());
        let first_ids: Vec<&str> = first.payouts.iter().map(|p| p.id.as_str()).collect();
        let second_ids: Vec<&str> = second.payouts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
        assert_eq!(repo.list_payouts(id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_settle_unknown_tournament_returns_not_found() {
        let repo = Arc::new(InMemorySettlementRepository::new());
        let worker = SettlementWorker::new(repo, EXPLORER.to_owned());

        let result = worker
            .settle(&scenario_a_inputs(Uuid::new_v4()), &RecordingTransferExecutor::new())
            .await;

        assert!(matches!(
            result,
            Err(DomainError::NotFound {
                entity: "tournament",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_settle_propagates_repository_failure() {
        let worker = SettlementWorker::new(
            Arc::new(FailingSettlementRepository),
            EXPLORER.to_owned(),
        );

        let result = worker
            .settle(&scenario_a_inputs(Uuid::new_v4()), &RecordingTransferExecutor::new())
            .await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_update_payout_status_confirms_submitted_payout() {
        let id = Uuid::new_v4();
        let (_repo, worker) = seeded(id).await;
        let outcome = worker
            .settle(&scenario_a_inputs(id), &RecordingTransferExecutor::new())
            .await
            .unwrap();
        let payout_id = outcome.payouts[0].id.clone();

        let updated = worker
            .update_payout_status(&payout_id, PayoutStatus::Confirmed, None)
            .await
            .unwrap();

        assert_eq!(updated.status, PayoutStatus::Confirmed);
        assert_eq!(updated.tx_hash, outcome.payouts[0].tx_hash);
    }

    #[tokio::test]
    async fn test_update_payout_status_rejects_backward_transition() {
        let id = Uuid::new_v4();
        let (_repo, worker) = seeded(id).await;
        let outcome = worker
            .settle(&scenario_a_inputs(id), &RecordingTransferExecutor::new())
            .await
            .unwrap();

        let result = worker
            .update_payout_status(&outcome.payouts[0].id, PayoutStatus::Pending, None)
            .await;

        assert!(matches!(result, Err(DomainError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_update_payout_status_unknown_payout_returns_not_found() {
        let (_repo, worker) = seeded(Uuid::new_v4()).await;

        let result = worker
            .update_payout_status("payout_missing", PayoutStatus::Confirmed, None)
            .await;

        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_retry_payout_resubmits_failed_payout() {
        // Arrange
        let id = Uuid::new_v4();
        let (repo, worker) = seeded(id).await;
        let outcome = worker
            .settle(&scenario_a_inputs(id), &FailingTransferExecutor)
            .await
            .unwrap();
        let payout_id = outcome.payouts[2].id.clone();

        // Act
        let retried = worker
            .retry_payout(&payout_id, &RecordingTransferExecutor::new())
            .await
            .unwrap();

        // Assert
        assert_eq!(retried.status, PayoutStatus::Submitted);
        let expected_hash = format!("0x{payout_id}");
        assert_eq!(retried.tx_hash.as_deref(), Some(expected_hash.as_str()));
        let stored = repo.load_payout(&payout_id).await.unwrap().unwrap();
        assert_eq!(stored.status, PayoutStatus::Submitted);
    }

    #[tokio::test]
    async fn test_retry_payout_rejects_payout_that_is_not_failed() {
        let id = Uuid::new_v4();
        let (_repo, worker) = seeded(id).await;
        let outcome = worker
            .settle(&scenario_a_inputs(id), &RecordingTransferExecutor::new())
            .await
            .unwrap();

        let result = worker
            .retry_payout(&outcome.payouts[0].id, &RecordingTransferExecutor::new())
            .await;

        assert!(matches!(result, Err(DomainError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_retry_payout_keeps_failed_status_when_transfer_fails_again() {
        let id = Uuid::new_v4();
        let (repo, worker) = seeded(id).await;
        let outcome = worker
            .settle(&scenario_a_inputs(id), &FailingTransferExecutor)
            .await
            .unwrap();
        let payout_id = outcome.payouts[0].id.clone();

        let result = worker.retry_payout(&payout_id, &FailingTransferExecutor).await;

        assert!(matches!(result, Err(DomainError::External(_))));
        let stored = repo.load_payout(&payout_id).await.unwrap().unwrap();
        assert_eq!(stored.status, PayoutStatus::Failed);
    }
}
