//! Tournament registry and scheduler tick.
//!
//! Every tournament lives behind its own `tokio::sync::Mutex`, so commands
//! and ticks against one tournament are serialized while different
//! tournaments proceed independently. `tick` is the single place phase
//! events are drained and finished tournaments are handed to settlement.
//! Settlement runs on its own task, so a slow transfer never holds up the
//! next tick.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use quizarena_core::aggregate::AggregateRoot;
use quizarena_core::clock::Clock;
use quizarena_core::error::DomainError;
use quizarena_core::event::DomainEvent;
use quizarena_core::repository::TournamentRecord;
use quizarena_core::transfer::TransferExecutor;
use quizarena_settlement::application::worker::{
    SettlementInputs, SettlementOutcome, SettlementWorker,
};
use quizarena_settlement::domain::ranking::TournamentResults;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::Tournament;
use crate::domain::events::TournamentEvent;

/// Handle to one tournament's serialized state.
pub(crate) type TournamentHandle = Arc<Mutex<Tournament>>;

/// Owns every tournament in the process and drives their phases.
pub struct TournamentScheduler {
    tournaments: RwLock<HashMap<Uuid, TournamentHandle>>,
    pub(crate) clock: Arc<dyn Clock>,
    settlement: SettlementWorker,
    transfer: Arc<dyn TransferExecutor>,
    settlements: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for TournamentScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TournamentScheduler")
            .field("settlement", &self.settlement)
            .finish_non_exhaustive()
    }
}

fn log_event(event: &TournamentEvent) {
    let meta = event.metadata();
    info!(
        tournament_id = %event.aggregate_id(),
        event_type = event.event_type(),
        sequence_number = meta.sequence_number,
        correlation_id = %meta.correlation_id,
        "tournament event"
    );
    debug!(payload = %event.to_payload(), "tournament event payload");
}

/// What a settlement task needs once it owns nothing borrowed.
struct SettlementJob {
    handle: TournamentHandle,
    record: TournamentRecord,
    results: TournamentResults,
    correlation_id: Uuid,
}

impl TournamentScheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        settlement: SettlementWorker,
        transfer: Arc<dyn TransferExecutor>,
    ) -> Self {
        Self {
            tournaments: RwLock::new(HashMap::new()),
            clock,
            settlement,
            transfer,
            settlements: Mutex::new(Vec::new()),
        }
    }

    /// The settlement worker used for finished tournaments.
    #[must_use]
    pub fn settlement(&self) -> &SettlementWorker {
        &self.settlement
    }

    pub(crate) async fn insert(&self, tournament: Tournament) {
        self.tournaments
            .write()
            .await
            .insert(tournament.id, Arc::new(Mutex::new(tournament)));
    }

    pub(crate) async fn handle(&self, tournament_id: Uuid) -> Result<TournamentHandle, DomainError> {
        self.tournaments
            .read()
            .await
            .get(&tournament_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("tournament", tournament_id))
    }

    pub(crate) async fn handles(&self) -> Vec<TournamentHandle> {
        self.tournaments.read().await.values().cloned().collect()
    }

    /// Advances every tournament to `now`, starts settlement of the ones
    /// that finished, and returns every event recorded since the previous
    /// tick.
    ///
    /// Settlement runs at most once per tournament: a tournament is flagged
    /// while its settlement task is in flight, and a failed settlement clears
    /// the flag so the next tick retries it. Events recorded by a settlement
    /// task are returned by the first tick after it completes.
    #[instrument(skip(self))]
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<TournamentEvent> {
        let correlation_id = Uuid::new_v4();
        let mut events = Vec::new();
        let mut due = Vec::new();

        for handle in self.handles().await {
            let mut tournament = handle.lock().await;
            tournament.advance(correlation_id, now);
            events.extend(tournament.take_uncommitted_events());
            if tournament.awaiting_settlement() {
                tournament.settlement_in_flight = true;
                due.push(SettlementJob {
                    handle: Arc::clone(&handle),
                    record: tournament.settlement_record(),
                    results: tournament.answer_key(),
                    correlation_id,
                });
            }
        }

        if !due.is_empty() {
            let mut running = self.settlements.lock().await;
            running.retain(|task| !task.is_finished());
            for job in due {
                info!(tournament_id = %job.record.id, "settlement started");
                running.push(tokio::spawn(settle_one(
                    self.settlement.clone(),
                    Arc::clone(&self.transfer),
                    Arc::clone(&self.clock),
                    job,
                )));
            }
        }

        for event in &events {
            log_event(event);
        }
        events
    }

    /// Waits for every settlement task started so far.
    pub async fn wait_for_settlements(&self) {
        let running = std::mem::take(&mut *self.settlements.lock().await);
        for task in running {
            if let Err(e) = task.await {
                error!(error = %e, "settlement task did not complete");
            }
        }
    }
}

async fn settle_one(
    settlement: SettlementWorker,
    transfer: Arc<dyn TransferExecutor>,
    clock: Arc<dyn Clock>,
    job: SettlementJob,
) {
    let SettlementJob {
        handle,
        record,
        results,
        correlation_id,
    } = job;
    let inputs = SettlementInputs {
        tournament_id: record.id,
        results,
        buy_in: record.buy_in,
        rake_bps: record.rake_bps,
    };
    let outcome = match settlement.repository().save_tournament(&record).await {
        Ok(()) => settlement.settle(&inputs, transfer.as_ref()).await,
        Err(e) => Err(e),
    };

    let mut tournament = handle.lock().await;
    record_settlement(&mut tournament, outcome, correlation_id, clock.now());
}

/// Applies a settlement result to its tournament. Any failure clears the
/// in-flight flag so the next tick can retry.
fn record_settlement(
    tournament: &mut Tournament,
    outcome: Result<SettlementOutcome, DomainError>,
    correlation_id: Uuid,
    now: DateTime<Utc>,
) {
    let result = outcome.and_then(|outcome| tournament.mark_settled(&outcome, correlation_id, now));
    if let Err(e) = result {
        tournament.settlement_in_flight = false;
        error!(
            tournament_id = %tournament.id,
            error = %e,
            "settlement failed; retrying on next tick"
        );
    }
}
