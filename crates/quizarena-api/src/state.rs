//! Shared application state.

use std::sync::Arc;

use quizarena_core::clock::Clock;
use quizarena_core::repository::SettlementRepository;
use quizarena_core::transfer::TransferExecutor;
use quizarena_payments::application::http_gateway::PaymentGateway;
use quizarena_payments::application::reconciler::PaymentReconciler;
use quizarena_room::application::registry::RoomRegistry;
use quizarena_settlement::application::worker::SettlementWorker;
use quizarena_tournament::application::scheduler::TournamentScheduler;

/// Application state shared across all request handlers and the ticker.
#[derive(Clone)]
pub struct AppState {
    /// Clock for request-time reads.
    pub clock: Arc<dyn Clock>,
    /// Tournament phases, joins and answers.
    pub scheduler: Arc<TournamentScheduler>,
    /// Question rooms keyed by room id.
    pub rooms: Arc<RoomRegistry>,
    /// Paid join intents and ledger pots.
    pub payments: Arc<PaymentReconciler>,
    /// Payment gateway client.
    pub gateway: Arc<dyn PaymentGateway>,
    /// Custodial transfer executor used for payout retries.
    pub transfer: Arc<dyn TransferExecutor>,
    /// Operator wallet receiving buy-ins.
    pub payment_destination: Option<String>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("payment_destination", &self.payment_destination)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        repository: Arc<dyn SettlementRepository>,
        transfer: Arc<dyn TransferExecutor>,
        gateway: Arc<dyn PaymentGateway>,
        explorer_base_url: String,
        payment_destination: Option<String>,
    ) -> Self {
        let settlement = SettlementWorker::new(repository, explorer_base_url);
        Self {
            scheduler: Arc::new(TournamentScheduler::new(
                Arc::clone(&clock),
                settlement,
                Arc::clone(&transfer),
            )),
            rooms: Arc::new(RoomRegistry::new(Arc::clone(&clock))),
            payments: Arc::new(PaymentReconciler::new(Arc::clone(&clock))),
            clock,
            gateway,
            transfer,
            payment_destination,
        }
    }
}
