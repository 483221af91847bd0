//! Join-intent bookkeeping and gateway reconciliation.
//!
//! Each tournament has its own ledger behind its own lock, so reconciliation
//! of one tournament never waits on another and the pot total of a
//! tournament is only ever touched under its lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::SecondsFormat;
use quizarena_core::clock::Clock;
use quizarena_core::error::DomainError;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::gateway::TransactionVerification;
use crate::domain::join::{JoinRecord, JoinStatus, PendingJoin};
use crate::domain::ledger::LedgerPot;

/// How a reconciliation moved the ledger pot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum PotAdjustment {
    /// Status did not cross into or out of `paid`.
    Unchanged,
    /// The buy-in was added.
    Credited(u64),
    /// The buy-in was removed.
    Debited(u64),
}

/// Result of reconciling one gateway confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    /// The join after reconciliation.
    pub join: JoinRecord,
    /// Status before reconciliation.
    pub previous_status: JoinStatus,
    /// Pot movement caused by this call.
    pub pot_adjustment: PotAdjustment,
    /// Pot after reconciliation, once any buy-in was confirmed.
    pub pot: Option<LedgerPot>,
}

impl Reconciliation {
    /// Whether this call moved the join into `paid`.
    #[must_use]
    pub fn became_paid(&self) -> bool {
        self.previous_status != JoinStatus::Paid && self.join.join_status == JoinStatus::Paid
    }

    /// Whether this call moved the join out of `paid`.
    #[must_use]
    pub fn left_paid(&self) -> bool {
        self.previous_status == JoinStatus::Paid && self.join.join_status != JoinStatus::Paid
    }
}

#[derive(Debug, Default)]
struct TournamentLedger {
    joins: HashMap<String, JoinRecord>,
    /// Gateway transaction id to the world id whose join consumed it.
    transactions: HashMap<String, String>,
    pot: Option<LedgerPot>,
}

type LedgerHandle = Arc<Mutex<TournamentLedger>>;

/// Tracks paid joins and the ledger pot of every tournament.
pub struct PaymentReconciler {
    ledgers: RwLock<HashMap<Uuid, LedgerHandle>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for PaymentReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentReconciler").finish_non_exhaustive()
    }
}

fn mismatch(what: &str, expected: impl std::fmt::Display, actual: impl std::fmt::Display) -> DomainError {
    DomainError::Integrity(format!("{what} mismatch: expected {expected}, got {actual}"))
}

impl PaymentReconciler {
    /// Creates a reconciler with no joins.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            ledgers: RwLock::new(HashMap::new()),
            clock,
        }
    }

    fn stamp(&self) -> String {
        self.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    async fn ledger(&self, tournament_id: Uuid) -> Option<LedgerHandle> {
        self.ledgers.read().await.get(&tournament_id).cloned()
    }

    async fn ledger_or_create(&self, tournament_id: Uuid) -> LedgerHandle {
        if let Some(ledger) = self.ledger(tournament_id).await {
            return ledger;
        }
        let mut ledgers = self.ledgers.write().await;
        Arc::clone(ledgers.entry(tournament_id).or_default())
    }

    /// Records a join intent awaiting payment.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for missing fields or a zero
    /// amount, and `DomainError::Conflict` while a non-refunded join exists
    /// for the participant.
    #[instrument(skip(self, join), fields(tournament_id = %join.tournament_id, world_id = %join.world_id))]
    pub async fn set_pending_join(&self, join: PendingJoin) -> Result<JoinRecord, DomainError> {
        join.validate()?;
        let handle = self.ledger_or_create(join.tournament_id).await;
        let mut ledger = handle.lock().await;

        if ledger.joins.get(&join.world_id).is_some_and(JoinRecord::is_active) {
            warn!("duplicate join intent rejected");
            return Err(DomainError::Conflict(
                "player already joined or payment in progress".to_owned(),
            ));
        }

        let record = JoinRecord {
            tournament_id: join.tournament_id,
            world_id: join.world_id,
            wallet_address: join.wallet_address,
            join_status: JoinStatus::PendingPayment,
            amount: join.amount,
            currency: join.currency,
            destination: join.destination,
            transaction_id: None,
            transaction_hash: None,
            audit_log: vec![format!("{} - join initialized", self.stamp())],
        };
        ledger.joins.insert(record.world_id.clone(), record.clone());
        info!(amount = record.amount, currency = %record.currency, "join intent recorded");
        Ok(record)
    }

    /// Applies a gateway confirmation to a recorded join.
    ///
    /// The confirmation must match the intent exactly. The pot moves only
    /// when the status crosses into or out of `paid`; a repeated
    /// confirmation only appends an audit line.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown join and
    /// `DomainError::Integrity` when the transaction already confirmed
    /// another participant's join, when the wallet, destination, currency,
    /// or amount disagrees with the intent, or when the pot holds another
    /// currency.
    #[instrument(skip(self, verification), fields(transaction_id = %verification.transaction_id))]
    pub async fn reconcile_transaction(
        &self,
        verification: &TransactionVerification,
        tournament_id: Uuid,
        world_id: &str,
        wallet_address: &str,
    ) -> Result<Reconciliation, DomainError> {
        let not_found = || DomainError::not_found("join", format!("{tournament_id}:{world_id}"));
        let handle = self.ledger(tournament_id).await.ok_or_else(not_found)?;
        let mut guard = handle.lock().await;
        let ledger = &mut *guard;
        let record = ledger.joins.get_mut(world_id).ok_or_else(not_found)?;

        if let Some(owner) = ledger.transactions.get(&verification.transaction_id)
            && owner != world_id
        {
            warn!(world_id, bound_to = %owner, "transaction replayed onto another join");
            return Err(DomainError::Integrity(format!(
                "transaction {} already belongs to another join",
                verification.transaction_id
            )));
        }
        if !record.wallet_address.eq_ignore_ascii_case(wallet_address) {
            return Err(mismatch("wallet", &record.wallet_address, wallet_address));
        }
        if !record.destination.eq_ignore_ascii_case(&verification.destination) {
            return Err(mismatch(
                "destination address",
                &record.destination,
                &verification.destination,
            ));
        }
        if record.currency != verification.currency {
            return Err(mismatch("currency", record.currency, verification.currency));
        }
        if record.amount != verification.amount {
            return Err(mismatch("amount", record.amount, verification.amount));
        }

        let previous = record.join_status;
        let next = verification.status.join_status().unwrap_or(previous);
        let adjustment = match (previous, next) {
            (p, JoinStatus::Paid) if p != JoinStatus::Paid => PotAdjustment::Credited(record.amount),
            (JoinStatus::Paid, JoinStatus::Refunded) => PotAdjustment::Debited(record.amount),
            _ => PotAdjustment::Unchanged,
        };
        if adjustment != PotAdjustment::Unchanged
            && let Some(pot) = &ledger.pot
        {
            pot.ensure_currency(record.currency)?;
        }

        record.join_status = next;
        record.transaction_id = Some(verification.transaction_id.clone());
        ledger
            .transactions
            .entry(verification.transaction_id.clone())
            .or_insert_with(|| world_id.to_owned());
        if verification.hash.is_some() {
            record.transaction_hash.clone_from(&verification.hash);
        }
        record.audit_log.push(format!(
            "{} - status updated from {previous} to {next} (tx: {})",
            self.stamp(),
            verification.transaction_id
        ));

        match adjustment {
            PotAdjustment::Credited(amount) => match &mut ledger.pot {
                Some(pot) => pot.credit(amount),
                None => {
                    ledger.pot = Some(LedgerPot::opened(tournament_id, amount, record.currency));
                }
            },
            PotAdjustment::Debited(amount) => {
                if let Some(pot) = &mut ledger.pot {
                    pot.debit(amount);
                }
            }
            PotAdjustment::Unchanged => {}
        }

        info!(
            world_id,
            previous = %previous,
            next = %next,
            pot_total = ledger.pot.map_or(0, |p| p.total),
            "transaction reconciled"
        );
        Ok(Reconciliation {
            join: record.clone(),
            previous_status: previous,
            pot_adjustment: adjustment,
            pot: ledger.pot,
        })
    }

    /// The recorded join of a participant.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if none exists.
    pub async fn join_record(
        &self,
        tournament_id: Uuid,
        world_id: &str,
    ) -> Result<JoinRecord, DomainError> {
        let not_found = || DomainError::not_found("join", format!("{tournament_id}:{world_id}"));
        let handle = self.ledger(tournament_id).await.ok_or_else(not_found)?;
        let ledger = handle.lock().await;
        ledger.joins.get(world_id).cloned().ok_or_else(not_found)
    }

    /// The tournament's ledger pot, once any buy-in was confirmed.
    pub async fn pot(&self, tournament_id: Uuid) -> Option<LedgerPot> {
        let handle = self.ledger(tournament_id).await?;
        let ledger = handle.lock().await;
        ledger.pot
    }
}
