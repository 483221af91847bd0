//! Routes for tournaments: lifecycle, joins, answers, results and paid
//! entry.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{
    Json, Router,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use quizarena_core::error::DomainError;
use quizarena_core::repository::PayoutRecord;
use quizarena_payments::application::callback::{JoinCallback, handle_join_callback};
use quizarena_payments::application::reconciler::PotAdjustment;
use quizarena_payments::domain::join::{Currency, JoinStatus, PendingJoin};
use quizarena_payments::domain::ledger::LedgerPot;
use quizarena_tournament::application::query_handlers::{
    CurrentQuestionView, TournamentSummary, TournamentView,
};
use quizarena_tournament::domain::commands::{
    CreateTournament, JoinTournament, SubmitAnswer, WithdrawEntry,
};
use quizarena_tournament::domain::events::{
    Answer, Question, TournamentPayout, TournamentState,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateTournamentRequest {
    /// Display name.
    pub name: String,
    /// Default contribution per player.
    pub entry_fee: u64,
    /// Operator rake in basis points.
    #[serde(default)]
    pub rake_bps: u32,
    /// Announcement time; defaults to now.
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// When joins open; defaults to the announcement time.
    #[serde(default)]
    pub open_at: Option<DateTime<Utc>>,
    /// When play starts.
    pub start_at: DateTime<Utc>,
    /// Vetted question set.
    pub questions: Vec<Question>,
}

/// Request body for POST /{id}/join.
#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    /// World ID of a participant whose payment is confirmed.
    pub participant_id: String,
}

/// Request body for POST /{id}/answer.
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    /// Who is answering.
    pub participant_id: String,
    /// Chosen option.
    pub option_index: u32,
}

/// Response body for GET /{id}/state.
#[derive(Debug, Serialize)]
pub struct StateResponse {
    /// The tournament.
    pub tournament_id: Uuid,
    /// Its phase.
    pub state: TournamentState,
}

/// Request body for POST /{id}/payment-intent.
#[derive(Debug, Deserialize)]
pub struct PaymentIntentRequest {
    /// Participant's World ID.
    #[serde(default, alias = "worldId")]
    pub world_id: String,
    /// Wallet that will pay.
    #[serde(default, alias = "walletAddress")]
    pub wallet_address: String,
    /// Amount to pay in the smallest unit.
    #[serde(default)]
    pub amount: u64,
    /// Token; defaults to WLD.
    #[serde(default)]
    pub currency: Option<String>,
}

/// Response body for POST /{id}/payment-intent.
#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    /// Wallet to pay.
    pub destination: String,
    /// Amount to pay.
    pub amount: u64,
    /// Token to pay in.
    pub currency: Currency,
    /// Join status.
    pub status: JoinStatus,
    /// Next step for the client.
    pub message: &'static str,
}

/// What a payment callback did to the participant's tournament entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryChange {
    /// Nothing to do.
    Unchanged,
    /// Payment confirmed; the participant was entered.
    Joined,
    /// Payment refunded; the entry was removed.
    Withdrawn,
    /// The scheduler refused the change (for example, play already started).
    Rejected,
}

/// Response body for POST /{id}/payment-callback.
#[derive(Debug, Serialize)]
pub struct PaymentCallbackResponse {
    /// Join status after reconciliation.
    pub status: JoinStatus,
    /// Gateway transaction id.
    pub transaction_id: Option<String>,
    /// On-chain hash, if known.
    pub transaction_hash: Option<String>,
    /// Ledger pot after reconciliation.
    pub pot: Option<LedgerPot>,
    /// Pot movement caused by this callback.
    pub pot_adjustment: PotAdjustment,
    /// Effect on the tournament entry.
    pub entry: EntryChange,
    /// Most recent audit lines.
    pub audit: Vec<String>,
}

/// POST /
#[instrument(skip(state, request), fields(name = %request.name))]
async fn create_tournament(
    State(state): State<AppState>,
    Json(request): Json<CreateTournamentRequest>,
) -> Result<(StatusCode, Json<TournamentView>), ApiError> {
    let scheduled_at = request.scheduled_at.unwrap_or_else(|| state.clock.now());
    let command = CreateTournament {
        correlation_id: Uuid::new_v4(),
        name: request.name,
        entry_fee: request.entry_fee,
        rake_bps: request.rake_bps,
        scheduled_at,
        open_at: request.open_at.unwrap_or(scheduled_at),
        start_at: request.start_at,
        questions: request.questions,
    };
    let view = state.scheduler.create_tournament(&command).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /active
async fn active_tournaments(State(state): State<AppState>) -> Json<Vec<TournamentSummary>> {
    Json(state.scheduler.active_tournaments().await)
}

/// GET /{id}
async fn get_tournament(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TournamentView>, ApiError> {
    Ok(Json(state.scheduler.get_tournament(id).await?))
}

/// GET /{id}/state
async fn get_state(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StateResponse>, ApiError> {
    let current = state.scheduler.state(id).await?;
    Ok(Json(StateResponse {
        tournament_id: id,
        state: current,
    }))
}

/// POST /{id}/join
///
/// Enters a participant whose buy-in the gateway has confirmed. Entry
/// normally happens in the payment callback; this is the idempotent retry.
#[instrument(skip(state, request), fields(participant_id = %request.participant_id))]
async fn join(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<JoinRequest>,
) -> Result<Json<TournamentView>, ApiError> {
    let paid = match state.payments.join_record(id, &request.participant_id).await {
        Ok(record) if record.join_status == JoinStatus::Paid => record,
        Ok(_) | Err(DomainError::NotFound { .. }) => {
            warn!("join without a confirmed payment rejected");
            return Err(DomainError::InvalidState(
                "joining requires a confirmed payment; create a payment intent first".to_owned(),
            )
            .into());
        }
        Err(e) => return Err(e.into()),
    };
    let command = JoinTournament {
        correlation_id: Uuid::new_v4(),
        tournament_id: id,
        participant_id: paid.world_id,
        contribution: Some(paid.amount),
    };
    Ok(Json(state.scheduler.join(&command).await?))
}

/// POST /{id}/answer
#[instrument(skip(state, request), fields(participant_id = %request.participant_id))]
async fn answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<Answer>, ApiError> {
    let command = SubmitAnswer {
        correlation_id: Uuid::new_v4(),
        tournament_id: id,
        participant_id: request.participant_id,
        option_index: request.option_index,
    };
    Ok(Json(state.scheduler.submit_answer(&command).await?))
}

/// GET /{id}/questions/current
async fn current_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<CurrentQuestionView>>, ApiError> {
    Ok(Json(state.scheduler.current_question(id).await?))
}

/// GET /{id}/result
async fn result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TournamentPayout>>, ApiError> {
    Ok(Json(state.scheduler.result(id).await?))
}

/// GET /{id}/payouts
async fn payouts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PayoutRecord>>, ApiError> {
    state.scheduler.get_tournament(id).await?;
    Ok(Json(state.scheduler.settlement().list_payouts(id).await?))
}

/// POST /{id}/payment-intent
#[instrument(skip(state, request), fields(world_id = %request.world_id))]
async fn payment_intent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PaymentIntentRequest>,
) -> Result<Json<PaymentIntentResponse>, ApiError> {
    let currency = match request.currency.as_deref() {
        Some(raw) => raw.parse::<Currency>()?,
        None => Currency::Wld,
    };
    let tournament = state
        .scheduler
        .ensure_accepting_joins(id, Uuid::new_v4())
        .await?;
    if request.amount != tournament.entry_fee {
        return Err(DomainError::Validation(format!(
            "amount must equal the entry fee of {}, got {}",
            tournament.entry_fee, request.amount
        ))
        .into());
    }
    let destination = state.payment_destination.clone().ok_or_else(|| {
        DomainError::External("payment destination is not configured on the server".to_owned())
    })?;

    let join = state
        .payments
        .set_pending_join(PendingJoin {
            tournament_id: id,
            world_id: request.world_id,
            wallet_address: request.wallet_address,
            amount: request.amount,
            currency,
            destination,
        })
        .await?;

    Ok(Json(PaymentIntentResponse {
        destination: join.destination,
        amount: join.amount,
        currency: join.currency,
        status: join.join_status,
        message: "payment intent created; proceed with the wallet payment",
    }))
}

/// POST /{id}/payment-callback
#[instrument(skip(state, callback), fields(transaction_id = %callback.transaction_id))]
async fn payment_callback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(callback): Json<JoinCallback>,
) -> Result<Json<PaymentCallbackResponse>, ApiError> {
    let reconciliation =
        handle_join_callback(&state.payments, state.gateway.as_ref(), id, &callback).await?;

    let entry = if reconciliation.became_paid() {
        let command = JoinTournament {
            correlation_id: Uuid::new_v4(),
            tournament_id: id,
            participant_id: reconciliation.join.world_id.clone(),
            contribution: Some(reconciliation.join.amount),
        };
        match state.scheduler.join(&command).await {
            Ok(_) => EntryChange::Joined,
            Err(e) => {
                warn!(error = %e, "paid participant could not be entered");
                EntryChange::Rejected
            }
        }
    } else if reconciliation.left_paid() {
        let command = WithdrawEntry {
            correlation_id: Uuid::new_v4(),
            tournament_id: id,
            participant_id: reconciliation.join.world_id.clone(),
        };
        match state.scheduler.withdraw(&command).await {
            Ok(_) => EntryChange::Withdrawn,
            Err(e) => {
                warn!(error = %e, "refunded participant could not be withdrawn");
                EntryChange::Rejected
            }
        }
    } else {
        EntryChange::Unchanged
    };
    info!(status = %reconciliation.join.join_status, entry = ?entry, "payment callback handled");

    let audit_len = reconciliation.join.audit_log.len();
    Ok(Json(PaymentCallbackResponse {
        status: reconciliation.join.join_status,
        transaction_id: reconciliation.join.transaction_id.clone(),
        transaction_hash: reconciliation.join.transaction_hash.clone(),
        pot: reconciliation.pot,
        pot_adjustment: reconciliation.pot_adjustment,
        entry,
        audit: reconciliation.join.audit_log[audit_len.saturating_sub(3)..].to_vec(),
    }))
}

/// Returns the router for tournaments.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_tournament))
        .route("/active", get(active_tournaments))
        .route("/{id}", get(get_tournament))
        .route("/{id}/state", get(get_state))
        .route("/{id}/join", post(join))
        .route("/{id}/answer", post(answer))
        .route("/{id}/questions/current", get(current_question))
        .route("/{id}/result", get(result))
        .route("/{id}/payouts", get(payouts))
        .route("/{id}/payment-intent", post(payment_intent))
        .route("/{id}/payment-callback", post(payment_callback))
}
