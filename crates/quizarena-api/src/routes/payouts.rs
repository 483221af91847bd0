//! Routes for operator payout maintenance.

use axum::extract::{Path, State};
use axum::{Json, Router, routing::post};
use quizarena_core::repository::{PayoutRecord, PayoutStatus};
use serde::Deserialize;
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /{payout_id}/status.
#[derive(Debug, Deserialize)]
pub struct UpdatePayoutStatusRequest {
    /// Target status: `submitted`, `confirmed` or `failed`.
    pub status: String,
    /// Transaction hash to record.
    #[serde(default)]
    pub tx_hash: Option<String>,
}

/// POST /{payout_id}/status
#[instrument(skip(state, request), fields(status = %request.status))]
async fn update_status(
    State(state): State<AppState>,
    Path(payout_id): Path<String>,
    Json(request): Json<UpdatePayoutStatusRequest>,
) -> Result<Json<PayoutRecord>, ApiError> {
    let status: PayoutStatus = request.status.parse()?;
    let payout = state
        .scheduler
        .settlement()
        .update_payout_status(&payout_id, status, request.tx_hash.as_deref())
        .await?;
    Ok(Json(payout))
}

/// POST /{payout_id}/retry
#[instrument(skip(state))]
async fn retry(
    State(state): State<AppState>,
    Path(payout_id): Path<String>,
) -> Result<Json<PayoutRecord>, ApiError> {
    let payout = state
        .scheduler
        .settlement()
        .retry_payout(&payout_id, state.transfer.as_ref())
        .await?;
    Ok(Json(payout))
}

/// Returns the router for payouts.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{payout_id}/status", post(update_status))
        .route("/{payout_id}/retry", post(retry))
}
