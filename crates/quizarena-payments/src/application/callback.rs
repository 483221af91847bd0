//! Payment callback flow: verify with the gateway, then reconcile.

use quizarena_core::error::DomainError;
use serde::Deserialize;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::http_gateway::PaymentGateway;
use super::reconciler::{PaymentReconciler, Reconciliation};
use crate::domain::gateway::GatewayStatus;

/// Client notification that a payment was sent.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinCallback {
    /// Gateway transaction id.
    #[serde(default, alias = "transactionId")]
    pub transaction_id: String,
    /// Participant's World ID.
    #[serde(default, alias = "worldId")]
    pub world_id: String,
    /// Wallet the payment came from.
    #[serde(default, alias = "walletAddress")]
    pub wallet_address: String,
}

impl JoinCallback {
    fn validate(&self) -> Result<(), DomainError> {
        let missing = if self.transaction_id.trim().is_empty() {
            "missing transactionId"
        } else if self.world_id.trim().is_empty() {
            "missing World ID for the player"
        } else if self.wallet_address.trim().is_empty() {
            "missing wallet address for the player"
        } else {
            return Ok(());
        };
        Err(DomainError::Validation(missing.to_owned()))
    }
}

/// Verifies a reported payment with the gateway and reconciles it.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a malformed callback or a payment
/// the gateway reports as failed, `DomainError::External` when the gateway
/// cannot be read, and any error of
/// [`PaymentReconciler::reconcile_transaction`].
#[instrument(skip(reconciler, gateway, callback), fields(transaction_id = %callback.transaction_id))]
pub async fn handle_join_callback(
    reconciler: &PaymentReconciler,
    gateway: &dyn PaymentGateway,
    tournament_id: Uuid,
    callback: &JoinCallback,
) -> Result<Reconciliation, DomainError> {
    callback.validate()?;
    let verification = gateway.fetch_transaction(&callback.transaction_id).await?;
    if verification.status == GatewayStatus::Failed {
        warn!(world_id = %callback.world_id, "gateway reports payment failed");
        return Err(DomainError::Validation(
            "payment failed on gateway, no changes applied".to_owned(),
        ));
    }
    reconciler
        .reconcile_transaction(
            &verification,
            tournament_id,
            &callback.world_id,
            &callback.wallet_address,
        )
        .await
}
