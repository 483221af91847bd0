//! Custodial transfer fan-out.

use futures::future::join_all;
use quizarena_core::repository::{PayoutRecord, PayoutStatus};
use quizarena_core::transfer::TransferExecutor;
use tracing::{error, info};

/// Default block explorer prefix for transaction links.
pub const DEFAULT_EXPLORER_BASE_URL: &str = "https://worldchain.explorer/tx/";

/// Explorer URL for `tx_hash`.
#[must_use]
pub fn explorer_link(explorer_base_url: &str, tx_hash: &str) -> String {
    format!("{explorer_base_url}{tx_hash}")
}

async fn submit_one(
    mut payout: PayoutRecord,
    transfer: &dyn TransferExecutor,
    explorer_base_url: &str,
) -> PayoutRecord {
    match transfer.transfer(&payout).await {
        Ok(tx_hash) => {
            info!(
                payout_id = %payout.id,
                participant_id = %payout.participant_id,
                amount = payout.amount,
                tx_hash = %tx_hash,
                "payout submitted"
            );
            payout.explorer_url = Some(explorer_link(explorer_base_url, &tx_hash));
            payout.tx_hash = Some(tx_hash);
            payout.status = PayoutStatus::Submitted;
        }
        Err(e) => {
            error!(
                payout_id = %payout.id,
                participant_id = %payout.participant_id,
                error = %e,
                "payout transfer failed"
            );
            payout.status = PayoutStatus::Failed;
        }
    }
    payout
}

/// Sends every payout through `transfer` concurrently.
///
/// Each payout comes back `submitted` (with hash and explorer link) or
/// `failed` on its own; one failure never affects the others. Order is
/// preserved.
pub async fn submit_custodial_transfers(
    payouts: Vec<PayoutRecord>,
    transfer: &dyn TransferExecutor,
    explorer_base_url: &str,
) -> Vec<PayoutRecord> {
    join_all(
        payouts
            .into_iter()
            .map(|payout| submit_one(payout, transfer, explorer_base_url)),
    )
    .await
}
