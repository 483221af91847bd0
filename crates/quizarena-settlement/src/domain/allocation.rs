//! Prize allocation.

use quizarena_core::money::share_of;
use quizarena_core::repository::{PayoutRecord, PayoutStatus, RankingRow};
use uuid::Uuid;

/// Share of the prize pool for positions 1, 2, and 3, in basis points.
/// Positions beyond the table receive nothing.
pub const PRIZE_SPLIT_BPS: [u32; 3] = [5_000, 3_000, 2_000];

/// Generates an idempotent payout identifier (`payout_<uuid>`).
#[must_use]
pub fn payout_id() -> String {
    format!("payout_{}", Uuid::new_v4())
}

/// Allocates `prize_pool` over the top of `ranking`.
///
/// Each share rounds to the nearest unit (ties toward zero). Zero-amount
/// payouts are dropped. Shares for positions nobody holds stay in the pool.
/// The total never exceeds `prize_pool`.
#[must_use]
pub fn allocate_prize(
    tournament_id: Uuid,
    prize_pool: u64,
    ranking: &[RankingRow],
) -> Vec<PayoutRecord> {
    let mut amounts: Vec<(&RankingRow, u64)> = ranking
        .iter()
        .filter_map(|row| {
            let index = usize::try_from(row.position.checked_sub(1)?).ok()?;
            let bps = *PRIZE_SPLIT_BPS.get(index)?;
            Some((row, share_of(prize_pool, bps)))
        })
        .collect();

    // Trim rounding excess from the lowest-ranked payouts first.
    let mut excess = amounts
        .iter()
        .map(|(_, amount)| *amount)
        .sum::<u64>()
        .saturating_sub(prize_pool);
    for (_, amount) in amounts.iter_mut().rev() {
        if excess == 0 {
            break;
        }
        let cut = excess.min(*amount);
        *amount -= cut;
        excess -= cut;
    }

    amounts
        .into_iter()
        .filter(|(_, amount)| *amount > 0)
        .map(|(row, amount)| PayoutRecord {
            id: payout_id(),
            tournament_id,
            participant_id: row.participant_id.clone(),
            rank: row.position,
            amount,
            tx_hash: None,
            merkle_proof: Vec::new(),
            status: PayoutStatus::Pending,
            explorer_url: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranking(n: u32) -> Vec<RankingRow> {
        (1..=n)
            .map(|position| RankingRow {
                participant_id: format!("p{position}"),
                correct_count: 10 - position,
                average_latency_ms: 100,
                position,
            })
            .collect()
    }

    #[test]
    fn test_allocate_prize_splits_fifty_thirty_twenty() {
        let payouts = allocate_prize(Uuid::new_v4(), 90, &ranking(5));

        let amounts: Vec<(u32, u64)> = payouts.iter().map(|p| (p.rank, p.amount)).collect();
        assert_eq!(amounts, vec![(1, 45), (2, 27), (3, 18)]);
    }

    #[test]
    fn test_allocate_prize_assigns_pending_status_and_payout_ids() {
        let tournament_id = Uuid::new_v4();

        let payouts = allocate_prize(tournament_id, 100, &ranking(3));

        for payout in &payouts {
            assert!(payout.id.starts_with("payout_"));
            assert_eq!(payout.status, PayoutStatus::Pending);
            assert_eq!(payout.tournament_id, tournament_id);
            assert!(payout.tx_hash.is_none());
        }
        assert_ne!(payouts[0].id, payouts[1].id);
    }

    #[test]
    fn test_allocate_prize_drops_zero_amount_payouts() {
        let payouts = allocate_prize(Uuid::new_v4(), 1, &ranking(3));

        assert!(payouts.is_empty());
    }

    #[test]
    fn test_allocate_prize_with_fewer_entrants_leaves_remainder_undistributed() {
        let payouts = allocate_prize(Uuid::new_v4(), 100, &ranking(2));

        let total: u64 = payouts.iter().map(|p| p.amount).sum();
        assert_eq!(payouts.len(), 2);
        assert_eq!(total, 80);
    }

    #[test]
    fn test_allocate_prize_never_exceeds_pool() {
        for pool in 0..500_u64 {
            let payouts = allocate_prize(Uuid::new_v4(), pool, &ranking(4));

            let total: u64 = payouts.iter().map(|p| p.amount).sum();
            assert!(total <= pool, "pool {pool} paid out {total}");
        }
    }
}
