//! Pot locking.

use quizarena_core::error::DomainError;
use quizarena_core::money::{BPS_DENOMINATOR, rake_of};
use quizarena_core::repository::PotBreakdown;

/// Computes the pot for `total_entries` paid entries of `buy_in` each.
///
/// `gross = total_entries × buy_in`, `rake = floor(gross × rake_bps / 10_000)`,
/// `prize_pool = gross − rake`.
///
/// # Errors
///
/// Returns `DomainError::Validation` if `rake_bps` exceeds 10 000 or the
/// gross pot does not fit in a `u64`.
pub fn calculate_pot(
    total_entries: u64,
    buy_in: u64,
    rake_bps: u32,
) -> Result<PotBreakdown, DomainError> {
    if rake_bps > BPS_DENOMINATOR {
        return Err(DomainError::Validation(format!(
            "rake_bps must be at most {BPS_DENOMINATOR}, got {rake_bps}"
        )));
    }
    let gross_pot = total_entries.checked_mul(buy_in).ok_or_else(|| {
        DomainError::Validation(format!(
            "gross pot overflows for {total_entries} entries of {buy_in}"
        ))
    })?;
    let rake = rake_of(gross_pot, rake_bps);

    Ok(PotBreakdown {
        total_entries,
        gross_pot,
        rake_bps,
        rake,
        prize_pool: gross_pot - rake,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_pot_ten_entries_with_ten_percent_rake() {
        let pot = calculate_pot(10, 10, 1_000).unwrap();

        assert_eq!(pot.gross_pot, 100);
        assert_eq!(pot.rake, 10);
        assert_eq!(pot.prize_pool, 90);
        assert_eq!(pot.total_entries, 10);
    }

    #[test]
    fn test_calculate_pot_floors_rake() {
        let pot = calculate_pot(3, 7, 250).unwrap();

        assert_eq!(pot.gross_pot, 21);
        assert_eq!(pot.rake, 0);
        assert_eq!(pot.prize_pool, 21);
    }

    #[test]
    fn test_calculate_pot_with_no_entries_is_empty() {
        let pot = calculate_pot(0, 10, 1_000).unwrap();

        assert_eq!(pot.gross_pot, 0);
        assert_eq!(pot.prize_pool, 0);
    }

    #[test]
    fn test_calculate_pot_rejects_rake_above_whole_pot() {
        let result = calculate_pot(1, 10, 10_001);

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_calculate_pot_rejects_overflowing_gross() {
        let result = calculate_pot(u64::MAX, 2, 0);

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }
}
