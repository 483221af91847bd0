//! Per-tournament ledger of confirmed buy-ins.

use quizarena_core::error::DomainError;
use serde::Serialize;
use uuid::Uuid;

use super::join::Currency;

/// Sum of confirmed buy-ins for one tournament, in a single currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerPot {
    /// Tournament the pot belongs to.
    pub tournament_id: Uuid,
    /// Total in the smallest unit.
    pub total: u64,
    /// The currency of the first credit.
    pub currency: Currency,
}

impl LedgerPot {
    /// Opens a pot with its first credit.
    #[must_use]
    pub fn opened(tournament_id: Uuid, amount: u64, currency: Currency) -> Self {
        Self {
            tournament_id,
            total: amount,
            currency,
        }
    }

    /// Checks `currency` matches the pot's.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Integrity` on a mismatch.
    pub fn ensure_currency(&self, currency: Currency) -> Result<(), DomainError> {
        if self.currency == currency {
            Ok(())
        } else {
            Err(DomainError::Integrity(format!(
                "currency mismatch for tournament pot: pot is {}, payment is {currency}",
                self.currency
            )))
        }
    }

    pub(crate) fn credit(&mut self, amount: u64) {
        self.total = self.total.saturating_add(amount);
    }

    pub(crate) fn debit(&mut self, amount: u64) {
        self.total = self.total.saturating_sub(amount);
    }
}
