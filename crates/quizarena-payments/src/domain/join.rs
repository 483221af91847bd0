//! Paid join intents.

use std::fmt;
use std::str::FromStr;

use quizarena_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tokens accepted for buy-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Worldcoin.
    Wld,
    /// USD Coin.
    Usdc,
}

impl Currency {
    /// Ticker symbol.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wld => "WLD",
            Self::Usdc => "USDC",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WLD" => Ok(Self::Wld),
            "USDC" => Ok(Self::Usdc),
            other => Err(DomainError::Validation(format!(
                "unsupported currency: {other}"
            ))),
        }
    }
}

/// Where a participant's paid join stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStatus {
    /// Intent recorded, payment not confirmed.
    PendingPayment,
    /// Payment confirmed; the buy-in is in the pot.
    Paid,
    /// Payment returned; the participant may join again.
    Refunded,
}

impl JoinStatus {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
        }
    }
}

impl fmt::Display for JoinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to record a join intent before the participant pays.
#[derive(Debug, Clone)]
pub struct PendingJoin {
    /// Tournament being joined.
    pub tournament_id: Uuid,
    /// Participant's World ID.
    pub world_id: String,
    /// Wallet the payment must come from.
    pub wallet_address: String,
    /// Expected amount in the smallest unit.
    pub amount: u64,
    /// Expected token.
    pub currency: Currency,
    /// Operator wallet the payment must reach.
    pub destination: String,
}

impl PendingJoin {
    /// Checks that every field is present and the amount is positive.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` naming the first bad field.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.world_id.trim().is_empty() {
            return Err(DomainError::Validation("world id is required".to_owned()));
        }
        if self.wallet_address.trim().is_empty() {
            return Err(DomainError::Validation(
                "wallet address is required".to_owned(),
            ));
        }
        if self.destination.trim().is_empty() {
            return Err(DomainError::Validation(
                "payment destination is required".to_owned(),
            ));
        }
        if self.amount == 0 {
            return Err(DomainError::Validation(
                "a positive amount is required to join the tournament".to_owned(),
            ));
        }
        Ok(())
    }
}

/// A participant's join and its payment trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinRecord {
    /// Tournament joined.
    pub tournament_id: Uuid,
    /// Participant's World ID.
    pub world_id: String,
    /// Wallet the payment must come from.
    pub wallet_address: String,
    /// Current status.
    pub join_status: JoinStatus,
    /// Expected amount in the smallest unit.
    pub amount: u64,
    /// Expected token.
    pub currency: Currency,
    /// Operator wallet the payment must reach.
    pub destination: String,
    /// Gateway transaction id of the last reconciliation.
    pub transaction_id: Option<String>,
    /// On-chain hash, once the gateway reports one.
    pub transaction_hash: Option<String>,
    /// Timestamped history lines.
    pub audit_log: Vec<String>,
}

impl JoinRecord {
    /// Whether this record blocks a new intent for the same participant.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.join_status != JoinStatus::Refunded
    }
}
