//! Gateway confirmations and the boundary parser for gateway payloads.

use quizarena_core::error::DomainError;
use serde::Serialize;
use serde_json::Value;

use super::join::{Currency, JoinStatus};

/// Transaction status as reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    /// Submitted, not yet processed.
    Pending,
    /// Being processed.
    Processing,
    /// Settled.
    Completed,
    /// Settled (alternate spelling used by some gateways).
    Succeeded,
    /// Rejected.
    Failed,
    /// Returned to the sender.
    Refunded,
    /// Anything the gateway reported that is not listed above.
    Unknown,
}

impl GatewayStatus {
    /// Parses a gateway status string. Unrecognised values map to `Unknown`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "refunded" => Self::Refunded,
            _ => Self::Unknown,
        }
    }

    /// The join status this gateway status settles on, or `None` when the
    /// payment is still in flight and the join keeps its current status.
    #[must_use]
    pub fn join_status(self) -> Option<JoinStatus> {
        match self {
            Self::Completed | Self::Succeeded => Some(JoinStatus::Paid),
            Self::Refunded => Some(JoinStatus::Refunded),
            Self::Pending | Self::Processing | Self::Failed | Self::Unknown => None,
        }
    }
}

/// A gateway's confirmation of one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionVerification {
    /// Gateway transaction id.
    pub transaction_id: String,
    /// Reported status.
    pub status: GatewayStatus,
    /// Amount paid in the smallest unit.
    pub amount: u64,
    /// Token paid.
    pub currency: Currency,
    /// Wallet the payment reached.
    pub destination: String,
    /// On-chain hash, if any.
    pub hash: Option<String>,
}

fn first<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| payload.get(*key).filter(|v| !v.is_null()))
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        _ => None,
    }
}

fn positive_amount(value: &Value) -> Option<u64> {
    let amount = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    (amount > 0).then_some(amount)
}

/// Validates a raw gateway payload and narrows it to a verification.
///
/// Accepted aliases: `amount|value`, `currency|token`,
/// `destination|receiver`, `hash|tx_hash|txHash`. A missing status is
/// `unknown`.
///
/// # Errors
///
/// Returns `DomainError::External` when the payload is not an object or the
/// amount, currency or destination is missing or unusable.
pub fn parse_gateway_payload(
    payload: &Value,
    transaction_id: &str,
) -> Result<TransactionVerification, DomainError> {
    if !payload.is_object() {
        return Err(DomainError::External(
            "gateway payload is not a JSON object".to_owned(),
        ));
    }
    let incomplete = |field: &str| {
        DomainError::External(format!(
            "incomplete transaction payload from gateway: {field}"
        ))
    };

    let status = first(payload, &["status"])
        .and_then(Value::as_str)
        .map_or(GatewayStatus::Unknown, GatewayStatus::parse);
    let amount = first(payload, &["amount", "value"])
        .and_then(positive_amount)
        .ok_or_else(|| incomplete("amount"))?;
    let currency = first(payload, &["currency", "token"])
        .and_then(Value::as_str)
        .and_then(|c| c.parse::<Currency>().ok())
        .ok_or_else(|| incomplete("currency"))?;
    let destination = first(payload, &["destination", "receiver"])
        .and_then(text)
        .ok_or_else(|| incomplete("destination"))?;
    let hash = first(payload, &["hash", "tx_hash", "txHash"]).and_then(text);

    Ok(TransactionVerification {
        transaction_id: transaction_id.to_owned(),
        status,
        amount,
        currency,
        destination,
        hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_reads_primary_field_names() {
        let payload = json!({
            "status": "completed",
            "amount": 5,
            "currency": "WLD",
            "destination": "0xOperator",
            "hash": "0xabc"
        });

        let v = parse_gateway_payload(&payload, "tx-1").unwrap();

        assert_eq!(v.transaction_id, "tx-1");
        assert_eq!(v.status, GatewayStatus::Completed);
        assert_eq!(v.amount, 5);
        assert_eq!(v.currency, Currency::Wld);
        assert_eq!(v.destination, "0xOperator");
        assert_eq!(v.hash.as_deref(), Some("0xabc"));
    }

    #[test]
    fn test_parse_reads_aliases_and_numeric_strings() {
        let payload = json!({
            "status": "succeeded",
            "value": "12",
            "token": "USDC",
            "receiver": "0xOperator",
            "txHash": "0xdef"
        });

        let v = parse_gateway_payload(&payload, "tx-2").unwrap();

        assert_eq!(v.amount, 12);
        assert_eq!(v.currency, Currency::Usdc);
        assert_eq!(v.hash.as_deref(), Some("0xdef"));
    }

    #[test]
    fn test_parse_maps_missing_or_odd_status_to_unknown() {
        let payload = json!({
            "amount": 5,
            "currency": "WLD",
            "destination": "0xOperator",
            "status": "mined"
        });

        let v = parse_gateway_payload(&payload, "tx-3").unwrap();

        assert_eq!(v.status, GatewayStatus::Unknown);
        assert!(v.hash.is_none());
    }

    #[test]
    fn test_parse_rejects_incomplete_payloads() {
        let cases = [
            json!({ "currency": "WLD", "destination": "0xOperator" }),
            json!({ "amount": 0, "currency": "WLD", "destination": "0xOperator" }),
            json!({ "amount": 5, "currency": "EUR", "destination": "0xOperator" }),
            json!({ "amount": 5, "currency": "WLD" }),
            json!({ "amount": 1.5, "currency": "WLD", "destination": "0xOperator" }),
            json!(["not", "an", "object"]),
        ];

        for payload in cases {
            let result = parse_gateway_payload(&payload, "tx");
            assert!(
                matches!(result, Err(DomainError::External(_))),
                "accepted {payload}"
            );
        }
    }

    #[test]
    fn test_join_status_mapping() {
        assert_eq!(GatewayStatus::Completed.join_status(), Some(JoinStatus::Paid));
        assert_eq!(GatewayStatus::Succeeded.join_status(), Some(JoinStatus::Paid));
        assert_eq!(
            GatewayStatus::Refunded.join_status(),
            Some(JoinStatus::Refunded)
        );
        assert_eq!(GatewayStatus::Processing.join_status(), None);
    }
}
