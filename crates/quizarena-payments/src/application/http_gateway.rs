//! Payment gateway client.

use async_trait::async_trait;
use quizarena_core::error::DomainError;
use tracing::{debug, instrument};

use crate::domain::gateway::{TransactionVerification, parse_gateway_payload};

/// Default transaction lookup endpoint.
pub const DEFAULT_GATEWAY_BASE_URL: &str =
    "https://developer.worldcoin.org/mini-app/transactions";

/// Looks up a payment transaction by id.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Fetches and validates the gateway's view of `transaction_id`.
    async fn fetch_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionVerification, DomainError>;
}

/// Gateway client over HTTP: `GET {base}/{transaction_id}`.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpPaymentGateway {
    /// Creates a client with a 10 second request timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    /// URL of the transaction lookup.
    #[must_use]
    pub fn transaction_url(&self, transaction_id: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), transaction_id)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self))]
    async fn fetch_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionVerification, DomainError> {
        let mut request = self
            .client
            .get(self.transaction_url(transaction_id))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DomainError::External(format!("gateway request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::External(format!(
                "gateway responded with status {}",
                status.as_u16()
            )));
        }
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DomainError::External(format!("gateway returned invalid JSON: {e}")))?;
        debug!(%payload, "gateway payload received");
        parse_gateway_payload(&payload, transaction_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_url_joins_base_and_id() {
        let gateway = HttpPaymentGateway::new(format!("{DEFAULT_GATEWAY_BASE_URL}/"), None);

        assert_eq!(
            gateway.transaction_url("tx-9"),
            "https://developer.worldcoin.org/mini-app/transactions/tx-9"
        );
    }
}
