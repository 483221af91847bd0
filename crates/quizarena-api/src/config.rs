//! Environment configuration, parsed once at startup.

use std::time::Duration;

use quizarena_payments::application::http_gateway::DEFAULT_GATEWAY_BASE_URL;
use quizarena_settlement::application::transfers::DEFAULT_EXPLORER_BASE_URL;

use crate::error::AppError;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// PostgreSQL URL; the in-memory store is used when unset.
    pub database_url: Option<String>,
    /// Operator wallet receiving buy-ins.
    pub payment_destination: Option<String>,
    /// Gateway transaction lookup base.
    pub gateway_base_url: String,
    /// Bearer token for the gateway.
    pub gateway_api_key: Option<String>,
    /// Prefix for payout explorer links.
    pub explorer_base_url: String,
    /// Scheduler tick period.
    pub tick_interval: Duration,
}

impl AppConfig {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for an unparsable value.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`. Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for an unparsable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?,
            None => 3000,
        };
        let tick_ms = match var("TICK_INTERVAL_MS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| {
                    AppError::Config("TICK_INTERVAL_MS must be a positive integer".to_owned())
                })?,
            None => 1000,
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port,
            database_url: var("DATABASE_URL"),
            payment_destination: var("PAYMENT_DESTINATION"),
            gateway_base_url: var("PAYMENT_GATEWAY_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GATEWAY_BASE_URL.to_owned()),
            gateway_api_key: var("PAYMENT_GATEWAY_API_KEY"),
            explorer_base_url: var("EXPLORER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_EXPLORER_BASE_URL.to_owned()),
            tick_interval: Duration::from_millis(tick_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = config(&[]).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert!(config.payment_destination.is_none());
        assert_eq!(config.gateway_base_url, DEFAULT_GATEWAY_BASE_URL);
        assert_eq!(config.explorer_base_url, DEFAULT_EXPLORER_BASE_URL);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_reads_overrides() {
        let config = config(&[
            ("PORT", "8080"),
            ("PAYMENT_DESTINATION", "0xOperator"),
            ("TICK_INTERVAL_MS", "250"),
            ("DATABASE_URL", "  "),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.payment_destination.as_deref(), Some("0xOperator"));
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(matches!(config(&[("PORT", "99999")]), Err(AppError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_tick_interval() {
        assert!(matches!(
            config(&[("TICK_INTERVAL_MS", "0")]),
            Err(AppError::Config(_))
        ));
    }
}
