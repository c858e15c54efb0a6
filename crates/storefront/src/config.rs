//! Application configuration loaded from environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use checkout::{CheckoutSettings, DEFAULT_CALL_TIMEOUT};
use common::PaymentMethodId;
use rust_decimal::Decimal;

/// Storefront configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL` - PostgreSQL connection string (required to run)
/// - `RUST_LOG` - tracing filter directive (default: `"info"`)
/// - `TAX_RATE` - rate passed to `finish_transaction` (default: `0`)
/// - `PAYMENT_METHOD_ID` - payment method for every purchase (default: `1`)
/// - `GATEWAY_TIMEOUT_MS` - per-call time budget (default: `5000`)
/// - `LOT_PREVIEW_LIMIT` - stock lots shown before asking for a quantity (default: `5`)
/// - `METRICS_ADDR` - Prometheus listener address (default: disabled)
///
/// Values that fail to parse fall back to their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: Option<String>,
    pub log_level: String,
    pub tax_rate: Decimal,
    pub payment_method_id: PaymentMethodId,
    pub gateway_timeout: Duration,
    pub lot_preview_limit: usize,
    pub metrics_addr: Option<SocketAddr>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            tax_rate: parse_var(&lookup, "TAX_RATE").unwrap_or(defaults.tax_rate),
            payment_method_id: parse_var(&lookup, "PAYMENT_METHOD_ID")
                .map(PaymentMethodId::new)
                .unwrap_or(defaults.payment_method_id),
            gateway_timeout: parse_var(&lookup, "GATEWAY_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.gateway_timeout),
            lot_preview_limit: parse_var(&lookup, "LOT_PREVIEW_LIMIT")
                .unwrap_or(defaults.lot_preview_limit),
            metrics_addr: parse_var(&lookup, "METRICS_ADDR"),
        }
    }

    /// Returns the parameters for every checkout attempt.
    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings::default()
            .with_tax_rate(self.tax_rate)
            .with_payment_method(self.payment_method_id)
            .with_call_timeout(self.gateway_timeout)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            log_level: "info".to_string(),
            tax_rate: Decimal::ZERO,
            payment_method_id: PaymentMethodId::DEFAULT,
            gateway_timeout: DEFAULT_CALL_TIMEOUT,
            lot_preview_limit: cart::DEFAULT_PREVIEW_LIMIT,
            metrics_addr: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.database_url, None);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.tax_rate, Decimal::ZERO);
        assert_eq!(config.payment_method_id, PaymentMethodId::new(1));
        assert_eq!(config.gateway_timeout, Duration::from_millis(5000));
        assert_eq!(config.lot_preview_limit, 5);
        assert_eq!(config.metrics_addr, None);
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        assert_eq!(from_pairs(&[]), Config::default());
    }

    #[test]
    fn test_values_are_read() {
        let config = from_pairs(&[
            ("DATABASE_URL", "postgres://localhost/store"),
            ("RUST_LOG", "debug"),
            ("TAX_RATE", "0.0825"),
            ("PAYMENT_METHOD_ID", "3"),
            ("GATEWAY_TIMEOUT_MS", "250"),
            ("LOT_PREVIEW_LIMIT", "10"),
            ("METRICS_ADDR", "127.0.0.1:9000"),
        ]);

        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/store")
        );
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.tax_rate, Decimal::new(825, 4));
        assert_eq!(config.payment_method_id, PaymentMethodId::new(3));
        assert_eq!(config.gateway_timeout, Duration::from_millis(250));
        assert_eq!(config.lot_preview_limit, 10);
        assert_eq!(config.metrics_addr, "127.0.0.1:9000".parse().ok());
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = from_pairs(&[
            ("TAX_RATE", "eight percent"),
            ("GATEWAY_TIMEOUT_MS", "-1"),
            ("METRICS_ADDR", "not an address"),
        ]);

        assert_eq!(config.tax_rate, Decimal::ZERO);
        assert_eq!(config.gateway_timeout, Duration::from_millis(5000));
        assert_eq!(config.metrics_addr, None);
    }

    #[test]
    fn test_checkout_settings() {
        let config = from_pairs(&[("TAX_RATE", "0.05"), ("GATEWAY_TIMEOUT_MS", "900")]);
        let settings = config.checkout_settings();

        assert_eq!(settings.tax_rate, Decimal::new(5, 2));
        assert_eq!(settings.payment_method_id, PaymentMethodId::DEFAULT);
        assert_eq!(settings.call_timeout, Duration::from_millis(900));
    }
}
