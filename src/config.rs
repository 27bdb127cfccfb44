//! Process configuration read from the environment (and `.env`).

use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub port: u16,
    pub nats_url: Option<String>,
    pub store_name: String,
    pub public_base_url: String,
    pub default_currency: String,
    pub invoice_prefix: String,
    /// CZK per EUR when no rate has been stored.
    pub fallback_eur_czk: Decimal,
    /// Stock level at or below which a low-stock event is published.
    pub low_stock_threshold: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 10,
            port: 8083,
            nats_url: None,
            store_name: "Hairstore".to_string(),
            public_base_url: "http://localhost:8083".to_string(),
            default_currency: "CZK".to_string(),
            invoice_prefix: "INV".to_string(),
            fallback_eur_czk: Decimal::new(250, 1),
            low_stock_threshold: 2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid value for {key}: {value:?}")]
pub struct ConfigError { pub key: &'static str, pub value: String }

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Ok(Self {
            database_url: get("DATABASE_URL"),
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            port: parse_or(&get, "PORT", defaults.port)?,
            nats_url: get("NATS_URL"),
            store_name: get("STORE_NAME").unwrap_or(defaults.store_name),
            public_base_url: get("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
            default_currency: get("DEFAULT_CURRENCY").map(|c| c.to_uppercase()).unwrap_or(defaults.default_currency),
            invoice_prefix: get("INVOICE_PREFIX").unwrap_or(defaults.invoice_prefix),
            fallback_eur_czk: parse_or(&get, "FALLBACK_EUR_CZK", defaults.fallback_eur_czk)?,
            low_stock_threshold: parse_or(&get, "LOW_STOCK_THRESHOLD", defaults.low_stock_threshold)?,
        })
    }
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_and_overrides() {
        let env: HashMap<&str, &str> = [("PORT", "9000"), ("DEFAULT_CURRENCY", "eur"), ("DATABASE_URL", "  ")].into();
        let cfg = Config::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.default_currency, "EUR");
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.fallback_eur_czk, Decimal::new(25, 0));
    }

    #[test]
    fn test_invalid_number() {
        let err = Config::from_lookup(|k| (k == "PORT").then(|| "eighty".to_string())).unwrap_err();
        assert_eq!(err.key, "PORT");
    }
}
