//! Application configuration loaded from environment variables.

use std::str::FromStr;

use crate::errors::{IndexerError, Result};

const DEFAULT_RPC_URL: &str = "https://soroban-testnet.stellar.org";
const DEFAULT_NETWORK_PASSPHRASE: &str = "Test SDF Network ; September 2015";

#[derive(Debug, Clone)]
pub struct Config {
    /// Soroban RPC endpoint (e.g. https://soroban-testnet.stellar.org)
    pub rpc_url: String,
    /// The single deployed DAO contract address (Strkey format)
    pub contract_id: String,
    /// Passphrase of the one network the dashboard targets
    pub network_passphrase: String,
    /// Path to the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// How often (in seconds) to poll the RPC for new events
    pub poll_interval_secs: u64,
    /// Maximum number of events to fetch per RPC request
    pub events_per_page: u32,
    /// Ledger to start from if no cursor is saved
    pub start_ledger: u32,
    /// Decimals of the treasury token
    pub token_decimals: u32,
    /// Smallest funding request the application form accepts, in whole units
    pub min_funding_request: String,
    /// How many times to poll for a submitted transaction's result
    pub tx_confirm_attempts: u32,
    pub tx_confirm_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key → value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let contract_id = lookup("CONTRACT_ID").filter(|v| !v.trim().is_empty()).ok_or_else(|| {
            IndexerError::Config("CONTRACT_ID environment variable is required".to_string())
        })?;

        let token_decimals = parse_or(&lookup, "TOKEN_DECIMALS", 7)?;
        if token_decimals > MAX_TOKEN_DECIMALS {
            return Err(IndexerError::Config(format!(
                "TOKEN_DECIMALS must be at most {MAX_TOKEN_DECIMALS}"
            )));
        }

        Ok(Config {
            rpc_url: lookup("RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            contract_id,
            network_passphrase: lookup("NETWORK_PASSPHRASE")
                .unwrap_or_else(|| DEFAULT_NETWORK_PASSPHRASE.to_string()),
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:./maung_dao.db".to_string()),
            api_port: parse_or(&lookup, "API_PORT", 3001)?,
            poll_interval_secs: parse_or(&lookup, "POLL_INTERVAL_SECS", 5)?,
            events_per_page: parse_or(&lookup, "EVENTS_PER_PAGE", 100)?,
            start_ledger: parse_or(&lookup, "START_LEDGER", 0)?,
            token_decimals,
            min_funding_request: lookup("MIN_FUNDING_REQUEST")
                .unwrap_or_else(|| "0.01".to_string()),
            tx_confirm_attempts: parse_or(&lookup, "TX_CONFIRM_ATTEMPTS", 10)?,
            tx_confirm_interval_secs: parse_or(&lookup, "TX_CONFIRM_INTERVAL_SECS", 2)?,
        })
    }
}

/// 10^38 is the largest power of ten that fits a `u128`.
const MAX_TOKEN_DECIMALS: u32 = 38;

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| IndexerError::Config(format!("Invalid {key}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_contract_is_set() {
        let config = Config::from_lookup(lookup_from(&[("CONTRACT_ID", "CDAO")])).unwrap();
        assert_eq!(config.contract_id, "CDAO");
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.network_passphrase, DEFAULT_NETWORK_PASSPHRASE);
        assert_eq!(config.api_port, 3001);
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.events_per_page, 100);
        assert_eq!(config.token_decimals, 7);
        assert_eq!(config.min_funding_request, "0.01");
        assert_eq!(config.tx_confirm_attempts, 10);
    }

    #[test]
    fn missing_contract_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, IndexerError::Config(msg) if msg.contains("CONTRACT_ID")));

        let blank = Config::from_lookup(lookup_from(&[("CONTRACT_ID", "  ")]));
        assert!(blank.is_err());
    }

    #[test]
    fn invalid_number_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[
            ("CONTRACT_ID", "CDAO"),
            ("API_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, IndexerError::Config(msg) if msg == "Invalid API_PORT"));
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::from_lookup(lookup_from(&[
            ("CONTRACT_ID", "CDAO"),
            ("API_PORT", "8080"),
            ("TOKEN_DECIMALS", "18"),
            ("START_LEDGER", "123456"),
        ]))
        .unwrap();
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.token_decimals, 18);
        assert_eq!(config.start_ledger, 123_456);
    }

    #[test]
    fn decimals_beyond_u128_scale_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("CONTRACT_ID", "CDAO"),
            ("TOKEN_DECIMALS", "39"),
        ]))
        .unwrap_err();
        assert!(matches!(err, IndexerError::Config(_)));

        let config = Config::from_lookup(lookup_from(&[
            ("CONTRACT_ID", "CDAO"),
            ("TOKEN_DECIMALS", "38"),
        ]))
        .unwrap();
        assert_eq!(config.token_decimals, 38);
    }
}
