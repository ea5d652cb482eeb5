//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::errors::{GatewayError, Result};

/// Where the projection endpoints read "now" from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    /// Timestamp of the latest block.
    Chain,
    /// Local wall clock.
    System,
}

impl FromStr for ClockSource {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chain" => Ok(Self::Chain),
            "system" => Ok(Self::System),
            other => Err(GatewayError::Config(format!(
                "Invalid CLOCK_SOURCE {other:?} (expected \"chain\" or \"system\")"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Ethereum JSON-RPC endpoint
    pub rpc_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Delay between `eth_getTransactionReceipt` polls
    pub receipt_poll_interval: Duration,
    /// Give up waiting for a receipt after this long
    pub receipt_timeout: Duration,
    /// Timeout applied to every outbound HTTP request
    pub http_timeout: Duration,
    pub clock_source: ClockSource,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            rpc_url: get("RPC_URL", "http://127.0.0.1:8545"),
            api_port: parse(&get("API_PORT", "3001"), "API_PORT")?,
            receipt_poll_interval: Duration::from_millis(parse(
                &get("RECEIPT_POLL_INTERVAL_MS", "1000"),
                "RECEIPT_POLL_INTERVAL_MS",
            )?),
            receipt_timeout: Duration::from_secs(parse(
                &get("RECEIPT_TIMEOUT_SECS", "180"),
                "RECEIPT_TIMEOUT_SECS",
            )?),
            http_timeout: Duration::from_secs(parse(
                &get("HTTP_TIMEOUT_SECS", "30"),
                "HTTP_TIMEOUT_SECS",
            )?),
            clock_source: get("CLOCK_SOURCE", "chain").parse()?,
        })
    }
}

fn parse<T: FromStr>(value: &str, key: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| GatewayError::Config(format!("Invalid {key}")))
}
