//! Ethereum JSON-RPC client — broadcasts pre-signed transactions, polls for
//! receipts, and reads allowances and block timestamps.
//!
//! ## Resilience
//!
//! * Exponential back-off is applied when the node returns a transport error,
//!   a rate-limit response, or a soft RPC error, up to [`MAX_BACKOFF_MS`]
//!   between attempts and [`MAX_ATTEMPTS`] attempts in total.
//! * Broadcasting is never retried: a lost response to
//!   `eth_sendRawTransaction` must not turn into a second submission attempt
//!   that fails with "already known".

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, warn};
use txflow::{ActionError, Receipt, ReceiptStatus, ReceiptWaiter, TxHash};

use crate::errors::{GatewayError, Result};

const MAX_BACKOFF_MS: u64 = 30_000;
const INITIAL_BACKOFF_MS: u64 = 1_000;
const MAX_ATTEMPTS: u32 = 6;

/// `allowance(address,address)`
const ALLOWANCE_SELECTOR: &str = "dd62ed3e";

/// Error codes that will not succeed on retry: malformed request, unknown
/// method, bad params, execution reverted, and the generic server error nodes
/// use for rejected transactions (nonce too low, insufficient funds, ...).
const HARD_ERROR_CODES: [i64; 5] = [-32600, -32601, -32602, 3, -32000];

// ─────────────────────────────────────────────────────────
// JSON-RPC response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Value,
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RawReceipt {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: TxHash,
    /// `0x1` success, `0x0` reverted. Absent on pre-Byzantium chains.
    pub status: Option<String>,
    #[serde(rename = "blockNumber")]
    pub block_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    timestamp: String,
}

// ─────────────────────────────────────────────────────────
// Address
// ─────────────────────────────────────────────────────────

/// A 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 20]);

impl FromStr for Address {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits)
            .map_err(|e| GatewayError::InvalidInput(format!("address {s:?}: {e}")))?;
        let array: [u8; 20] = bytes.as_slice().try_into().map_err(|_| {
            GatewayError::InvalidInput(format!("address {s:?} must be 20 bytes"))
        })?;
        Ok(Self(array))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ─────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────

pub struct RpcClient {
    client: Client,
    rpc_url: String,
    initial_backoff: Duration,
}

impl RpcClient {
    pub fn new(client: Client, rpc_url: impl Into<String>) -> Self {
        Self {
            client,
            rpc_url: rpc_url.into(),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    #[cfg(test)]
    fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Issue a JSON-RPC call, retrying soft failures with back-off.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.call_with_attempts(method, params, MAX_ATTEMPTS).await
    }

    async fn call_with_attempts(
        &self,
        method: &str,
        params: Value,
        max_attempts: u32,
    ) -> Result<Value> {
        let mut backoff = self.initial_backoff;
        let max_backoff = Duration::from_millis(MAX_BACKOFF_MS);
        let mut attempt = 1;

        loop {
            let response = self
                .client
                .post(&self.rpc_url)
                .json(&json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "method": method,
                    "params": params,
                }))
                .send()
                .await;

            let retry_reason = match response {
                Err(e) => {
                    if attempt >= max_attempts {
                        return Err(GatewayError::Http(e));
                    }
                    format!("request failed: {e}")
                }
                Ok(resp) if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= max_attempts {
                        return Err(GatewayError::Rpc {
                            code: 429,
                            message: "rate limited".to_string(),
                        });
                    }
                    "rate limited".to_string()
                }
                Ok(resp) => {
                    let body: RpcResponse = resp.error_for_status()?.json().await?;

                    match body.error {
                        None => {
                            debug!("{method} succeeded on attempt {attempt}");
                            return Ok(body.result);
                        }
                        Some(err) if HARD_ERROR_CODES.contains(&err.code) => {
                            return Err(GatewayError::Rpc {
                                code: err.code,
                                message: err.message,
                            });
                        }
                        Some(err) => {
                            if attempt >= max_attempts {
                                return Err(GatewayError::Rpc {
                                    code: err.code,
                                    message: err.message,
                                });
                            }
                            format!("soft error {} {}", err.code, err.message)
                        }
                    }
                }
            };

            warn!("{method} attempt {attempt} failed (will retry in {backoff:?}): {retry_reason}");
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(max_backoff);
            attempt += 1;
        }
    }

    /// Broadcast a signed transaction and return its hash.
    pub async fn send_raw_transaction(&self, raw_tx: &str) -> Result<TxHash> {
        let result = self
            .call_with_attempts("eth_sendRawTransaction", json!([raw_tx]), 1)
            .await?;
        let hash = result.as_str().ok_or_else(|| {
            GatewayError::InvalidInput(format!("eth_sendRawTransaction returned {result}"))
        })?;
        hash.parse()
            .map_err(|e| GatewayError::InvalidInput(format!("transaction hash {hash:?}: {e}")))
    }

    /// The receipt of `tx_hash`, or `None` while it is still pending.
    pub async fn transaction_receipt(&self, tx_hash: &TxHash) -> Result<Option<Receipt>> {
        let result = self
            .call("eth_getTransactionReceipt", json!([tx_hash.to_string()]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let raw: RawReceipt = serde_json::from_value(result)?;
        decode_receipt(raw).map(Some)
    }

    /// Timestamp (Unix seconds) of the latest block.
    pub async fn latest_block_timestamp(&self) -> Result<i64> {
        let result = self
            .call("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        let block: RawBlock = serde_json::from_value(result)?;
        let ts = parse_quantity(&block.timestamp)?;
        i64::try_from(ts)
            .map_err(|_| GatewayError::InvalidInput(format!("block timestamp {ts} out of range")))
    }

    /// ERC-20 `allowance(owner, spender)` on `token`, saturating at `u128::MAX`.
    pub async fn erc20_allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
    ) -> Result<u128> {
        let result = self
            .call(
                "eth_call",
                json!([
                    { "to": token.to_string(), "data": encode_allowance_call(owner, spender) },
                    "latest"
                ]),
            )
            .await?;
        let word = result.as_str().ok_or_else(|| {
            GatewayError::InvalidInput(format!("eth_call returned {result}"))
        })?;
        parse_u256_saturating(word)
    }
}

// ─────────────────────────────────────────────────────────
// Receipt polling
// ─────────────────────────────────────────────────────────

/// Waits for receipts by polling `eth_getTransactionReceipt`.
pub struct ReceiptPoller {
    rpc: Arc<RpcClient>,
    interval: Duration,
    timeout: Duration,
}

impl ReceiptPoller {
    pub fn new(rpc: Arc<RpcClient>, interval: Duration, timeout: Duration) -> Self {
        Self {
            rpc,
            interval,
            timeout,
        }
    }
}

#[async_trait]
impl ReceiptWaiter for ReceiptPoller {
    async fn wait_for_receipt(
        &self,
        tx_hash: &TxHash,
    ) -> std::result::Result<Receipt, ActionError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(receipt) = self.rpc.transaction_receipt(tx_hash).await? {
                debug!(%tx_hash, status = ?receipt.status, "Receipt received");
                return Ok(receipt);
            }
            if Instant::now() + self.interval > deadline {
                return Err(GatewayError::ReceiptTimeout(tx_hash.to_string()).into());
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

// ─────────────────────────────────────────────────────────
// Encoding helpers
// ─────────────────────────────────────────────────────────

fn decode_receipt(raw: RawReceipt) -> Result<Receipt> {
    let status = match raw.status.as_deref() {
        None => ReceiptStatus::Success,
        Some(s) if parse_quantity(s)? == 1 => ReceiptStatus::Success,
        Some(_) => ReceiptStatus::Reverted,
    };
    let block_number = raw.block_number.as_deref().map(parse_quantity).transpose()?;
    Ok(Receipt {
        tx_hash: raw.transaction_hash,
        status,
        block_number,
    })
}

/// Parse a hex `QUANTITY` (`0x1b4`).
fn parse_quantity(s: &str) -> Result<u64> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| GatewayError::InvalidInput(format!("quantity {s:?}: {e}")))
}

/// Parse a 256-bit hex word, saturating values wider than 128 bits.
fn parse_u256_saturating(s: &str) -> Result<u128> {
    let digits = s.strip_prefix("0x").unwrap_or(s).trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    if digits.len() > 32 {
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(GatewayError::InvalidInput(format!("uint256 {s:?}")));
        }
        return Ok(u128::MAX);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| GatewayError::InvalidInput(format!("uint256 {s:?}: {e}")))
}

fn encode_allowance_call(owner: &Address, spender: &Address) -> String {
    format!(
        "0x{ALLOWANCE_SELECTOR}{:0>64}{:0>64}",
        hex::encode(owner.0),
        hex::encode(spender.0)
    )
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
