//! Concrete step actions built from REST requests.
//!
//! The gateway never signs anything: a step carries a transaction the wallet
//! already signed, optionally guarded by an ERC-20 allowance check so an
//! approval is skipped when the spender is already allowed enough.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, info};
use txflow::{ActionError, ActionResult, PostConfirmation, Receipt, StepAction, TransactionStep};

use crate::errors::{GatewayError, Result};
use crate::rpc::{Address, RpcClient};

// ─────────────────────────────────────────────────────────
// Request shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct StepRequest {
    pub label: String,
    /// Signed transaction, `0x`-prefixed. Absent for steps that complete
    /// without a transaction.
    #[serde(default)]
    pub raw_tx: Option<String>,
    #[serde(default)]
    pub allowance_check: Option<AllowanceCheckRequest>,
    /// Notified with the receipt once the transaction is final.
    #[serde(default)]
    pub notify_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllowanceCheckRequest {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    /// Decimal token amount; a string so values beyond 2^53 survive JSON.
    pub required: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowanceCheck {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub required: u128,
}

impl TryFrom<AllowanceCheckRequest> for AllowanceCheck {
    type Error = GatewayError;

    fn try_from(req: AllowanceCheckRequest) -> Result<Self> {
        let required = req.required.trim().parse().map_err(|_| {
            GatewayError::InvalidInput(format!("required amount {:?}", req.required))
        })?;
        Ok(Self {
            token: req.token,
            owner: req.owner,
            spender: req.spender,
            required,
        })
    }
}

// ─────────────────────────────────────────────────────────
// Actions
// ─────────────────────────────────────────────────────────

pub struct RawTransactionAction {
    rpc: Arc<RpcClient>,
    raw_tx: Option<String>,
    allowance_check: Option<AllowanceCheck>,
}

#[async_trait]
impl StepAction for RawTransactionAction {
    async fn execute(&self) -> std::result::Result<ActionResult, ActionError> {
        if let Some(check) = &self.allowance_check {
            let current = self
                .rpc
                .erc20_allowance(&check.token, &check.owner, &check.spender)
                .await?;
            if current >= check.required {
                info!(
                    "Allowance {current} of {} for {} already covers {}",
                    check.token, check.spender, check.required
                );
                return Ok(ActionResult::Skipped);
            }
            debug!("Allowance {current} below required {}", check.required);
        }

        match &self.raw_tx {
            None => Ok(ActionResult::completed()),
            Some(raw) => {
                let hash = self.rpc.send_raw_transaction(raw).await?;
                info!(%hash, "Transaction broadcast");
                Ok(ActionResult::submitted(hash))
            }
        }
    }
}

/// Posts the receipt as JSON to an external service.
pub struct NotifyHook {
    client: Client,
    url: Url,
}

#[async_trait]
impl PostConfirmation for NotifyHook {
    async fn on_receipt(&self, receipt: &Receipt) -> std::result::Result<(), ActionError> {
        self.client
            .post(self.url.clone())
            .json(receipt)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(ActionError::transport)?;
        debug!(tx_hash = %receipt.tx_hash, url = %self.url, "Receipt delivered");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────
// Construction
// ─────────────────────────────────────────────────────────

/// Validate step requests and turn them into sequencer steps.
pub fn build_steps(
    requests: Vec<StepRequest>,
    rpc: &Arc<RpcClient>,
    client: &Client,
) -> Result<Vec<TransactionStep>> {
    if requests.is_empty() {
        return Err(GatewayError::InvalidInput(
            "a run needs at least one step".to_string(),
        ));
    }
    requests
        .into_iter()
        .enumerate()
        .map(|(index, req)| build_step(index, req, rpc, client))
        .collect()
}

fn build_step(
    index: usize,
    req: StepRequest,
    rpc: &Arc<RpcClient>,
    client: &Client,
) -> Result<TransactionStep> {
    if req.label.trim().is_empty() {
        return Err(GatewayError::InvalidInput(format!(
            "step {index} has an empty label"
        )));
    }

    if let Some(raw) = &req.raw_tx {
        validate_raw_tx(raw)
            .map_err(|e| GatewayError::InvalidInput(format!("step {index}: {e}")))?;
    }

    let allowance_check = req.allowance_check.map(AllowanceCheck::try_from).transpose()?;

    let action = RawTransactionAction {
        rpc: rpc.clone(),
        raw_tx: req.raw_tx,
        allowance_check,
    };
    let mut step = TransactionStep::new(req.label, action);

    if let Some(url) = req.notify_url {
        let url = Url::parse(&url)
            .map_err(|e| GatewayError::InvalidInput(format!("step {index} notify_url: {e}")))?;
        step = step.with_post_confirmation(NotifyHook {
            client: client.clone(),
            url,
        });
    }

    Ok(step)
}

fn validate_raw_tx(raw: &str) -> std::result::Result<(), String> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| "raw_tx must be 0x-prefixed".to_string())?;
    if digits.is_empty() {
        return Err("raw_tx is empty".to_string());
    }
    hex::decode(digits).map_err(|e| format!("raw_tx is not hex: {e}"))?;
    Ok(())
}
