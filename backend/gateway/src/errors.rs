//! Application-wide error types.

use thiserror::Error;
use txflow::ActionError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timed out waiting for receipt of {0}")]
    ReceiptTimeout(String),

    #[error("Run {0} not found")]
    RunNotFound(u64),

    #[error("Step execution aborted: {0}")]
    Execution(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl From<GatewayError> for ActionError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Http(e) => ActionError::transport(e),
            GatewayError::ReceiptTimeout(hash) => {
                ActionError::Timeout(format!("receipt of {hash}"))
            }
            e @ GatewayError::Rpc { .. } => ActionError::Rejected(e.to_string()),
            e => ActionError::Other(e.to_string()),
        }
    }
}
