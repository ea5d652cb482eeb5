//! Error types for step capabilities and the per-step error record.

use serde::Serialize;
use thiserror::Error;

/// Failure reported by a capability (action, receipt wait, post-confirmation hook).
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("{0}")]
    Other(String),
}

impl ActionError {
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Box::new(err))
    }
}

/// Where in a step's execution the failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    /// The action failed before any hash existed.
    Submission,
    /// Waiting for the receipt failed; the hash is retained.
    Confirmation,
    /// The receipt came back with a non-success status.
    Reverted,
    /// The post-confirmation hook failed.
    PostConfirmation,
}

/// Error recorded against a step in [`crate::TxState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{kind:?}: {message}")]
pub struct StepError {
    pub kind: StepErrorKind,
    pub message: String,
}

impl StepError {
    pub fn new(kind: StepErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn from_action(kind: StepErrorKind, err: &ActionError) -> Self {
        Self::new(kind, err.to_string())
    }
}
