//! Transaction steps and the capabilities they are built from.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::ActionError;
use crate::types::{ActionResult, Receipt, TxHash};

/// The work a step performs: typically requesting a signed transaction.
///
/// Called again if the caller retries a failed step, so implementations must
/// be re-runnable.
#[async_trait]
pub trait StepAction: Send + Sync {
    async fn execute(&self) -> Result<ActionResult, ActionError>;
}

#[async_trait]
impl<F, Fut> StepAction for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<ActionResult, ActionError>> + Send + 'static,
{
    async fn execute(&self) -> Result<ActionResult, ActionError> {
        (self)().await
    }
}

/// Side effect run once a step's receipt has been received and recorded.
#[async_trait]
pub trait PostConfirmation: Send + Sync {
    async fn on_receipt(&self, receipt: &Receipt) -> Result<(), ActionError>;
}

/// Waits until a submitted transaction reaches finality.
#[async_trait]
pub trait ReceiptWaiter: Send + Sync {
    async fn wait_for_receipt(&self, tx_hash: &TxHash) -> Result<Receipt, ActionError>;
}

/// One unit of work in a sequence.
#[derive(Clone)]
pub struct TransactionStep {
    pub label: String,
    pub action: Arc<dyn StepAction>,
    pub post_confirmation: Option<Arc<dyn PostConfirmation>>,
}

impl TransactionStep {
    pub fn new(label: impl Into<String>, action: impl StepAction + 'static) -> Self {
        Self {
            label: label.into(),
            action: Arc::new(action),
            post_confirmation: None,
        }
    }

    pub fn with_post_confirmation(mut self, hook: impl PostConfirmation + 'static) -> Self {
        self.post_confirmation = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for TransactionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionStep")
            .field("label", &self.label)
            .field("post_confirmation", &self.post_confirmation.is_some())
            .finish()
    }
}
