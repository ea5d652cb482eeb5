//! Step sequencer: runs an ordered list of dependent transaction steps one at
//! a time and publishes every state transition.
//!
//! ## Preconditions
//!
//! * Steps are executed strictly one after another. `execute_next` takes
//!   `&mut self`, so a single owner cannot overlap two calls; owners that share
//!   a sequencer must serialize access (the gateway wraps it in a mutex).
//! * Ordering between steps is the caller's contract: step `i + 1` should not
//!   be executed before the call for step `i` has returned, and the caller
//!   should stop once [`RunState::is_error`] is observed. The sequencer does
//!   not enforce either.
//! * There is no retry and no cancellation. Once an action has been invoked it
//!   runs to completion; a failed step stays failed until it is executed again.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::errors::{StepError, StepErrorKind};
use crate::state::{RunState, StepEvent};
use crate::step::{ReceiptWaiter, TransactionStep};
use crate::types::{ActionResult, ReceiptStatus};

pub struct Sequencer {
    steps: Vec<TransactionStep>,
    receipts: Arc<dyn ReceiptWaiter>,
    state: watch::Sender<RunState>,
}

impl Sequencer {
    /// Initialize a run: every step pending, cursor at zero.
    pub fn new(steps: Vec<TransactionStep>, receipts: Arc<dyn ReceiptWaiter>) -> Self {
        let (state, _) = watch::channel(RunState::new(steps.len()));
        Self {
            steps,
            receipts,
            state,
        }
    }

    /// Receive every state transition of this run.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> RunState {
        self.state.borrow().clone()
    }

    pub fn current_step(&self) -> usize {
        self.state.borrow().current_step
    }

    pub fn is_error(&self) -> bool {
        self.state.borrow().is_error()
    }

    pub fn is_success(&self) -> bool {
        self.state.borrow().is_success()
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().is_pending()
    }

    /// Execute the step at `index`.
    ///
    /// Returns `false` if the action, the receipt wait, or the
    /// post-confirmation hook failed; the step is then `Failed` and the cursor
    /// stays put. Returns `true` otherwise, including when the receipt reports
    /// a revert, and the cursor advances by one.
    pub async fn execute_next(&mut self, index: usize) -> bool {
        let Some(step) = self.steps.get(index).cloned() else {
            warn!(
                "Step index {index} out of range (run has {} steps)",
                self.steps.len()
            );
            return false;
        };

        self.transition(StepEvent::Sending { index });
        debug!(step = %step.label, index, "Sending step");

        let result = match step.action.execute().await {
            Ok(result) => result,
            Err(e) => {
                warn!(step = %step.label, index, "Step submission failed: {e}");
                self.fail(index, StepError::from_action(StepErrorKind::Submission, &e));
                return false;
            }
        };

        let tx_hash = result.tx_hash();
        self.transition(StepEvent::Sent { index, tx_hash });

        match result {
            ActionResult::Skipped => {
                info!(step = %step.label, index, "Step skipped");
                self.transition(StepEvent::Skipped { index });
            }
            ActionResult::Submitted {
                tx_hash: Some(hash),
            } => {
                debug!(step = %step.label, index, %hash, "Waiting for receipt");
                let receipt = match self.receipts.wait_for_receipt(&hash).await {
                    Ok(receipt) => receipt,
                    Err(e) => {
                        warn!(step = %step.label, index, %hash, "Waiting for receipt failed: {e}");
                        self.fail(
                            index,
                            StepError::from_action(StepErrorKind::Confirmation, &e),
                        );
                        return false;
                    }
                };

                match receipt.status {
                    ReceiptStatus::Success => {
                        info!(step = %step.label, index, %hash, "Step confirmed");
                        self.transition(StepEvent::Confirmed { index });
                    }
                    ReceiptStatus::Reverted => {
                        warn!(step = %step.label, index, %hash, "Transaction reverted");
                        self.fail(
                            index,
                            StepError::new(
                                StepErrorKind::Reverted,
                                format!("transaction {hash} reverted"),
                            ),
                        );
                    }
                }

                if let Some(hook) = &step.post_confirmation {
                    if let Err(e) = hook.on_receipt(&receipt).await {
                        warn!(step = %step.label, index, "Post-confirmation hook failed: {e}");
                        self.fail(
                            index,
                            StepError::from_action(StepErrorKind::PostConfirmation, &e),
                        );
                        return false;
                    }
                }
            }
            ActionResult::Submitted { tx_hash: None } => {
                info!(step = %step.label, index, "Step completed without a transaction");
                self.transition(StepEvent::Confirmed { index });
            }
        }

        self.transition(StepEvent::Advanced);
        true
    }

    /// Execute steps from the cursor until the list is exhausted or a step
    /// fails. Returns true only if every step ended confirmed or skipped.
    pub async fn run_remaining(&mut self) -> bool {
        while self.current_step() < self.steps.len() && !self.is_error() {
            let index = self.current_step();
            if !self.execute_next(index).await {
                break;
            }
        }
        let state = self.snapshot();
        state.is_success() && !state.is_error()
    }

    fn fail(&self, index: usize, error: StepError) {
        self.transition(StepEvent::Failed { index, error });
    }

    fn transition(&self, event: StepEvent) {
        self.state.send_modify(|state| *state = state.apply(&event));
    }
}
