//! # txflow
//!
//! Core of the hashpower marketplace transaction flow. Two independent pieces
//! live here:
//!
//! | Piece               | Entry point(s)                                        |
//! |---------------------|-------------------------------------------------------|
//! | Step sequencing     | [`Sequencer::new`], [`Sequencer::execute_next`], [`Sequencer::subscribe`] |
//! | Run state machine   | [`RunState::apply`], `is_success` / `is_error` / `is_pending` |
//! | Lifecycle progress  | [`simple_progress`], [`ContractStatus::compute`], [`LifecycleEntity::phase`] |
//!
//! ## Architecture
//!
//! The crate performs no I/O. Submitting a transaction, waiting for its
//! receipt, and reading the clock are capabilities injected by the host
//! through [`StepAction`], [`PostConfirmation`] and [`ReceiptWaiter`], so the
//! whole flow can be driven deterministically by fakes in tests.

mod errors;
mod lifecycle;
mod sequencer;
mod state;
mod step;
mod types;

#[cfg(test)]
mod test_lifecycle;

pub use errors::{ActionError, StepError, StepErrorKind};
pub use lifecycle::{
    simple_progress, sort_by_progress, ContractStatus, LifecycleEntity, LifecyclePhase, Progress,
};
pub use sequencer::Sequencer;
pub use state::{RunState, StepEvent, TxState, TxStatus};
pub use step::{PostConfirmation, ReceiptWaiter, StepAction, TransactionStep};
pub use types::{ActionResult, ParseHashError, Receipt, ReceiptStatus, TxHash};
