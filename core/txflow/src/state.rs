//! # Run state
//!
//! Per-step status records and the pure transition function that drives them.
//!
//! ## Step status as a finite-state machine
//!
//! ```text
//! Pending ──► Sending ──► Sent ──► Confirmed
//!                │          ├────► Skipped
//!                │          └────► Failed
//!                └───────────────► Failed
//! ```
//!
//! A `Failed` step may be sent again (`Failed ──► Sending`) when the caller
//! retries it. Overall success and failure are derived from the step list
//! on demand and never stored.

use serde::Serialize;

use crate::errors::StepError;
use crate::types::TxHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Sending,
    Sent,
    Confirmed,
    Failed,
    Skipped,
}

impl TxStatus {
    /// `Sending` or `Sent`: the step's action or receipt wait is outstanding.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Sending | Self::Sent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxState {
    pub status: TxStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
}

impl TxState {
    pub fn pending() -> Self {
        Self {
            status: TxStatus::Pending,
            error: None,
            tx_hash: None,
        }
    }
}

/// A transition reported by the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEvent {
    Sending { index: usize },
    Sent { index: usize, tx_hash: Option<TxHash> },
    Confirmed { index: usize },
    Failed { index: usize, error: StepError },
    Skipped { index: usize },
    /// Move the cursor forward by one.
    Advanced,
}

/// Status of every step in one run, plus the cursor of the next step to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunState {
    pub steps: Vec<TxState>,
    pub current_step: usize,
}

impl RunState {
    /// All `step_count` steps pending, cursor at zero.
    pub fn new(step_count: usize) -> Self {
        Self {
            steps: vec![TxState::pending(); step_count],
            current_step: 0,
        }
    }

    /// Return the state that results from applying `event`.
    ///
    /// Events naming an index outside the run are ignored.
    pub fn apply(&self, event: &StepEvent) -> RunState {
        let mut next = self.clone();
        match event {
            StepEvent::Sending { index } => {
                if let Some(step) = next.steps.get_mut(*index) {
                    step.status = TxStatus::Sending;
                    step.error = None;
                    step.tx_hash = None;
                }
            }
            StepEvent::Sent { index, tx_hash } => {
                if let Some(step) = next.steps.get_mut(*index) {
                    step.status = TxStatus::Sent;
                    if tx_hash.is_some() {
                        step.tx_hash = *tx_hash;
                    }
                }
            }
            StepEvent::Confirmed { index } => {
                if let Some(step) = next.steps.get_mut(*index) {
                    step.status = TxStatus::Confirmed;
                }
            }
            StepEvent::Failed { index, error } => {
                if let Some(step) = next.steps.get_mut(*index) {
                    step.status = TxStatus::Failed;
                    step.error = Some(error.clone());
                }
            }
            StepEvent::Skipped { index } => {
                if let Some(step) = next.steps.get_mut(*index) {
                    step.status = TxStatus::Skipped;
                }
            }
            StepEvent::Advanced => next.current_step += 1,
        }
        next
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// True if any step has failed.
    pub fn is_error(&self) -> bool {
        self.steps.iter().any(|s| s.status == TxStatus::Failed)
    }

    /// True if the last step is confirmed or skipped.
    ///
    /// Only the final step is consulted: a failed earlier step followed by a
    /// confirmed final step reports success *and* error at the same time.
    /// Consumers that need "every step succeeded" must also check
    /// [`RunState::is_error`].
    pub fn is_success(&self) -> bool {
        matches!(
            self.steps.last().map(|s| s.status),
            Some(TxStatus::Confirmed | TxStatus::Skipped)
        )
    }

    pub fn is_pending(&self) -> bool {
        !self.is_success() && !self.is_error()
    }

    /// Indices of steps that are `Sending` or `Sent`.
    pub fn in_flight(&self) -> Vec<usize> {
        self.steps
            .iter()
            .enumerate()
            .filter(|(_, s)| s.status.is_in_flight())
            .map(|(i, _)| i)
            .collect()
    }
}
