//! Registry of in-progress step runs.
//!
//! Every run owns an isolated [`Sequencer`]. Execution goes through the
//! per-run mutex so at most one step of a run is ever executing; snapshots are
//! read from the run's watch channel and never wait on an executing step.
//!
//! Execution runs on its own task. A caller that goes away (client disconnect,
//! request timeout) stops waiting for the result but does not cancel a step
//! whose action has already been submitted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::info;
use txflow::{ReceiptWaiter, RunState, Sequencer, TransactionStep, TxState};

use crate::errors::{GatewayError, Result};

#[derive(Clone)]
pub struct RunHandle {
    pub id: u64,
    pub labels: Arc<[String]>,
    pub sequencer: Arc<Mutex<Sequencer>>,
    pub status: watch::Receiver<RunState>,
}

impl RunHandle {
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot::new(self.id, &self.labels, &self.status.borrow())
    }
}

#[derive(Debug, Serialize)]
pub struct StepView {
    pub label: String,
    #[serde(flatten)]
    pub state: TxState,
}

#[derive(Debug, Serialize)]
pub struct RunSnapshot {
    pub id: u64,
    pub steps: Vec<StepView>,
    pub current_step: usize,
    pub is_success: bool,
    pub is_error: bool,
    pub is_pending: bool,
}

impl RunSnapshot {
    fn new(id: u64, labels: &[String], state: &RunState) -> Self {
        Self {
            id,
            steps: labels
                .iter()
                .zip(&state.steps)
                .map(|(label, state)| StepView {
                    label: label.clone(),
                    state: state.clone(),
                })
                .collect(),
            current_step: state.current_step,
            is_success: state.is_success(),
            is_error: state.is_error(),
            is_pending: state.is_pending(),
        }
    }
}

#[derive(Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<u64, RunHandle>>,
    next_id: AtomicU64,
}

impl RunRegistry {
    /// Initialize a new run and return a handle to it.
    pub async fn create(
        &self,
        steps: Vec<TransactionStep>,
        receipts: Arc<dyn ReceiptWaiter>,
    ) -> RunHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let labels: Arc<[String]> = steps.iter().map(|s| s.label.clone()).collect();
        let sequencer = Sequencer::new(steps, receipts);
        let handle = RunHandle {
            id,
            labels,
            status: sequencer.subscribe(),
            sequencer: Arc::new(Mutex::new(sequencer)),
        };

        self.runs.write().await.insert(id, handle.clone());
        info!("Run {id} created with {} steps", handle.labels.len());
        handle
    }

    pub async fn get(&self, id: u64) -> Result<RunHandle> {
        self.runs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(GatewayError::RunNotFound(id))
    }

    pub async fn remove(&self, id: u64) -> Result<()> {
        self.runs
            .write()
            .await
            .remove(&id)
            .map(|_| info!("Run {id} discarded"))
            .ok_or(GatewayError::RunNotFound(id))
    }

    /// Execute one step of run `id`.
    ///
    /// Returns whether the step completed without an exceptional failure,
    /// plus the run snapshot afterwards.
    pub async fn execute_step(&self, id: u64, index: usize) -> Result<(bool, RunSnapshot)> {
        let handle = self.get(id).await?;
        if index >= handle.labels.len() {
            return Err(GatewayError::InvalidInput(format!(
                "run {id} has no step {index}"
            )));
        }
        let sequencer = handle.sequencer.clone();
        let ok = tokio::spawn(async move { sequencer.lock().await.execute_next(index).await })
            .await
            .map_err(|e| GatewayError::Execution(format!("run {id} step {index}: {e}")))?;
        Ok((ok, handle.snapshot()))
    }

    /// Execute every remaining step of run `id`, stopping at the first failure.
    pub async fn execute_remaining(&self, id: u64) -> Result<(bool, RunSnapshot)> {
        let handle = self.get(id).await?;
        let sequencer = handle.sequencer.clone();
        let ok = tokio::spawn(async move { sequencer.lock().await.run_remaining().await })
            .await
            .map_err(|e| GatewayError::Execution(format!("run {id}: {e}")))?;
        Ok((ok, handle.snapshot()))
    }
}
