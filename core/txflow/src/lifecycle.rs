//! # Lifecycle projection
//!
//! Pure functions that place a hashrate contract (or a validator history
//! record) on its timeline given the current time. All times are Unix seconds;
//! the caller supplies `now` on every call, typically from the chain clock.
//!
//! Two projections exist side by side:
//!
//! * [`simple_progress`] — fraction of the nominal term elapsed, with
//!   sentinels for archived (`-2`) and finished (`-1`) contracts.
//! * [`ContractStatus::compute`] — running / closed-early / success flags and
//!   a scalar that sorts closed-early contracts below running ones and running
//!   ones below completed ones.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEntity {
    /// Creation time for listings, purchase time for purchased contracts.
    pub creation_time: i64,
    /// Nominal term in seconds.
    pub nominal_length: u64,
    /// Set once the contract has ended or has a scheduled end.
    #[serde(default)]
    pub actual_end_time: Option<i64>,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Result of [`simple_progress`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    Archived,
    Finished,
    /// Elapsed fraction of the term. Negative for contracts dated in the
    /// future; deliberately not clamped so clock skew stays visible.
    Running(f64),
}

impl Progress {
    pub const ARCHIVED: f64 = -2.0;
    pub const FINISHED: f64 = -1.0;

    pub fn as_sentinel(&self) -> f64 {
        match self {
            Self::Archived => Self::ARCHIVED,
            Self::Finished => Self::FINISHED,
            Self::Running(p) => *p,
        }
    }
}

/// Elapsed fraction of an entity's nominal term at `now`.
pub fn simple_progress(entity: &LifecycleEntity, now: i64) -> Progress {
    if entity.is_deleted {
        return Progress::Archived;
    }
    if entity.nominal_length == 0 {
        return Progress::Finished;
    }

    let progress = elapsed_fraction(entity.creation_time, now, entity.nominal_length);
    if progress > 1.0 {
        Progress::Finished
    } else {
        Progress::Running(progress)
    }
}

/// Sort entities by their [`simple_progress`] sentinel, ascending.
pub fn sort_by_progress(entities: &mut [LifecycleEntity], now: i64) {
    entities.sort_by(|a, b| {
        simple_progress(a, now)
            .as_sentinel()
            .total_cmp(&simple_progress(b, now).as_sentinel())
    });
}

/// Tri-state view of a purchased contract with early closure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContractStatus {
    pub is_running: bool,
    /// Ended, or is scheduled to end, before the nominal term. Computed
    /// independently of `is_running`; both can be true at once.
    pub is_closed_early: bool,
    pub progress: f64,
    pub sort_value: f64,
    pub is_success: bool,
}

impl ContractStatus {
    pub fn compute(purchase_time: i64, end_time: i64, length: u64, now: i64) -> Self {
        let expected_end_time = purchase_time.saturating_add_unsigned(length);
        let is_running = end_time > now;
        let is_closed_early = expected_end_time > end_time;

        let mut progress = 1.0;
        let mut sort_value = 1.0;

        if is_running {
            progress = elapsed_fraction(purchase_time, now, length);
            sort_value = progress;
        }

        if is_closed_early {
            progress = elapsed_fraction(purchase_time, end_time, length);
            sort_value = progress - 1.0;
        }

        // Exact: only the untouched default (ended on time, not closed early)
        // counts as success.
        let is_success = progress == 1.0;

        Self {
            is_running,
            is_closed_early,
            progress,
            sort_value,
            is_success,
        }
    }
}

// A zero-length term is complete as soon as it starts. Timestamps span the
// full i64 range, so the difference is taken in f64.
fn elapsed_fraction(from: i64, to: i64, length: u64) -> f64 {
    if length == 0 {
        return 1.0;
    }
    (to as f64 - from as f64) / length as f64
}

/// Temporal phase of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Archived,
    Future,
    Running,
    ClosedEarly,
    Finished,
}

impl LifecycleEntity {
    pub fn expected_end_time(&self) -> i64 {
        self.creation_time.saturating_add_unsigned(self.nominal_length)
    }

    /// The actual end when known, the nominal end otherwise.
    pub fn effective_end_time(&self) -> i64 {
        self.actual_end_time
            .unwrap_or_else(|| self.expected_end_time())
    }

    pub fn progress(&self, now: i64) -> Progress {
        simple_progress(self, now)
    }

    pub fn status(&self, now: i64) -> ContractStatus {
        ContractStatus::compute(
            self.creation_time,
            self.effective_end_time(),
            self.nominal_length,
            now,
        )
    }

    pub fn phase(&self, now: i64) -> LifecyclePhase {
        if self.is_deleted {
            return LifecyclePhase::Archived;
        }
        if now < self.creation_time {
            return LifecyclePhase::Future;
        }
        let end = self.effective_end_time();
        if end > now {
            LifecyclePhase::Running
        } else if end < self.expected_end_time() {
            LifecyclePhase::ClosedEarly
        } else {
            LifecyclePhase::Finished
        }
    }
}
