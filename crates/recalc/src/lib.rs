//! Recalculation engine: cycle detection, forward/backward critical-path
//! passes, float assignment, and dependency date propagation.
//!
//! The pass structure follows classic CPM. Schedule positions (ES/EF/LS/LF,
//! float) step in *business days* so that a Friday-to-Monday handoff carries
//! zero float; propagation onto `current_start`/`current_end` uses the
//! calendar-day offsets of the dependency kinds and is monotonic forward
//! only — dates are extended, never pulled in automatically.

mod cpm;
mod engine;
mod propagate;

pub use cpm::{ScheduleEntry, compute_schedule, detect_cycle};
pub use engine::{RecalcResult, RecalculationEngine};
pub use propagate::{propagate_dates, resolve_baseline_conflicts};

use thiserror::Error;

/// Errors from the recalculation engine.
#[derive(Debug, Error)]
pub enum RecalcError {
    /// The dependency graph contains a cycle; carries the first cycle found
    /// as external ids.
    #[error("dependency cycle detected: {}", .path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    #[error("store error: {0}")]
    Store(#[from] cadence_store::StoreError),
}
