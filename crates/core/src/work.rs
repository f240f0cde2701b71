use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ExternalId;

/// Execution status of a work item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    OnHold,
    Cancelled,
}

impl WorkStatus {
    /// Terminal statuses are never revived by imports or cascades.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Kind of a dependency edge between two work items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyKind {
    /// Finish-to-start: successor starts after the predecessor finishes.
    #[default]
    FS,
    /// Start-to-start: successor starts when the predecessor starts.
    SS,
    /// Finish-to-finish: successor finishes when the predecessor finishes.
    FF,
    /// Start-to-finish: successor finishes when the predecessor starts.
    SF,
}

/// A single schedulable unit of work.
///
/// Three families of dates coexist: `planned_*` is the baseline declared by
/// the plan owner (changed only by import), `current_*` is the live forecast
/// (moved by responses and recalculation), and `actual_*` records what really
/// happened (never overwritten by import).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    pub external_id: ExternalId,
    pub phase_id: Uuid,
    pub name: String,

    // Baseline (the plan)
    pub planned_start: NaiveDate,
    pub planned_end: NaiveDate,
    pub planned_effort_hours: Option<f64>,
    pub allocation_percent: i32,

    // Forecast (the projection)
    pub current_start: NaiveDate,
    pub current_end: NaiveDate,

    // Truth (what happened)
    pub actual_start: Option<NaiveDate>,
    pub actual_end: Option<NaiveDate>,
    pub status: WorkStatus,
    pub completion_percent: i32,

    pub resource_id: Option<Uuid>,

    // Recalculation outputs
    pub is_critical_path: bool,
    pub slack_days: Option<i64>,

    // Review / cancellation bookkeeping
    pub flag_for_review: bool,
    pub review_message: Option<String>,
    pub cancellation_reason: Option<String>,

    // Risk & importance metadata carried from the plan
    pub complexity: Option<String>,
    pub revenue_impact: Option<f64>,
    pub strategic_importance: Option<String>,
    pub customer_impact: Option<String>,
    pub is_critical_launch: bool,
    pub feature_name: Option<String>,
}

impl WorkItem {
    /// Initial state for a freshly imported item: the forecast equals the
    /// baseline and nothing has started yet.
    #[must_use]
    pub fn new(
        phase_id: Uuid,
        external_id: ExternalId,
        name: impl Into<String>,
        planned_start: NaiveDate,
        planned_end: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id,
            phase_id,
            name: name.into(),
            planned_start,
            planned_end,
            planned_effort_hours: None,
            allocation_percent: 100,
            current_start: planned_start,
            current_end: planned_end,
            actual_start: None,
            actual_end: None,
            status: WorkStatus::NotStarted,
            completion_percent: 0,
            resource_id: None,
            is_critical_path: false,
            slack_days: None,
            flag_for_review: false,
            review_message: None,
            cancellation_reason: None,
            complexity: None,
            revenue_impact: None,
            strategic_importance: None,
            customer_impact: None,
            is_critical_launch: false,
            feature_name: None,
        }
    }

    /// Current duration in calendar days (end minus start).
    #[must_use]
    pub fn current_duration_days(&self) -> i64 {
        (self.current_end - self.current_start).num_days()
    }
}

/// A dependency edge: the successor is constrained by the predecessor.
///
/// Unique per `(successor_id, predecessor_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub id: Uuid,
    pub successor_id: Uuid,
    pub predecessor_id: Uuid,
    pub kind: DependencyKind,
    pub lag_days: i64,
}

impl Dependency {
    #[must_use]
    pub fn new(predecessor_id: Uuid, successor_id: Uuid, kind: DependencyKind, lag_days: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            successor_id,
            predecessor_id,
            kind,
            lag_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn new_item_mirrors_baseline_into_forecast() {
        let item = WorkItem::new(
            Uuid::new_v4(),
            ExternalId::from("T-1"),
            "Build",
            d("2024-02-05"),
            d("2024-02-09"),
        );
        assert_eq!(item.current_start, item.planned_start);
        assert_eq!(item.current_end, item.planned_end);
        assert_eq!(item.status, WorkStatus::NotStarted);
        assert_eq!(item.completion_percent, 0);
        assert_eq!(item.current_duration_days(), 4);
    }

    #[test]
    fn status_serde_uses_variant_names() {
        let json = serde_json::to_string(&WorkStatus::InProgress).unwrap();
        assert_eq!(json, "\"InProgress\"");
        assert!(WorkStatus::Cancelled.is_terminal());
        assert!(!WorkStatus::OnHold.is_terminal());
    }
}
