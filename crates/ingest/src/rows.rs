use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use cadence_core::{DependencyKind, ExternalId};

/// A fully parsed plan as handed over by the external workbook reader.
///
/// The reader owns cell-level concerns (sheet layout, date coercion, header
/// detection); everything here is already normalized. Each import describes
/// exactly one program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedPlan {
    pub program: ProgramRow,
    #[serde(default)]
    pub resources: Vec<ResourceRow>,
    #[serde(default)]
    pub work_items: Vec<WorkItemRow>,
    #[serde(default)]
    pub dependencies: Vec<DependencyRow>,
}

/// Program header of the uploaded plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramRow {
    pub external_id: ExternalId,
    pub name: String,
}

/// One resource row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRow {
    /// 1-based row number in the source sheet, for error reporting.
    #[serde(default)]
    pub row_num: usize,
    pub external_id: ExternalId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub notification_email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub backup_external_id: Option<ExternalId>,
    #[serde(default)]
    pub manager_external_id: Option<ExternalId>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub max_utilization: Option<i32>,
    #[serde(default)]
    pub chat_user_id: Option<String>,
}

/// One work item row, carrying its position in the hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItemRow {
    #[serde(default)]
    pub row_num: usize,
    pub external_id: ExternalId,
    pub name: String,
    pub project_external_id: ExternalId,
    #[serde(default)]
    pub project_name: Option<String>,
    pub phase_external_id: ExternalId,
    #[serde(default)]
    pub phase_name: Option<String>,
    #[serde(default)]
    pub phase_sequence: Option<i32>,
    pub planned_start: NaiveDate,
    pub planned_end: NaiveDate,
    #[serde(default)]
    pub planned_effort_hours: Option<f64>,
    #[serde(default)]
    pub allocation_percent: Option<i32>,
    /// External id of the assigned resource.
    #[serde(default)]
    pub assigned_resource: Option<ExternalId>,
    #[serde(default)]
    pub complexity: Option<String>,
    #[serde(default)]
    pub revenue_impact: Option<f64>,
    #[serde(default)]
    pub strategic_importance: Option<String>,
    #[serde(default)]
    pub customer_impact: Option<String>,
    #[serde(default)]
    pub is_critical_launch: bool,
    #[serde(default)]
    pub feature_name: Option<String>,
}

/// One dependency row, referencing work items by external id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyRow {
    #[serde(default)]
    pub row_num: usize,
    pub successor_external_id: ExternalId,
    pub predecessor_external_id: ExternalId,
    #[serde(default)]
    pub kind: DependencyKind,
    #[serde(default)]
    pub lag_days: i64,
}
