use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of an import batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportBatchStatus {
    Pending,
    Completed,
    ValidationFailed,
    Failed,
}

/// Bookkeeping record for one plan upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub id: Uuid,
    pub program_id: Uuid,
    pub file_name: String,
    /// SHA-256 of the uploaded content, for duplicate detection and audit.
    pub file_hash: String,
    pub imported_by: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ImportBatchStatus,
    /// Per-phase counters and warnings, shaped by the import report.
    pub summary: Option<serde_json::Value>,
    pub baseline_version_id: Option<Uuid>,
}

impl ImportBatch {
    #[must_use]
    pub fn new(
        program_id: Uuid,
        file_name: impl Into<String>,
        file_hash: impl Into<String>,
        imported_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            program_id,
            file_name: file_name.into(),
            file_hash: file_hash.into(),
            imported_by: imported_by.into(),
            started_at: Utc::now(),
            completed_at: None,
            status: ImportBatchStatus::Pending,
            summary: None,
            baseline_version_id: None,
        }
    }
}

/// Aggregates captured when a baseline snapshot is taken.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaselineTotals {
    pub work_item_count: usize,
    pub earliest_start: Option<NaiveDate>,
    pub latest_end: Option<NaiveDate>,
}

/// A numbered snapshot of a program's work items at import time.
///
/// `version_number` increases monotonically per program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineVersion {
    pub id: Uuid,
    pub program_id: Uuid,
    pub version_number: i64,
    /// Full work-item snapshot as stored rows.
    pub snapshot: serde_json::Value,
    pub totals: BaselineTotals,
    pub reason: Option<String>,
    pub created_by: String,
    pub import_batch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
