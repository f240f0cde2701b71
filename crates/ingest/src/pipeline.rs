use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use cadence_core::{BaselineTotals, BaselineVersion, ExternalId, ImportBatch, ImportBatchStatus};
use cadence_recalc::{RecalcError, RecalculationEngine};
use cadence_store::{HolidayCache, ProjectStore, TxContext};

use crate::ImportError;
use crate::merge::{MergeAction, MergeSummary, SmartMergeEngine};
use crate::rows::ParsedPlan;
use crate::sync::{sync_dependencies, sync_hierarchy, sync_resources};
use crate::validate::{ValidationReport, validate_plan};

/// Knobs for one import run, mirroring the upload query parameters.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Validate only; no writes of any kind.
    pub dry_run: bool,
    pub perform_ghost_check: bool,
    pub trigger_recalculation: bool,
    pub save_baseline_version: bool,
    pub file_name: String,
    /// SHA-256 of the uploaded content.
    pub file_hash: String,
    pub imported_by: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            perform_ghost_check: true,
            trigger_recalculation: true,
            save_baseline_version: false,
            file_name: String::new(),
            file_hash: String::new(),
            imported_by: "system:plan_import".to_owned(),
        }
    }
}

/// Overall outcome of an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Success,
    PartialSuccess,
    ValidationFailed,
    Failed,
}

/// The structured report returned to the caller.
#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub status: ImportStatus,
    pub batch_id: Option<Uuid>,
    pub program_id: Option<Uuid>,
    pub validation: ValidationReport,
    pub tasks_created: usize,
    pub tasks_updated: usize,
    pub tasks_preserved: usize,
    pub tasks_cancelled: usize,
    pub tasks_flagged: usize,
    pub tasks_skipped: usize,
    pub dependencies_synced: usize,
    pub resources_synced: usize,
    pub baseline_version: Option<i64>,
    pub critical_path: Vec<ExternalId>,
    pub project_end_date: Option<NaiveDate>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl ImportReport {
    fn from_validation(status: ImportStatus, validation: ValidationReport) -> Self {
        Self {
            status,
            batch_id: None,
            program_id: None,
            validation,
            tasks_created: 0,
            tasks_updated: 0,
            tasks_preserved: 0,
            tasks_cancelled: 0,
            tasks_flagged: 0,
            tasks_skipped: 0,
            dependencies_synced: 0,
            resources_synced: 0,
            baseline_version: None,
            critical_path: Vec::new(),
            project_end_date: None,
            warnings: Vec::new(),
            error: None,
        }
    }

    fn absorb_merge(&mut self, merge: &MergeSummary) {
        self.tasks_created = merge.tasks_created;
        self.tasks_updated = merge.tasks_updated;
        self.tasks_preserved = merge.tasks_preserved;
        self.tasks_cancelled = merge.tasks_cancelled;
        self.tasks_flagged = merge.tasks_flagged;
        self.tasks_skipped = merge
            .outcomes
            .iter()
            .filter(|o| o.action == MergeAction::Skipped)
            .count();
        self.warnings.extend(merge.warnings.iter().cloned());
    }

    fn summary_json(&self) -> serde_json::Value {
        serde_json::json!({
            "tasks_created": self.tasks_created,
            "tasks_updated": self.tasks_updated,
            "tasks_preserved": self.tasks_preserved,
            "tasks_cancelled": self.tasks_cancelled,
            "tasks_flagged": self.tasks_flagged,
            "tasks_skipped": self.tasks_skipped,
            "dependencies_synced": self.dependencies_synced,
            "resources_synced": self.resources_synced,
            "warning_count": self.warnings.len(),
        })
    }
}

/// The three-pass import pipeline: validate (pure), then execute inside a
/// transaction envelope, then recalculate.
pub struct ImportPipeline {
    store: Arc<dyn ProjectStore>,
    holidays: Arc<HolidayCache>,
    default_country: String,
}

impl ImportPipeline {
    #[must_use]
    pub fn new(
        store: Arc<dyn ProjectStore>,
        holidays: Arc<HolidayCache>,
        default_country: impl Into<String>,
    ) -> Self {
        Self {
            store,
            holidays,
            default_country: default_country.into(),
        }
    }

    /// Run an import. Validation problems and execute-phase failures are
    /// reported in the returned record, not as `Err`.
    pub async fn run(&self, plan: &ParsedPlan, options: &ImportOptions) -> ImportReport {
        let validation = validate_plan(plan);
        if !validation.is_valid() {
            info!(
                errors = validation.errors.len(),
                warnings = validation.warnings.len(),
                "import rejected by validation"
            );
            return ImportReport::from_validation(ImportStatus::ValidationFailed, validation);
        }
        if options.dry_run {
            return ImportReport::from_validation(ImportStatus::Success, validation);
        }

        let mut report = ImportReport::from_validation(ImportStatus::Success, validation);
        let mut tx = TxContext::new();

        match self.execute(plan, options, &mut tx, &mut report).await {
            Ok(()) => {
                if report.tasks_skipped > 0 {
                    report.status = ImportStatus::PartialSuccess;
                }
                info!(
                    batch_id = ?report.batch_id,
                    created = report.tasks_created,
                    updated = report.tasks_updated,
                    cancelled = report.tasks_cancelled,
                    "import completed"
                );
            }
            Err(e) => {
                error!(error = %e, "import execute phase failed; rolling back");
                let rollback = tx.rollback(&*self.store).await;
                if !rollback.is_clean() {
                    for failure in &rollback.failures {
                        report
                            .warnings
                            .push(format!("rollback step failed: {failure}"));
                    }
                }
                if let Some(batch_id) = report.batch_id
                    && let Ok(Some(mut batch)) = self.store.get_import_batch(batch_id).await
                {
                    batch.status = ImportBatchStatus::Failed;
                    batch.completed_at = Some(Utc::now());
                    batch.summary = Some(serde_json::json!({ "error": e.to_string() }));
                    let _ = self.store.update_import_batch(batch).await;
                }
                report.status = ImportStatus::Failed;
                report.error = Some(e.to_string());
            }
        }

        report
    }

    async fn execute(
        &self,
        plan: &ParsedPlan,
        options: &ImportOptions,
        tx: &mut TxContext,
        report: &mut ImportReport,
    ) -> Result<(), ImportError> {
        let store = &*self.store;

        // 1. Resources, 2. hierarchy.
        let resource_mapping = sync_resources(store, tx, &plan.resources).await?;
        report.resources_synced = resource_mapping.len();
        let (program, phase_mapping) = sync_hierarchy(store, tx, plan).await?;
        report.program_id = Some(program.id);

        // 3. Batch record; its id becomes the envelope's batch id.
        let batch = ImportBatch::new(
            program.id,
            options.file_name.clone(),
            options.file_hash.clone(),
            options.imported_by.clone(),
        );
        let batch = store.insert_import_batch(batch).await?;
        tx.set_batch_id(batch.id);
        report.batch_id = Some(batch.id);

        // 4. Baseline snapshot of the pre-merge state, when requested.
        let mut baseline_version_id = None;
        if options.save_baseline_version {
            let snapshot_items = store.list_work_items_by_program(program.id).await?;
            let totals = BaselineTotals {
                work_item_count: snapshot_items.len(),
                earliest_start: snapshot_items.iter().map(|i| i.planned_start).min(),
                latest_end: snapshot_items.iter().map(|i| i.planned_end).max(),
            };
            let version_number = store.next_baseline_version_number(program.id).await?;
            let version = BaselineVersion {
                id: Uuid::new_v4(),
                program_id: program.id,
                version_number,
                snapshot: serde_json::to_value(&snapshot_items)
                    .map_err(|e| ImportError::Other(e.to_string()))?,
                totals,
                reason: Some(format!("pre-import snapshot for {}", options.file_name)),
                created_by: options.imported_by.clone(),
                import_batch_id: Some(batch.id),
                created_at: Utc::now(),
            };
            let version = store.insert_baseline_version(version).await?;
            baseline_version_id = Some(version.id);
            report.baseline_version = Some(version.version_number);
        }

        // 5-7. Classify, bulk-apply, ghost-check.
        let mut engine = SmartMergeEngine::new(store, tx);
        let merge = engine
            .merge_all(
                &plan.work_items,
                &phase_mapping,
                &resource_mapping,
                program.id,
                options.perform_ghost_check,
            )
            .await?;
        report.absorb_merge(&merge);

        // 8. Dependencies.
        report.dependencies_synced = sync_dependencies(store, tx, plan, program.id).await?;

        // Close out the batch.
        let mut batch = batch;
        batch.status = ImportBatchStatus::Completed;
        batch.completed_at = Some(Utc::now());
        batch.summary = Some(report.summary_json());
        batch.baseline_version_id = baseline_version_id;
        store.update_import_batch(batch).await?;

        // Recalculate outside the envelope: the import itself is complete,
        // and recalculation is idempotent.
        if options.trigger_recalculation {
            let calendar = self.holidays.calendar_for(&self.default_country).await?;
            let engine = RecalculationEngine::new(Arc::clone(&self.store));
            match engine.recalculate_program(program.id, &calendar).await {
                Ok(recalc) => {
                    report.critical_path = recalc.critical_path_items;
                    report.project_end_date = recalc.project_end_date;
                    report.warnings.extend(recalc.warnings);
                }
                Err(RecalcError::DependencyCycle { path }) => {
                    // In-batch cycles are caught by validation; this one
                    // spans previously imported items.
                    warn!(path = path.join(" -> "), "recalculation skipped: cycle");
                    report.status = ImportStatus::PartialSuccess;
                    report.warnings.push(format!(
                        "recalculation skipped: dependency cycle {}",
                        path.join(" -> ")
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}
