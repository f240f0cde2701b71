use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};
use uuid::Uuid;

use cadence_core::{
    AuditRecord, ChangeSource, ExternalId, WorkItem, WorkStatus,
};
use cadence_store::{ProjectStore, TxContext, TxOp};

use crate::ImportError;
use crate::rows::WorkItemRow;

/// Identity the merge writes into audit records.
const IMPORT_ACTOR: &str = "system:plan_import";

/// What happened to one work item during the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// Case A: no match in the store, inserted fresh.
    Created,
    /// Case B: matched and at least one baseline field changed.
    Updated,
    /// Matched with nothing to change, or completed ghost left alone.
    Preserved,
    /// Ghost with status NotStarted, soft-deleted.
    Cancelled,
    /// Ghost with work in progress, flagged for PM review.
    Flagged,
    /// Row could not be applied (e.g. unknown phase).
    Skipped,
}

/// Per-item merge result.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub external_id: ExternalId,
    pub action: MergeAction,
    pub work_item_id: Option<Uuid>,
    pub fields_updated: Vec<String>,
    pub warnings: Vec<String>,
}

/// Aggregate counters over a whole merge.
#[derive(Debug, Default)]
pub struct MergeSummary {
    pub tasks_created: usize,
    pub tasks_updated: usize,
    pub tasks_preserved: usize,
    pub tasks_cancelled: usize,
    pub tasks_flagged: usize,
    pub warnings: Vec<String>,
    pub outcomes: Vec<MergeOutcome>,
}

impl MergeSummary {
    fn push(&mut self, outcome: MergeOutcome) {
        match outcome.action {
            MergeAction::Created => self.tasks_created += 1,
            MergeAction::Updated => self.tasks_updated += 1,
            MergeAction::Preserved => self.tasks_preserved += 1,
            MergeAction::Cancelled => self.tasks_cancelled += 1,
            MergeAction::Flagged => self.tasks_flagged += 1,
            MergeAction::Skipped => {}
        }
        self.warnings.extend(outcome.warnings.iter().cloned());
        self.outcomes.push(outcome);
    }
}

/// The smart merge engine: reconciles incoming plan rows against live state.
///
/// New rows insert with forecast = baseline; existing rows update baseline
/// fields only, leaving forecast/actual/status untouched; rows absent from
/// the plan go through the status-aware ghost check. Writes are buffered
/// and applied in bulk, with one audit record per action and per changed
/// field, all attached to the envelope's batch id.
pub struct SmartMergeEngine<'a> {
    store: &'a dyn ProjectStore,
    tx: &'a TxContext,
    to_insert: Vec<WorkItem>,
    /// `(new_row, pre-mutation snapshot)` pairs.
    to_update: Vec<(WorkItem, WorkItem)>,
    audit: Vec<AuditRecord>,
}

impl<'a> SmartMergeEngine<'a> {
    pub fn new(store: &'a dyn ProjectStore, tx: &'a TxContext) -> Self {
        Self {
            store,
            tx,
            to_insert: Vec::new(),
            to_update: Vec::new(),
            audit: Vec::new(),
        }
    }

    /// Merge all rows for one program.
    ///
    /// `phase_mapping` resolves `(project_external_id, phase_external_id)`
    /// pairs; `resource_mapping` resolves resource external ids. Both come
    /// from the hierarchy/resource sync that ran earlier in the pipeline.
    pub async fn merge_all(
        &mut self,
        rows: &[WorkItemRow],
        phase_mapping: &HashMap<(ExternalId, ExternalId), Uuid>,
        resource_mapping: &HashMap<ExternalId, Uuid>,
        program_id: Uuid,
        perform_ghost_check: bool,
    ) -> Result<MergeSummary, ImportError> {
        let mut summary = MergeSummary::default();
        let mut plan_external_ids: HashSet<ExternalId> = HashSet::new();

        // Cache existing items per phase so classification is two store
        // round-trips total, not one per row.
        let mut existing: HashMap<(Uuid, ExternalId), WorkItem> = HashMap::new();
        for phase_id in phase_mapping.values() {
            for item in self.store.list_work_items_by_phase(*phase_id).await? {
                existing.insert((*phase_id, item.external_id.clone()), item);
            }
        }

        for row in rows {
            plan_external_ids.insert(row.external_id.clone());

            let phase_key = (row.project_external_id.clone(), row.phase_external_id.clone());
            let Some(&phase_id) = phase_mapping.get(&phase_key) else {
                summary.push(MergeOutcome {
                    external_id: row.external_id.clone(),
                    action: MergeAction::Skipped,
                    work_item_id: None,
                    fields_updated: Vec::new(),
                    warnings: vec![format!(
                        "skipped {}: phase {} not found",
                        row.external_id, row.phase_external_id
                    )],
                });
                continue;
            };

            let resource_id = match row.assigned_resource.as_ref() {
                Some(ext) => {
                    let resolved = resource_mapping.get(ext).copied();
                    if resolved.is_none() {
                        summary.warnings.push(format!(
                            "task {}: resource {ext} not found, assignment skipped",
                            row.external_id
                        ));
                    }
                    resolved
                }
                None => None,
            };

            match existing.get(&(phase_id, row.external_id.clone())) {
                None => self.prepare_insert(row, phase_id, resource_id),
                Some(current) => {
                    let outcome = self.prepare_update(row, current, resource_id);
                    summary.push(outcome);
                }
            }
        }

        self.flush(&mut summary).await?;

        if perform_ghost_check {
            self.ghost_check(program_id, &plan_external_ids, &mut summary)
                .await?;
        }

        Ok(summary)
    }

    /// Case A: stage a fresh insert with forecast = baseline.
    fn prepare_insert(&mut self, row: &WorkItemRow, phase_id: Uuid, resource_id: Option<Uuid>) {
        let mut item = WorkItem::new(
            phase_id,
            row.external_id.clone(),
            row.name.clone(),
            row.planned_start,
            row.planned_end,
        );
        item.planned_effort_hours = row.planned_effort_hours;
        item.allocation_percent = row.allocation_percent.unwrap_or(100);
        item.resource_id = resource_id;
        item.complexity = row.complexity.clone();
        item.revenue_impact = row.revenue_impact;
        item.strategic_importance = row.strategic_importance.clone();
        item.customer_impact = row.customer_impact.clone();
        item.is_critical_launch = row.is_critical_launch;
        item.feature_name = row.feature_name.clone();
        self.to_insert.push(item);
    }

    /// Case B: stage a whitelist-only baseline update, diffing per field.
    ///
    /// Forecast, actual, status, completion, and slack fields are never
    /// touched here — that is the whole point of the smart merge.
    fn prepare_update(
        &mut self,
        row: &WorkItemRow,
        current: &WorkItem,
        resource_id: Option<Uuid>,
    ) -> MergeOutcome {
        let mut updated = current.clone();
        let mut fields: Vec<String> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        macro_rules! diff {
            ($field:ident, $new:expr) => {
                if updated.$field != $new {
                    self.audit.push(
                        AuditRecord::new(
                            "work_item",
                            current.id,
                            "updated",
                            ChangeSource::PlanImport,
                            IMPORT_ACTOR,
                        )
                        .with_field(
                            stringify!($field),
                            Some(format!("{:?}", updated.$field)),
                            Some(format!("{:?}", $new)),
                        )
                        .with_reason("baseline updated from plan import"),
                    );
                    updated.$field = $new;
                    fields.push(stringify!($field).to_owned());
                }
            };
        }

        diff!(name, row.name.clone());
        diff!(planned_start, row.planned_start);
        diff!(planned_end, row.planned_end);
        diff!(planned_effort_hours, row.planned_effort_hours);
        diff!(allocation_percent, row.allocation_percent.unwrap_or(100));
        diff!(complexity, row.complexity.clone());
        diff!(revenue_impact, row.revenue_impact);
        diff!(strategic_importance, row.strategic_importance.clone());
        diff!(customer_impact, row.customer_impact.clone());
        diff!(is_critical_launch, row.is_critical_launch);
        diff!(feature_name, row.feature_name.clone());
        if let Some(resource_id) = resource_id {
            diff!(resource_id, Some(resource_id));
        }

        if row.planned_start > current.current_start {
            warnings.push(format!(
                "task {}: new baseline start ({}) is later than the current forecast ({}); recalculation will push current dates forward",
                row.external_id, row.planned_start, current.current_start
            ));
        }
        if row.planned_end > current.current_end {
            warnings.push(format!(
                "task {}: new baseline end ({}) is later than the current end ({}); recalculation will push current dates forward",
                row.external_id, row.planned_end, current.current_end
            ));
        }

        if fields.is_empty() {
            return MergeOutcome {
                external_id: row.external_id.clone(),
                action: MergeAction::Preserved,
                work_item_id: Some(current.id),
                fields_updated: fields,
                warnings,
            };
        }

        let outcome = MergeOutcome {
            external_id: row.external_id.clone(),
            action: MergeAction::Updated,
            work_item_id: Some(current.id),
            fields_updated: fields,
            warnings,
        };
        self.to_update.push((updated, current.clone()));
        outcome
    }

    /// Execute the buffered bulk operations and the audit flush.
    async fn flush(&mut self, summary: &mut MergeSummary) -> Result<(), ImportError> {
        if !self.to_insert.is_empty() {
            let inserted = self
                .store
                .insert_work_items(std::mem::take(&mut self.to_insert))
                .await?;
            for item in &inserted {
                self.tx.record(TxOp::WorkItemCreated(item.id));
                self.audit.push(
                    AuditRecord::new(
                        "work_item",
                        item.id,
                        "created",
                        ChangeSource::PlanImport,
                        IMPORT_ACTOR,
                    )
                    .with_reason("new task from plan import"),
                );
                summary.push(MergeOutcome {
                    external_id: item.external_id.clone(),
                    action: MergeAction::Created,
                    work_item_id: Some(item.id),
                    fields_updated: Vec::new(),
                    warnings: Vec::new(),
                });
            }
        }

        if !self.to_update.is_empty() {
            let staged = std::mem::take(&mut self.to_update);
            let mut rows = Vec::with_capacity(staged.len());
            for (updated, snapshot) in staged {
                self.tx.record(TxOp::WorkItemUpdated(snapshot));
                rows.push(updated);
            }
            self.store.update_work_items(rows).await?;
        }

        self.flush_audit().await
    }

    async fn flush_audit(&mut self) -> Result<(), ImportError> {
        if self.audit.is_empty() {
            return Ok(());
        }
        let batch_id = self.tx.batch_id();
        let mut records = std::mem::take(&mut self.audit);
        for record in &mut records {
            record.batch_id = Some(batch_id);
            self.tx.record(TxOp::AuditInserted(record.id));
        }
        debug!(count = records.len(), "writing merge audit records");
        self.store.insert_audit_records(records).await?;
        Ok(())
    }

    /// The ghost check: items present in the store but absent from the plan,
    /// classified by execution status.
    ///
    /// NotStarted cancels, InProgress/OnHold flags for PM review (the status
    /// itself is preserved — never auto-cancel work in motion), Completed is
    /// left untouched with a note.
    async fn ghost_check(
        &mut self,
        program_id: Uuid,
        plan_external_ids: &HashSet<ExternalId>,
        summary: &mut MergeSummary,
    ) -> Result<(), ImportError> {
        let stored = self.store.list_work_items_by_program(program_id).await?;

        let mut to_cancel: Vec<WorkItem> = Vec::new();
        let mut to_flag: Vec<WorkItem> = Vec::new();

        for item in stored {
            if item.status == WorkStatus::Cancelled
                || plan_external_ids.contains(&item.external_id)
            {
                continue;
            }

            match item.status {
                WorkStatus::NotStarted => to_cancel.push(item),
                WorkStatus::InProgress | WorkStatus::OnHold => to_flag.push(item),
                WorkStatus::Completed => {
                    summary.push(MergeOutcome {
                        external_id: item.external_id.clone(),
                        action: MergeAction::Preserved,
                        work_item_id: Some(item.id),
                        fields_updated: Vec::new(),
                        warnings: vec![format!(
                            "task {} was removed from the plan but preserved (status: Completed); historical data retained",
                            item.external_id
                        )],
                    });
                }
                WorkStatus::Cancelled => {}
            }
        }

        if !to_cancel.is_empty() {
            let mut rows = Vec::with_capacity(to_cancel.len());
            for item in to_cancel {
                let snapshot = item.clone();
                let mut cancelled = item;
                cancelled.status = WorkStatus::Cancelled;
                cancelled.cancellation_reason =
                    Some("removed from updated plan (was Not Started)".to_owned());

                self.tx.record(TxOp::WorkItemUpdated(snapshot));
                self.audit.push(
                    AuditRecord::new(
                        "work_item",
                        cancelled.id,
                        "cancelled",
                        ChangeSource::PlanImport,
                        IMPORT_ACTOR,
                    )
                    .with_field(
                        "status",
                        Some("NotStarted".to_owned()),
                        Some("Cancelled".to_owned()),
                    )
                    .with_reason("removed from updated plan"),
                );
                summary.push(MergeOutcome {
                    external_id: cancelled.external_id.clone(),
                    action: MergeAction::Cancelled,
                    work_item_id: Some(cancelled.id),
                    fields_updated: vec!["status".to_owned()],
                    warnings: vec![format!(
                        "task {} was removed from the plan and has been cancelled (was Not Started)",
                        cancelled.external_id
                    )],
                });
                rows.push(cancelled);
            }
            self.store.update_work_items(rows).await?;
        }

        if !to_flag.is_empty() {
            let mut rows = Vec::with_capacity(to_flag.len());
            for item in to_flag {
                let snapshot = item.clone();
                let mut flagged = item;
                let message = format!(
                    "task {} was removed from the plan but is {}% complete (status: {:?}); requires PM decision to cancel or continue",
                    flagged.external_id, flagged.completion_percent, flagged.status
                );
                flagged.flag_for_review = true;
                flagged.review_message = Some(message.clone());

                self.tx.record(TxOp::WorkItemUpdated(snapshot));
                self.audit.push(
                    AuditRecord::new(
                        "work_item",
                        flagged.id,
                        "flagged",
                        ChangeSource::PlanImport,
                        IMPORT_ACTOR,
                    )
                    .with_field("flag_for_review", Some("false".to_owned()), Some("true".to_owned()))
                    .with_reason(message.clone()),
                );
                summary.push(MergeOutcome {
                    external_id: flagged.external_id.clone(),
                    action: MergeAction::Flagged,
                    work_item_id: Some(flagged.id),
                    fields_updated: vec!["flag_for_review".to_owned()],
                    warnings: vec![format!("requires review: {message}")],
                });
                rows.push(flagged);
            }
            warn!(count = rows.len(), "flagged in-progress ghosts for review");
            self.store.update_work_items(rows).await?;
        }

        self.flush_audit().await
    }
}
