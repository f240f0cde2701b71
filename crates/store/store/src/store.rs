use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use cadence_core::{
    Alert, AuditRecord, BaselineVersion, Dependency, EscalationPolicy, ExternalId, Holiday,
    ImportBatch, Phase, Program, Project, QueuedSend, Resource, ResponseToken, WorkItem,
    WorkItemResponse,
};

use crate::error::StoreError;

/// Row-level access to the tabular store.
///
/// The backend exposes per-table CRUD but no multi-statement transactions;
/// multi-step writes are wrapped in a [`TxContext`](crate::tx::TxContext)
/// that records compensating actions. Implementations must be `Send + Sync`
/// and enforce the unique constraints documented on each method.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    // -- programs -----------------------------------------------------------

    async fn insert_program(&self, program: Program) -> Result<Program, StoreError>;
    async fn update_program(&self, program: Program) -> Result<(), StoreError>;
    async fn get_program(&self, id: Uuid) -> Result<Option<Program>, StoreError>;
    async fn find_program_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<Program>, StoreError>;
    async fn delete_program(&self, id: Uuid) -> Result<bool, StoreError>;

    // -- projects -----------------------------------------------------------

    /// Unique per `(program_id, external_id)`.
    async fn insert_project(&self, project: Project) -> Result<Project, StoreError>;
    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, StoreError>;
    async fn find_project(
        &self,
        program_id: Uuid,
        external_id: &ExternalId,
    ) -> Result<Option<Project>, StoreError>;
    async fn delete_project(&self, id: Uuid) -> Result<bool, StoreError>;

    // -- phases -------------------------------------------------------------

    /// Unique per `(project_id, external_id)`.
    async fn insert_phase(&self, phase: Phase) -> Result<Phase, StoreError>;
    async fn get_phase(&self, id: Uuid) -> Result<Option<Phase>, StoreError>;
    async fn find_phase(
        &self,
        project_id: Uuid,
        external_id: &ExternalId,
    ) -> Result<Option<Phase>, StoreError>;
    async fn list_phases_by_program(&self, program_id: Uuid) -> Result<Vec<Phase>, StoreError>;
    async fn delete_phase(&self, id: Uuid) -> Result<bool, StoreError>;

    // -- resources ----------------------------------------------------------

    async fn insert_resource(&self, resource: Resource) -> Result<Resource, StoreError>;
    async fn update_resource(&self, resource: Resource) -> Result<(), StoreError>;
    async fn get_resource(&self, id: Uuid) -> Result<Option<Resource>, StoreError>;
    async fn find_resource_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<Resource>, StoreError>;

    // -- work items ---------------------------------------------------------

    /// Bulk insert; each row is unique per `(phase_id, external_id)`.
    async fn insert_work_items(&self, items: Vec<WorkItem>) -> Result<Vec<WorkItem>, StoreError>;
    /// Bulk whole-row update.
    async fn update_work_items(&self, items: Vec<WorkItem>) -> Result<(), StoreError>;
    async fn update_work_item(&self, item: WorkItem) -> Result<(), StoreError>;
    async fn get_work_item(&self, id: Uuid) -> Result<Option<WorkItem>, StoreError>;
    async fn list_work_items_by_phase(&self, phase_id: Uuid) -> Result<Vec<WorkItem>, StoreError>;
    async fn list_work_items_by_program(
        &self,
        program_id: Uuid,
    ) -> Result<Vec<WorkItem>, StoreError>;
    async fn list_work_items_by_resource(
        &self,
        resource_id: Uuid,
    ) -> Result<Vec<WorkItem>, StoreError>;
    /// Items with `current_end` inside `[from, to]`, for the deadline scan.
    async fn list_work_items_due_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<WorkItem>, StoreError>;
    async fn delete_work_item(&self, id: Uuid) -> Result<bool, StoreError>;

    // -- dependencies -------------------------------------------------------

    /// Insert-or-replace keyed on `(successor_id, predecessor_id)`.
    async fn upsert_dependency(&self, dependency: Dependency) -> Result<Dependency, StoreError>;
    async fn list_dependencies_by_program(
        &self,
        program_id: Uuid,
    ) -> Result<Vec<Dependency>, StoreError>;
    /// Edges whose predecessor is `work_item_id`.
    async fn list_successor_edges(
        &self,
        work_item_id: Uuid,
    ) -> Result<Vec<Dependency>, StoreError>;
    async fn delete_dependency(&self, id: Uuid) -> Result<bool, StoreError>;

    // -- alerts -------------------------------------------------------------

    /// Fails with [`StoreError::UniqueViolation`] when a live alert already
    /// exists for `(work_item_id, deadline_date, alert_type,
    /// escalation_level)`.
    async fn insert_alert(&self, alert: Alert) -> Result<Alert, StoreError>;
    async fn update_alert(&self, alert: Alert) -> Result<(), StoreError>;
    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>, StoreError>;
    /// Most recent non-expired, non-cancelled alert for the pair.
    async fn find_live_alert(
        &self,
        work_item_id: Uuid,
        deadline: NaiveDate,
    ) -> Result<Option<Alert>, StoreError>;
    /// Alerts awaiting a response whose escalation timeout has passed.
    async fn list_alerts_past_timeout(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, StoreError>;
    /// Live alerts whose `expires_at` has passed.
    async fn list_alerts_past_expiry(&self, now: DateTime<Utc>) -> Result<Vec<Alert>, StoreError>;
    /// Sent-but-unanswered alerts sent before `sent_before`.
    async fn list_alerts_awaiting_response(
        &self,
        sent_before: DateTime<Utc>,
    ) -> Result<Vec<Alert>, StoreError>;
    /// The alert and every alert escalated from it, ordered by level.
    async fn list_alert_chain(&self, alert_id: Uuid) -> Result<Vec<Alert>, StoreError>;
    async fn delete_alert(&self, id: Uuid) -> Result<bool, StoreError>;

    // -- response tokens ----------------------------------------------------

    /// `token_hash` is unique.
    async fn insert_response_token(
        &self,
        token: ResponseToken,
    ) -> Result<ResponseToken, StoreError>;
    async fn update_response_token(&self, token: ResponseToken) -> Result<(), StoreError>;
    async fn find_token_by_hash(&self, token_hash: &str)
    -> Result<Option<ResponseToken>, StoreError>;
    async fn delete_response_token(&self, id: Uuid) -> Result<bool, StoreError>;
    /// Remove revoked tokens older than `cutoff`; returns how many.
    async fn purge_revoked_tokens_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    // -- work item responses ------------------------------------------------

    /// `idempotency_key` is unique when present.
    async fn insert_response(
        &self,
        response: WorkItemResponse,
    ) -> Result<WorkItemResponse, StoreError>;
    async fn update_response(&self, response: WorkItemResponse) -> Result<(), StoreError>;
    async fn get_response(&self, id: Uuid) -> Result<Option<WorkItemResponse>, StoreError>;
    async fn find_response_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<WorkItemResponse>, StoreError>;
    /// The highest-version response for the work item, if any.
    async fn latest_response_for_work_item(
        &self,
        work_item_id: Uuid,
    ) -> Result<Option<WorkItemResponse>, StoreError>;
    async fn list_pending_approvals(&self) -> Result<Vec<WorkItemResponse>, StoreError>;
    async fn delete_response(&self, id: Uuid) -> Result<bool, StoreError>;

    // -- audit --------------------------------------------------------------

    /// Append-only in normal operation; `delete_audit_record` exists solely
    /// for the transaction envelope's compensating rollback.
    async fn insert_audit_records(&self, records: Vec<AuditRecord>) -> Result<(), StoreError>;
    async fn delete_audit_record(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn list_audit_records_for_batch(
        &self,
        batch_id: Uuid,
    ) -> Result<Vec<AuditRecord>, StoreError>;

    // -- import batches / baseline versions ---------------------------------

    async fn insert_import_batch(&self, batch: ImportBatch) -> Result<ImportBatch, StoreError>;
    async fn update_import_batch(&self, batch: ImportBatch) -> Result<(), StoreError>;
    async fn get_import_batch(&self, id: Uuid) -> Result<Option<ImportBatch>, StoreError>;
    async fn list_import_batches(&self, program_id: Uuid)
    -> Result<Vec<ImportBatch>, StoreError>;

    async fn insert_baseline_version(
        &self,
        version: BaselineVersion,
    ) -> Result<BaselineVersion, StoreError>;
    async fn list_baseline_versions(
        &self,
        program_id: Uuid,
    ) -> Result<Vec<BaselineVersion>, StoreError>;
    /// `max(version_number) + 1` for the program, starting at 1.
    async fn next_baseline_version_number(&self, program_id: Uuid) -> Result<i64, StoreError>;

    // -- holidays -----------------------------------------------------------

    /// Holidays for the country plus universal (null-country) entries.
    async fn list_holidays(&self, country: Option<&str>) -> Result<Vec<Holiday>, StoreError>;
    async fn insert_holiday(&self, holiday: Holiday) -> Result<Holiday, StoreError>;
    async fn delete_holiday(&self, id: Uuid) -> Result<bool, StoreError>;

    // -- outbound queue -----------------------------------------------------

    /// Returns `false` (without inserting) when the idempotency key already
    /// exists — the row-level guard against double sends.
    async fn enqueue_send(&self, entry: QueuedSend) -> Result<bool, StoreError>;
    async fn list_due_queue_entries(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueuedSend>, StoreError>;
    async fn mark_queue_entry_processed(
        &self,
        id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn delete_queue_entry(&self, id: Uuid) -> Result<bool, StoreError>;

    // -- escalation policies / org settings ---------------------------------

    /// Program-specific policy, falling back to the global row, falling back
    /// to the built-in defaults.
    async fn escalation_policy(
        &self,
        program_id: Option<Uuid>,
    ) -> Result<EscalationPolicy, StoreError>;
    async fn set_escalation_policy(
        &self,
        program_id: Option<Uuid>,
        policy: EscalationPolicy,
    ) -> Result<(), StoreError>;

    async fn get_org_setting(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set_org_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;

    // -- derived lookups ----------------------------------------------------

    /// Resolve the program a work item belongs to by walking
    /// work item → phase → project.
    async fn program_id_for_work_item(
        &self,
        work_item_id: Uuid,
    ) -> Result<Option<Uuid>, StoreError> {
        let Some(item) = self.get_work_item(work_item_id).await? else {
            return Ok(None);
        };
        let Some(phase) = self.get_phase(item.phase_id).await? else {
            return Ok(None);
        };
        let Some(project) = self.get_project(phase.project_id).await? else {
            return Ok(None);
        };
        Ok(Some(project.program_id))
    }
}
