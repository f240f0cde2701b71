use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use cadence_core::{
    Alert, AuditRecord, BaselineVersion, Dependency, EscalationPolicy, ExternalId, Holiday,
    ImportBatch, Phase, Program, Project, QueuedSend, Resource, ResponseToken, WorkItem,
    WorkItemResponse,
};
use cadence_store::{ProjectStore, StoreError};

/// In-memory store with one `DashMap` per table.
///
/// Lookups that would be served by secondary indexes in a real backend are
/// linear scans here; tables stay small enough in tests and single-process
/// use for that to be fine.
#[derive(Default)]
pub struct MemoryStore {
    programs: DashMap<Uuid, Program>,
    projects: DashMap<Uuid, Project>,
    phases: DashMap<Uuid, Phase>,
    resources: DashMap<Uuid, Resource>,
    work_items: DashMap<Uuid, WorkItem>,
    dependencies: DashMap<Uuid, Dependency>,
    alerts: DashMap<Uuid, Alert>,
    tokens: DashMap<Uuid, ResponseToken>,
    responses: DashMap<Uuid, WorkItemResponse>,
    audit: DashMap<Uuid, AuditRecord>,
    batches: DashMap<Uuid, ImportBatch>,
    baselines: DashMap<Uuid, BaselineVersion>,
    holidays: DashMap<Uuid, Holiday>,
    queue: DashMap<Uuid, QueuedSend>,
    /// Keyed by program uuid string, or `"global"` for the default row.
    policies: DashMap<String, EscalationPolicy>,
    org_settings: DashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn phase_ids_for_program(&self, program_id: Uuid) -> Vec<Uuid> {
        let project_ids: Vec<Uuid> = self
            .projects
            .iter()
            .filter(|p| p.program_id == program_id)
            .map(|p| p.id)
            .collect();
        self.phases
            .iter()
            .filter(|ph| project_ids.contains(&ph.project_id))
            .map(|ph| ph.id)
            .collect()
    }

    fn policy_key(program_id: Option<Uuid>) -> String {
        match program_id {
            Some(id) => id.to_string(),
            None => "global".to_owned(),
        }
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    // -- programs -----------------------------------------------------------

    async fn insert_program(&self, program: Program) -> Result<Program, StoreError> {
        if self
            .programs
            .iter()
            .any(|p| p.external_id == program.external_id)
        {
            return Err(StoreError::UniqueViolation {
                table: "programs",
                constraint: "external_id",
            });
        }
        self.programs.insert(program.id, program.clone());
        Ok(program)
    }

    async fn update_program(&self, program: Program) -> Result<(), StoreError> {
        if !self.programs.contains_key(&program.id) {
            return Err(StoreError::NotFound {
                table: "programs",
                id: program.id.to_string(),
            });
        }
        self.programs.insert(program.id, program);
        Ok(())
    }

    async fn get_program(&self, id: Uuid) -> Result<Option<Program>, StoreError> {
        Ok(self.programs.get(&id).map(|p| p.clone()))
    }

    async fn find_program_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<Program>, StoreError> {
        Ok(self
            .programs
            .iter()
            .find(|p| &p.external_id == external_id)
            .map(|p| p.clone()))
    }

    async fn delete_program(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.programs.remove(&id).is_some())
    }

    // -- projects -----------------------------------------------------------

    async fn insert_project(&self, project: Project) -> Result<Project, StoreError> {
        if self
            .projects
            .iter()
            .any(|p| p.program_id == project.program_id && p.external_id == project.external_id)
        {
            return Err(StoreError::UniqueViolation {
                table: "projects",
                constraint: "(program_id, external_id)",
            });
        }
        self.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, StoreError> {
        Ok(self.projects.get(&id).map(|p| p.clone()))
    }

    async fn find_project(
        &self,
        program_id: Uuid,
        external_id: &ExternalId,
    ) -> Result<Option<Project>, StoreError> {
        Ok(self
            .projects
            .iter()
            .find(|p| p.program_id == program_id && &p.external_id == external_id)
            .map(|p| p.clone()))
    }

    async fn delete_project(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.projects.remove(&id).is_some())
    }

    // -- phases -------------------------------------------------------------

    async fn insert_phase(&self, phase: Phase) -> Result<Phase, StoreError> {
        if self
            .phases
            .iter()
            .any(|p| p.project_id == phase.project_id && p.external_id == phase.external_id)
        {
            return Err(StoreError::UniqueViolation {
                table: "phases",
                constraint: "(project_id, external_id)",
            });
        }
        self.phases.insert(phase.id, phase.clone());
        Ok(phase)
    }

    async fn get_phase(&self, id: Uuid) -> Result<Option<Phase>, StoreError> {
        Ok(self.phases.get(&id).map(|p| p.clone()))
    }

    async fn find_phase(
        &self,
        project_id: Uuid,
        external_id: &ExternalId,
    ) -> Result<Option<Phase>, StoreError> {
        Ok(self
            .phases
            .iter()
            .find(|p| p.project_id == project_id && &p.external_id == external_id)
            .map(|p| p.clone()))
    }

    async fn list_phases_by_program(&self, program_id: Uuid) -> Result<Vec<Phase>, StoreError> {
        let ids = self.phase_ids_for_program(program_id);
        let mut phases: Vec<Phase> = self
            .phases
            .iter()
            .filter(|p| ids.contains(&p.id))
            .map(|p| p.clone())
            .collect();
        phases.sort_by_key(|p| p.sequence);
        Ok(phases)
    }

    async fn delete_phase(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.phases.remove(&id).is_some())
    }

    // -- resources ----------------------------------------------------------

    async fn insert_resource(&self, resource: Resource) -> Result<Resource, StoreError> {
        if self
            .resources
            .iter()
            .any(|r| r.external_id == resource.external_id)
        {
            return Err(StoreError::UniqueViolation {
                table: "resources",
                constraint: "external_id",
            });
        }
        self.resources.insert(resource.id, resource.clone());
        Ok(resource)
    }

    async fn update_resource(&self, resource: Resource) -> Result<(), StoreError> {
        if !self.resources.contains_key(&resource.id) {
            return Err(StoreError::NotFound {
                table: "resources",
                id: resource.id.to_string(),
            });
        }
        self.resources.insert(resource.id, resource);
        Ok(())
    }

    async fn get_resource(&self, id: Uuid) -> Result<Option<Resource>, StoreError> {
        Ok(self.resources.get(&id).map(|r| r.clone()))
    }

    async fn find_resource_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<Resource>, StoreError> {
        Ok(self
            .resources
            .iter()
            .find(|r| &r.external_id == external_id)
            .map(|r| r.clone()))
    }

    // -- work items ---------------------------------------------------------

    async fn insert_work_items(&self, items: Vec<WorkItem>) -> Result<Vec<WorkItem>, StoreError> {
        for item in &items {
            if self
                .work_items
                .iter()
                .any(|w| w.phase_id == item.phase_id && w.external_id == item.external_id)
            {
                return Err(StoreError::UniqueViolation {
                    table: "work_items",
                    constraint: "(phase_id, external_id)",
                });
            }
        }
        for item in &items {
            self.work_items.insert(item.id, item.clone());
        }
        Ok(items)
    }

    async fn update_work_items(&self, items: Vec<WorkItem>) -> Result<(), StoreError> {
        for item in items {
            self.update_work_item(item).await?;
        }
        Ok(())
    }

    async fn update_work_item(&self, item: WorkItem) -> Result<(), StoreError> {
        if !self.work_items.contains_key(&item.id) {
            return Err(StoreError::NotFound {
                table: "work_items",
                id: item.id.to_string(),
            });
        }
        self.work_items.insert(item.id, item);
        Ok(())
    }

    async fn get_work_item(&self, id: Uuid) -> Result<Option<WorkItem>, StoreError> {
        Ok(self.work_items.get(&id).map(|w| w.clone()))
    }

    async fn list_work_items_by_phase(&self, phase_id: Uuid) -> Result<Vec<WorkItem>, StoreError> {
        Ok(self
            .work_items
            .iter()
            .filter(|w| w.phase_id == phase_id)
            .map(|w| w.clone())
            .collect())
    }

    async fn list_work_items_by_program(
        &self,
        program_id: Uuid,
    ) -> Result<Vec<WorkItem>, StoreError> {
        let phase_ids = self.phase_ids_for_program(program_id);
        Ok(self
            .work_items
            .iter()
            .filter(|w| phase_ids.contains(&w.phase_id))
            .map(|w| w.clone())
            .collect())
    }

    async fn list_work_items_by_resource(
        &self,
        resource_id: Uuid,
    ) -> Result<Vec<WorkItem>, StoreError> {
        Ok(self
            .work_items
            .iter()
            .filter(|w| w.resource_id == Some(resource_id))
            .map(|w| w.clone())
            .collect())
    }

    async fn list_work_items_due_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<WorkItem>, StoreError> {
        Ok(self
            .work_items
            .iter()
            .filter(|w| {
                !w.status.is_terminal()
                    && w.actual_end.is_none()
                    && w.current_end >= from
                    && w.current_end <= to
            })
            .map(|w| w.clone())
            .collect())
    }

    async fn delete_work_item(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.work_items.remove(&id).is_some())
    }

    // -- dependencies -------------------------------------------------------

    async fn upsert_dependency(&self, dependency: Dependency) -> Result<Dependency, StoreError> {
        let existing = self.dependencies.iter().find_map(|d| {
            (d.successor_id == dependency.successor_id
                && d.predecessor_id == dependency.predecessor_id)
                .then_some(d.id)
        });
        let row = match existing {
            Some(id) => Dependency { id, ..dependency },
            None => dependency,
        };
        self.dependencies.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_dependencies_by_program(
        &self,
        program_id: Uuid,
    ) -> Result<Vec<Dependency>, StoreError> {
        let phase_ids = self.phase_ids_for_program(program_id);
        let item_ids: Vec<Uuid> = self
            .work_items
            .iter()
            .filter(|w| phase_ids.contains(&w.phase_id))
            .map(|w| w.id)
            .collect();
        Ok(self
            .dependencies
            .iter()
            .filter(|d| item_ids.contains(&d.successor_id) || item_ids.contains(&d.predecessor_id))
            .map(|d| d.clone())
            .collect())
    }

    async fn list_successor_edges(
        &self,
        work_item_id: Uuid,
    ) -> Result<Vec<Dependency>, StoreError> {
        Ok(self
            .dependencies
            .iter()
            .filter(|d| d.predecessor_id == work_item_id)
            .map(|d| d.clone())
            .collect())
    }

    async fn delete_dependency(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.dependencies.remove(&id).is_some())
    }

    // -- alerts -------------------------------------------------------------

    async fn insert_alert(&self, alert: Alert) -> Result<Alert, StoreError> {
        // Partial unique index: only rows that are not expired/cancelled
        // participate in the constraint.
        let conflict = self.alerts.iter().any(|a| {
            a.work_item_id == alert.work_item_id
                && a.deadline_date == alert.deadline_date
                && a.alert_type == alert.alert_type
                && a.escalation_level == alert.escalation_level
                && !matches!(
                    a.status,
                    cadence_core::AlertStatus::Expired | cadence_core::AlertStatus::Cancelled
                )
        });
        if conflict {
            return Err(StoreError::UniqueViolation {
                table: "alerts",
                constraint: "(work_item_id, deadline_date, alert_type, escalation_level)",
            });
        }
        self.alerts.insert(alert.id, alert.clone());
        Ok(alert)
    }

    async fn update_alert(&self, alert: Alert) -> Result<(), StoreError> {
        if !self.alerts.contains_key(&alert.id) {
            return Err(StoreError::NotFound {
                table: "alerts",
                id: alert.id.to_string(),
            });
        }
        self.alerts.insert(alert.id, alert);
        Ok(())
    }

    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>, StoreError> {
        Ok(self.alerts.get(&id).map(|a| a.clone()))
    }

    async fn find_live_alert(
        &self,
        work_item_id: Uuid,
        deadline: NaiveDate,
    ) -> Result<Option<Alert>, StoreError> {
        let mut candidates: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|a| {
                a.work_item_id == work_item_id
                    && a.deadline_date == deadline
                    && !matches!(
                        a.status,
                        cadence_core::AlertStatus::Expired | cadence_core::AlertStatus::Cancelled
                    )
            })
            .map(|a| a.clone())
            .collect();
        candidates.sort_by_key(|a| a.created_at);
        Ok(candidates.pop())
    }

    async fn list_alerts_past_timeout(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, StoreError> {
        Ok(self
            .alerts
            .iter()
            .filter(|a| {
                a.status.awaiting_response()
                    && a.escalation_timeout_at.is_some_and(|t| t < now)
            })
            .map(|a| a.clone())
            .collect())
    }

    async fn list_alerts_past_expiry(&self, now: DateTime<Utc>) -> Result<Vec<Alert>, StoreError> {
        Ok(self
            .alerts
            .iter()
            .filter(|a| a.status.is_live() && a.expires_at.is_some_and(|t| t < now))
            .map(|a| a.clone())
            .collect())
    }

    async fn list_alerts_awaiting_response(
        &self,
        sent_before: DateTime<Utc>,
    ) -> Result<Vec<Alert>, StoreError> {
        Ok(self
            .alerts
            .iter()
            .filter(|a| a.status.awaiting_response() && a.sent_at.is_some_and(|t| t < sent_before))
            .map(|a| a.clone())
            .collect())
    }

    async fn list_alert_chain(&self, alert_id: Uuid) -> Result<Vec<Alert>, StoreError> {
        let mut chain: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|a| a.id == alert_id || a.parent_alert_id == Some(alert_id))
            .map(|a| a.clone())
            .collect();
        chain.sort_by_key(|a| a.escalation_level);
        Ok(chain)
    }

    async fn delete_alert(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.alerts.remove(&id).is_some())
    }

    // -- response tokens ----------------------------------------------------

    async fn insert_response_token(
        &self,
        token: ResponseToken,
    ) -> Result<ResponseToken, StoreError> {
        if self.tokens.iter().any(|t| t.token_hash == token.token_hash) {
            return Err(StoreError::UniqueViolation {
                table: "response_tokens",
                constraint: "token_hash",
            });
        }
        self.tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn update_response_token(&self, token: ResponseToken) -> Result<(), StoreError> {
        if !self.tokens.contains_key(&token.id) {
            return Err(StoreError::NotFound {
                table: "response_tokens",
                id: token.id.to_string(),
            });
        }
        self.tokens.insert(token.id, token);
        Ok(())
    }

    async fn find_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<ResponseToken>, StoreError> {
        Ok(self
            .tokens
            .iter()
            .find(|t| t.token_hash == token_hash)
            .map(|t| t.clone()))
    }

    async fn delete_response_token(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.tokens.remove(&id).is_some())
    }

    async fn purge_revoked_tokens_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let doomed: Vec<Uuid> = self
            .tokens
            .iter()
            .filter(|t| t.revoked && t.revoked_at.is_some_and(|at| at < cutoff))
            .map(|t| t.id)
            .collect();
        for id in &doomed {
            self.tokens.remove(id);
        }
        Ok(doomed.len())
    }

    // -- work item responses ------------------------------------------------

    async fn insert_response(
        &self,
        response: WorkItemResponse,
    ) -> Result<WorkItemResponse, StoreError> {
        if let Some(ref key) = response.idempotency_key
            && self
                .responses
                .iter()
                .any(|r| r.idempotency_key.as_deref() == Some(key))
        {
            return Err(StoreError::UniqueViolation {
                table: "work_item_responses",
                constraint: "idempotency_key",
            });
        }
        self.responses.insert(response.id, response.clone());
        Ok(response)
    }

    async fn update_response(&self, response: WorkItemResponse) -> Result<(), StoreError> {
        if !self.responses.contains_key(&response.id) {
            return Err(StoreError::NotFound {
                table: "work_item_responses",
                id: response.id.to_string(),
            });
        }
        self.responses.insert(response.id, response);
        Ok(())
    }

    async fn get_response(&self, id: Uuid) -> Result<Option<WorkItemResponse>, StoreError> {
        Ok(self.responses.get(&id).map(|r| r.clone()))
    }

    async fn find_response_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<WorkItemResponse>, StoreError> {
        Ok(self
            .responses
            .iter()
            .find(|r| r.idempotency_key.as_deref() == Some(key))
            .map(|r| r.clone()))
    }

    async fn latest_response_for_work_item(
        &self,
        work_item_id: Uuid,
    ) -> Result<Option<WorkItemResponse>, StoreError> {
        Ok(self
            .responses
            .iter()
            .filter(|r| r.work_item_id == work_item_id)
            .max_by_key(|r| r.response_version)
            .map(|r| r.clone()))
    }

    async fn list_pending_approvals(&self) -> Result<Vec<WorkItemResponse>, StoreError> {
        let mut pending: Vec<WorkItemResponse> = self
            .responses
            .iter()
            .filter(|r| {
                r.requires_approval
                    && r.approval_status == cadence_core::ApprovalStatus::Pending
            })
            .map(|r| r.clone())
            .collect();
        pending.sort_by_key(|r| std::cmp::Reverse(r.submitted_at));
        Ok(pending)
    }

    async fn delete_response(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.responses.remove(&id).is_some())
    }

    // -- audit --------------------------------------------------------------

    async fn insert_audit_records(&self, records: Vec<AuditRecord>) -> Result<(), StoreError> {
        for record in records {
            self.audit.insert(record.id, record);
        }
        Ok(())
    }

    async fn delete_audit_record(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.audit.remove(&id).is_some())
    }

    async fn list_audit_records_for_batch(
        &self,
        batch_id: Uuid,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        let mut records: Vec<AuditRecord> = self
            .audit
            .iter()
            .filter(|a| a.batch_id == Some(batch_id))
            .map(|a| a.clone())
            .collect();
        records.sort_by_key(|a| a.changed_at);
        Ok(records)
    }

    // -- import batches / baseline versions ---------------------------------

    async fn insert_import_batch(&self, batch: ImportBatch) -> Result<ImportBatch, StoreError> {
        self.batches.insert(batch.id, batch.clone());
        Ok(batch)
    }

    async fn update_import_batch(&self, batch: ImportBatch) -> Result<(), StoreError> {
        if !self.batches.contains_key(&batch.id) {
            return Err(StoreError::NotFound {
                table: "import_batches",
                id: batch.id.to_string(),
            });
        }
        self.batches.insert(batch.id, batch);
        Ok(())
    }

    async fn get_import_batch(&self, id: Uuid) -> Result<Option<ImportBatch>, StoreError> {
        Ok(self.batches.get(&id).map(|b| b.clone()))
    }

    async fn list_import_batches(
        &self,
        program_id: Uuid,
    ) -> Result<Vec<ImportBatch>, StoreError> {
        let mut batches: Vec<ImportBatch> = self
            .batches
            .iter()
            .filter(|b| b.program_id == program_id)
            .map(|b| b.clone())
            .collect();
        batches.sort_by_key(|b| std::cmp::Reverse(b.started_at));
        Ok(batches)
    }

    async fn insert_baseline_version(
        &self,
        version: BaselineVersion,
    ) -> Result<BaselineVersion, StoreError> {
        self.baselines.insert(version.id, version.clone());
        Ok(version)
    }

    async fn list_baseline_versions(
        &self,
        program_id: Uuid,
    ) -> Result<Vec<BaselineVersion>, StoreError> {
        let mut versions: Vec<BaselineVersion> = self
            .baselines
            .iter()
            .filter(|v| v.program_id == program_id)
            .map(|v| v.clone())
            .collect();
        versions.sort_by_key(|v| v.version_number);
        Ok(versions)
    }

    async fn next_baseline_version_number(&self, program_id: Uuid) -> Result<i64, StoreError> {
        let max = self
            .baselines
            .iter()
            .filter(|v| v.program_id == program_id)
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    // -- holidays -----------------------------------------------------------

    async fn list_holidays(&self, country: Option<&str>) -> Result<Vec<Holiday>, StoreError> {
        Ok(self
            .holidays
            .iter()
            .filter(|h| match (country, h.country_code.as_deref()) {
                // Null-country holidays apply universally.
                (_, None) => true,
                (Some(wanted), Some(code)) => wanted == code,
                (None, Some(_)) => true,
            })
            .map(|h| h.clone())
            .collect())
    }

    async fn insert_holiday(&self, holiday: Holiday) -> Result<Holiday, StoreError> {
        self.holidays.insert(holiday.id, holiday.clone());
        Ok(holiday)
    }

    async fn delete_holiday(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.holidays.remove(&id).is_some())
    }

    // -- outbound queue -----------------------------------------------------

    async fn enqueue_send(&self, entry: QueuedSend) -> Result<bool, StoreError> {
        if self
            .queue
            .iter()
            .any(|q| q.idempotency_key == entry.idempotency_key)
        {
            return Ok(false);
        }
        self.queue.insert(entry.id, entry);
        Ok(true)
    }

    async fn list_due_queue_entries(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueuedSend>, StoreError> {
        let mut due: Vec<QueuedSend> = self
            .queue
            .iter()
            .filter(|q| q.processed_at.is_none() && q.scheduled_for <= now)
            .map(|q| q.clone())
            .collect();
        due.sort_by_key(|q| (q.priority, q.scheduled_for));
        Ok(due)
    }

    async fn mark_queue_entry_processed(
        &self,
        id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        match self.queue.get_mut(&id) {
            Some(mut entry) => {
                entry.processed_at = Some(processed_at);
                Ok(())
            }
            None => Err(StoreError::NotFound {
                table: "alert_queue",
                id: id.to_string(),
            }),
        }
    }

    async fn delete_queue_entry(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.queue.remove(&id).is_some())
    }

    // -- escalation policies / org settings ---------------------------------

    async fn escalation_policy(
        &self,
        program_id: Option<Uuid>,
    ) -> Result<EscalationPolicy, StoreError> {
        if let Some(id) = program_id
            && let Some(policy) = self.policies.get(&Self::policy_key(Some(id)))
        {
            return Ok(policy.clone());
        }
        if let Some(policy) = self.policies.get(&Self::policy_key(None)) {
            return Ok(policy.clone());
        }
        Ok(EscalationPolicy::default())
    }

    async fn set_escalation_policy(
        &self,
        program_id: Option<Uuid>,
        policy: EscalationPolicy,
    ) -> Result<(), StoreError> {
        self.policies.insert(Self::policy_key(program_id), policy);
        Ok(())
    }

    async fn get_org_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.org_settings.get(key).map(|v| v.clone()))
    }

    async fn set_org_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.org_settings.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}
