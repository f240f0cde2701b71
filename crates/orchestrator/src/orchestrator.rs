use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use cadence_core::{
    Alert, AlertStatus, AlertType, ApprovalStatus, AuditRecord, ChangeSource, ExternalId,
    ImpactSummary, Program, QueueAction, QueuedSend, ReasonCategory, ReportedStatus, Urgency,
    WorkItem, WorkItemResponse, WorkStatus, next_escalation_level,
};
use cadence_notify::{NotificationSink, render};
use cadence_store::{HolidayCache, ProjectStore, StoreError, TxContext, TxOp};
use cadence_token::TokenSigner;

use crate::OrchestratorError;
use crate::escalation::{PmContact, find_available_recipient, pm_for_notification};
use crate::impact::{ReasonDetails, analyze_impact, cascade_preview};

/// Identity stamped on system-driven audit records.
const SYSTEM_ACTOR: &str = "system:tracking_loop";

/// Tuning for the tracking loop.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Country used for every business-day calendar query.
    pub default_country: String,
    /// How far ahead the daily scan looks for deadlines, in calendar days.
    pub scan_window_days: i64,
    /// Final fallback recipient when no PM can be resolved.
    pub ops_escalation_email: Option<String>,
    pub ops_escalation_name: String,
    /// Revoked tokens older than this are purged by the nightly cleanup.
    pub token_retention_days: i64,
    /// Unanswered alerts older than this get a reminder nudge.
    pub reminder_after_hours: i64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_country: "US".to_owned(),
            scan_window_days: 7,
            ops_escalation_email: None,
            ops_escalation_name: "Operations Team".to_owned(),
            token_retention_days: 30,
            reminder_after_hours: 24,
        }
    }
}

/// A task the daily scan decided needs a status check.
#[derive(Debug, Clone, Serialize)]
pub struct PendingStatusCheck {
    pub work_item_id: Uuid,
    pub external_id: ExternalId,
    pub work_item_name: String,
    pub deadline: NaiveDate,
    pub resource_id: Uuid,
    pub resource_name: String,
    pub resource_email: String,
    pub program_id: Uuid,
    pub is_critical_path: bool,
    pub urgency: Urgency,
    pub existing_alert_id: Option<Uuid>,
    pub latest_response_status: Option<ReportedStatus>,
}

/// Result of creating (or colliding with) a status-check alert.
#[derive(Debug, Clone, Serialize)]
pub struct AlertCreation {
    pub alert_id: Uuid,
    /// True when the unique constraint routed us to an existing alert.
    pub duplicate: bool,
    pub recipient_name: String,
    pub recipient_email: String,
    pub escalation_level: u8,
    pub scheduled_send_at: Option<DateTime<Utc>>,
    pub skipped_recipients: usize,
    pub requires_manual_intervention: bool,
}

/// Summary of one daily scan run.
#[derive(Debug, Default, Serialize)]
pub struct DailyScanSummary {
    pub scan_date: Option<NaiveDate>,
    pub tasks_scanned: usize,
    pub alerts_created: usize,
    pub duplicates: usize,
    pub errors: Vec<String>,
}

/// A submitted status response, as received from the magic-link form.
#[derive(Debug, Clone)]
pub struct StatusResponseRequest {
    pub alert_id: Uuid,
    pub responder_id: Uuid,
    pub reported_status: ReportedStatus,
    pub token: Option<String>,
    pub proposed_new_date: Option<NaiveDate>,
    pub reason_category: Option<ReasonCategory>,
    pub reason_details: Option<serde_json::Value>,
    pub comment: Option<String>,
    pub idempotency_key: Option<String>,
}

/// What happened to a status response.
#[derive(Debug, Serialize)]
pub struct ResponseOutcome {
    pub response_id: Uuid,
    pub reported_status: ReportedStatus,
    pub version: i64,
    pub duplicate: bool,
    pub requires_approval: bool,
    pub auto_approved: bool,
    pub escalated: bool,
    pub message: String,
    pub impact: Option<ImpactSummary>,
}

/// One alert hop recorded by timeout escalation.
#[derive(Debug, Serialize)]
pub struct EscalationEvent {
    pub original_alert_id: Uuid,
    pub new_alert_id: Uuid,
    pub from_level: u8,
    pub to_level: u8,
    pub new_recipient: String,
}

/// One step in an alert's escalation history.
#[derive(Debug, Serialize)]
pub struct EscalationStep {
    pub level: u8,
    pub recipient_name: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub status: AlertStatus,
    pub reason: Option<String>,
}

/// Escalation history for an alert and its descendants.
#[derive(Debug, Serialize)]
pub struct EscalationSummary {
    pub alert_id: Uuid,
    pub escalation_count: usize,
    pub current_level: u8,
    pub history: Vec<EscalationStep>,
}

/// A delay waiting in the PM approval queue.
#[derive(Debug, Serialize)]
pub struct PendingApproval {
    pub response_id: Uuid,
    pub work_item_external_id: Option<ExternalId>,
    pub work_item_name: Option<String>,
    pub responder_name: Option<String>,
    pub proposed_new_date: Option<NaiveDate>,
    pub delay_days: Option<i64>,
    pub reason_category: Option<ReasonCategory>,
    pub comment: Option<String>,
    pub impact: Option<ImpactSummary>,
    pub submitted_at: DateTime<Utc>,
}

/// Result of a queue drain.
#[derive(Debug, Default, Serialize)]
pub struct QueueDrainSummary {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Result of applying an approved delay.
#[derive(Debug, Serialize)]
pub struct ApplyDelayResult {
    pub work_item_id: Uuid,
    pub old_end: NaiveDate,
    pub new_end: NaiveDate,
    pub delay_days: i64,
    pub cascaded_tasks: Vec<ExternalId>,
}

/// The alert orchestrator: the heartbeat of proactive tracking.
pub struct AlertOrchestrator {
    store: Arc<dyn ProjectStore>,
    holidays: Arc<HolidayCache>,
    signer: Arc<TokenSigner>,
    sink: Arc<dyn NotificationSink>,
    config: OrchestratorConfig,
}

impl AlertOrchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn ProjectStore>,
        holidays: Arc<HolidayCache>,
        signer: Arc<TokenSigner>,
        sink: Arc<dyn NotificationSink>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            holidays,
            signer,
            sink,
            config,
        }
    }

    fn ops_fallback(&self) -> Option<PmContact> {
        self.config.ops_escalation_email.as_ref().map(|email| PmContact {
            resource_id: None,
            name: self.config.ops_escalation_name.clone(),
            email: email.clone(),
            timezone: "UTC".to_owned(),
        })
    }

    async fn program_for_work_item(
        &self,
        work_item_id: Uuid,
    ) -> Result<Option<Program>, StoreError> {
        match self.store.program_id_for_work_item(work_item_id).await? {
            Some(id) => self.store.get_program(id).await,
            None => Ok(None),
        }
    }

    // -- daily scan ---------------------------------------------------------

    /// Find work items whose status-check alert should go out on `target`.
    ///
    /// Rows missing a resource or a resolvable program are logged and
    /// skipped, never errors — a single broken row must not stall the scan.
    pub async fn scan_for_pending_status_checks(
        &self,
        target: NaiveDate,
        days_before: u32,
    ) -> Result<Vec<PendingStatusCheck>, OrchestratorError> {
        let calendar = self.holidays.calendar_for(&self.config.default_country).await?;
        let window_start = target + Duration::days(1);
        let window_end = target + Duration::days(self.config.scan_window_days);

        let due = self
            .store
            .list_work_items_due_between(window_start, window_end)
            .await?;

        let mut pending = Vec::new();
        let mut skipped = 0usize;

        for item in due {
            let deadline = item.current_end;
            if calendar.alert_send_date(deadline, days_before) != target {
                continue;
            }

            let Some(resource_id) = item.resource_id else {
                debug!(work_item = %item.external_id, "scan skip: no assigned resource");
                skipped += 1;
                continue;
            };
            let Some(resource) = self.store.get_resource(resource_id).await? else {
                debug!(work_item = %item.external_id, "scan skip: resource row missing");
                skipped += 1;
                continue;
            };
            let Some(program_id) = self.store.program_id_for_work_item(item.id).await? else {
                debug!(work_item = %item.external_id, "scan skip: unresolvable program");
                skipped += 1;
                continue;
            };

            let existing = self.store.find_live_alert(item.id, deadline).await?;
            let latest_response = self.store.latest_response_for_work_item(item.id).await?;
            let latest_status = latest_response.map(|r| r.reported_status);
            if existing.is_some() && latest_status == Some(ReportedStatus::OnTrack) {
                continue;
            }

            pending.push(PendingStatusCheck {
                work_item_id: item.id,
                external_id: item.external_id.clone(),
                work_item_name: item.name.clone(),
                deadline,
                resource_id,
                resource_name: resource.name.clone(),
                resource_email: resource.delivery_email().to_owned(),
                program_id,
                is_critical_path: item.is_critical_path,
                urgency: Urgency::for_deadline(deadline, target),
                existing_alert_id: existing.map(|a| a.id),
                latest_response_status: latest_status,
            });
        }

        if skipped > 0 {
            info!(pending = pending.len(), skipped, "deadline scan complete");
        }
        Ok(pending)
    }

    /// The daily cron entry point: scan and create alerts.
    pub async fn run_daily_scan(&self, today: NaiveDate) -> DailyScanSummary {
        let mut summary = DailyScanSummary {
            scan_date: Some(today),
            ..DailyScanSummary::default()
        };

        let policy = match self.store.escalation_policy(None).await {
            Ok(policy) => policy,
            Err(e) => {
                summary.errors.push(e.to_string());
                return summary;
            }
        };

        let pending = match self
            .scan_for_pending_status_checks(today, policy.days_before_deadline)
            .await
        {
            Ok(pending) => pending,
            Err(e) => {
                summary.errors.push(e.to_string());
                return summary;
            }
        };
        summary.tasks_scanned = pending.len();

        for task in pending {
            if task.existing_alert_id.is_some() {
                summary.duplicates += 1;
                continue;
            }
            match self
                .create_status_check_alert(
                    task.work_item_id,
                    task.deadline,
                    task.resource_id,
                    Some(task.program_id),
                    0,
                    None,
                    None,
                )
                .await
            {
                Ok(creation) if creation.duplicate => summary.duplicates += 1,
                Ok(_) => summary.alerts_created += 1,
                Err(e) => {
                    error!(work_item = %task.external_id, error = %e, "alert creation failed");
                    summary.errors.push(format!("{}: {e}", task.external_id));
                }
            }
        }

        summary
    }

    // -- alert creation -----------------------------------------------------

    /// Create a status-check alert for one work item and deadline.
    ///
    /// Resolves the recipient through the escalation chain (starting at
    /// `start_level`), mints the magic link, inserts the alert (the store's
    /// unique constraint is the authoritative duplicate guard — a collision
    /// returns the existing alert), and enqueues the send.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_status_check_alert(
        &self,
        work_item_id: Uuid,
        deadline: NaiveDate,
        owner_id: Uuid,
        program_id: Option<Uuid>,
        start_level: u8,
        parent_alert_id: Option<Uuid>,
        escalation_reason: Option<String>,
    ) -> Result<AlertCreation, OrchestratorError> {
        let program = match program_id {
            Some(id) => self.store.get_program(id).await?,
            None => None,
        };
        let ops = self.ops_fallback();

        let (recipient, skipped) = find_available_recipient(
            &*self.store,
            owner_id,
            program.as_ref(),
            ops.as_ref(),
            start_level,
        )
        .await?;

        let Some(recipient) = recipient else {
            return self
                .create_no_recipient_alert(work_item_id, deadline, owner_id, program.as_ref(), &skipped)
                .await;
        };

        let policy = self.store.escalation_policy(program_id).await?;
        let calendar = self.holidays.calendar_for(&self.config.default_country).await?;
        let send_at = calendar.alert_send_timestamp(
            deadline,
            policy.alert_time_of_day,
            &recipient.timezone,
            policy.days_before_deadline,
        );

        // The token binds the responder; synthetic recipients respond on
        // behalf of the owner.
        let token_resource = recipient.resource_id.unwrap_or(owner_id);
        let issued = self
            .signer
            .issue(work_item_id, token_resource, deadline, None)
            .map_err(OrchestratorError::from)?;
        let token_row = self.store.insert_response_token(issued.record.clone()).await?;

        let skipped_meta: Vec<serde_json::Value> = skipped
            .iter()
            .map(|s| {
                serde_json::json!({
                    "name": s.name,
                    "reason": s.skip_reason,
                })
            })
            .collect();

        let today = Utc::now().date_naive();
        let mut reason = escalation_reason;
        if recipient.escalation_level > 0 && reason.is_none() {
            reason = Some(match skipped.first() {
                Some(first) => format!(
                    "PRIMARY_UNAVAILABLE: {}",
                    first.skip_reason.as_deref().unwrap_or("unavailable")
                ),
                None => "DIRECT_ESCALATION".to_owned(),
            });
        }

        let alert = Alert {
            id: Uuid::new_v4(),
            work_item_id,
            deadline_date: deadline,
            intended_recipient_id: owner_id,
            actual_recipient_id: recipient.resource_id,
            alert_type: AlertType::StatusCheck,
            escalation_level: recipient.escalation_level,
            urgency: Urgency::for_deadline(deadline, today),
            status: AlertStatus::Pending,
            scheduled_send_at: Some(send_at),
            sent_at: None,
            responded_at: None,
            expires_at: Some(TokenSigner::expiry_for_deadline(deadline)),
            escalation_timeout_at: policy.escalation_timeout_at(send_at, recipient.escalation_level),
            parent_alert_id,
            escalation_reason: reason,
            metadata: serde_json::json!({
                "magic_link": issued.url,
                "recipient_name": recipient.name,
                "recipient_email": recipient.email,
                "skipped_recipients": skipped_meta,
            }),
            created_at: Utc::now(),
        };

        let alert = match self.store.insert_alert(alert).await {
            Ok(alert) => alert,
            Err(StoreError::UniqueViolation { .. }) => {
                // Lost the race: another creator got there first. Clean up
                // the token we minted and hand back the existing alert.
                let _ = self.store.delete_response_token(token_row.id).await;
                let existing = self
                    .store
                    .find_live_alert(work_item_id, deadline)
                    .await?
                    .ok_or(OrchestratorError::AlertNotFound(work_item_id))?;
                info!(alert_id = %existing.id, "alert already exists, returning duplicate");
                return Ok(AlertCreation {
                    alert_id: existing.id,
                    duplicate: true,
                    recipient_name: recipient.name,
                    recipient_email: recipient.email,
                    escalation_level: existing.escalation_level,
                    scheduled_send_at: existing.scheduled_send_at,
                    skipped_recipients: skipped.len(),
                    requires_manual_intervention: false,
                });
            }
            Err(e) => return Err(e.into()),
        };

        // Backfill the alert id onto the token row; the respond surface
        // resolves the alert through it.
        let mut linked_token = token_row;
        linked_token.alert_id = Some(alert.id);
        self.store.update_response_token(linked_token).await?;

        // The queue's idempotency key prevents double sends even when two
        // creators raced past this point.
        self.store
            .enqueue_send(QueuedSend::send(alert.id, send_at))
            .await?;

        debug!(alert_id = %alert.id, level = recipient.escalation_level, "status check alert created");
        Ok(AlertCreation {
            alert_id: alert.id,
            duplicate: false,
            recipient_name: recipient.name,
            recipient_email: recipient.email,
            escalation_level: recipient.escalation_level,
            scheduled_send_at: Some(send_at),
            skipped_recipients: skipped.len(),
            requires_manual_intervention: false,
        })
    }

    /// Nobody in the chain was available: create a CRITICAL escalation alert
    /// addressed to the PM-notify lookup and fire a best-effort
    /// notification. Requires manual intervention either way.
    async fn create_no_recipient_alert(
        &self,
        work_item_id: Uuid,
        deadline: NaiveDate,
        owner_id: Uuid,
        program: Option<&Program>,
        skipped: &[cadence_core::EscalationRecipient],
    ) -> Result<AlertCreation, OrchestratorError> {
        let item = self.store.get_work_item(work_item_id).await?;
        let owner = self.store.get_resource(owner_id).await?;
        let ops = self.ops_fallback();
        let pm = pm_for_notification(&*self.store, program, ops.as_ref()).await?;

        let skipped_names: Vec<String> = skipped
            .iter()
            .map(|s| {
                format!(
                    "{} ({})",
                    s.name,
                    s.skip_reason.as_deref().unwrap_or("unavailable")
                )
            })
            .collect();

        let alert = Alert {
            id: Uuid::new_v4(),
            work_item_id,
            deadline_date: deadline,
            intended_recipient_id: owner_id,
            actual_recipient_id: pm.as_ref().and_then(|p| p.resource_id),
            alert_type: AlertType::Escalation,
            escalation_level: 3,
            urgency: Urgency::Critical,
            status: AlertStatus::Pending,
            scheduled_send_at: Some(Utc::now()),
            sent_at: None,
            responded_at: None,
            expires_at: Some(TokenSigner::expiry_for_deadline(deadline)),
            escalation_timeout_at: None,
            parent_alert_id: None,
            escalation_reason: Some("NO_AVAILABLE_RECIPIENT".to_owned()),
            metadata: serde_json::json!({
                "error": "no available recipients in escalation chain",
                "skipped_recipients": skipped_names,
                "work_item_name": item.as_ref().map(|i| i.name.clone()),
                "work_item_external_id": item.as_ref().map(|i| i.external_id.to_string()),
                "original_assignee_name": owner.as_ref().map(|r| r.name.clone()),
                "recipient_name": pm.as_ref().map(|p| p.name.clone()),
                "recipient_email": pm.as_ref().map(|p| p.email.clone()),
                "pm_notified": pm.is_some(),
            }),
            created_at: Utc::now(),
        };

        let alert = match self.store.insert_alert(alert).await {
            Ok(alert) => alert,
            Err(StoreError::UniqueViolation { .. }) => {
                let existing = self
                    .store
                    .find_live_alert(work_item_id, deadline)
                    .await?
                    .ok_or(OrchestratorError::AlertNotFound(work_item_id))?;
                return Ok(AlertCreation {
                    alert_id: existing.id,
                    duplicate: true,
                    recipient_name: String::new(),
                    recipient_email: String::new(),
                    escalation_level: 3,
                    scheduled_send_at: None,
                    skipped_recipients: skipped.len(),
                    requires_manual_intervention: true,
                });
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(ref pm) = pm {
            let message = render::no_recipient(
                &pm.email,
                &pm.name,
                item.as_ref().map_or("unknown task", |i| i.name.as_str()),
                item.as_ref().map_or("", |i| i.external_id.as_str()),
                &deadline.to_string(),
                owner.as_ref().map_or("unknown", |r| r.name.as_str()),
                &skipped_names,
            );
            if let Err(e) = self.sink.send(&message).await {
                warn!(alert_id = %alert.id, error = %e, "no-recipient notification failed");
            }
        } else {
            error!(
                work_item_id = %work_item_id,
                "no PM and no ops fallback configured; no-recipient alert is silent"
            );
        }

        warn!(alert_id = %alert.id, "no recipient available, manual intervention required");
        Ok(AlertCreation {
            alert_id: alert.id,
            duplicate: false,
            recipient_name: pm.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
            recipient_email: pm.as_ref().map(|p| p.email.clone()).unwrap_or_default(),
            escalation_level: 3,
            scheduled_send_at: alert.scheduled_send_at,
            skipped_recipients: skipped.len(),
            requires_manual_intervention: true,
        })
    }

    // -- response processing ------------------------------------------------

    /// Process a status response. The transactional heart of the loop: the
    /// supersede/insert/revoke/mark sequence commits or rolls back as one.
    pub async fn process_status_response(
        &self,
        req: StatusResponseRequest,
    ) -> Result<ResponseOutcome, OrchestratorError> {
        // Idempotency shortcut: a retried submission returns the original.
        if let Some(ref key) = req.idempotency_key
            && let Some(existing) = self.store.find_response_by_idempotency_key(key).await?
        {
            info!(idempotency_key = %key, "duplicate submission, returning original response");
            return Ok(ResponseOutcome {
                response_id: existing.id,
                reported_status: existing.reported_status,
                version: existing.response_version,
                duplicate: true,
                requires_approval: existing.requires_approval,
                auto_approved: existing.approval_status == ApprovalStatus::AutoApproved,
                escalated: false,
                message: "response already submitted".to_owned(),
                impact: existing.impact_analysis,
            });
        }

        // Token gating. A missing hash row is tolerated (the response simply
        // is not token-tracked); a revoked one is a hard stop.
        let token_row = match req.token.as_deref() {
            Some(token) => {
                self.signer.verify(token)?;
                match self.store.find_token_by_hash(&cadence_token::hash_token(token)).await? {
                    Some(row) if row.revoked => {
                        return Err(OrchestratorError::TokenAlreadyUsed { used_at: row.used_at });
                    }
                    Some(row) => Some(row),
                    None => {
                        warn!(alert_id = %req.alert_id, "token not found in store; responding without token tracking");
                        None
                    }
                }
            }
            None => None,
        };

        let alert = self
            .store
            .get_alert(req.alert_id)
            .await?
            .ok_or(OrchestratorError::AlertNotFound(req.alert_id))?;
        let item = self
            .store
            .get_work_item(alert.work_item_id)
            .await?
            .ok_or(OrchestratorError::WorkItemNotFound(alert.work_item_id))?;
        let program_id = self.store.program_id_for_work_item(item.id).await?;

        let previous_latest = self.store.latest_response_for_work_item(item.id).await?;
        let version = previous_latest.as_ref().map_or(0, |r| r.response_version) + 1;

        let delay_days = match (req.reported_status, req.proposed_new_date) {
            (ReportedStatus::Delayed, Some(proposed)) => {
                Some((proposed - item.current_end).num_days())
            }
            _ => None,
        };

        let policy = self.store.escalation_policy(program_id).await?;
        let requires_approval = matches!(req.reported_status, ReportedStatus::Delayed)
            && delay_days.is_some_and(|d| d > policy.auto_approve_delay_up_to_days);

        let reason = req.reason_category.unwrap_or(ReasonCategory::Other);
        let details: ReasonDetails = req
            .reason_details
            .clone()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let impact = match (req.reported_status, req.proposed_new_date) {
            (ReportedStatus::Delayed, Some(proposed)) => {
                match analyze_impact(&*self.store, item.id, proposed, reason, &details).await {
                    Ok(report) => Some(report),
                    Err(e) => {
                        error!(work_item = %item.external_id, error = %e, "impact analysis failed");
                        None
                    }
                }
            }
            _ => None,
        };

        let now = Utc::now();
        let tx = TxContext::new();

        let response = WorkItemResponse {
            id: Uuid::new_v4(),
            alert_id: alert.id,
            work_item_id: item.id,
            responder_id: req.responder_id,
            token_id: token_row.as_ref().map(|t| t.id),
            reported_status: req.reported_status,
            proposed_new_date: req.proposed_new_date,
            delay_days,
            reason_category: req.reason_category,
            reason_details: req.reason_details.clone(),
            comment: req.comment.clone(),
            response_version: version,
            is_latest: true,
            superseded_by_response_version: None,
            requires_approval,
            approval_status: if requires_approval {
                ApprovalStatus::Pending
            } else {
                ApprovalStatus::AutoApproved
            },
            approved_by_resource_id: None,
            approved_at: None,
            rejection_reason: None,
            impact_analysis: impact.as_ref().map(super::impact::ImpactReport::summary),
            submitted_at: now,
            idempotency_key: req.idempotency_key.clone(),
        };

        let atomic = self
            .atomic_response_sequence(&tx, previous_latest, response, token_row, &alert, now)
            .await;
        let response = match atomic {
            Ok(response) => response,
            Err(e) => {
                error!(alert_id = %alert.id, error = %e, "atomic response sequence failed; rolling back");
                let report = tx.rollback(&*self.store).await;
                if !report.is_clean() {
                    for failure in &report.failures {
                        warn!(failure = %failure, "rollback step failed");
                    }
                }
                return Err(e.into());
            }
        };

        // Branch on the reported status. These follow-ups run after the
        // atomic commit, matching the recorded-response-first semantics.
        let mut outcome = ResponseOutcome {
            response_id: response.id,
            reported_status: req.reported_status,
            version,
            duplicate: false,
            requires_approval,
            auto_approved: false,
            escalated: false,
            message: String::new(),
            impact: response.impact_analysis.clone(),
        };

        match req.reported_status {
            ReportedStatus::OnTrack => {
                outcome.message = "thank you, status confirmed as on track".to_owned();
            }
            ReportedStatus::Delayed => {
                let Some(proposed) = req.proposed_new_date else {
                    outcome.message = "delay recorded without a proposed date".to_owned();
                    return Ok(outcome);
                };
                let delay = delay_days.unwrap_or(0);
                if requires_approval {
                    self.create_approval_request_alert(&item, &response, proposed, delay, program_id)
                        .await?;
                    outcome.message =
                        format!("delay of {delay} days recorded, awaiting PM approval");
                } else {
                    let new_start = impact.as_ref().map(|i| i.recalculation.new_start);
                    self.apply_approved_delay(
                        item.id,
                        proposed,
                        new_start,
                        "system:auto_approve",
                        true,
                    )
                    .await?;
                    outcome.auto_approved = true;
                    outcome.message = format!("delay of {delay} days auto-approved");
                }
            }
            ReportedStatus::Blocked => {
                self.handle_blocker_report(&item, &alert, &response, req.comment.as_deref())
                    .await?;
                outcome.escalated = true;
                outcome.message = "blocker reported, the PM has been notified".to_owned();
            }
            ReportedStatus::Completed => {
                let snapshot = item.clone();
                let mut completed = item.clone();
                completed.status = WorkStatus::Completed;
                completed.actual_end = Some(now.date_naive());
                completed.completion_percent = 100;
                self.store.update_work_item(completed).await?;
                self.store
                    .insert_audit_records(vec![
                        AuditRecord::new(
                            "work_item",
                            snapshot.id,
                            "completed",
                            ChangeSource::StatusResponse,
                            SYSTEM_ACTOR,
                        )
                        .with_field(
                            "status",
                            Some(format!("{:?}", snapshot.status)),
                            Some("Completed".to_owned()),
                        ),
                    ])
                    .await?;
                outcome.message = "task marked as completed".to_owned();
            }
        }

        Ok(outcome)
    }

    /// The four-step atomic sequence: supersede prior latest, insert the new
    /// response, revoke the token, mark the alert responded.
    async fn atomic_response_sequence(
        &self,
        tx: &TxContext,
        previous_latest: Option<WorkItemResponse>,
        response: WorkItemResponse,
        token_row: Option<cadence_core::ResponseToken>,
        alert: &Alert,
        now: DateTime<Utc>,
    ) -> Result<WorkItemResponse, StoreError> {
        if let Some(previous) = previous_latest {
            let snapshot = previous.clone();
            let mut superseded = previous;
            superseded.is_latest = false;
            superseded.superseded_by_response_version = Some(response.response_version);
            tx.record(TxOp::ResponseUpdated(snapshot));
            self.store.update_response(superseded).await?;
        }

        let response = self.store.insert_response(response).await?;
        tx.record(TxOp::ResponseCreated(response.id));

        if let Some(token) = token_row {
            let snapshot = token.clone();
            let mut revoked = token;
            revoked.revoked = true;
            revoked.revoked_at = Some(now);
            revoked.used_at = Some(now);
            revoked.used_by_response_id = Some(response.id);
            revoked.revocation_reason = Some("used to submit a response".to_owned());
            tx.record(TxOp::TokenUpdated(snapshot));
            self.store.update_response_token(revoked).await?;
        }

        let snapshot = alert.clone();
        let mut responded = alert.clone();
        responded.status = AlertStatus::Responded;
        responded.responded_at = Some(now);
        tx.record(TxOp::AlertUpdated(snapshot));
        self.store.update_alert(responded).await?;

        Ok(response)
    }

    async fn create_approval_request_alert(
        &self,
        item: &WorkItem,
        response: &WorkItemResponse,
        proposed: NaiveDate,
        delay_days: i64,
        program_id: Option<Uuid>,
    ) -> Result<(), OrchestratorError> {
        let program = match program_id {
            Some(id) => self.store.get_program(id).await?,
            None => None,
        };
        let ops = self.ops_fallback();
        let pm = pm_for_notification(&*self.store, program.as_ref(), ops.as_ref()).await?;

        let alert = Alert {
            id: Uuid::new_v4(),
            work_item_id: item.id,
            deadline_date: proposed,
            intended_recipient_id: response.responder_id,
            actual_recipient_id: pm.as_ref().and_then(|p| p.resource_id),
            alert_type: AlertType::ApprovalRequest,
            escalation_level: 3,
            urgency: if delay_days > 3 {
                Urgency::High
            } else {
                Urgency::Normal
            },
            status: AlertStatus::Pending,
            scheduled_send_at: Some(Utc::now()),
            sent_at: None,
            responded_at: None,
            expires_at: None,
            escalation_timeout_at: None,
            parent_alert_id: Some(response.alert_id),
            escalation_reason: None,
            metadata: serde_json::json!({
                "response_id": response.id,
                "delay_days": delay_days,
                "proposed_new_date": proposed,
                "impact": response.impact_analysis,
                "work_item_external_id": item.external_id.to_string(),
                "recipient_name": pm.as_ref().map(|p| p.name.clone()),
                "recipient_email": pm.as_ref().map(|p| p.email.clone()),
            }),
            created_at: Utc::now(),
        };

        match self.store.insert_alert(alert).await {
            Ok(alert) => {
                self.store
                    .enqueue_send(QueuedSend::send(alert.id, Utc::now()))
                    .await?;
                Ok(())
            }
            // A second response version for the same proposed date reuses
            // the alert already in front of the PM.
            Err(StoreError::UniqueViolation { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn handle_blocker_report(
        &self,
        item: &WorkItem,
        alert: &Alert,
        response: &WorkItemResponse,
        comment: Option<&str>,
    ) -> Result<(), OrchestratorError> {
        let snapshot = item.clone();
        let mut flagged = item.clone();
        flagged.flag_for_review = true;
        flagged.review_message = Some(format!(
            "BLOCKED: {}",
            comment.unwrap_or("blocker reported")
        ));
        self.store.update_work_item(flagged).await?;
        self.store
            .insert_audit_records(vec![
                AuditRecord::new(
                    "work_item",
                    snapshot.id,
                    "flagged",
                    ChangeSource::StatusResponse,
                    SYSTEM_ACTOR,
                )
                .with_field("flag_for_review", Some("false".to_owned()), Some("true".to_owned()))
                .with_reason(format!("BLOCKED: {}", comment.unwrap_or("blocker reported"))),
            ])
            .await?;

        let program = self.program_for_work_item(item.id).await?;
        let ops = self.ops_fallback();
        let pm = pm_for_notification(&*self.store, program.as_ref(), ops.as_ref()).await?;

        let blocker = Alert {
            id: Uuid::new_v4(),
            work_item_id: item.id,
            deadline_date: Utc::now().date_naive(),
            intended_recipient_id: response.responder_id,
            actual_recipient_id: pm.as_ref().and_then(|p| p.resource_id),
            alert_type: AlertType::BlockerReport,
            escalation_level: 3,
            urgency: Urgency::Critical,
            status: AlertStatus::Pending,
            scheduled_send_at: Some(Utc::now()),
            sent_at: None,
            responded_at: None,
            expires_at: None,
            escalation_timeout_at: None,
            parent_alert_id: Some(alert.id),
            escalation_reason: Some("BLOCKER_REPORTED".to_owned()),
            metadata: serde_json::json!({
                "response_id": response.id,
                "blocker_description": comment,
                "work_item_external_id": item.external_id.to_string(),
                "work_item_name": item.name,
                "recipient_name": pm.as_ref().map(|p| p.name.clone()),
                "recipient_email": pm.as_ref().map(|p| p.email.clone()),
            }),
            created_at: Utc::now(),
        };

        match self.store.insert_alert(blocker).await {
            Ok(blocker) => {
                self.store
                    .enqueue_send(QueuedSend::send(blocker.id, Utc::now()))
                    .await?;
                Ok(())
            }
            Err(StoreError::UniqueViolation { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    // -- timeout escalation -------------------------------------------------

    /// Escalate every alert whose response window has lapsed: create a new
    /// alert one level up (linked via `parent_alert_id`), expire the old
    /// one, and write the audit trail.
    pub async fn check_and_escalate_timeouts(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EscalationEvent>, OrchestratorError> {
        let lapsed = self.store.list_alerts_past_timeout(now).await?;
        let mut escalated = Vec::new();

        for alert in lapsed {
            let current = alert.escalation_level;
            let next = next_escalation_level(current);
            if next == current {
                continue;
            }

            let Some(item) = self.store.get_work_item(alert.work_item_id).await? else {
                continue;
            };
            let Some(owner_id) = item.resource_id else {
                continue;
            };
            let program_id = self.store.program_id_for_work_item(item.id).await?;

            let creation = match self
                .create_status_check_alert(
                    item.id,
                    alert.deadline_date,
                    owner_id,
                    program_id,
                    next,
                    Some(alert.id),
                    Some("TIMEOUT_NO_RESPONSE".to_owned()),
                )
                .await
            {
                Ok(creation) => creation,
                Err(e) => {
                    error!(alert_id = %alert.id, error = %e, "escalation alert creation failed");
                    continue;
                }
            };

            let snapshot = alert.clone();
            let mut expired = alert.clone();
            expired.status = AlertStatus::Expired;
            self.store.update_alert(expired).await?;

            self.store
                .insert_audit_records(vec![
                    AuditRecord::new(
                        "alert",
                        snapshot.id,
                        "escalated",
                        ChangeSource::Escalation,
                        SYSTEM_ACTOR,
                    )
                    .with_field(
                        "escalation_level",
                        Some(current.to_string()),
                        Some(creation.escalation_level.to_string()),
                    )
                    .with_reason("TIMEOUT_NO_RESPONSE")
                    .with_metadata(serde_json::json!({
                        "from_resource_id": snapshot.actual_recipient_id,
                        "to_resource_name": creation.recipient_name,
                        "new_alert_id": creation.alert_id,
                    })),
                ])
                .await?;

            info!(
                original = %snapshot.id,
                new = %creation.alert_id,
                from = current,
                to = creation.escalation_level,
                "alert escalated on timeout"
            );
            escalated.push(EscalationEvent {
                original_alert_id: snapshot.id,
                new_alert_id: creation.alert_id,
                from_level: current,
                to_level: creation.escalation_level,
                new_recipient: creation.recipient_name,
            });
        }

        Ok(escalated)
    }

    // -- approval workflow --------------------------------------------------

    /// Approve a pending delay and apply it (with cascade).
    pub async fn approve_delay(
        &self,
        response_id: Uuid,
        approver_id: Uuid,
    ) -> Result<ApplyDelayResult, OrchestratorError> {
        let response = self
            .store
            .get_response(response_id)
            .await?
            .ok_or(OrchestratorError::ResponseNotFound(response_id))?;
        if response.approval_status != ApprovalStatus::Pending {
            return Err(OrchestratorError::NotPendingApproval(format!(
                "{:?}",
                response.approval_status
            )));
        }
        let Some(proposed) = response.proposed_new_date else {
            return Err(OrchestratorError::NotPendingApproval(
                "response carries no proposed date".to_owned(),
            ));
        };

        let mut approved = response.clone();
        approved.approval_status = ApprovalStatus::Approved;
        approved.approved_by_resource_id = Some(approver_id);
        approved.approved_at = Some(Utc::now());
        self.store.update_response(approved).await?;

        self.store
            .insert_audit_records(vec![
                AuditRecord::new(
                    "work_item_response",
                    response_id,
                    "approved",
                    ChangeSource::StatusResponse,
                    approver_id.to_string(),
                )
                .with_field("approval_status", Some("PENDING".to_owned()), Some("APPROVED".to_owned())),
            ])
            .await?;

        // Re-run the reason math against current state so the start shift
        // (e.g. STARTED_LATE) lands too.
        let new_start = match self.store.get_work_item(response.work_item_id).await? {
            Some(item) => response.reason_category.map(|reason| {
                let details = response
                    .reason_details
                    .clone()
                    .and_then(|v| serde_json::from_value(v).ok())
                    .unwrap_or_default();
                super::impact::recalculate_duration(&item, proposed, reason, &details).new_start
            }),
            None => None,
        };

        self.apply_approved_delay(
            response.work_item_id,
            proposed,
            new_start,
            &approver_id.to_string(),
            true,
        )
        .await
    }

    /// Reject a pending delay. Dates are untouched.
    pub async fn reject_delay(
        &self,
        response_id: Uuid,
        approver_id: Uuid,
        reason: String,
    ) -> Result<(), OrchestratorError> {
        let response = self
            .store
            .get_response(response_id)
            .await?
            .ok_or(OrchestratorError::ResponseNotFound(response_id))?;
        if response.approval_status != ApprovalStatus::Pending {
            return Err(OrchestratorError::NotPendingApproval(format!(
                "{:?}",
                response.approval_status
            )));
        }

        let mut rejected = response;
        rejected.approval_status = ApprovalStatus::Rejected;
        rejected.approved_by_resource_id = Some(approver_id);
        rejected.approved_at = Some(Utc::now());
        rejected.rejection_reason = Some(reason.clone());
        self.store.update_response(rejected).await?;

        self.store
            .insert_audit_records(vec![
                AuditRecord::new(
                    "work_item_response",
                    response_id,
                    "rejected",
                    ChangeSource::StatusResponse,
                    approver_id.to_string(),
                )
                .with_field("approval_status", Some("PENDING".to_owned()), Some("REJECTED".to_owned()))
                .with_reason(reason),
            ])
            .await?;
        Ok(())
    }

    /// Everything waiting in the PM approval queue, enriched with work-item
    /// and responder context.
    pub async fn pending_approvals(&self) -> Result<Vec<PendingApproval>, OrchestratorError> {
        let mut out = Vec::new();
        for response in self.store.list_pending_approvals().await? {
            let item = self.store.get_work_item(response.work_item_id).await?;
            let responder = self.store.get_resource(response.responder_id).await?;
            out.push(PendingApproval {
                response_id: response.id,
                work_item_external_id: item.as_ref().map(|i| i.external_id.clone()),
                work_item_name: item.map(|i| i.name),
                responder_name: responder.map(|r| r.name),
                proposed_new_date: response.proposed_new_date,
                delay_days: response.delay_days,
                reason_category: response.reason_category,
                comment: response.comment.clone(),
                impact: response.impact_analysis.clone(),
                submitted_at: response.submitted_at,
            });
        }
        Ok(out)
    }

    // -- apply delay --------------------------------------------------------

    /// Apply an approved delay and cascade it downstream, all inside one
    /// transaction envelope. On failure the envelope restores every touched
    /// row and the error carries what was attempted.
    pub async fn apply_approved_delay(
        &self,
        work_item_id: Uuid,
        new_end: NaiveDate,
        new_start: Option<NaiveDate>,
        approved_by: &str,
        cascade: bool,
    ) -> Result<ApplyDelayResult, OrchestratorError> {
        let item = self
            .store
            .get_work_item(work_item_id)
            .await?
            .ok_or(OrchestratorError::WorkItemNotFound(work_item_id))?;
        let old_end = item.current_end;
        let delay_days = (new_end - old_end).num_days();

        let tx = TxContext::new();
        let mut attempted: Vec<String> = Vec::new();

        let applied: Result<Vec<ExternalId>, StoreError> = async {
            let snapshot = item.clone();
            let mut updated = item.clone();
            updated.current_end = new_end;
            // Forecast starts only ever move forward; reason math that
            // shifted the window is honored, a pull-in is not.
            if let Some(start) = new_start
                && start > updated.current_start
            {
                updated.current_start = start;
            }
            tx.record(TxOp::WorkItemUpdated(snapshot));
            attempted.push(item.external_id.to_string());
            self.store.update_work_item(updated).await?;

            let audit = AuditRecord::new(
                "work_item",
                work_item_id,
                "delay_approved",
                ChangeSource::StatusResponse,
                approved_by,
            )
            .with_field(
                "current_end",
                Some(old_end.to_string()),
                Some(new_end.to_string()),
            );
            tx.record(TxOp::AuditInserted(audit.id));
            self.store.insert_audit_records(vec![audit]).await?;

            let mut cascaded = Vec::new();
            if cascade && delay_days > 0 {
                for affected in cascade_preview(&*self.store, work_item_id, delay_days).await? {
                    let Some(downstream) = self.store.get_work_item(affected.work_item_id).await?
                    else {
                        continue;
                    };
                    let snapshot = downstream.clone();
                    let mut shifted = downstream;
                    shifted.current_start = affected.new_start;
                    shifted.current_end = affected.new_end;
                    tx.record(TxOp::WorkItemUpdated(snapshot));
                    attempted.push(affected.external_id.to_string());
                    self.store.update_work_item(shifted).await?;
                    cascaded.push(affected.external_id);
                }
            }
            Ok(cascaded)
        }
        .await;

        match applied {
            Ok(cascaded) => {
                info!(
                    work_item_id = %work_item_id,
                    delay_days,
                    cascaded = cascaded.len(),
                    "approved delay applied"
                );
                Ok(ApplyDelayResult {
                    work_item_id,
                    old_end,
                    new_end,
                    delay_days,
                    cascaded_tasks: cascaded,
                })
            }
            Err(e) => {
                error!(work_item_id = %work_item_id, error = %e, "cascade failed, rolling back");
                let report = tx.rollback(&*self.store).await;
                Err(OrchestratorError::CascadeFailure {
                    error: e.to_string(),
                    attempted,
                    rolled_back: report.is_clean(),
                })
            }
        }
    }

    // -- queue, reminders, cleanup ------------------------------------------

    /// Drain due queue entries: render each alert's message and hand it to
    /// the notification sink. Failed sends stay queued for the next drain.
    pub async fn drain_queue(&self, now: DateTime<Utc>) -> Result<QueueDrainSummary, OrchestratorError> {
        let mut summary = QueueDrainSummary::default();

        for entry in self.store.list_due_queue_entries(now).await? {
            let Some(alert) = self.store.get_alert(entry.alert_id).await? else {
                self.store.mark_queue_entry_processed(entry.id, now).await?;
                summary.skipped += 1;
                continue;
            };

            let deliverable = match entry.action {
                QueueAction::Send => alert.status == AlertStatus::Pending,
                QueueAction::Remind => alert.status.awaiting_response(),
            };
            if !deliverable {
                // Responded, expired, or cancelled since it was queued.
                self.store.mark_queue_entry_processed(entry.id, now).await?;
                summary.skipped += 1;
                continue;
            }

            let message = self.render_alert(&alert, entry.action).await?;
            let Some(message) = message else {
                self.store.mark_queue_entry_processed(entry.id, now).await?;
                summary.skipped += 1;
                continue;
            };

            match self.sink.send(&message).await {
                Ok(()) => {
                    if entry.action == QueueAction::Send {
                        let mut sent = alert.clone();
                        sent.status = AlertStatus::Sent;
                        sent.sent_at = Some(now);
                        self.store.update_alert(sent).await?;
                    }
                    self.store.mark_queue_entry_processed(entry.id, now).await?;
                    summary.sent += 1;
                }
                Err(e) => {
                    warn!(alert_id = %alert.id, error = %e, "notification send failed; will retry");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Render the outbound message for an alert. Returns `None` when there
    /// is no deliverable recipient address.
    async fn render_alert(
        &self,
        alert: &Alert,
        action: QueueAction,
    ) -> Result<Option<cadence_notify::RenderedMessage>, OrchestratorError> {
        let meta = &alert.metadata;
        let str_meta = |key: &str| meta.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_owned();

        let (email, name) = match alert.actual_recipient_id {
            Some(id) => match self.store.get_resource(id).await? {
                Some(resource) => (resource.delivery_email().to_owned(), resource.name),
                None => (str_meta("recipient_email"), str_meta("recipient_name")),
            },
            None => (str_meta("recipient_email"), str_meta("recipient_name")),
        };
        if email.is_empty() {
            warn!(alert_id = %alert.id, "alert has no deliverable recipient");
            return Ok(None);
        }

        let item = self.store.get_work_item(alert.work_item_id).await?;
        let task_name = item.as_ref().map_or(String::new(), |i| i.name.clone());
        let task_ext = item
            .as_ref()
            .map_or(String::new(), |i| i.external_id.to_string());
        let deadline = alert.deadline_date.to_string();
        let link = str_meta("magic_link");

        let message = match (alert.alert_type, action) {
            (AlertType::StatusCheck, QueueAction::Remind) => {
                render::reminder(&email, &name, &task_ext, &deadline, &link)
            }
            (AlertType::StatusCheck, QueueAction::Send) => {
                if let Some(parent_id) = alert.parent_alert_id {
                    let previous = match self.store.get_alert(parent_id).await? {
                        Some(parent) => match parent.actual_recipient_id {
                            Some(id) => self
                                .store
                                .get_resource(id)
                                .await?
                                .map_or_else(|| "the previous recipient".to_owned(), |r| r.name),
                            None => "the previous recipient".to_owned(),
                        },
                        None => "the previous recipient".to_owned(),
                    };
                    render::escalation(&email, &name, &task_name, &task_ext, &deadline, &previous, &link)
                } else {
                    render::status_check(&email, &name, &task_name, &task_ext, &deadline, &link)
                }
            }
            (AlertType::BlockerReport, _) => render::blocker_report(
                &email,
                &name,
                &task_name,
                &task_ext,
                &str_meta("blocker_description"),
            ),
            (AlertType::ApprovalRequest, _) => {
                let delay = meta.get("delay_days").and_then(serde_json::Value::as_i64).unwrap_or(0);
                let risk = meta
                    .get("impact")
                    .and_then(|i| i.get("risk_level"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("UNKNOWN");
                render::approval_request(
                    &email,
                    &name,
                    &task_ext,
                    delay,
                    &str_meta("proposed_new_date"),
                    risk,
                )
            }
            (AlertType::Escalation | AlertType::Notification, _) => {
                let skipped: Vec<String> = meta
                    .get("skipped_recipients")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|v| v.as_str().map(ToOwned::to_owned))
                            .collect()
                    })
                    .unwrap_or_default();
                render::no_recipient(
                    &email,
                    &name,
                    &task_name,
                    &task_ext,
                    &deadline,
                    &str_meta("original_assignee_name"),
                    &skipped,
                )
            }
        };

        Ok(Some(message))
    }

    /// Enqueue reminder nudges for unanswered alerts older than the
    /// configured threshold. The `remind-{alert}` idempotency key caps it at
    /// one reminder per alert.
    pub async fn send_reminders(&self, now: DateTime<Utc>) -> Result<usize, OrchestratorError> {
        let threshold = now - Duration::hours(self.config.reminder_after_hours);
        let mut enqueued = 0;
        for alert in self.store.list_alerts_awaiting_response(threshold).await? {
            if self
                .store
                .enqueue_send(QueuedSend::remind(alert.id, now))
                .await?
            {
                enqueued += 1;
            }
        }
        if enqueued > 0 {
            info!(count = enqueued, "reminders enqueued");
        }
        Ok(enqueued)
    }

    /// Nightly cleanup: expire alerts past their window, purge old revoked
    /// tokens. Returns `(alerts_expired, tokens_purged)`.
    pub async fn cleanup_stale(&self, now: DateTime<Utc>) -> Result<(usize, usize), OrchestratorError> {
        let mut expired = 0;
        for alert in self.store.list_alerts_past_expiry(now).await? {
            let mut stale = alert;
            stale.status = AlertStatus::Expired;
            self.store.update_alert(stale).await?;
            expired += 1;
        }

        let cutoff = now - Duration::days(self.config.token_retention_days);
        let purged = self.store.purge_revoked_tokens_before(cutoff).await?;

        if expired > 0 || purged > 0 {
            info!(expired, purged, "stale cleanup complete");
        }
        Ok((expired, purged))
    }

    /// Escalation history for an alert: itself plus every alert created
    /// from it, ordered by level.
    pub async fn escalation_summary(
        &self,
        alert_id: Uuid,
    ) -> Result<EscalationSummary, OrchestratorError> {
        let chain = self.store.list_alert_chain(alert_id).await?;
        if chain.is_empty() {
            return Err(OrchestratorError::AlertNotFound(alert_id));
        }

        let mut history = Vec::with_capacity(chain.len());
        let mut current_level = 0;
        for alert in &chain {
            current_level = current_level.max(alert.escalation_level);
            let recipient_name = match alert.actual_recipient_id {
                Some(id) => self.store.get_resource(id).await?.map(|r| r.name),
                None => None,
            };
            history.push(EscalationStep {
                level: alert.escalation_level,
                recipient_name,
                sent_at: alert.sent_at,
                responded_at: alert.responded_at,
                status: alert.status,
                reason: alert.escalation_reason.clone(),
            });
        }

        Ok(EscalationSummary {
            alert_id,
            escalation_count: chain.len().saturating_sub(1),
            current_level,
            history,
        })
    }
}
