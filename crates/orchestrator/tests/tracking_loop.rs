//! The tracking loop end-to-end against the in-memory store: scan, alert
//! creation, magic-link responses, escalation on timeout, approval
//! workflow, and blocker handling.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use cadence_core::{
    AlertStatus, AlertType, ApprovalStatus, AvailabilityStatus, Dependency, DependencyKind,
    ExternalId, Phase, Program, Project, ReasonCategory, ReportedStatus, Resource, WorkItem,
    WorkStatus,
};
use cadence_notify::LoggingSink;
use cadence_orchestrator::{
    AlertOrchestrator, OrchestratorConfig, OrchestratorError, StatusResponseRequest,
    cascade_preview,
};
use cadence_store::{HolidayCache, ProjectStore};
use cadence_store_memory::MemoryStore;
use cadence_token::TokenSigner;

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

struct Fixture {
    store: Arc<MemoryStore>,
    orchestrator: AlertOrchestrator,
    program_id: Uuid,
    phase_id: Uuid,
    owner: Resource,
    pm: Resource,
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn ProjectStore> = Arc::clone(&store) as Arc<dyn ProjectStore>;

    let pm = store
        .insert_resource(Resource::new(
            ExternalId::from("R-PM"),
            "Priya",
            "priya@example.com",
        ))
        .await
        .unwrap();

    let mut owner = Resource::new(ExternalId::from("R-1"), "Ada", "ada@example.com");
    owner.timezone = "America/New_York".to_owned();
    let owner = store.insert_resource(owner).await.unwrap();

    let mut program = Program::new(ExternalId::from("PROG-1"), "Launch");
    program.pm_resource_id = Some(pm.id);
    let program = store.insert_program(program).await.unwrap();
    let project = store
        .insert_project(Project::new(program.id, ExternalId::from("PROJ-1"), "Core"))
        .await
        .unwrap();
    let phase = store
        .insert_phase(Phase::new(project.id, ExternalId::from("PHS-1"), "Build", 1))
        .await
        .unwrap();

    let holidays = Arc::new(HolidayCache::new(Arc::clone(&dyn_store)));
    let signer = Arc::new(TokenSigner::new("test-secret", "http://localhost:5173"));
    let orchestrator = AlertOrchestrator::new(
        dyn_store,
        holidays,
        signer,
        Arc::new(LoggingSink),
        OrchestratorConfig {
            ops_escalation_email: Some("ops@example.com".to_owned()),
            ..OrchestratorConfig::default()
        },
    );

    Fixture {
        store,
        orchestrator,
        program_id: program.id,
        phase_id: phase.id,
        owner,
        pm,
    }
}

async fn seed_item(fx: &Fixture, ext: &str, start: &str, end: &str) -> WorkItem {
    let mut item = WorkItem::new(
        fx.phase_id,
        ExternalId::from(ext),
        format!("Task {ext}"),
        d(start),
        d(end),
    );
    item.resource_id = Some(fx.owner.id);
    let item_clone = item.clone();
    fx.store.insert_work_items(vec![item]).await.unwrap();
    item_clone
}

// Pull the link out of the alert metadata the way the response form does,
// and extract the raw token from the query string.
async fn magic_link_token(fx: &Fixture, alert_id: Uuid) -> String {
    let alert = fx.store.get_alert(alert_id).await.unwrap().unwrap();
    let link = alert.metadata["magic_link"].as_str().unwrap().to_owned();
    link.split("token=").nth(1).unwrap().to_owned()
}

#[tokio::test]
async fn thursday_scan_finds_friday_deadline() {
    let fx = fixture().await;
    // Friday 2024-02-09 deadline, scan on Thursday 2024-02-08.
    seed_item(&fx, "T-1", "2024-02-05", "2024-02-09").await;

    let pending = fx
        .orchestrator
        .scan_for_pending_status_checks(d("2024-02-08"), 1)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].deadline, d("2024-02-09"));
    assert_eq!(pending[0].resource_name, "Ada");

    // A Wednesday scan does not pick it up.
    let pending = fx
        .orchestrator
        .scan_for_pending_status_checks(d("2024-02-07"), 1)
        .await
        .unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn daily_scan_creates_alert_once() {
    let fx = fixture().await;
    seed_item(&fx, "T-1", "2024-02-05", "2024-02-09").await;

    let summary = fx.orchestrator.run_daily_scan(d("2024-02-08")).await;
    assert_eq!(summary.alerts_created, 1);
    assert!(summary.errors.is_empty());

    // Second run the same day: the existing live alert short-circuits.
    let summary = fx.orchestrator.run_daily_scan(d("2024-02-08")).await;
    assert_eq!(summary.alerts_created, 0);
    assert_eq!(summary.duplicates, 1);
}

#[tokio::test]
async fn delayed_response_requires_approval_and_revokes_token() {
    let fx = fixture().await;
    let item = seed_item(&fx, "T-1", "2024-02-05", "2024-02-09").await;

    // The token expiry hangs off the deadline, so the alert must carry a
    // future one for the link to still verify.
    let deadline = Utc::now().date_naive() + Duration::days(10);
    let creation = fx
        .orchestrator
        .create_status_check_alert(item.id, deadline, fx.owner.id, Some(fx.program_id), 0, None, None)
        .await
        .unwrap();
    assert!(!creation.duplicate);
    assert_eq!(creation.escalation_level, 0);

    let token = magic_link_token(&fx, creation.alert_id).await;
    let outcome = fx
        .orchestrator
        .process_status_response(StatusResponseRequest {
            alert_id: creation.alert_id,
            responder_id: fx.owner.id,
            reported_status: ReportedStatus::Delayed,
            token: Some(token.clone()),
            proposed_new_date: Some(d("2024-02-14")),
            reason_category: Some(ReasonCategory::ScopeIncrease),
            reason_details: Some(serde_json::json!({ "additional_work_percent": 40.0 })),
            comment: None,
            idempotency_key: Some("K1".to_owned()),
        })
        .await
        .unwrap();

    assert!(!outcome.duplicate);
    assert!(outcome.requires_approval);
    assert!(!outcome.auto_approved);
    assert_eq!(outcome.version, 1);
    let impact = outcome.impact.expect("impact digest");
    assert_eq!(impact.delay_days, 5);

    // Response row is the latest; token revoked; alert responded.
    let latest = fx
        .store
        .latest_response_for_work_item(item.id)
        .await
        .unwrap()
        .unwrap();
    assert!(latest.is_latest);
    assert_eq!(latest.approval_status, ApprovalStatus::Pending);

    let token_row = fx
        .store
        .find_token_by_hash(&cadence_token::hash_token(&token))
        .await
        .unwrap()
        .unwrap();
    assert!(token_row.revoked);
    assert_eq!(token_row.used_by_response_id, Some(latest.id));

    let alert = fx.store.get_alert(creation.alert_id).await.unwrap().unwrap();
    assert_eq!(alert.status, AlertStatus::Responded);

    // An APPROVAL_REQUEST alert for the PM exists.
    let chain = fx.store.list_alert_chain(creation.alert_id).await.unwrap();
    let approval = chain
        .iter()
        .find(|a| a.alert_type == AlertType::ApprovalRequest)
        .expect("approval request alert");
    assert_eq!(approval.actual_recipient_id, Some(fx.pm.id));

    // Replaying the same idempotency key returns the original response.
    let replay = fx
        .orchestrator
        .process_status_response(StatusResponseRequest {
            alert_id: creation.alert_id,
            responder_id: fx.owner.id,
            reported_status: ReportedStatus::Delayed,
            token: None,
            proposed_new_date: Some(d("2024-02-14")),
            reason_category: Some(ReasonCategory::ScopeIncrease),
            reason_details: None,
            comment: None,
            idempotency_key: Some("K1".to_owned()),
        })
        .await
        .unwrap();
    assert!(replay.duplicate);
    assert_eq!(replay.response_id, latest.id);

    // Reusing the revoked token is a hard stop.
    let reuse = fx
        .orchestrator
        .process_status_response(StatusResponseRequest {
            alert_id: creation.alert_id,
            responder_id: fx.owner.id,
            reported_status: ReportedStatus::OnTrack,
            token: Some(token),
            proposed_new_date: None,
            reason_category: None,
            reason_details: None,
            comment: None,
            idempotency_key: None,
        })
        .await;
    assert!(matches!(reuse, Err(OrchestratorError::TokenAlreadyUsed { .. })));
}

#[tokio::test]
async fn approving_a_delay_applies_and_cascades() {
    let fx = fixture().await;
    let t1 = seed_item(&fx, "T-1", "2024-02-05", "2024-02-09").await;
    let t2 = seed_item(&fx, "T-2", "2024-02-12", "2024-02-16").await;
    fx.store
        .upsert_dependency(Dependency::new(t1.id, t2.id, DependencyKind::FS, 0))
        .await
        .unwrap();

    let creation = fx
        .orchestrator
        .create_status_check_alert(t1.id, d("2024-02-09"), fx.owner.id, Some(fx.program_id), 0, None, None)
        .await
        .unwrap();

    fx.orchestrator
        .process_status_response(StatusResponseRequest {
            alert_id: creation.alert_id,
            responder_id: fx.owner.id,
            reported_status: ReportedStatus::Delayed,
            token: None,
            proposed_new_date: Some(d("2024-02-14")),
            reason_category: Some(ReasonCategory::TechnicalBlocker),
            reason_details: None,
            comment: None,
            idempotency_key: None,
        })
        .await
        .unwrap();

    let pending = fx.orchestrator.pending_approvals().await.unwrap();
    assert_eq!(pending.len(), 1);
    let response_id = pending[0].response_id;

    let applied = fx
        .orchestrator
        .approve_delay(response_id, fx.pm.id)
        .await
        .unwrap();
    assert_eq!(applied.delay_days, 5);
    assert_eq!(applied.cascaded_tasks, vec![ExternalId::from("T-2")]);

    let t1_after = fx.store.get_work_item(t1.id).await.unwrap().unwrap();
    assert_eq!(t1_after.current_end, d("2024-02-14"));
    let t2_after = fx.store.get_work_item(t2.id).await.unwrap().unwrap();
    assert_eq!(t2_after.current_start, d("2024-02-17"));
    assert_eq!(t2_after.current_end, d("2024-02-21"));

    // Law: after applying, a zero-delay preview cascades nothing.
    let preview = cascade_preview(&*fx.store, t1.id, 0).await.unwrap();
    assert!(preview.is_empty());

    // A second approval attempt is refused.
    let again = fx.orchestrator.approve_delay(response_id, fx.pm.id).await;
    assert!(matches!(again, Err(OrchestratorError::NotPendingApproval(_))));
}

#[tokio::test]
async fn rejecting_a_delay_leaves_dates_alone() {
    let fx = fixture().await;
    let item = seed_item(&fx, "T-1", "2024-02-05", "2024-02-09").await;
    let creation = fx
        .orchestrator
        .create_status_check_alert(item.id, d("2024-02-09"), fx.owner.id, Some(fx.program_id), 0, None, None)
        .await
        .unwrap();

    fx.orchestrator
        .process_status_response(StatusResponseRequest {
            alert_id: creation.alert_id,
            responder_id: fx.owner.id,
            reported_status: ReportedStatus::Delayed,
            token: None,
            proposed_new_date: Some(d("2024-02-20")),
            reason_category: Some(ReasonCategory::Other),
            reason_details: None,
            comment: None,
            idempotency_key: None,
        })
        .await
        .unwrap();

    let pending = fx.orchestrator.pending_approvals().await.unwrap();
    fx.orchestrator
        .reject_delay(pending[0].response_id, fx.pm.id, "hold the date".to_owned())
        .await
        .unwrap();

    let after = fx.store.get_work_item(item.id).await.unwrap().unwrap();
    assert_eq!(after.current_end, d("2024-02-09"));
    let response = fx
        .store
        .get_response(pending[0].response_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.approval_status, ApprovalStatus::Rejected);
    assert_eq!(response.rejection_reason.as_deref(), Some("hold the date"));
}

#[tokio::test]
async fn blocked_response_flags_item_and_alerts_pm() {
    let fx = fixture().await;
    let item = seed_item(&fx, "T-1", "2024-02-05", "2024-02-09").await;
    let creation = fx
        .orchestrator
        .create_status_check_alert(item.id, d("2024-02-09"), fx.owner.id, Some(fx.program_id), 0, None, None)
        .await
        .unwrap();

    let outcome = fx
        .orchestrator
        .process_status_response(StatusResponseRequest {
            alert_id: creation.alert_id,
            responder_id: fx.owner.id,
            reported_status: ReportedStatus::Blocked,
            token: None,
            proposed_new_date: None,
            reason_category: None,
            reason_details: None,
            comment: Some("vendor offline".to_owned()),
            idempotency_key: None,
        })
        .await
        .unwrap();
    assert!(outcome.escalated);

    let after = fx.store.get_work_item(item.id).await.unwrap().unwrap();
    assert!(after.flag_for_review);
    assert_eq!(after.review_message.as_deref(), Some("BLOCKED: vendor offline"));
    assert_eq!(after.status, WorkStatus::NotStarted, "blocked must not change status");

    let chain = fx.store.list_alert_chain(creation.alert_id).await.unwrap();
    let blocker = chain
        .iter()
        .find(|a| a.alert_type == AlertType::BlockerReport)
        .expect("blocker report alert");
    assert_eq!(blocker.urgency, cadence_core::Urgency::Critical);
    assert_eq!(blocker.parent_alert_id, Some(creation.alert_id));
}

#[tokio::test]
async fn completed_response_closes_the_item() {
    let fx = fixture().await;
    let item = seed_item(&fx, "T-1", "2024-02-05", "2024-02-09").await;
    let creation = fx
        .orchestrator
        .create_status_check_alert(item.id, d("2024-02-09"), fx.owner.id, Some(fx.program_id), 0, None, None)
        .await
        .unwrap();

    fx.orchestrator
        .process_status_response(StatusResponseRequest {
            alert_id: creation.alert_id,
            responder_id: fx.owner.id,
            reported_status: ReportedStatus::Completed,
            token: None,
            proposed_new_date: None,
            reason_category: None,
            reason_details: None,
            comment: None,
            idempotency_key: None,
        })
        .await
        .unwrap();

    let after = fx.store.get_work_item(item.id).await.unwrap().unwrap();
    assert_eq!(after.status, WorkStatus::Completed);
    assert!(after.actual_end.is_some());
}

#[tokio::test]
async fn timeout_escalates_to_backup_with_audit_trail() {
    let fx = fixture().await;

    // Give the owner a backup so level 1 resolves.
    let backup = fx
        .store
        .insert_resource(Resource::new(
            ExternalId::from("R-2"),
            "Bao",
            "bao@example.com",
        ))
        .await
        .unwrap();
    let mut owner = fx.store.get_resource(fx.owner.id).await.unwrap().unwrap();
    owner.backup_resource_id = Some(backup.id);
    fx.store.update_resource(owner).await.unwrap();

    let item = seed_item(&fx, "T-1", "2024-02-05", "2024-02-09").await;
    let creation = fx
        .orchestrator
        .create_status_check_alert(item.id, d("2024-02-09"), fx.owner.id, Some(fx.program_id), 0, None, None)
        .await
        .unwrap();

    // Simulate a send 5 hours ago with the default 4h level-0 timeout.
    let sent_at = Utc::now() - Duration::hours(5);
    let mut alert = fx.store.get_alert(creation.alert_id).await.unwrap().unwrap();
    alert.status = AlertStatus::Sent;
    alert.sent_at = Some(sent_at);
    alert.escalation_timeout_at = Some(sent_at + Duration::hours(4));
    fx.store.update_alert(alert).await.unwrap();

    let events = fx
        .orchestrator
        .check_and_escalate_timeouts(Utc::now())
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].from_level, 0);
    assert_eq!(events[0].to_level, 1);
    assert_eq!(events[0].new_recipient, "Bao");

    let original = fx.store.get_alert(creation.alert_id).await.unwrap().unwrap();
    assert_eq!(original.status, AlertStatus::Expired);

    let new_alert = fx.store.get_alert(events[0].new_alert_id).await.unwrap().unwrap();
    assert_eq!(new_alert.parent_alert_id, Some(creation.alert_id));
    assert_eq!(new_alert.escalation_level, 1);
    assert_eq!(new_alert.actual_recipient_id, Some(backup.id));

    let summary = fx
        .orchestrator
        .escalation_summary(creation.alert_id)
        .await
        .unwrap();
    assert_eq!(summary.escalation_count, 1);
    assert_eq!(summary.current_level, 1);
}

#[tokio::test]
async fn unavailable_chain_routes_to_pm_lookup() {
    let fx = fixture().await;
    let mut owner = fx.store.get_resource(fx.owner.id).await.unwrap().unwrap();
    owner.availability_status = AvailabilityStatus::OnLeave;
    fx.store.update_resource(owner).await.unwrap();

    let item = seed_item(&fx, "T-1", "2024-02-05", "2024-02-09").await;
    let creation = fx
        .orchestrator
        .create_status_check_alert(item.id, d("2024-02-09"), fx.owner.id, Some(fx.program_id), 0, None, None)
        .await
        .unwrap();

    // The program PM is active, so the chain resolves at level 3 rather
    // than the no-recipient path.
    assert_eq!(creation.escalation_level, 3);
    assert_eq!(creation.recipient_name, "Priya");
    assert!(!creation.requires_manual_intervention);
    assert_eq!(creation.skipped_recipients, 1);
}

#[tokio::test]
async fn queue_drain_sends_and_marks_alerts() {
    let fx = fixture().await;
    let item = seed_item(&fx, "T-1", "2024-02-05", "2024-02-09").await;
    fx.orchestrator
        .create_status_check_alert(item.id, d("2024-02-09"), fx.owner.id, Some(fx.program_id), 0, None, None)
        .await
        .unwrap();

    // Drain well after the scheduled send time.
    let summary = fx
        .orchestrator
        .drain_queue(Utc::now() + Duration::days(30))
        .await
        .unwrap();
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 0);

    let alert = fx
        .store
        .find_live_alert(item.id, d("2024-02-09"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alert.status, AlertStatus::Sent);
    assert!(alert.sent_at.is_some());

    // Nothing left to drain.
    let summary = fx
        .orchestrator
        .drain_queue(Utc::now() + Duration::days(30))
        .await
        .unwrap();
    assert_eq!(summary.sent, 0);
}
