//! End-to-end import flows against the in-memory store: initial import,
//! re-import idempotence, progressive elaboration, and the ghost check.

use std::sync::Arc;

use chrono::NaiveDate;

use cadence_core::{DependencyKind, ExternalId, WorkStatus};
use cadence_ingest::{
    DependencyRow, ImportOptions, ImportPipeline, ImportStatus, ParsedPlan, ProgramRow,
    ResourceRow, WorkItemRow,
};
use cadence_store::{HolidayCache, ProjectStore};
use cadence_store_memory::MemoryStore;

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn work_item_row(ext: &str, start: &str, end: &str) -> WorkItemRow {
    WorkItemRow {
        row_num: 2,
        external_id: ExternalId::from(ext),
        name: format!("Task {ext}"),
        project_external_id: ExternalId::from("PROJ-1"),
        project_name: Some("Core".to_owned()),
        phase_external_id: ExternalId::from("PHS-1"),
        phase_name: Some("Build".to_owned()),
        phase_sequence: Some(1),
        planned_start: d(start),
        planned_end: d(end),
        planned_effort_hours: None,
        allocation_percent: None,
        assigned_resource: Some(ExternalId::from("R-1")),
        complexity: None,
        revenue_impact: None,
        strategic_importance: None,
        customer_impact: None,
        is_critical_launch: false,
        feature_name: None,
    }
}

fn resource_row(ext: &str, email: &str) -> ResourceRow {
    ResourceRow {
        row_num: 2,
        external_id: ExternalId::from(ext),
        name: format!("Resource {ext}"),
        email: email.to_owned(),
        notification_email: None,
        role: None,
        backup_external_id: None,
        manager_external_id: None,
        timezone: None,
        max_utilization: None,
        chat_user_id: None,
    }
}

fn two_task_plan() -> ParsedPlan {
    ParsedPlan {
        program: ProgramRow {
            external_id: ExternalId::from("PROG-1"),
            name: "Launch".to_owned(),
        },
        resources: vec![resource_row("R-1", "owner@example.com")],
        work_items: vec![
            work_item_row("T-1", "2024-02-05", "2024-02-09"),
            work_item_row("T-2", "2024-02-12", "2024-02-16"),
        ],
        dependencies: vec![DependencyRow {
            row_num: 2,
            successor_external_id: ExternalId::from("T-2"),
            predecessor_external_id: ExternalId::from("T-1"),
            kind: DependencyKind::FS,
            lag_days: 0,
        }],
    }
}

fn pipeline(store: &Arc<MemoryStore>) -> ImportPipeline {
    let store: Arc<dyn ProjectStore> = Arc::clone(store) as Arc<dyn ProjectStore>;
    let holidays = Arc::new(HolidayCache::new(Arc::clone(&store)));
    ImportPipeline::new(store, holidays, "US")
}

fn options(name: &str) -> ImportOptions {
    ImportOptions {
        file_name: name.to_owned(),
        file_hash: format!("hash-{name}"),
        ..ImportOptions::default()
    }
}

async fn find_item(store: &MemoryStore, program_id: uuid::Uuid, ext: &str) -> cadence_core::WorkItem {
    store
        .list_work_items_by_program(program_id)
        .await
        .unwrap()
        .into_iter()
        .find(|i| i.external_id.as_str() == ext)
        .unwrap_or_else(|| panic!("work item {ext} not found"))
}

#[tokio::test]
async fn initial_import_creates_hierarchy_and_critical_path() {
    let store = Arc::new(MemoryStore::new());
    let report = pipeline(&store).run(&two_task_plan(), &options("plan-v1.xlsx")).await;

    assert_eq!(report.status, ImportStatus::Success);
    assert_eq!(report.tasks_created, 2);
    assert_eq!(report.dependencies_synced, 1);
    assert_eq!(report.resources_synced, 1);
    assert_eq!(report.project_end_date, Some(d("2024-02-16")));

    let mut critical: Vec<String> = report.critical_path.iter().map(ToString::to_string).collect();
    critical.sort();
    assert_eq!(critical, vec!["T-1".to_owned(), "T-2".to_owned()]);

    let program_id = report.program_id.unwrap();
    let t1 = find_item(&store, program_id, "T-1").await;
    assert_eq!(t1.current_start, d("2024-02-05"));
    assert_eq!(t1.status, WorkStatus::NotStarted);
    assert!(t1.is_critical_path);

    // Batch record closed out.
    let batches = store.list_import_batches(program_id).await.unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].status, cadence_core::ImportBatchStatus::Completed);
}

#[tokio::test]
async fn reimporting_the_same_plan_changes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let p = pipeline(&store);
    p.run(&two_task_plan(), &options("plan-v1.xlsx")).await;
    let second = p.run(&two_task_plan(), &options("plan-v1b.xlsx")).await;

    assert_eq!(second.status, ImportStatus::Success);
    assert_eq!(second.tasks_created, 0);
    assert_eq!(second.tasks_updated, 0);
    assert_eq!(second.tasks_cancelled, 0);
    assert_eq!(second.tasks_preserved, 2);
}

#[tokio::test]
async fn progressive_elaboration_extends_baseline_and_preserves_truth() {
    let store = Arc::new(MemoryStore::new());
    let p = pipeline(&store);
    let first = p.run(&two_task_plan(), &options("plan-v1.xlsx")).await;
    let program_id = first.program_id.unwrap();

    // T-1 is now in progress.
    let mut t1 = find_item(&store, program_id, "T-1").await;
    t1.status = WorkStatus::InProgress;
    t1.completion_percent = 30;
    t1.actual_start = Some(d("2024-02-05"));
    store.update_work_item(t1).await.unwrap();

    // Reimport with T-1's end moved out to the following Wednesday.
    let mut plan = two_task_plan();
    plan.work_items[0].planned_end = d("2024-02-14");
    let report = p.run(&plan, &options("plan-v2.xlsx")).await;

    assert_eq!(report.tasks_updated, 1);
    assert!(
        report
            .warnings
            .iter()
            .any(|w| w.contains("later than the current end")),
        "expected a baseline-vs-current warning, got {:?}",
        report.warnings
    );

    let t1 = find_item(&store, program_id, "T-1").await;
    assert_eq!(t1.planned_end, d("2024-02-14"));
    // Recalculation extended the forecast; truth preserved.
    assert_eq!(t1.current_end, d("2024-02-14"));
    assert_eq!(t1.status, WorkStatus::InProgress);
    assert_eq!(t1.completion_percent, 30);
    assert_eq!(t1.actual_start, Some(d("2024-02-05")));

    // Calendar-day FS propagation pushes the successor to Thursday.
    let t2 = find_item(&store, program_id, "T-2").await;
    assert_eq!(t2.current_start, d("2024-02-15"));
}

#[tokio::test]
async fn ghost_check_cancels_unstarted_and_flags_in_progress() {
    let store = Arc::new(MemoryStore::new());
    let p = pipeline(&store);
    let first = p.run(&two_task_plan(), &options("plan-v1.xlsx")).await;
    let program_id = first.program_id.unwrap();

    // Reimport without T-2 while it is still NotStarted: cancelled.
    let mut plan = two_task_plan();
    plan.work_items.retain(|i| i.external_id.as_str() != "T-2");
    plan.dependencies.clear();
    let report = p.run(&plan, &options("plan-v2.xlsx")).await;
    assert_eq!(report.tasks_cancelled, 1);

    let t2 = find_item(&store, program_id, "T-2").await;
    assert_eq!(t2.status, WorkStatus::Cancelled);
    assert!(t2.cancellation_reason.is_some());

    // Revive the scenario with an in-progress item: flagged, not cancelled.
    let mut t2 = t2;
    t2.status = WorkStatus::InProgress;
    t2.completion_percent = 40;
    t2.flag_for_review = false;
    t2.cancellation_reason = None;
    store.update_work_item(t2).await.unwrap();

    let report = p.run(&plan, &options("plan-v3.xlsx")).await;
    assert_eq!(report.tasks_cancelled, 0);
    assert_eq!(report.tasks_flagged, 1);

    let t2 = find_item(&store, program_id, "T-2").await;
    assert_eq!(t2.status, WorkStatus::InProgress, "ghost check must never cancel in-progress work");
    assert!(t2.flag_for_review);
    let message = t2.review_message.unwrap();
    assert!(message.contains("40%"), "review message should quote completion: {message}");
}

#[tokio::test]
async fn validation_failure_writes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let mut plan = two_task_plan();
    plan.work_items[0].planned_end = d("2024-01-01");

    let report = pipeline(&store).run(&plan, &options("broken.xlsx")).await;
    assert_eq!(report.status, ImportStatus::ValidationFailed);
    assert!(!report.validation.errors.is_empty());

    // No program, no batch, no items.
    assert!(
        store
            .find_program_by_external_id(&ExternalId::from("PROG-1"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn dry_run_validates_without_writing() {
    let store = Arc::new(MemoryStore::new());
    let mut opts = options("plan-v1.xlsx");
    opts.dry_run = true;

    let report = pipeline(&store).run(&two_task_plan(), &opts).await;
    assert_eq!(report.status, ImportStatus::Success);
    assert_eq!(report.tasks_created, 0);
    assert!(
        store
            .find_program_by_external_id(&ExternalId::from("PROG-1"))
            .await
            .unwrap()
            .is_none()
    );
}
