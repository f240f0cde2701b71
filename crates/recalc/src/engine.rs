use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use cadence_core::{BusinessCalendar, ExternalId};
use cadence_store::ProjectStore;

use crate::cpm::compute_schedule;
use crate::propagate::{propagate_dates, resolve_baseline_conflicts};
use crate::RecalcError;

/// Outcome of a program recalculation.
#[derive(Debug, Default)]
pub struct RecalcResult {
    pub work_items_updated: usize,
    pub critical_path_items: Vec<ExternalId>,
    pub min_slack_days: i64,
    pub max_slack_days: i64,
    pub project_end_date: Option<NaiveDate>,
    pub warnings: Vec<String>,
    pub execution_time_ms: u128,
}

/// Recomputes slack, critical path, and forecast dates for a program.
pub struct RecalculationEngine {
    store: Arc<dyn ProjectStore>,
}

impl RecalculationEngine {
    #[must_use]
    pub fn new(store: Arc<dyn ProjectStore>) -> Self {
        Self { store }
    }

    /// Run the full pipeline for one program: cycle check, baseline-conflict
    /// resolution, forward date propagation, CPM passes, and persistence of
    /// every item whose dates or schedule attributes changed.
    pub async fn recalculate_program(
        &self,
        program_id: Uuid,
        calendar: &BusinessCalendar,
    ) -> Result<RecalcResult, RecalcError> {
        let started = Instant::now();
        let mut result = RecalcResult::default();

        let mut items = self.store.list_work_items_by_program(program_id).await?;
        let deps = self.store.list_dependencies_by_program(program_id).await?;

        if items.is_empty() {
            result.warnings.push("no work items to recalculate".to_owned());
            result.execution_time_ms = started.elapsed().as_millis();
            return Ok(result);
        }

        let mut changed: HashSet<Uuid> = HashSet::new();

        changed.extend(resolve_baseline_conflicts(&mut items));
        changed.extend(propagate_dates(&mut items, &deps));

        // The schedule pass also performs the cycle check and refuses to
        // proceed on a cyclic graph.
        let schedule = compute_schedule(&items, &deps, calendar)?;

        let mut min_slack = i64::MAX;
        let mut max_slack = i64::MIN;
        for entry in &schedule {
            min_slack = min_slack.min(entry.total_float);
            max_slack = max_slack.max(entry.total_float);
            result.project_end_date = Some(
                result
                    .project_end_date
                    .map_or(entry.early_finish, |end| end.max(entry.early_finish)),
            );

            let Some(item) = items.iter_mut().find(|i| i.id == entry.work_item_id) else {
                continue;
            };
            if item.is_critical_path != entry.is_critical
                || item.slack_days != Some(entry.total_float)
            {
                item.is_critical_path = entry.is_critical;
                item.slack_days = Some(entry.total_float);
                changed.insert(item.id);
            }
            if entry.is_critical {
                result.critical_path_items.push(item.external_id.clone());
            }
        }
        result.min_slack_days = if min_slack == i64::MAX { 0 } else { min_slack };
        result.max_slack_days = if max_slack == i64::MIN { 0 } else { max_slack };

        let to_update: Vec<_> = items
            .iter()
            .filter(|i| changed.contains(&i.id))
            .cloned()
            .collect();
        result.work_items_updated = to_update.len();
        if !to_update.is_empty() {
            debug!(program_id = %program_id, count = to_update.len(), "persisting recalculated items");
            self.store.update_work_items(to_update).await?;
        }

        result.execution_time_ms = started.elapsed().as_millis();
        info!(
            program_id = %program_id,
            updated = result.work_items_updated,
            critical = result.critical_path_items.len(),
            elapsed_ms = result.execution_time_ms,
            "recalculation complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{Dependency, DependencyKind, Phase, Program, Project, WorkItem};
    use cadence_store_memory::MemoryStore;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    async fn seed_two_task_program(store: &MemoryStore) -> (Uuid, Uuid, Uuid) {
        let program = store
            .insert_program(Program::new(ExternalId::from("PROG-1"), "Launch"))
            .await
            .unwrap();
        let project = store
            .insert_project(Project::new(program.id, ExternalId::from("PROJ-1"), "Core"))
            .await
            .unwrap();
        let phase = store
            .insert_phase(Phase::new(project.id, ExternalId::from("PHS-1"), "Build", 1))
            .await
            .unwrap();

        let t1 = WorkItem::new(
            phase.id,
            ExternalId::from("T-1"),
            "Design",
            d("2024-02-05"),
            d("2024-02-09"),
        );
        let t2 = WorkItem::new(
            phase.id,
            ExternalId::from("T-2"),
            "Build",
            d("2024-02-12"),
            d("2024-02-16"),
        );
        let (t1_id, t2_id) = (t1.id, t2.id);
        store.insert_work_items(vec![t1, t2]).await.unwrap();
        store
            .upsert_dependency(Dependency::new(t1_id, t2_id, DependencyKind::FS, 0))
            .await
            .unwrap();
        (program.id, t1_id, t2_id)
    }

    #[tokio::test]
    async fn weekend_handoff_chain_is_critical_end_to_end() {
        let store = Arc::new(MemoryStore::new());
        let (program_id, t1_id, t2_id) = seed_two_task_program(&store).await;

        let engine = RecalculationEngine::new(store.clone());
        let cal = BusinessCalendar::weekends_only();
        let result = engine.recalculate_program(program_id, &cal).await.unwrap();

        let mut critical: Vec<String> = result
            .critical_path_items
            .iter()
            .map(ToString::to_string)
            .collect();
        critical.sort();
        assert_eq!(critical, vec!["T-1".to_owned(), "T-2".to_owned()]);
        assert_eq!(result.project_end_date, Some(d("2024-02-16")));
        assert_eq!(result.min_slack_days, 0);

        let t1 = store.get_work_item(t1_id).await.unwrap().unwrap();
        let t2 = store.get_work_item(t2_id).await.unwrap().unwrap();
        assert!(t1.is_critical_path && t2.is_critical_path);
        assert_eq!(t1.slack_days, Some(0));
        assert_eq!(t2.slack_days, Some(0));
    }

    #[tokio::test]
    async fn replanned_predecessor_cascades_into_successor() {
        let store = Arc::new(MemoryStore::new());
        let (program_id, t1_id, t2_id) = seed_two_task_program(&store).await;

        // Progressive elaboration: T-1's baseline end moves to Wednesday the
        // following week while it is already in progress.
        let mut t1 = store.get_work_item(t1_id).await.unwrap().unwrap();
        t1.planned_end = d("2024-02-14");
        t1.status = cadence_core::WorkStatus::InProgress;
        t1.completion_percent = 30;
        t1.actual_start = Some(d("2024-02-05"));
        store.update_work_item(t1).await.unwrap();

        let engine = RecalculationEngine::new(store.clone());
        let cal = BusinessCalendar::weekends_only();
        engine.recalculate_program(program_id, &cal).await.unwrap();

        let t1 = store.get_work_item(t1_id).await.unwrap().unwrap();
        let t2 = store.get_work_item(t2_id).await.unwrap().unwrap();
        // Conflict resolution extended the end but preserved the started
        // item's start and actuals.
        assert_eq!(t1.current_end, d("2024-02-14"));
        assert_eq!(t1.current_start, d("2024-02-05"));
        assert_eq!(t1.actual_start, Some(d("2024-02-05")));
        // Calendar-day FS propagation: Wednesday end pushes the successor to
        // Thursday.
        assert_eq!(t2.current_start, d("2024-02-15"));
    }

    #[tokio::test]
    async fn cycle_refuses_recalculation() {
        let store = Arc::new(MemoryStore::new());
        let (program_id, t1_id, t2_id) = seed_two_task_program(&store).await;
        store
            .upsert_dependency(Dependency::new(t2_id, t1_id, DependencyKind::FS, 0))
            .await
            .unwrap();

        let engine = RecalculationEngine::new(store);
        let cal = BusinessCalendar::weekends_only();
        let err = engine
            .recalculate_program(program_id, &cal)
            .await
            .unwrap_err();
        assert!(matches!(err, RecalcError::DependencyCycle { .. }));
    }
}
