use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use cadence_core::ExternalId;

use crate::rows::ParsedPlan;

/// Loose structural email check; deliverability is the transport's problem.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid")
});

/// Share of dependency-less tasks above which the plan draws a warning.
const ORPHAN_WARNING_RATIO: f64 = 0.2;

/// A single validation finding, anchored to a source row and field.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub row: usize,
    pub field: String,
    pub value: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(
        row: usize,
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            row,
            field: field.into(),
            value: value.into(),
            message: message.into(),
        }
    }
}

/// Outcome of the validation pass.
///
/// Errors block the import; warnings annotate it but let it continue.
/// Running the pass twice on identical input yields the same sets.
#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub duplicate_external_ids: Vec<ExternalId>,
    /// First dependency cycle found, as external ids.
    pub circular_dependency: Option<Vec<ExternalId>>,
    pub over_allocated_resources: Vec<ExternalId>,
    pub orphaned_tasks: Vec<ExternalId>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(
        &mut self,
        row: usize,
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.errors.push(ValidationIssue::new(row, field, value, message));
    }

    fn warning(
        &mut self,
        row: usize,
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.warnings
            .push(ValidationIssue::new(row, field, value, message));
    }
}

/// Pass 2: validate a parsed plan. Pure — no store access, no writes.
#[must_use]
pub fn validate_plan(plan: &ParsedPlan) -> ValidationReport {
    let mut report = ValidationReport::default();

    validate_work_items(plan, &mut report);
    validate_resources(plan, &mut report);
    validate_dependencies(plan, &mut report);
    check_duplicate_external_ids(plan, &mut report);
    check_circular_dependencies(plan, &mut report);
    check_resource_allocation(plan, &mut report);
    check_orphaned_tasks(plan, &mut report);

    report
}

fn validate_work_items(plan: &ParsedPlan, report: &mut ValidationReport) {
    for item in &plan.work_items {
        if item.external_id.as_str().trim().is_empty() {
            report.error(item.row_num, "external_id", "", "required field 'external_id' is missing");
        }
        if item.name.trim().is_empty() {
            report.error(item.row_num, "name", "", "required field 'name' is missing");
        }
        if item.phase_external_id.as_str().trim().is_empty() {
            report.error(item.row_num, "phase_external_id", "", "required field 'phase_external_id' is missing");
        }

        if item.planned_end < item.planned_start {
            report.error(
                item.row_num,
                "planned_end",
                item.planned_end.to_string(),
                format!(
                    "end date ({}) cannot be before start date ({})",
                    item.planned_end, item.planned_start
                ),
            );
        }

        if let Some(allocation) = item.allocation_percent
            && !(0..=100).contains(&allocation)
        {
            report.error(
                item.row_num,
                "allocation_percent",
                allocation.to_string(),
                format!("allocation must be between 0-100%, got {allocation}%"),
            );
        }
    }
}

fn validate_resources(plan: &ParsedPlan, report: &mut ValidationReport) {
    for resource in &plan.resources {
        if resource.external_id.as_str().trim().is_empty() {
            report.error(resource.row_num, "external_id", "", "required field 'external_id' is missing");
        }
        if resource.name.trim().is_empty() {
            report.error(resource.row_num, "name", "", "required field 'name' is missing");
        }
        if resource.email.trim().is_empty() {
            report.error(resource.row_num, "email", "", "required field 'email' is missing");
        } else if !EMAIL_RE.is_match(resource.email.trim()) {
            report.error(
                resource.row_num,
                "email",
                resource.email.clone(),
                format!("invalid email address: {}", resource.email),
            );
        }
    }
}

fn validate_dependencies(plan: &ParsedPlan, report: &mut ValidationReport) {
    let known: HashSet<&ExternalId> = plan.work_items.iter().map(|i| &i.external_id).collect();

    for dep in &plan.dependencies {
        if dep.successor_external_id == dep.predecessor_external_id {
            report.error(
                dep.row_num,
                "predecessor_external_id",
                dep.predecessor_external_id.to_string(),
                format!("task {} cannot depend on itself", dep.successor_external_id),
            );
            continue;
        }
        for (field, id) in [
            ("successor_external_id", &dep.successor_external_id),
            ("predecessor_external_id", &dep.predecessor_external_id),
        ] {
            if !known.contains(id) {
                report.error(
                    dep.row_num,
                    field,
                    id.to_string(),
                    format!("dependency references unknown task {id}"),
                );
            }
        }
    }
}

fn check_duplicate_external_ids(plan: &ParsedPlan, report: &mut ValidationReport) {
    let mut seen: HashMap<&ExternalId, usize> = HashMap::new();
    for item in &plan.work_items {
        if let Some(&first_row) = seen.get(&item.external_id) {
            if !report.duplicate_external_ids.contains(&item.external_id) {
                report.duplicate_external_ids.push(item.external_id.clone());
            }
            report.error(
                item.row_num,
                "external_id",
                item.external_id.to_string(),
                format!(
                    "duplicate external id {} (first seen at row {first_row})",
                    item.external_id
                ),
            );
        } else {
            seen.insert(&item.external_id, item.row_num);
        }
    }
}

/// DFS with an explicit recursion stack over the in-batch dependency graph.
fn check_circular_dependencies(plan: &ParsedPlan, report: &mut ValidationReport) {
    let mut successors: HashMap<&ExternalId, Vec<&ExternalId>> = HashMap::new();
    for dep in &plan.dependencies {
        successors
            .entry(&dep.predecessor_external_id)
            .or_default()
            .push(&dep.successor_external_id);
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InStack,
        Done,
    }

    let mut marks: HashMap<&ExternalId, Mark> = plan
        .work_items
        .iter()
        .map(|i| (&i.external_id, Mark::Unvisited))
        .collect();

    for start in plan.work_items.iter().map(|i| &i.external_id) {
        if marks.get(start) != Some(&Mark::Unvisited) {
            continue;
        }
        let mut stack: Vec<(&ExternalId, usize)> = vec![(start, 0)];
        marks.insert(start, Mark::InStack);

        loop {
            let Some(&(node, child_idx)) = stack.last() else {
                break;
            };
            let children = successors.get(node).map_or(&[][..], Vec::as_slice);
            if child_idx < children.len() {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                let child = children[child_idx];
                match marks.get(child) {
                    Some(Mark::InStack) => {
                        let mut path: Vec<ExternalId> = stack
                            .iter()
                            .map(|(id, _)| (*id).clone())
                            .skip_while(|id| id != child)
                            .collect();
                        path.push(child.clone());
                        let description = path
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(" -> ");
                        report.error(
                            0,
                            "dependencies",
                            description.clone(),
                            format!("circular dependency detected: {description}"),
                        );
                        report.circular_dependency = Some(path);
                        return;
                    }
                    Some(Mark::Unvisited) => {
                        marks.insert(child, Mark::InStack);
                        stack.push((child, 0));
                    }
                    _ => {}
                }
            } else {
                marks.insert(node, Mark::Done);
                stack.pop();
            }
        }
    }
}

/// Warning-only: a resource whose summed allocation across the plan exceeds
/// 100% is probably over-committed, but planners sometimes do this on
/// purpose.
fn check_resource_allocation(plan: &ParsedPlan, report: &mut ValidationReport) {
    let mut totals: HashMap<&ExternalId, i32> = HashMap::new();
    for item in &plan.work_items {
        if let Some(ref resource) = item.assigned_resource {
            *totals.entry(resource).or_default() += item.allocation_percent.unwrap_or(100);
        }
    }
    for (resource, total) in totals {
        if total > 100 {
            report.over_allocated_resources.push(resource.clone());
            report.warning(
                0,
                "allocation_percent",
                total.to_string(),
                format!("resource {resource} is allocated {total}% across this plan"),
            );
        }
    }
}

/// Warning-only: a plan where a fifth of the tasks have no dependencies at
/// all usually means the dependency sheet was not filled in.
fn check_orphaned_tasks(plan: &ParsedPlan, report: &mut ValidationReport) {
    if plan.work_items.is_empty() {
        return;
    }
    let mut connected: HashSet<&ExternalId> = HashSet::new();
    for dep in &plan.dependencies {
        connected.insert(&dep.successor_external_id);
        connected.insert(&dep.predecessor_external_id);
    }
    let orphans: Vec<ExternalId> = plan
        .work_items
        .iter()
        .filter(|i| !connected.contains(&i.external_id))
        .map(|i| i.external_id.clone())
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let ratio = orphans.len() as f64 / plan.work_items.len() as f64;
    if ratio >= ORPHAN_WARNING_RATIO && !orphans.is_empty() {
        report.warning(
            0,
            "dependencies",
            orphans.len().to_string(),
            format!(
                "{} of {} tasks have no dependencies; dependency data may be incomplete",
                orphans.len(),
                plan.work_items.len()
            ),
        );
        report.orphaned_tasks = orphans;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::{DependencyRow, ProgramRow, ResourceRow, WorkItemRow};
    use cadence_core::DependencyKind;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn work_item(row: usize, ext: &str, start: &str, end: &str) -> WorkItemRow {
        WorkItemRow {
            row_num: row,
            external_id: ExternalId::from(ext),
            name: format!("Task {ext}"),
            project_external_id: ExternalId::from("PROJ-1"),
            project_name: None,
            phase_external_id: ExternalId::from("PHS-1"),
            phase_name: None,
            phase_sequence: None,
            planned_start: d(start),
            planned_end: d(end),
            planned_effort_hours: None,
            allocation_percent: None,
            assigned_resource: None,
            complexity: None,
            revenue_impact: None,
            strategic_importance: None,
            customer_impact: None,
            is_critical_launch: false,
            feature_name: None,
        }
    }

    fn dependency(succ: &str, pred: &str) -> DependencyRow {
        DependencyRow {
            row_num: 2,
            successor_external_id: ExternalId::from(succ),
            predecessor_external_id: ExternalId::from(pred),
            kind: DependencyKind::FS,
            lag_days: 0,
        }
    }

    fn plan(items: Vec<WorkItemRow>, deps: Vec<DependencyRow>) -> ParsedPlan {
        ParsedPlan {
            program: ProgramRow {
                external_id: ExternalId::from("PROG-1"),
                name: "Launch".to_owned(),
            },
            resources: Vec::new(),
            work_items: items,
            dependencies: deps,
        }
    }

    #[test]
    fn valid_plan_passes() {
        let p = plan(
            vec![
                work_item(2, "T-1", "2024-02-05", "2024-02-09"),
                work_item(3, "T-2", "2024-02-12", "2024-02-16"),
            ],
            vec![dependency("T-2", "T-1")],
        );
        let report = validate_plan(&p);
        assert!(report.is_valid(), "unexpected errors: {:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn end_before_start_is_an_error() {
        let p = plan(vec![work_item(2, "T-1", "2024-02-09", "2024-02-05")], vec![]);
        let report = validate_plan(&p);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].field, "planned_end");
    }

    #[test]
    fn allocation_out_of_bounds_is_an_error() {
        let mut item = work_item(2, "T-1", "2024-02-05", "2024-02-09");
        item.allocation_percent = Some(150);
        let report = validate_plan(&plan(vec![item], vec![]));
        assert!(report.errors.iter().any(|e| e.field == "allocation_percent"));
    }

    #[test]
    fn malformed_email_is_an_error() {
        let mut p = plan(vec![work_item(2, "T-1", "2024-02-05", "2024-02-09")], vec![]);
        p.resources.push(ResourceRow {
            row_num: 2,
            external_id: ExternalId::from("R-1"),
            name: "Ada".to_owned(),
            email: "not-an-email".to_owned(),
            notification_email: None,
            role: None,
            backup_external_id: None,
            manager_external_id: None,
            timezone: None,
            max_utilization: None,
            chat_user_id: None,
        });
        let report = validate_plan(&p);
        assert!(report.errors.iter().any(|e| e.field == "email"));
    }

    #[test]
    fn self_dependency_is_an_error() {
        let p = plan(
            vec![work_item(2, "T-1", "2024-02-05", "2024-02-09")],
            vec![dependency("T-1", "T-1")],
        );
        let report = validate_plan(&p);
        assert!(report.errors.iter().any(|e| e.message.contains("depend on itself")));
    }

    #[test]
    fn unresolved_dependency_reference_is_an_error() {
        let p = plan(
            vec![work_item(2, "T-1", "2024-02-05", "2024-02-09")],
            vec![dependency("T-1", "T-9")],
        );
        let report = validate_plan(&p);
        assert!(report.errors.iter().any(|e| e.message.contains("unknown task T-9")));
    }

    #[test]
    fn cycle_is_detected_with_path() {
        let p = plan(
            vec![
                work_item(2, "T-1", "2024-02-05", "2024-02-09"),
                work_item(3, "T-2", "2024-02-12", "2024-02-16"),
                work_item(4, "T-3", "2024-02-19", "2024-02-23"),
            ],
            vec![
                dependency("T-2", "T-1"),
                dependency("T-3", "T-2"),
                dependency("T-1", "T-3"),
            ],
        );
        let report = validate_plan(&p);
        assert!(!report.is_valid());
        let cycle = report.circular_dependency.expect("cycle path");
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.len() == 4);
    }

    #[test]
    fn duplicate_external_ids_are_errors() {
        let p = plan(
            vec![
                work_item(2, "T-1", "2024-02-05", "2024-02-09"),
                work_item(3, "T-1", "2024-02-12", "2024-02-16"),
            ],
            vec![],
        );
        let report = validate_plan(&p);
        assert!(!report.is_valid());
        assert_eq!(report.duplicate_external_ids, vec![ExternalId::from("T-1")]);
    }

    #[test]
    fn over_allocation_is_warning_only() {
        let mut a = work_item(2, "T-1", "2024-02-05", "2024-02-09");
        let mut b = work_item(3, "T-2", "2024-02-05", "2024-02-09");
        a.assigned_resource = Some(ExternalId::from("R-1"));
        a.allocation_percent = Some(80);
        b.assigned_resource = Some(ExternalId::from("R-1"));
        b.allocation_percent = Some(60);
        let report = validate_plan(&plan(vec![a, b], vec![dependency("T-2", "T-1")]));
        assert!(report.is_valid());
        assert_eq!(report.over_allocated_resources, vec![ExternalId::from("R-1")]);
    }

    #[test]
    fn validation_is_idempotent() {
        let p = plan(
            vec![
                work_item(2, "T-1", "2024-02-09", "2024-02-05"),
                work_item(3, "T-1", "2024-02-12", "2024-02-16"),
            ],
            vec![dependency("T-1", "T-9")],
        );
        let first = validate_plan(&p);
        let second = validate_plan(&p);
        assert_eq!(first.errors.len(), second.errors.len());
        assert_eq!(first.warnings.len(), second.warnings.len());
    }
}
