use std::collections::{HashSet, VecDeque};
use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cadence_core::{
    AffectedItemRef, ExternalId, ImpactSummary, ReasonCategory, WorkItem,
};
use cadence_store::{ProjectStore, StoreError};

use crate::OrchestratorError;

/// Hard cap on the cascade preview; a delay touching more than this many
/// downstream items needs a human, not a longer list.
pub const CASCADE_PREVIEW_CAP: usize = 100;

/// Caller-supplied numbers that refine the duration math for some reasons.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReasonDetails {
    /// SCOPE_INCREASE: percent of additional work discovered.
    #[serde(default)]
    pub additional_work_percent: Option<f64>,
    /// RESOURCE_PULLED: percent of the owner's effort still available.
    #[serde(default)]
    pub available_effort_percent: Option<f64>,
}

/// Risk grading of a proposed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// New window for a work item after reason-aware duration recalculation.
#[derive(Debug, Clone, Serialize)]
pub struct DurationRecalculation {
    pub new_start: NaiveDate,
    pub new_end: NaiveDate,
    pub new_duration_days: i64,
    pub original_duration_days: i64,
    pub extension_days: i64,
    pub calculation_method: &'static str,
    pub explanation: String,
}

/// One downstream item in the cascade preview.
#[derive(Debug, Clone, Serialize)]
pub struct CascadeItem {
    pub work_item_id: Uuid,
    pub external_id: ExternalId,
    pub name: String,
    pub current_start: NaiveDate,
    pub current_end: NaiveDate,
    pub new_start: NaiveDate,
    pub new_end: NaiveDate,
    pub slip_days: i64,
    pub depth: usize,
}

/// Over-allocation found when the proposed window overlaps the owner's
/// other work.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceConflict {
    pub resource_id: Uuid,
    pub resource_name: String,
    pub total_allocation: i32,
    pub max_utilization: i32,
    pub over_by: i32,
    pub overlapping_tasks: Vec<ExternalId>,
}

/// Full impact analysis for a proposed new end date.
#[derive(Debug, Clone, Serialize)]
pub struct ImpactReport {
    pub work_item_id: Uuid,
    pub work_item_name: String,
    pub original_end: NaiveDate,
    pub proposed_end: NaiveDate,
    pub delay_days: i64,
    pub reason_category: ReasonCategory,
    pub recalculation: DurationRecalculation,
    pub affected_items: Vec<CascadeItem>,
    pub cascade_count: usize,
    pub is_critical_path: bool,
    pub critical_path_impact: Option<String>,
    pub resource_conflicts: Vec<ResourceConflict>,
    pub risk_level: RiskLevel,
    pub recommendation: String,
}

impl ImpactReport {
    /// Compact digest stored on the response row.
    #[must_use]
    pub fn summary(&self) -> ImpactSummary {
        ImpactSummary {
            delay_days: self.delay_days,
            cascade_count: self.cascade_count,
            is_critical_path: self.is_critical_path,
            risk_level: self.risk_level.to_string(),
            recommendation: self.recommendation.clone(),
            affected_items: self
                .affected_items
                .iter()
                .take(5)
                .map(|i| AffectedItemRef {
                    external_id: i.external_id.clone(),
                    name: i.name.clone(),
                })
                .collect(),
        }
    }
}

/// Reason-aware duration recalculation.
///
/// SCOPE_INCREASE scales the duration by the extra work, STARTED_LATE
/// shifts the whole window preserving duration, RESOURCE_PULLED divides by
/// the remaining effort, and everything else takes the proposed date as-is.
#[must_use]
pub fn recalculate_duration(
    item: &WorkItem,
    proposed_new_end: NaiveDate,
    reason: ReasonCategory,
    details: &ReasonDetails,
) -> DurationRecalculation {
    let start = item.current_start;
    let end = item.current_end;
    let original = (end - start).num_days();

    match reason {
        ReasonCategory::ScopeIncrease => {
            let percent = details.additional_work_percent.unwrap_or(0.0);
            let new_end = if percent > 0.0 {
                #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
                let scaled = (original as f64 * (1.0 + percent / 100.0)) as i64;
                (start + Duration::days(scaled)).max(proposed_new_end)
            } else {
                proposed_new_end
            };
            let new_duration = (new_end - start).num_days();
            DurationRecalculation {
                new_start: start,
                new_end,
                new_duration_days: new_duration,
                original_duration_days: original,
                extension_days: new_duration - original,
                calculation_method: "SCOPE_PERCENTAGE",
                explanation: format!(
                    "scope increased by {percent}%: duration {original} -> {new_duration} days"
                ),
            }
        }
        ReasonCategory::StartedLate => {
            let delta = (proposed_new_end - end).num_days();
            DurationRecalculation {
                new_start: start + Duration::days(delta),
                new_end: proposed_new_end,
                new_duration_days: original,
                original_duration_days: original,
                extension_days: 0,
                calculation_method: "WINDOW_SHIFT",
                explanation: format!(
                    "started late: window shifted by {delta} days, duration preserved at {original} days"
                ),
            }
        }
        ReasonCategory::ResourcePulled => {
            let effort = details.available_effort_percent.unwrap_or(100.0);
            let new_end = if effort > 0.0 && effort < 100.0 {
                #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
                let stretched = (original as f64 / (effort / 100.0)) as i64;
                (start + Duration::days(stretched)).max(proposed_new_end)
            } else {
                proposed_new_end
            };
            let new_duration = (new_end - start).num_days();
            DurationRecalculation {
                new_start: start,
                new_end,
                new_duration_days: new_duration,
                original_duration_days: original,
                extension_days: new_duration - original,
                calculation_method: "REDUCED_CAPACITY",
                explanation: format!(
                    "resource at {effort}% capacity: duration {original} -> {new_duration} days"
                ),
            }
        }
        _ => {
            let new_duration = (proposed_new_end - start).num_days();
            DurationRecalculation {
                new_start: start,
                new_end: proposed_new_end,
                new_duration_days: new_duration,
                original_duration_days: original,
                extension_days: new_duration - original,
                calculation_method: "DIRECT_EXTENSION",
                explanation: format!(
                    "direct extension: new end {proposed_new_end} ({:+} days)",
                    new_duration - original
                ),
            }
        }
    }
}

/// BFS over successor edges, applying `delay_days` uniformly to every live
/// downstream item. Edge-kind-specific math belongs to the recalculation
/// engine; the preview answers "who moves if this slips", not "by exactly
/// how much".
pub async fn cascade_preview(
    store: &dyn ProjectStore,
    work_item_id: Uuid,
    delay_days: i64,
) -> Result<Vec<CascadeItem>, StoreError> {
    let mut affected = Vec::new();
    if delay_days == 0 {
        return Ok(affected);
    }

    let mut visited: HashSet<Uuid> = HashSet::new();
    let mut queue: VecDeque<(Uuid, usize)> = VecDeque::new();
    queue.push_back((work_item_id, 1));

    while let Some((current, depth)) = queue.pop_front() {
        if affected.len() >= CASCADE_PREVIEW_CAP {
            break;
        }
        if !visited.insert(current) {
            continue;
        }

        for edge in store.list_successor_edges(current).await? {
            if visited.contains(&edge.successor_id) {
                continue;
            }
            let Some(successor) = store.get_work_item(edge.successor_id).await? else {
                continue;
            };
            if successor.status.is_terminal() {
                continue;
            }

            affected.push(CascadeItem {
                work_item_id: successor.id,
                external_id: successor.external_id.clone(),
                name: successor.name.clone(),
                current_start: successor.current_start,
                current_end: successor.current_end,
                new_start: successor.current_start + Duration::days(delay_days),
                new_end: successor.current_end + Duration::days(delay_days),
                slip_days: delay_days,
                depth,
            });
            if affected.len() >= CASCADE_PREVIEW_CAP {
                break;
            }
            queue.push_back((successor.id, depth + 1));
        }
    }

    Ok(affected)
}

/// Sum the owner's allocation across live tasks overlapping the proposed
/// window; report a conflict when the total exceeds `max_utilization`.
pub async fn resource_conflicts(
    store: &dyn ProjectStore,
    item: &WorkItem,
    new_start: NaiveDate,
    new_end: NaiveDate,
) -> Result<Vec<ResourceConflict>, StoreError> {
    let Some(resource_id) = item.resource_id else {
        return Ok(Vec::new());
    };
    let Some(resource) = store.get_resource(resource_id).await? else {
        return Ok(Vec::new());
    };

    let mut total = item.allocation_percent;
    let mut overlapping = Vec::new();
    for other in store.list_work_items_by_resource(resource_id).await? {
        if other.id == item.id || other.status.is_terminal() {
            continue;
        }
        if other.current_start <= new_end && other.current_end >= new_start {
            total += other.allocation_percent;
            overlapping.push(other.external_id.clone());
        }
    }

    if total > resource.max_utilization {
        Ok(vec![ResourceConflict {
            resource_id,
            resource_name: resource.name,
            total_allocation: total,
            max_utilization: resource.max_utilization,
            over_by: total - resource.max_utilization,
            overlapping_tasks: overlapping,
        }])
    } else {
        Ok(Vec::new())
    }
}

/// Additive 0-9 risk score, bucketed.
#[must_use]
pub fn risk_level(
    delay_days: i64,
    is_critical_path: bool,
    cascade_count: usize,
    has_resource_conflicts: bool,
) -> RiskLevel {
    let mut score = 0;
    if delay_days >= 7 {
        score += 3;
    } else if delay_days >= 3 {
        score += 2;
    } else if delay_days >= 1 {
        score += 1;
    }
    if is_critical_path {
        score += 3;
    }
    if cascade_count >= 5 {
        score += 2;
    } else if cascade_count >= 2 {
        score += 1;
    }
    if has_resource_conflicts {
        score += 1;
    }

    match score {
        s if s >= 6 => RiskLevel::Critical,
        s if s >= 4 => RiskLevel::High,
        s if s >= 2 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

fn recommendation(
    delay_days: i64,
    reason: ReasonCategory,
    is_critical_path: bool,
    cascade_count: usize,
    risk: RiskLevel,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    if risk == RiskLevel::Critical {
        parts.push("CRITICAL: immediate PM attention required.".to_owned());
    }
    if is_critical_path {
        parts.push(format!(
            "Consider adding resources to recover {delay_days} days on the critical path."
        ));
    }
    if cascade_count > 3 {
        parts.push(format!(
            "Review {cascade_count} downstream tasks for potential parallel work."
        ));
    }
    match reason {
        ReasonCategory::ResourcePulled => parts.push(
            "Consider reassigning to a dedicated resource to prevent further delays.".to_owned(),
        ),
        ReasonCategory::ScopeIncrease => {
            parts.push("Evaluate whether the new scope can be deferred to a later phase.".to_owned());
        }
        ReasonCategory::ExternalDependency => parts.push(
            "Set up a daily check-in with the external party to track progress.".to_owned(),
        ),
        _ => {}
    }
    if parts.is_empty() {
        parts.push(format!("Approve the {delay_days}-day schedule adjustment."));
    }
    parts.join(" ")
}

/// Full impact analysis: duration math, cascade preview, resource
/// conflicts, risk grading, recommendation.
pub async fn analyze_impact(
    store: &dyn ProjectStore,
    work_item_id: Uuid,
    proposed_new_end: NaiveDate,
    reason: ReasonCategory,
    details: &ReasonDetails,
) -> Result<ImpactReport, OrchestratorError> {
    let item = store
        .get_work_item(work_item_id)
        .await?
        .ok_or(OrchestratorError::WorkItemNotFound(work_item_id))?;

    let delay_days = (proposed_new_end - item.current_end).num_days();
    let recalculation = recalculate_duration(&item, proposed_new_end, reason, details);
    let affected = cascade_preview(store, work_item_id, delay_days).await?;
    let conflicts =
        resource_conflicts(store, &item, recalculation.new_start, recalculation.new_end).await?;

    let risk = risk_level(
        delay_days,
        item.is_critical_path,
        affected.len(),
        !conflicts.is_empty(),
    );
    let recommendation = recommendation(
        delay_days,
        reason,
        item.is_critical_path,
        affected.len(),
        risk,
    );
    let critical_path_impact = item.is_critical_path.then(|| {
        format!(
            "this task is on the critical path; a {delay_days}-day delay will directly impact the program end date"
        )
    });

    Ok(ImpactReport {
        work_item_id: item.id,
        work_item_name: item.name.clone(),
        original_end: item.current_end,
        proposed_end: proposed_new_end,
        delay_days,
        reason_category: reason,
        recalculation,
        cascade_count: affected.len(),
        affected_items: affected,
        is_critical_path: item.is_critical_path,
        critical_path_impact,
        resource_conflicts: conflicts,
        risk_level: risk,
        recommendation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{Dependency, DependencyKind};
    use cadence_store_memory::MemoryStore;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn item(ext: &str, start: &str, end: &str) -> WorkItem {
        WorkItem::new(Uuid::new_v4(), ExternalId::from(ext), ext, d(start), d(end))
    }

    #[test]
    fn scope_increase_extends_duration_from_start() {
        // 10-day task, 40% more work: 14 days from the same start.
        let mut w = item("T-1", "2024-02-05", "2024-02-15");
        w.current_start = d("2024-02-05");
        w.current_end = d("2024-02-15");
        let details = ReasonDetails {
            additional_work_percent: Some(40.0),
            available_effort_percent: None,
        };
        let r = recalculate_duration(&w, d("2024-02-16"), ReasonCategory::ScopeIncrease, &details);
        assert_eq!(r.new_start, d("2024-02-05"));
        assert_eq!(r.new_end, d("2024-02-19"));
        assert_eq!(r.new_duration_days, 14);
        assert_eq!(r.extension_days, 4);
    }

    #[test]
    fn scope_increase_takes_proposed_date_when_later() {
        let w = item("T-1", "2024-02-05", "2024-02-09");
        let details = ReasonDetails {
            additional_work_percent: Some(10.0),
            available_effort_percent: None,
        };
        // 10% of 4 days rounds down; the proposed date wins.
        let r = recalculate_duration(&w, d("2024-02-20"), ReasonCategory::ScopeIncrease, &details);
        assert_eq!(r.new_end, d("2024-02-20"));
    }

    #[test]
    fn started_late_shifts_window_preserving_duration() {
        let w = item("T-1", "2024-02-05", "2024-02-09");
        let r = recalculate_duration(
            &w,
            d("2024-02-14"),
            ReasonCategory::StartedLate,
            &ReasonDetails::default(),
        );
        assert_eq!(r.new_start, d("2024-02-10"));
        assert_eq!(r.new_end, d("2024-02-14"));
        assert_eq!(r.extension_days, 0);
        assert_eq!(r.new_duration_days, r.original_duration_days);
    }

    #[test]
    fn resource_pulled_stretches_by_remaining_effort() {
        // 10-day task at 50% effort takes 20 days.
        let w = item("T-1", "2024-02-05", "2024-02-15");
        let details = ReasonDetails {
            additional_work_percent: None,
            available_effort_percent: Some(50.0),
        };
        let r = recalculate_duration(&w, d("2024-02-16"), ReasonCategory::ResourcePulled, &details);
        assert_eq!(r.new_end, d("2024-02-25"));
        assert_eq!(r.new_duration_days, 20);
    }

    #[test]
    fn technical_blocker_is_direct_extension() {
        let w = item("T-1", "2024-02-05", "2024-02-09");
        let r = recalculate_duration(
            &w,
            d("2024-02-12"),
            ReasonCategory::TechnicalBlocker,
            &ReasonDetails::default(),
        );
        assert_eq!(r.new_start, d("2024-02-05"));
        assert_eq!(r.new_end, d("2024-02-12"));
        assert_eq!(r.calculation_method, "DIRECT_EXTENSION");
    }

    #[test]
    fn risk_scoring_buckets() {
        assert_eq!(risk_level(0, false, 0, false), RiskLevel::Low);
        assert_eq!(risk_level(1, false, 2, false), RiskLevel::Medium);
        assert_eq!(risk_level(3, false, 5, false), RiskLevel::High);
        assert_eq!(risk_level(7, true, 5, true), RiskLevel::Critical);
    }

    #[tokio::test]
    async fn cascade_preview_skips_terminal_and_caps() {
        let store = MemoryStore::new();
        let a = item("T-1", "2024-02-05", "2024-02-09");
        let b = item("T-2", "2024-02-12", "2024-02-16");
        let mut c = item("T-3", "2024-02-19", "2024-02-23");
        c.status = cadence_core::WorkStatus::Completed;
        let d2 = item("T-4", "2024-02-26", "2024-03-01");
        let (a_id, b_id, c_id, d_id) = (a.id, b.id, c.id, d2.id);
        store.insert_work_items(vec![a, b, c, d2]).await.unwrap();
        store
            .upsert_dependency(Dependency::new(a_id, b_id, DependencyKind::FS, 0))
            .await
            .unwrap();
        store
            .upsert_dependency(Dependency::new(a_id, c_id, DependencyKind::FS, 0))
            .await
            .unwrap();
        store
            .upsert_dependency(Dependency::new(b_id, d_id, DependencyKind::FS, 0))
            .await
            .unwrap();

        let affected = cascade_preview(&store, a_id, 3).await.unwrap();
        let exts: Vec<&str> = affected.iter().map(|i| i.external_id.as_str()).collect();
        // Completed T-3 is skipped; T-4 reached through T-2 at depth 2.
        assert_eq!(exts, vec!["T-2", "T-4"]);
        assert_eq!(affected[0].new_start, d("2024-02-15"));
        assert_eq!(affected[1].depth, 2);
    }

    #[tokio::test]
    async fn zero_delay_has_empty_cascade() {
        let store = MemoryStore::new();
        let a = item("T-1", "2024-02-05", "2024-02-09");
        let b = item("T-2", "2024-02-12", "2024-02-16");
        let (a_id, b_id) = (a.id, b.id);
        store.insert_work_items(vec![a, b]).await.unwrap();
        store
            .upsert_dependency(Dependency::new(a_id, b_id, DependencyKind::FS, 0))
            .await
            .unwrap();

        let affected = cascade_preview(&store, a_id, 0).await.unwrap();
        assert!(affected.is_empty());
    }

    #[tokio::test]
    async fn overlapping_allocation_reports_conflict() {
        let store = MemoryStore::new();
        let resource = store
            .insert_resource(cadence_core::Resource::new(
                ExternalId::from("R-1"),
                "Ada",
                "ada@example.com",
            ))
            .await
            .unwrap();

        let mut a = item("T-1", "2024-02-05", "2024-02-09");
        a.resource_id = Some(resource.id);
        a.allocation_percent = 60;
        let mut b = item("T-2", "2024-02-07", "2024-02-13");
        b.resource_id = Some(resource.id);
        b.allocation_percent = 60;
        let a_clone = a.clone();
        store.insert_work_items(vec![a, b]).await.unwrap();

        let conflicts = resource_conflicts(&store, &a_clone, d("2024-02-05"), d("2024-02-09"))
            .await
            .unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].total_allocation, 120);
        assert_eq!(conflicts[0].over_by, 20);
    }
}
