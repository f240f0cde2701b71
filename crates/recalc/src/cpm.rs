use std::collections::{HashMap, VecDeque};

use chrono::NaiveDate;
use uuid::Uuid;

use cadence_core::{BusinessCalendar, Dependency, DependencyKind, WorkItem};

use crate::RecalcError;

/// Schedule position of one work item after the forward/backward passes.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub work_item_id: Uuid,
    pub early_start: NaiveDate,
    pub early_finish: NaiveDate,
    pub late_start: NaiveDate,
    pub late_finish: NaiveDate,
    /// Business days of float; zero or negative means critical.
    pub total_float: i64,
    pub is_critical: bool,
}

/// Shift a date by `n` business days (negative `n` steps backward).
fn shift(cal: &BusinessCalendar, date: NaiveDate, n: i64) -> NaiveDate {
    if n >= 0 {
        cal.business_days_after(date, u32::try_from(n).unwrap_or(u32::MAX))
    } else {
        cal.business_days_before(date, u32::try_from(-n).unwrap_or(u32::MAX))
    }
}

/// Signed business-day distance from `a` to `b`.
fn distance(cal: &BusinessCalendar, a: NaiveDate, b: NaiveDate) -> i64 {
    if a <= b {
        cal.business_days_between(a, b)
    } else {
        -cal.business_days_between(b, a)
    }
}

/// Detect a cycle in the dependency graph, returning the first cycle found
/// as a path of work-item ids.
///
/// Iterative DFS with an explicit recursion stack; no recursion limits to
/// trip on deep graphs.
#[must_use]
pub fn detect_cycle(items: &[WorkItem], deps: &[Dependency]) -> Option<Vec<Uuid>> {
    let mut successors: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for dep in deps {
        successors
            .entry(dep.predecessor_id)
            .or_default()
            .push(dep.successor_id);
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InStack,
        Done,
    }

    let mut marks: HashMap<Uuid, Mark> = items.iter().map(|i| (i.id, Mark::Unvisited)).collect();

    for start in items.iter().map(|i| i.id) {
        if marks.get(&start) != Some(&Mark::Unvisited) {
            continue;
        }
        // (node, next child index) pairs form the explicit DFS stack.
        let mut stack: Vec<(Uuid, usize)> = vec![(start, 0)];
        marks.insert(start, Mark::InStack);

        loop {
            let Some(&(node, child_idx)) = stack.last() else {
                break;
            };
            let children = successors.get(&node).map_or(&[][..], Vec::as_slice);
            if child_idx < children.len() {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                let child = children[child_idx];
                match marks.get(&child) {
                    Some(Mark::InStack) => {
                        // Found a back edge: slice the stack from the first
                        // occurrence of `child` to get the cycle path.
                        let mut path: Vec<Uuid> = stack
                            .iter()
                            .map(|(id, _)| *id)
                            .skip_while(|id| *id != child)
                            .collect();
                        path.push(child);
                        return Some(path);
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

    None
}

/// Kahn topological order over the items; assumes the graph is acyclic.
fn topological_order(items: &[WorkItem], deps: &[Dependency]) -> Vec<Uuid> {
    let mut in_degree: HashMap<Uuid, usize> = items.iter().map(|i| (i.id, 0)).collect();
    let mut successors: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for dep in deps {
        if in_degree.contains_key(&dep.successor_id) && in_degree.contains_key(&dep.predecessor_id)
        {
            *in_degree.entry(dep.successor_id).or_default() += 1;
            successors
                .entry(dep.predecessor_id)
                .or_default()
                .push(dep.successor_id);
        }
    }

    let mut queue: VecDeque<Uuid> = items
        .iter()
        .filter(|i| in_degree.get(&i.id) == Some(&0))
        .map(|i| i.id)
        .collect();
    let mut order = Vec::with_capacity(items.len());

    while let Some(id) = queue.pop_front() {
        order.push(id);
        if let Some(children) = successors.get(&id) {
            for child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(*child);
                    }
                }
            }
        }
    }

    order
}

/// Forward and backward CPM passes over the items' current dates.
///
/// ES is anchored at the item's own `current_start` and pushed later by
/// predecessor constraints; tail items anchor LF at their own EF. Returns
/// entries in topological order.
pub fn compute_schedule(
    items: &[WorkItem],
    deps: &[Dependency],
    cal: &BusinessCalendar,
) -> Result<Vec<ScheduleEntry>, RecalcError> {
    if let Some(cycle_ids) = detect_cycle(items, deps) {
        let by_id: HashMap<Uuid, &WorkItem> = items.iter().map(|i| (i.id, i)).collect();
        let path = cycle_ids
            .iter()
            .map(|id| {
                by_id
                    .get(id)
                    .map_or_else(|| id.to_string(), |i| i.external_id.to_string())
            })
            .collect();
        return Err(RecalcError::DependencyCycle { path });
    }

    let by_id: HashMap<Uuid, &WorkItem> = items.iter().map(|i| (i.id, i)).collect();
    let span: HashMap<Uuid, i64> = items
        .iter()
        .map(|i| (i.id, distance(cal, i.current_start, i.current_end)))
        .collect();

    let mut incoming: HashMap<Uuid, Vec<&Dependency>> = HashMap::new();
    let mut outgoing: HashMap<Uuid, Vec<&Dependency>> = HashMap::new();
    for dep in deps {
        incoming.entry(dep.successor_id).or_default().push(dep);
        outgoing.entry(dep.predecessor_id).or_default().push(dep);
    }

    let order = topological_order(items, deps);

    // Forward pass: ES = max(own start, predecessor constraints), EF = ES + span.
    let mut es: HashMap<Uuid, NaiveDate> = HashMap::new();
    let mut ef: HashMap<Uuid, NaiveDate> = HashMap::new();
    for id in &order {
        let Some(item) = by_id.get(id) else { continue };
        let item_span = span.get(id).copied().unwrap_or(0);
        let mut start = item.current_start;
        for dep in incoming.get(id).map_or(&[][..], Vec::as_slice) {
            let (Some(&pred_es), Some(&pred_ef)) =
                (es.get(&dep.predecessor_id), ef.get(&dep.predecessor_id))
            else {
                continue;
            };
            let bound = match dep.kind {
                DependencyKind::FS => shift(cal, pred_ef, dep.lag_days + 1),
                DependencyKind::SS => shift(cal, pred_es, dep.lag_days),
                DependencyKind::FF => {
                    let finish = shift(cal, pred_ef, dep.lag_days);
                    shift(cal, finish, -item_span)
                }
                DependencyKind::SF => {
                    let finish = shift(cal, pred_es, dep.lag_days);
                    shift(cal, finish, -item_span)
                }
            };
            start = start.max(bound);
        }
        es.insert(*id, start);
        ef.insert(*id, shift(cal, start, item_span));
    }

    // Backward pass: LF = min(successor constraints), tails anchor at EF.
    let mut ls: HashMap<Uuid, NaiveDate> = HashMap::new();
    let mut lf: HashMap<Uuid, NaiveDate> = HashMap::new();
    for id in order.iter().rev() {
        let item_span = span.get(id).copied().unwrap_or(0);
        let own_ef = ef.get(id).copied().unwrap_or_default();
        let mut finish: Option<NaiveDate> = None;
        for dep in outgoing.get(id).map_or(&[][..], Vec::as_slice) {
            let (Some(&succ_ls), Some(&succ_lf)) =
                (ls.get(&dep.successor_id), lf.get(&dep.successor_id))
            else {
                continue;
            };
            let bound = match dep.kind {
                DependencyKind::FS => shift(cal, succ_ls, -(dep.lag_days + 1)),
                DependencyKind::SS => {
                    let late_start = shift(cal, succ_ls, -dep.lag_days);
                    shift(cal, late_start, item_span)
                }
                DependencyKind::FF => shift(cal, succ_lf, -dep.lag_days),
                DependencyKind::SF => {
                    let late_start = shift(cal, succ_lf, -dep.lag_days);
                    shift(cal, late_start, item_span)
                }
            };
            finish = Some(finish.map_or(bound, |f| f.min(bound)));
        }
        let late_finish = finish.unwrap_or(own_ef);
        lf.insert(*id, late_finish);
        ls.insert(*id, shift(cal, late_finish, -item_span));
    }

    let entries = order
        .iter()
        .map(|id| {
            let early_start = es.get(id).copied().unwrap_or_default();
            let late_start = ls.get(id).copied().unwrap_or(early_start);
            let total_float = distance(cal, early_start, late_start);
            ScheduleEntry {
                work_item_id: *id,
                early_start,
                early_finish: ef.get(id).copied().unwrap_or_default(),
                late_start,
                late_finish: lf.get(id).copied().unwrap_or_default(),
                total_float,
                is_critical: total_float <= 0,
            }
        })
        .collect();

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::ExternalId;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn item(ext: &str, start: &str, end: &str) -> WorkItem {
        WorkItem::new(Uuid::new_v4(), ExternalId::from(ext), ext, d(start), d(end))
    }

    #[test]
    fn two_task_chain_is_fully_critical() {
        // T-1 Mon-Fri, T-2 the following Mon-Fri, FS lag 0. The weekend gap
        // carries no float because the passes step in business days.
        let t1 = item("T-1", "2024-02-05", "2024-02-09");
        let t2 = item("T-2", "2024-02-12", "2024-02-16");
        let deps = vec![Dependency::new(t1.id, t2.id, DependencyKind::FS, 0)];
        let cal = BusinessCalendar::weekends_only();

        let schedule = compute_schedule(&[t1.clone(), t2.clone()], &deps, &cal).unwrap();
        let by_id: HashMap<Uuid, &ScheduleEntry> =
            schedule.iter().map(|e| (e.work_item_id, e)).collect();

        let e1 = by_id[&t1.id];
        let e2 = by_id[&t2.id];
        assert_eq!(e1.early_finish, d("2024-02-09"));
        assert_eq!(e2.early_start, d("2024-02-12"));
        assert_eq!(e2.early_finish, d("2024-02-16"));
        assert_eq!(e1.total_float, 0);
        assert_eq!(e2.total_float, 0);
        assert!(e1.is_critical && e2.is_critical);
    }

    #[test]
    fn short_parallel_branch_has_float() {
        // T-1 and T-2 both feed T-3; T-2 is two days shorter.
        let t1 = item("T-1", "2024-02-05", "2024-02-09");
        let t2 = item("T-2", "2024-02-05", "2024-02-07");
        let t3 = item("T-3", "2024-02-12", "2024-02-16");
        let deps = vec![
            Dependency::new(t1.id, t3.id, DependencyKind::FS, 0),
            Dependency::new(t2.id, t3.id, DependencyKind::FS, 0),
        ];
        let cal = BusinessCalendar::weekends_only();

        let schedule = compute_schedule(&[t1.clone(), t2.clone(), t3.clone()], &deps, &cal).unwrap();
        let by_id: HashMap<Uuid, &ScheduleEntry> =
            schedule.iter().map(|e| (e.work_item_id, e)).collect();

        assert!(by_id[&t1.id].is_critical);
        assert!(by_id[&t3.id].is_critical);
        assert_eq!(by_id[&t2.id].total_float, 2);
        assert!(!by_id[&t2.id].is_critical);
    }

    #[test]
    fn ss_dependency_with_lag() {
        let t1 = item("T-1", "2024-02-05", "2024-02-09");
        let mut t2 = item("T-2", "2024-02-05", "2024-02-07");
        t2.current_start = d("2024-02-05");
        t2.current_end = d("2024-02-07");
        // T-2 may start two business days after T-1 starts.
        let deps = vec![Dependency::new(t1.id, t2.id, DependencyKind::SS, 2)];
        let cal = BusinessCalendar::weekends_only();

        let schedule = compute_schedule(&[t1.clone(), t2.clone()], &deps, &cal).unwrap();
        let e2 = schedule
            .iter()
            .find(|e| e.work_item_id == t2.id)
            .unwrap();
        assert_eq!(e2.early_start, d("2024-02-07"));
    }

    #[test]
    fn cycle_is_reported_with_path() {
        let t1 = item("T-1", "2024-02-05", "2024-02-09");
        let t2 = item("T-2", "2024-02-12", "2024-02-16");
        let deps = vec![
            Dependency::new(t1.id, t2.id, DependencyKind::FS, 0),
            Dependency::new(t2.id, t1.id, DependencyKind::FS, 0),
        ];
        let cal = BusinessCalendar::weekends_only();

        let err = compute_schedule(&[t1, t2], &deps, &cal).unwrap_err();
        match err {
            RecalcError::DependencyCycle { path } => {
                assert!(path.len() >= 3);
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected cycle error, got {other}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let t1 = item("T-1", "2024-02-05", "2024-02-09");
        let deps = vec![Dependency::new(t1.id, t1.id, DependencyKind::FS, 0)];
        assert!(detect_cycle(&[t1], &deps).is_some());
    }
}
