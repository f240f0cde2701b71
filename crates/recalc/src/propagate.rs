use std::collections::HashMap;

use chrono::Duration;
use uuid::Uuid;

use cadence_core::{Dependency, DependencyKind, WorkItem};

use crate::cpm::detect_cycle;

/// Resolve baseline-vs-current conflicts in place.
///
/// An import can move the baseline later than the live forecast. For items
/// that have not started (`actual_start` unset) both current dates are
/// pushed out to the baseline; for started items only the end may be
/// extended — the start reflects reality and is never moved. Returns the
/// ids of changed items.
pub fn resolve_baseline_conflicts(items: &mut [WorkItem]) -> Vec<Uuid> {
    let mut changed = Vec::new();
    for item in items.iter_mut() {
        let mut touched = false;
        if item.actual_start.is_none() {
            if item.planned_start > item.current_start {
                item.current_start = item.planned_start;
                touched = true;
            }
            if item.planned_end > item.current_end {
                item.current_end = item.planned_end;
                touched = true;
            }
        } else if item.planned_end > item.current_end {
            item.current_end = item.planned_end;
            touched = true;
        }
        if touched {
            changed.push(item.id);
        }
    }
    changed
}

/// Push dependency date constraints forward through `current_start` /
/// `current_end`, in place.
///
/// Constraint math per edge kind (calendar days):
/// - FS: successor starts no earlier than `pred.end + lag + 1`
/// - SS: successor starts no earlier than `pred.start + lag`
/// - FF: successor ends no earlier than `pred.end + lag`
/// - SF: successor ends no earlier than `pred.start + lag`
///
/// Propagation is monotonic forward only: a computed start later than the
/// current one moves the item (keeping its duration); earlier constraints
/// never pull dates in. Terminal items are left untouched. Returns the ids
/// of changed items. Items are processed in topological order so a single
/// pass settles the graph; with a cycle present (callers check first) the
/// pass degrades to item order.
pub fn propagate_dates(items: &mut [WorkItem], deps: &[Dependency]) -> Vec<Uuid> {
    let order = propagation_order(items, deps);
    let index: HashMap<Uuid, usize> = items
        .iter()
        .enumerate()
        .map(|(idx, item)| (item.id, idx))
        .collect();

    let mut incoming: HashMap<Uuid, Vec<&Dependency>> = HashMap::new();
    for dep in deps {
        incoming.entry(dep.successor_id).or_default().push(dep);
    }

    let mut changed = Vec::new();
    for id in order {
        let Some(&item_idx) = index.get(&id) else {
            continue;
        };
        let Some(edges) = incoming.get(&id) else {
            continue;
        };
        if items[item_idx].status.is_terminal() {
            continue;
        }

        let duration = items[item_idx].current_duration_days();
        let mut required_start = items[item_idx].current_start;

        for dep in edges {
            let Some(&pred_idx) = index.get(&dep.predecessor_id) else {
                continue;
            };
            let pred_start = items[pred_idx].current_start;
            let pred_end = items[pred_idx].current_end;
            let lag = Duration::days(dep.lag_days);

            let bound = match dep.kind {
                DependencyKind::FS => pred_end + lag + Duration::days(1),
                DependencyKind::SS => pred_start + lag,
                DependencyKind::FF => pred_end + lag - Duration::days(duration),
                DependencyKind::SF => pred_start + lag - Duration::days(duration),
            };
            required_start = required_start.max(bound);
        }

        if required_start > items[item_idx].current_start {
            items[item_idx].current_start = required_start;
            items[item_idx].current_end = required_start + Duration::days(duration);
            changed.push(id);
        }
    }

    changed
}

/// Topological order when acyclic, otherwise the items' own order.
fn propagation_order(items: &[WorkItem], deps: &[Dependency]) -> Vec<Uuid> {
    if detect_cycle(items, deps).is_some() {
        return items.iter().map(|i| i.id).collect();
    }

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

    let mut ready: Vec<Uuid> = items
        .iter()
        .filter(|i| in_degree.get(&i.id) == Some(&0))
        .map(|i| i.id)
        .collect();
    let mut order = Vec::with_capacity(items.len());
    while let Some(id) = ready.pop() {
        order.push(id);
        if let Some(children) = successors.get(&id) {
            for child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(*child);
                    }
                }
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{ExternalId, WorkStatus};
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn item(ext: &str, start: &str, end: &str) -> WorkItem {
        WorkItem::new(Uuid::new_v4(), ExternalId::from(ext), ext, d(start), d(end))
    }

    #[test]
    fn fs_edge_pushes_successor_forward() {
        // Replanned predecessor ends Wednesday; FS lag 0 puts the successor
        // at Thursday even though its forecast said Monday.
        let mut t1 = item("T-1", "2024-02-05", "2024-02-09");
        t1.current_end = d("2024-02-14");
        let t2 = item("T-2", "2024-02-12", "2024-02-16");
        let deps = vec![Dependency::new(t1.id, t2.id, DependencyKind::FS, 0)];
        let t2_id = t2.id;

        let mut items = vec![t1, t2];
        let changed = propagate_dates(&mut items, &deps);

        assert_eq!(changed, vec![t2_id]);
        let t2 = items.iter().find(|i| i.id == t2_id).unwrap();
        assert_eq!(t2.current_start, d("2024-02-15"));
        // Duration preserved (4 days).
        assert_eq!(t2.current_end, d("2024-02-19"));
    }

    #[test]
    fn earlier_constraints_never_pull_dates_in() {
        let t1 = item("T-1", "2024-02-05", "2024-02-07");
        let t2 = item("T-2", "2024-02-19", "2024-02-23");
        let deps = vec![Dependency::new(t1.id, t2.id, DependencyKind::FS, 0)];

        let mut items = vec![t1, t2.clone()];
        let changed = propagate_dates(&mut items, &deps);

        assert!(changed.is_empty());
        let after = items.iter().find(|i| i.id == t2.id).unwrap();
        assert_eq!(after.current_start, t2.current_start);
    }

    #[test]
    fn terminal_successors_are_not_moved() {
        let mut t1 = item("T-1", "2024-02-05", "2024-02-09");
        t1.current_end = d("2024-02-14");
        let mut t2 = item("T-2", "2024-02-12", "2024-02-16");
        t2.status = WorkStatus::Completed;
        let deps = vec![Dependency::new(t1.id, t2.id, DependencyKind::FS, 0)];
        let t2_id = t2.id;

        let mut items = vec![t1, t2];
        let changed = propagate_dates(&mut items, &deps);
        assert!(changed.is_empty());
        let t2 = items.iter().find(|i| i.id == t2_id).unwrap();
        assert_eq!(t2.current_start, d("2024-02-12"));
    }

    #[test]
    fn chain_propagates_through_intermediate_items() {
        let mut t1 = item("T-1", "2024-02-05", "2024-02-06");
        t1.current_end = d("2024-02-08");
        let t2 = item("T-2", "2024-02-07", "2024-02-08");
        let t3 = item("T-3", "2024-02-09", "2024-02-10");
        let deps = vec![
            Dependency::new(t1.id, t2.id, DependencyKind::FS, 0),
            Dependency::new(t2.id, t3.id, DependencyKind::FS, 0),
        ];
        let (t2_id, t3_id) = (t2.id, t3.id);

        let mut items = vec![t1, t2, t3];
        let changed = propagate_dates(&mut items, &deps);
        assert_eq!(changed.len(), 2);

        let t2 = items.iter().find(|i| i.id == t2_id).unwrap();
        let t3 = items.iter().find(|i| i.id == t3_id).unwrap();
        assert_eq!(t2.current_start, d("2024-02-09"));
        assert_eq!(t2.current_end, d("2024-02-10"));
        assert_eq!(t3.current_start, d("2024-02-11"));
    }

    #[test]
    fn baseline_conflicts_respect_actual_start() {
        let mut unstarted = item("T-1", "2024-02-12", "2024-02-16");
        unstarted.current_start = d("2024-02-05");
        unstarted.current_end = d("2024-02-09");

        let mut started = item("T-2", "2024-02-12", "2024-02-16");
        started.current_start = d("2024-02-05");
        started.current_end = d("2024-02-09");
        started.actual_start = Some(d("2024-02-05"));

        let mut items = vec![unstarted.clone(), started.clone()];
        let changed = resolve_baseline_conflicts(&mut items);
        assert_eq!(changed.len(), 2);

        let u = items.iter().find(|i| i.id == unstarted.id).unwrap();
        assert_eq!(u.current_start, d("2024-02-12"));
        assert_eq!(u.current_end, d("2024-02-16"));

        // Started item: start preserved, end extended.
        let s = items.iter().find(|i| i.id == started.id).unwrap();
        assert_eq!(s.current_start, d("2024-02-05"));
        assert_eq!(s.current_end, d("2024-02-16"));
    }
}
