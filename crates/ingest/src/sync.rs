use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use cadence_core::{Dependency, ExternalId, Phase, Program, Project, Resource};
use cadence_store::{ProjectStore, TxContext, TxOp};

use crate::ImportError;
use crate::rows::{ParsedPlan, ResourceRow};

/// Upsert resources keyed by external id.
///
/// First pass writes the rows themselves; the second pass wires up the
/// backup/manager links, which may reference resources created later in the
/// same batch. Availability and leave fields are operational state and are
/// not overwritten by imports.
pub async fn sync_resources(
    store: &dyn ProjectStore,
    tx: &TxContext,
    rows: &[ResourceRow],
) -> Result<HashMap<ExternalId, Uuid>, ImportError> {
    let mut mapping: HashMap<ExternalId, Uuid> = HashMap::new();

    for row in rows {
        match store.find_resource_by_external_id(&row.external_id).await? {
            None => {
                let mut resource =
                    Resource::new(row.external_id.clone(), row.name.clone(), row.email.clone());
                apply_row(&mut resource, row);
                let inserted = store.insert_resource(resource).await?;
                tx.record(TxOp::ResourceCreated(inserted.id));
                mapping.insert(row.external_id.clone(), inserted.id);
            }
            Some(existing) => {
                let mut updated = existing.clone();
                updated.name = row.name.clone();
                updated.primary_email = row.email.clone();
                apply_row(&mut updated, row);
                if !same_resource(&existing, &updated) {
                    tx.record(TxOp::ResourceUpdated(existing.clone()));
                    store.update_resource(updated).await?;
                }
                mapping.insert(row.external_id.clone(), existing.id);
            }
        }
    }

    // Second pass: link backups and managers now that every row exists.
    for row in rows {
        let Some(&id) = mapping.get(&row.external_id) else {
            continue;
        };
        let backup = row
            .backup_external_id
            .as_ref()
            .and_then(|ext| mapping.get(ext).copied());
        let manager = row
            .manager_external_id
            .as_ref()
            .and_then(|ext| mapping.get(ext).copied());
        if backup.is_none() && manager.is_none() {
            continue;
        }
        if let Some(existing) = store.get_resource(id).await? {
            let mut updated = existing.clone();
            if backup.is_some() {
                updated.backup_resource_id = backup;
            }
            if manager.is_some() {
                updated.manager_id = manager;
            }
            if !same_resource(&existing, &updated) {
                tx.record(TxOp::ResourceUpdated(existing));
                store.update_resource(updated).await?;
            }
        }
    }

    debug!(count = mapping.len(), "synced resources");
    Ok(mapping)
}

fn apply_row(resource: &mut Resource, row: &ResourceRow) {
    resource.notification_email = row.notification_email.clone();
    resource.role = row.role.clone();
    if let Some(ref tz) = row.timezone {
        resource.timezone = tz.clone();
    }
    if let Some(max) = row.max_utilization {
        resource.max_utilization = max;
    }
    if let Some(ref chat) = row.chat_user_id {
        resource.chat_user_id = Some(chat.clone());
    }
}

fn same_resource(a: &Resource, b: &Resource) -> bool {
    a.name == b.name
        && a.primary_email == b.primary_email
        && a.notification_email == b.notification_email
        && a.role == b.role
        && a.timezone == b.timezone
        && a.max_utilization == b.max_utilization
        && a.chat_user_id == b.chat_user_id
        && a.backup_resource_id == b.backup_resource_id
        && a.manager_id == b.manager_id
}

/// Upsert the program → project → phase hierarchy referenced by the plan's
/// work item rows, and derive the program's baseline window from them.
///
/// Returns the program plus a mapping of
/// `(project_external_id, phase_external_id)` to phase ids for the merge.
pub async fn sync_hierarchy(
    store: &dyn ProjectStore,
    tx: &TxContext,
    plan: &ParsedPlan,
) -> Result<(Program, HashMap<(ExternalId, ExternalId), Uuid>), ImportError> {
    let window_start = plan.work_items.iter().map(|r| r.planned_start).min();
    let window_end = plan.work_items.iter().map(|r| r.planned_end).max();

    let program = match store
        .find_program_by_external_id(&plan.program.external_id)
        .await?
    {
        None => {
            let mut program = Program::new(plan.program.external_id.clone(), plan.program.name.clone());
            program.baseline_start = window_start;
            program.baseline_end = window_end;
            let inserted = store.insert_program(program).await?;
            tx.record(TxOp::ProgramCreated(inserted.id));
            inserted
        }
        Some(existing) => {
            let mut updated = existing.clone();
            updated.name = plan.program.name.clone();
            if let Some(start) = window_start {
                updated.baseline_start = Some(existing.baseline_start.map_or(start, |s| s.min(start)));
            }
            if let Some(end) = window_end {
                updated.baseline_end = Some(existing.baseline_end.map_or(end, |e| e.max(end)));
            }
            tx.record(TxOp::ProgramUpdated(existing));
            store.update_program(updated.clone()).await?;
            updated
        }
    };

    let mut project_ids: HashMap<ExternalId, Uuid> = HashMap::new();
    let mut phase_mapping: HashMap<(ExternalId, ExternalId), Uuid> = HashMap::new();
    let mut next_sequence: i32 = 1;

    for row in &plan.work_items {
        let project_id = match project_ids.get(&row.project_external_id) {
            Some(&id) => id,
            None => {
                let id = match store
                    .find_project(program.id, &row.project_external_id)
                    .await?
                {
                    Some(project) => project.id,
                    None => {
                        let name = row
                            .project_name
                            .clone()
                            .unwrap_or_else(|| row.project_external_id.to_string());
                        let inserted = store
                            .insert_project(Project::new(
                                program.id,
                                row.project_external_id.clone(),
                                name,
                            ))
                            .await?;
                        tx.record(TxOp::ProjectCreated(inserted.id));
                        inserted.id
                    }
                };
                project_ids.insert(row.project_external_id.clone(), id);
                id
            }
        };

        let phase_key = (row.project_external_id.clone(), row.phase_external_id.clone());
        if phase_mapping.contains_key(&phase_key) {
            continue;
        }
        let phase_id = match store.find_phase(project_id, &row.phase_external_id).await? {
            Some(phase) => phase.id,
            None => {
                let name = row
                    .phase_name
                    .clone()
                    .unwrap_or_else(|| row.phase_external_id.to_string());
                let sequence = row.phase_sequence.unwrap_or(next_sequence);
                let inserted = store
                    .insert_phase(Phase::new(
                        project_id,
                        row.phase_external_id.clone(),
                        name,
                        sequence,
                    ))
                    .await?;
                tx.record(TxOp::PhaseCreated(inserted.id));
                inserted.id
            }
        };
        next_sequence += 1;
        phase_mapping.insert(phase_key, phase_id);
    }

    debug!(
        program = %program.external_id,
        projects = project_ids.len(),
        phases = phase_mapping.len(),
        "synced hierarchy"
    );
    Ok((program, phase_mapping))
}

/// Upsert the plan's dependency edges, resolving external ids against the
/// program's work items. Returns how many edges were written.
pub async fn sync_dependencies(
    store: &dyn ProjectStore,
    tx: &TxContext,
    plan: &ParsedPlan,
    program_id: Uuid,
) -> Result<usize, ImportError> {
    let items = store.list_work_items_by_program(program_id).await?;
    let by_external: HashMap<&ExternalId, Uuid> =
        items.iter().map(|i| (&i.external_id, i.id)).collect();

    let existing: HashSet<(Uuid, Uuid)> = store
        .list_dependencies_by_program(program_id)
        .await?
        .into_iter()
        .map(|d| (d.successor_id, d.predecessor_id))
        .collect();

    let mut synced = 0;
    for row in &plan.dependencies {
        let (Some(&successor), Some(&predecessor)) = (
            by_external.get(&row.successor_external_id),
            by_external.get(&row.predecessor_external_id),
        ) else {
            // Validation already rejected unresolvable references; a miss
            // here means the row itself was skipped during merge.
            continue;
        };

        let written = store
            .upsert_dependency(Dependency::new(predecessor, successor, row.kind, row.lag_days))
            .await?;
        if !existing.contains(&(successor, predecessor)) {
            tx.record(TxOp::DependencyCreated(written.id));
        }
        synced += 1;
    }

    debug!(count = synced, "synced dependencies");
    Ok(synced)
}
