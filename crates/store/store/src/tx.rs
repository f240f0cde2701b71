use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};
use uuid::Uuid;

use cadence_core::{Alert, Program, Resource, ResponseToken, WorkItem, WorkItemResponse};

use crate::store::ProjectStore;

/// One compensating action recorded inside a transaction envelope.
///
/// `*Created` variants are undone by deleting the row; `*Updated` variants
/// carry the pre-mutation snapshot and are undone by writing it back.
#[derive(Debug, Clone)]
pub enum TxOp {
    ProgramCreated(Uuid),
    ProgramUpdated(Program),
    ProjectCreated(Uuid),
    PhaseCreated(Uuid),
    ResourceCreated(Uuid),
    ResourceUpdated(Resource),
    WorkItemCreated(Uuid),
    WorkItemUpdated(WorkItem),
    DependencyCreated(Uuid),
    AlertCreated(Uuid),
    AlertUpdated(Alert),
    ResponseCreated(Uuid),
    ResponseUpdated(WorkItemResponse),
    TokenCreated(Uuid),
    TokenUpdated(ResponseToken),
    AuditInserted(Uuid),
    QueueEntryCreated(Uuid),
}

/// What a rollback managed to undo.
///
/// Rollback is best-effort: failures are collected here and reported, never
/// raised over the error that triggered the rollback in the first place.
#[derive(Debug, Default)]
pub struct RollbackReport {
    pub undone: usize,
    pub failures: Vec<String>,
}

impl RollbackReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Application-level transaction envelope over the non-transactional store.
///
/// Every mutation made inside the envelope records either the created row id
/// or the pre-mutation snapshot. On failure the log is replayed in reverse:
/// inserts are deleted, updates restored. The `batch_id` is attached to
/// every audit record written inside the envelope.
pub struct TxContext {
    batch_id: Uuid,
    ops: Mutex<Vec<TxOp>>,
    should_rollback: AtomicBool,
}

impl Default for TxContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TxContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            ops: Mutex::new(Vec::new()),
            should_rollback: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Replace the envelope's batch id once the real `import_batches` row
    /// exists.
    pub fn set_batch_id(&mut self, batch_id: Uuid) {
        self.batch_id = batch_id;
    }

    /// Record a compensating action for a mutation just performed.
    pub fn record(&self, op: TxOp) {
        if let Ok(mut ops) = self.ops.lock() {
            ops.push(op);
        }
    }

    pub fn mark_for_rollback(&self) {
        self.should_rollback.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_marked_for_rollback(&self) -> bool {
        self.should_rollback.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn op_count(&self) -> usize {
        self.ops.lock().map(|ops| ops.len()).unwrap_or(0)
    }

    /// Walk the op log in reverse, deleting created rows and restoring
    /// updated rows to their snapshots.
    pub async fn rollback(&self, store: &dyn ProjectStore) -> RollbackReport {
        let ops: Vec<TxOp> = match self.ops.lock() {
            Ok(mut guard) => guard.drain(..).collect(),
            Err(_) => Vec::new(),
        };

        debug!(batch_id = %self.batch_id, ops = ops.len(), "rolling back transaction");

        let mut report = RollbackReport::default();
        for op in ops.into_iter().rev() {
            let outcome = match op {
                TxOp::ProgramCreated(id) => store.delete_program(id).await.map(|_| ()),
                TxOp::ProgramUpdated(snapshot) => store.update_program(snapshot).await,
                TxOp::ProjectCreated(id) => store.delete_project(id).await.map(|_| ()),
                TxOp::PhaseCreated(id) => store.delete_phase(id).await.map(|_| ()),
                // Resource rows are shared across programs; creations are
                // rolled back, plain field updates are restored.
                TxOp::ResourceCreated(_) => Ok(()),
                TxOp::ResourceUpdated(snapshot) => store.update_resource(snapshot).await,
                TxOp::WorkItemCreated(id) => store.delete_work_item(id).await.map(|_| ()),
                TxOp::WorkItemUpdated(snapshot) => store.update_work_item(snapshot).await,
                TxOp::DependencyCreated(id) => store.delete_dependency(id).await.map(|_| ()),
                TxOp::AlertCreated(id) => store.delete_alert(id).await.map(|_| ()),
                TxOp::AlertUpdated(snapshot) => store.update_alert(snapshot).await,
                TxOp::ResponseCreated(id) => store.delete_response(id).await.map(|_| ()),
                TxOp::ResponseUpdated(snapshot) => store.update_response(snapshot).await,
                TxOp::TokenCreated(id) => store.delete_response_token(id).await.map(|_| ()),
                TxOp::TokenUpdated(snapshot) => store.update_response_token(snapshot).await,
                TxOp::AuditInserted(id) => store.delete_audit_record(id).await.map(|_| ()),
                TxOp::QueueEntryCreated(id) => store.delete_queue_entry(id).await.map(|_| ()),
            };

            match outcome {
                Ok(()) => report.undone += 1,
                Err(e) => {
                    warn!(batch_id = %self.batch_id, error = %e, "rollback step failed");
                    report.failures.push(e.to_string());
                }
            }
        }

        report
    }
}
