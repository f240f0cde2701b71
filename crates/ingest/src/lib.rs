//! Plan ingestion: the interface rows produced by the external workbook
//! reader, the pure validation pass, the smart merge engine, and the import
//! pipeline that ties them together inside a transaction envelope.
//!
//! The guiding rule of the merge is: the uploaded plan updates the
//! *baseline*, the system preserves the *truth*. Baseline fields flow in
//! from every import; forecast and actual fields are never touched by one.

pub mod merge;
pub mod pipeline;
pub mod rows;
pub mod sync;
pub mod validate;

pub use merge::{MergeAction, MergeOutcome, MergeSummary, SmartMergeEngine};
pub use pipeline::{ImportOptions, ImportPipeline, ImportReport, ImportStatus};
pub use rows::{DependencyRow, ParsedPlan, ProgramRow, ResourceRow, WorkItemRow};
pub use validate::{ValidationIssue, ValidationReport, validate_plan};

use thiserror::Error;

/// Internal failures of the execute phase. Validation problems are data, not
/// errors — they travel in [`ValidationReport`].
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("store error: {0}")]
    Store(#[from] cadence_store::StoreError),

    #[error("recalculation error: {0}")]
    Recalc(#[from] cadence_recalc::RecalcError),

    #[error("import error: {0}")]
    Other(String),
}
