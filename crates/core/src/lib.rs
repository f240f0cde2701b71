pub mod alert;
pub mod audit;
pub mod batch;
pub mod calendar;
pub mod hierarchy;
pub mod policy;
pub mod resource;
pub mod response;
pub mod types;
pub mod work;

pub use alert::{Alert, AlertStatus, AlertType, QueueAction, QueuedSend, Urgency};
pub use audit::{AuditRecord, ChangeSource};
pub use batch::{BaselineTotals, BaselineVersion, ImportBatch, ImportBatchStatus};
pub use calendar::{BusinessCalendar, Holiday};
pub use hierarchy::{Phase, Program, ProgramStatus, Project};
pub use policy::{EscalationPolicy, EscalationRecipient, EscalationTarget, next_escalation_level};
pub use resource::{AvailabilityStatus, Resource};
pub use response::{
    AffectedItemRef, ApprovalStatus, ImpactSummary, ReasonCategory, ReportedStatus, ResponseToken,
    WorkItemResponse,
};
pub use types::ExternalId;
pub use work::{Dependency, DependencyKind, WorkItem, WorkStatus};
