//! The proactive execution tracking loop: deadline scans, status-check
//! alerts with signed one-click links, timeout escalation through the
//! Primary → Backup → Manager → PM chain, response processing with approval
//! workflow, and cascade application of approved delays.

pub mod escalation;
pub mod impact;
pub mod orchestrator;

pub use escalation::{PmContact, find_available_recipient, get_escalation_chain, pm_for_notification};
pub use impact::{
    CascadeItem, DurationRecalculation, ImpactReport, ReasonDetails, ResourceConflict, RiskLevel,
    analyze_impact, cascade_preview, recalculate_duration,
};
pub use orchestrator::{
    AlertCreation, AlertOrchestrator, ApplyDelayResult, DailyScanSummary, EscalationEvent,
    EscalationStep, EscalationSummary, OrchestratorConfig, PendingApproval, PendingStatusCheck,
    QueueDrainSummary, ResponseOutcome, StatusResponseRequest,
};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the tracking loop.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("store error: {0}")]
    Store(#[from] cadence_store::StoreError),

    #[error("alert not found: {0}")]
    AlertNotFound(Uuid),

    #[error("work item not found: {0}")]
    WorkItemNotFound(Uuid),

    #[error("response not found: {0}")]
    ResponseNotFound(Uuid),

    #[error("this link has already been used to submit a response")]
    TokenAlreadyUsed { used_at: Option<DateTime<Utc>> },

    #[error("this link has expired")]
    TokenExpired,

    #[error("invalid link: {0}")]
    TokenInvalid(String),

    #[error("response is not pending approval (status: {0})")]
    NotPendingApproval(String),

    /// Apply-delay partial failure; carries what was attempted and whether
    /// the rollback restored it.
    #[error("cascade application failed: {error}")]
    CascadeFailure {
        error: String,
        attempted: Vec<String>,
        rolled_back: bool,
    },
}

impl From<cadence_token::TokenError> for OrchestratorError {
    fn from(e: cadence_token::TokenError) -> Self {
        match e {
            cadence_token::TokenError::Expired => Self::TokenExpired,
            cadence_token::TokenError::Revoked(_) => Self::TokenAlreadyUsed { used_at: None },
            cadence_token::TokenError::Invalid(msg) => Self::TokenInvalid(msg),
            cadence_token::TokenError::ResourceMismatch => {
                Self::TokenInvalid("token does not match this work item".to_owned())
            }
        }
    }
}
