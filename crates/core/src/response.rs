use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ExternalId;

/// Status a responder reports through a magic link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportedStatus {
    OnTrack,
    Delayed,
    Blocked,
    Completed,
}

/// Why a delay happened. The category drives the duration recalculation math
/// in impact analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCategory {
    ScopeIncrease,
    StartedLate,
    ResourcePulled,
    TechnicalBlocker,
    ExternalDependency,
    SpecificationChange,
    QualityIssue,
    Other,
}

/// Approval state of a reported delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    AutoApproved,
    Approved,
    Rejected,
}

/// Compact impact digest stored alongside a DELAYED response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactSummary {
    pub delay_days: i64,
    pub cascade_count: usize,
    pub is_critical_path: bool,
    pub risk_level: String,
    pub recommendation: String,
    /// Up to the first five affected downstream items.
    pub affected_items: Vec<AffectedItemRef>,
}

/// Reference to a downstream item touched by a cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedItemRef {
    pub external_id: ExternalId,
    pub name: String,
}

/// A versioned response to a status check.
///
/// Exactly one response per work item carries `is_latest = true`; superseded
/// versions record which version replaced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItemResponse {
    pub id: Uuid,
    pub alert_id: Uuid,
    pub work_item_id: Uuid,
    pub responder_id: Uuid,
    pub token_id: Option<Uuid>,
    pub reported_status: ReportedStatus,
    pub proposed_new_date: Option<NaiveDate>,
    pub delay_days: Option<i64>,
    pub reason_category: Option<ReasonCategory>,
    pub reason_details: Option<serde_json::Value>,
    pub comment: Option<String>,
    pub response_version: i64,
    pub is_latest: bool,
    pub superseded_by_response_version: Option<i64>,
    pub requires_approval: bool,
    pub approval_status: ApprovalStatus,
    pub approved_by_resource_id: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub impact_analysis: Option<ImpactSummary>,
    pub submitted_at: DateTime<Utc>,
    pub idempotency_key: Option<String>,
}

/// Store-side record of an issued magic-link token.
///
/// Only the SHA-256 hash of the signed token is kept; the plaintext appears
/// exclusively in the link handed to the recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseToken {
    pub id: Uuid,
    pub token_hash: String,
    pub work_item_id: Uuid,
    pub resource_id: Uuid,
    pub alert_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by_response_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
