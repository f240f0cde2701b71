use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why an alert exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    /// One-click status request sent ahead of a deadline.
    StatusCheck,
    /// Rerouted or no-recipient escalation.
    Escalation,
    /// Critical notification to the PM after a BLOCKED response.
    BlockerReport,
    /// PM approval request for a reported delay.
    ApprovalRequest,
    /// Plain informational notification.
    Notification,
}

/// Lifecycle of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Pending,
    Sent,
    Delivered,
    Opened,
    Responded,
    Expired,
    Cancelled,
}

impl AlertStatus {
    /// Live alerts count against the at-most-one-in-flight constraint.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Sent | Self::Delivered | Self::Opened
        )
    }

    /// Sent-but-unanswered alerts are eligible for timeout escalation.
    #[must_use]
    pub fn awaiting_response(self) -> bool {
        matches!(self, Self::Sent | Self::Delivered | Self::Opened)
    }
}

/// Urgency grading derived from deadline proximity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    Low,
    Normal,
    High,
    Critical,
}

impl Urgency {
    /// Grade a deadline relative to `today`: due or overdue is CRITICAL, due
    /// tomorrow HIGH, due within three days NORMAL, later LOW.
    #[must_use]
    pub fn for_deadline(deadline: NaiveDate, today: NaiveDate) -> Self {
        if deadline <= today {
            return Self::Critical;
        }
        match (deadline - today).num_days() {
            1 => Self::High,
            2..=3 => Self::Normal,
            _ => Self::Low,
        }
    }
}

/// A dispatched (or to-be-dispatched) request for attention.
///
/// At most one live alert may exist per
/// `(work_item_id, deadline_date, alert_type, escalation_level)`; the store
/// enforces this and concurrent creators receive the existing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub work_item_id: Uuid,
    pub deadline_date: NaiveDate,
    /// The task owner the chain resolution started from.
    pub intended_recipient_id: Uuid,
    /// Who the alert was actually routed to. `None` for synthetic fallback
    /// recipients that exist only as an email address.
    pub actual_recipient_id: Option<Uuid>,
    pub alert_type: AlertType,
    pub escalation_level: u8,
    pub urgency: Urgency,
    pub status: AlertStatus,
    pub scheduled_send_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub escalation_timeout_at: Option<DateTime<Utc>>,
    pub parent_alert_id: Option<Uuid>,
    pub escalation_reason: Option<String>,
    /// Free-form context: magic link, skipped recipients, impact digest.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Action carried by an outbound queue row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueAction {
    Send,
    Remind,
}

/// A row in the outbound send queue.
///
/// `idempotency_key` is unique; enqueueing the same key twice is a no-op,
/// which is what prevents double sends when alert creation races.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedSend {
    pub id: Uuid,
    pub alert_id: Uuid,
    pub action: QueueAction,
    pub scheduled_for: DateTime<Utc>,
    pub priority: i32,
    pub idempotency_key: String,
    pub processed_at: Option<DateTime<Utc>>,
}

impl QueuedSend {
    #[must_use]
    pub fn send(alert_id: Uuid, scheduled_for: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_id,
            action: QueueAction::Send,
            scheduled_for,
            priority: 5,
            idempotency_key: format!("send-{alert_id}"),
            processed_at: None,
        }
    }

    #[must_use]
    pub fn remind(alert_id: Uuid, scheduled_for: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_id,
            action: QueueAction::Remind,
            scheduled_for,
            priority: 5,
            idempotency_key: format!("remind-{alert_id}"),
            processed_at: None,
        }
    }
}
