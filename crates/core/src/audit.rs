use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a mutation originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    PlanImport,
    StatusResponse,
    Escalation,
    ApiUpdate,
    System,
}

/// One append-only audit entry. Never updated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub field_changed: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub change_source: ChangeSource,
    /// Transaction batch this change belongs to, for forensic grouping.
    pub batch_id: Option<Uuid>,
    pub changed_by: String,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub changed_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Minimal entry; callers chain field mutations on the returned value.
    #[must_use]
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: Uuid,
        action: impl Into<String>,
        change_source: ChangeSource,
        changed_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_type: entity_type.into(),
            entity_id,
            action: action.into(),
            field_changed: None,
            old_value: None,
            new_value: None,
            change_source,
            batch_id: None,
            changed_by: changed_by.into(),
            reason: None,
            metadata: None,
            changed_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_field(
        mut self,
        field: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        self.field_changed = Some(field.into());
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
