use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ExternalId;

/// Whether a resource can currently receive and act on alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityStatus {
    #[default]
    Active,
    OnLeave,
    Unavailable,
    Partial,
}

/// A person who owns or backs up work items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub external_id: ExternalId,
    pub name: String,
    pub primary_email: String,
    /// Preferred delivery address; falls back to `primary_email` when unset.
    pub notification_email: Option<String>,
    pub role: Option<String>,
    pub backup_resource_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
    pub availability_status: AvailabilityStatus,
    pub leave_start: Option<NaiveDate>,
    pub leave_end: Option<NaiveDate>,
    /// IANA timezone name, e.g. `America/New_York`. Invalid values fall back
    /// to UTC at the point of use.
    pub timezone: String,
    pub max_utilization: i32,
    pub chat_user_id: Option<String>,
}

impl Resource {
    #[must_use]
    pub fn new(external_id: ExternalId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id,
            name: name.into(),
            primary_email: email.into(),
            notification_email: None,
            role: None,
            backup_resource_id: None,
            manager_id: None,
            availability_status: AvailabilityStatus::Active,
            leave_start: None,
            leave_end: None,
            timezone: "UTC".to_owned(),
            max_utilization: 100,
            chat_user_id: None,
        }
    }

    /// Address alerts should be delivered to.
    #[must_use]
    pub fn delivery_email(&self) -> &str {
        self.notification_email
            .as_deref()
            .unwrap_or(&self.primary_email)
    }

    /// Availability on a given date, accounting for a recorded leave window
    /// even when `availability_status` was not updated to match.
    #[must_use]
    pub fn is_available_on(&self, date: NaiveDate) -> bool {
        if self.availability_status != AvailabilityStatus::Active {
            return false;
        }
        if let (Some(start), Some(end)) = (self.leave_start, self.leave_end)
            && start <= date
            && date <= end
        {
            return false;
        }
        true
    }
}
