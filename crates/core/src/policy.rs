use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resource::AvailabilityStatus;

/// Role of a recipient within the escalation chain.
///
/// The chain is always exactly four levels deep, in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationTarget {
    Primary,
    Backup,
    Manager,
    Pm,
}

impl EscalationTarget {
    #[must_use]
    pub fn for_level(level: u8) -> Self {
        match level {
            0 => Self::Primary,
            1 => Self::Backup,
            2 => Self::Manager,
            _ => Self::Pm,
        }
    }
}

/// The PM level is terminal: escalation never goes past level 3.
#[must_use]
pub fn next_escalation_level(current: u8) -> u8 {
    (current + 1).min(3)
}

/// A resolved member of the escalation chain.
///
/// Synthetic fallback recipients (org fallback email, ops email) carry no
/// `resource_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRecipient {
    pub resource_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub escalation_level: u8,
    pub target: EscalationTarget,
    pub availability: AvailabilityStatus,
    pub is_available: bool,
    /// Populated when the recipient was skipped during resolution.
    pub skip_reason: Option<String>,
    pub timezone: String,
    pub chat_user_id: Option<String>,
}

/// Escalation behavior, per program with a global default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Business days before the deadline to send the status check.
    pub days_before_deadline: u32,
    /// Local time of day alerts go out in the recipient's timezone.
    pub alert_time_of_day: NaiveTime,
    /// Hours to wait per level before escalating; `None` is terminal.
    /// Indexed by escalation level 0..=3.
    pub timeout_hours_per_level: [Option<u32>; 4],
    /// Delays up to this many days are applied without PM approval.
    pub auto_approve_delay_up_to_days: i64,
    /// Whether BLOCKED responses escalate to the PM immediately.
    pub blocker_immediate_escalation: bool,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            days_before_deadline: 1,
            alert_time_of_day: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            timeout_hours_per_level: [Some(4), Some(4), Some(2), None],
            auto_approve_delay_up_to_days: 0,
            blocker_immediate_escalation: true,
        }
    }
}

impl EscalationPolicy {
    /// Timeout for a given level; `None` means the level is terminal.
    #[must_use]
    pub fn timeout_hours(&self, level: u8) -> Option<u32> {
        self.timeout_hours_per_level
            .get(usize::from(level))
            .copied()
            .flatten()
    }

    /// When an alert sent at `sent_at` on `level` should escalate, or `None`
    /// if the level never times out.
    #[must_use]
    pub fn escalation_timeout_at(
        &self,
        sent_at: DateTime<Utc>,
        level: u8,
    ) -> Option<DateTime<Utc>> {
        self.timeout_hours(level)
            .map(|hours| sent_at + Duration::hours(i64::from(hours)))
    }

    /// Whether an alert on `level` sent at `sent_at` has timed out as of
    /// `now`.
    #[must_use]
    pub fn should_escalate(&self, sent_at: DateTime<Utc>, level: u8, now: DateTime<Utc>) -> bool {
        match self.escalation_timeout_at(sent_at, level) {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_timeouts() {
        let policy = EscalationPolicy::default();
        assert_eq!(policy.timeout_hours(0), Some(4));
        assert_eq!(policy.timeout_hours(1), Some(4));
        assert_eq!(policy.timeout_hours(2), Some(2));
        assert_eq!(policy.timeout_hours(3), None);
        assert_eq!(policy.timeout_hours(9), None);
    }

    #[test]
    fn escalates_after_timeout_only() {
        let policy = EscalationPolicy::default();
        let sent = Utc.with_ymd_and_hms(2024, 2, 8, 9, 0, 0).unwrap();
        assert!(!policy.should_escalate(sent, 0, sent + Duration::hours(3)));
        assert!(policy.should_escalate(sent, 0, sent + Duration::hours(4)));
        assert!(policy.should_escalate(sent, 0, sent + Duration::hours(5)));
        // PM level is terminal.
        assert!(!policy.should_escalate(sent, 3, sent + Duration::hours(100)));
    }

    #[test]
    fn level_advancement_caps_at_pm() {
        assert_eq!(next_escalation_level(0), 1);
        assert_eq!(next_escalation_level(2), 3);
        assert_eq!(next_escalation_level(3), 3);
        assert_eq!(EscalationTarget::for_level(3), EscalationTarget::Pm);
    }
}
