use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A company holiday. A `None` country applies universally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holiday {
    pub id: Uuid,
    pub date: NaiveDate,
    pub country_code: Option<String>,
    pub name: Option<String>,
}

/// Business-day arithmetic over a resolved holiday set.
///
/// The calendar is pure: holiday loading and caching happen upstream, this
/// type only answers date questions. A business day is a date that is
/// neither Saturday, Sunday, nor in the holiday set.
#[derive(Debug, Clone, Default)]
pub struct BusinessCalendar {
    holidays: HashSet<NaiveDate>,
}

impl BusinessCalendar {
    #[must_use]
    pub fn new(holidays: HashSet<NaiveDate>) -> Self {
        Self { holidays }
    }

    /// Calendar with no holidays (weekends only).
    #[must_use]
    pub fn weekends_only() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_weekend(date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    #[must_use]
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    #[must_use]
    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !Self::is_weekend(date) && !self.is_holiday(date)
    }

    /// The date `n` business days before `target`.
    ///
    /// Steps backward one calendar day at a time, counting only business
    /// days. The iteration cap of `3n + 30` guards against degenerate
    /// holiday sets that would otherwise never terminate.
    #[must_use]
    pub fn business_days_before(&self, target: NaiveDate, n: u32) -> NaiveDate {
        self.step(target, n, -1)
    }

    /// The date `n` business days after `start`.
    #[must_use]
    pub fn business_days_after(&self, start: NaiveDate, n: u32) -> NaiveDate {
        self.step(start, n, 1)
    }

    fn step(&self, from: NaiveDate, n: u32, direction: i64) -> NaiveDate {
        if n == 0 {
            return from;
        }
        let mut date = from;
        let mut counted = 0u32;
        let max_iterations = n * 3 + 30;
        let mut iterations = 0u32;
        while counted < n && iterations < max_iterations {
            date += Duration::days(direction);
            if self.is_business_day(date) {
                counted += 1;
            }
            iterations += 1;
        }
        date
    }

    /// Count business days in the half-open range `[start, end)`.
    #[must_use]
    pub fn business_days_between(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        if start >= end {
            return 0;
        }
        let mut count = 0;
        let mut current = start;
        while current < end {
            if self.is_business_day(current) {
                count += 1;
            }
            current += Duration::days(1);
        }
        count
    }

    /// The date a status-check alert for `deadline` should go out.
    #[must_use]
    pub fn alert_send_date(&self, deadline: NaiveDate, days_before: u32) -> NaiveDate {
        self.business_days_before(deadline, days_before)
    }

    /// Exact UTC instant an alert should be sent: the resolved send date,
    /// anchored at `local_time` in the recipient's timezone.
    ///
    /// Unknown timezone names fall back to UTC rather than failing the send.
    #[must_use]
    pub fn alert_send_timestamp(
        &self,
        deadline: NaiveDate,
        local_time: NaiveTime,
        timezone: &str,
        days_before: u32,
    ) -> DateTime<Utc> {
        let send_date = self.alert_send_date(deadline, days_before);
        let tz = Tz::from_str(timezone).unwrap_or(Tz::UTC);
        let local = send_date.and_time(local_time);
        match tz.from_local_datetime(&local).earliest() {
            Some(zoned) => zoned.with_timezone(&Utc),
            // DST gap: fall back to interpreting the wall time as UTC.
            None => Utc.from_utc_datetime(&local),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn us_presidents_day() -> BusinessCalendar {
        // Monday 2024-02-19.
        BusinessCalendar::new([d("2024-02-19")].into_iter().collect())
    }

    #[test]
    fn weekend_detection() {
        assert!(BusinessCalendar::is_weekend(d("2024-02-10")));
        assert!(BusinessCalendar::is_weekend(d("2024-02-11")));
        assert!(!BusinessCalendar::is_weekend(d("2024-02-12")));
    }

    #[test]
    fn monday_deadline_alerts_on_friday() {
        let cal = BusinessCalendar::weekends_only();
        // Monday 2024-02-12, one business day before = Friday 2024-02-09.
        assert_eq!(cal.alert_send_date(d("2024-02-12"), 1), d("2024-02-09"));
    }

    #[test]
    fn holiday_monday_pushes_alert_to_previous_friday() {
        let cal = us_presidents_day();
        // Deadline Tuesday after the holiday Monday: one business day before
        // skips both the holiday and the weekend.
        assert_eq!(cal.alert_send_date(d("2024-02-20"), 1), d("2024-02-16"));
    }

    #[test]
    fn zero_days_before_is_identity() {
        let cal = BusinessCalendar::weekends_only();
        assert_eq!(cal.business_days_before(d("2024-02-10"), 0), d("2024-02-10"));
    }

    #[test]
    fn business_day_round_trip() {
        let cal = us_presidents_day();
        for start in ["2024-02-12", "2024-02-16", "2024-02-21"] {
            let start = d(start);
            for n in 1..6 {
                let back = cal.business_days_before(start, n);
                assert_eq!(cal.business_days_after(back, n), start);
            }
        }
    }

    #[test]
    fn business_days_between_is_half_open() {
        let cal = BusinessCalendar::weekends_only();
        // Mon..Fri of the same week: Mon,Tue,Wed,Thu counted, Fri excluded.
        assert_eq!(cal.business_days_between(d("2024-02-05"), d("2024-02-09")), 4);
        assert_eq!(cal.business_days_between(d("2024-02-09"), d("2024-02-05")), 0);
        // Across a weekend.
        assert_eq!(cal.business_days_between(d("2024-02-09"), d("2024-02-13")), 2);
    }

    #[test]
    fn send_timestamp_converts_local_nine_am_to_utc() {
        let cal = BusinessCalendar::weekends_only();
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        // 09:00 in New York (EST, UTC-5) on Friday 2024-02-09 = 14:00 UTC.
        let ts = cal.alert_send_timestamp(d("2024-02-12"), nine, "America/New_York", 1);
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 2, 9, 14, 0, 0).unwrap());
    }

    #[test]
    fn send_timestamp_unknown_timezone_falls_back_to_utc() {
        let cal = BusinessCalendar::weekends_only();
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let ts = cal.alert_send_timestamp(d("2024-02-12"), nine, "Not/AZone", 1);
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 2, 9, 9, 0, 0).unwrap());
    }
}
