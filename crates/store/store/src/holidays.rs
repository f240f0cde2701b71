use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use tracing::debug;

use cadence_core::BusinessCalendar;

use crate::error::StoreError;
use crate::store::ProjectStore;

/// Cached holiday entry for one country.
#[derive(Debug, Clone)]
struct CachedSet {
    holidays: HashSet<NaiveDate>,
    expires_at: DateTime<Utc>,
}

/// Process-local holiday cache in front of the store.
///
/// Entries are refreshed lazily on the first miss after expiry (1 hour).
/// Concurrent refreshes are permitted to race: both produce the same set, so
/// last-write-wins is harmless.
pub struct HolidayCache {
    store: Arc<dyn ProjectStore>,
    cache: DashMap<String, CachedSet>,
    ttl: Duration,
}

impl HolidayCache {
    #[must_use]
    pub fn new(store: Arc<dyn ProjectStore>) -> Self {
        Self {
            store,
            cache: DashMap::new(),
            ttl: Duration::hours(1),
        }
    }

    /// A [`BusinessCalendar`] for the given country, hitting the store only
    /// when the cached set is missing or stale.
    pub async fn calendar_for(&self, country: &str) -> Result<BusinessCalendar, StoreError> {
        let now = Utc::now();

        if let Some(entry) = self.cache.get(country)
            && now < entry.expires_at
        {
            return Ok(BusinessCalendar::new(entry.holidays.clone()));
        }

        let rows = self.store.list_holidays(Some(country)).await?;
        let holidays: HashSet<NaiveDate> = rows.into_iter().map(|h| h.date).collect();
        debug!(country, count = holidays.len(), "refreshed holiday cache");

        self.cache.insert(
            country.to_owned(),
            CachedSet {
                holidays: holidays.clone(),
                expires_at: now + self.ttl,
            },
        );

        Ok(BusinessCalendar::new(holidays))
    }

    /// Drop all cached sets, forcing a reload on next use. Called after
    /// holiday mutations through the API.
    pub fn invalidate(&self) {
        self.cache.clear();
    }
}
