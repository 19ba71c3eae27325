//! General-availability gating of index images.
//!
//! GA dates are memoized per platform version for the lifetime of the cache.
//! Entries are never evicted; a process that needs fresh dates builds a new
//! cache.

use crate::error::FreshmakerResult;
use crate::versioning::Clock;
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Product release schedule lookup
#[async_trait]
pub trait ReleaseDateService: Send + Sync {
    /// GA date of a platform version such as `v4.12`; `None` when unknown
    async fn ga_date(&self, platform_version: &str) -> FreshmakerResult<Option<NaiveDate>>;
}

pub struct ReleaseDateCache {
    service: Arc<dyn ReleaseDateService>,
    clock: Arc<dyn Clock>,
    dates: DashMap<String, Option<NaiveDate>>,
}

impl std::fmt::Debug for ReleaseDateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseDateCache")
            .field("cached", &self.dates.len())
            .finish()
    }
}

impl ReleaseDateCache {
    pub fn new(service: Arc<dyn ReleaseDateService>, clock: Arc<dyn Clock>) -> Self {
        Self {
            service,
            clock,
            dates: DashMap::new(),
        }
    }

    /// Pin the GA date of a platform version, bypassing the service
    pub fn insert_override(&self, platform_version: impl Into<String>, date: Option<NaiveDate>) {
        self.dates.insert(platform_version.into(), date);
    }

    pub async fn ga_date(&self, platform_version: &str) -> Option<NaiveDate> {
        if let Some(cached) = self.dates.get(platform_version) {
            return *cached;
        }

        // Lookup failures count as "not yet available" and are not memoized
        let date = match self.service.ga_date(platform_version).await {
            Ok(date) => date,
            Err(e) => {
                warn!(
                    platform_version = %platform_version,
                    error = %e,
                    "GA date lookup failed"
                );
                return None;
            }
        };
        self.dates.insert(platform_version.to_string(), date);
        date
    }

    /// True when the platform version reached GA on or before today
    pub async fn is_released(&self, platform_version: &str) -> bool {
        let released = match self.ga_date(platform_version).await {
            Some(date) => date <= self.clock.today(),
            None => false,
        };
        debug!(platform_version = %platform_version, released, "GA check");
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FreshmakerError;
    use crate::versioning::FixedClock;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingService {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReleaseDateService for CountingService {
        async fn ga_date(&self, platform_version: &str) -> FreshmakerResult<Option<NaiveDate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match platform_version {
                "v4.10" => Ok(NaiveDate::from_ymd_opt(2022, 3, 10)),
                "v4.99" => Ok(NaiveDate::from_ymd_opt(2099, 1, 1)),
                "broken" => Err(FreshmakerError::collaborator("release dates", "unavailable")),
                _ => Ok(None),
            }
        }
    }

    fn cache(service: Arc<CountingService>) -> ReleaseDateCache {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
        ReleaseDateCache::new(service, Arc::new(clock))
    }

    #[tokio::test]
    async fn test_released_and_unreleased() {
        let cache = cache(Arc::new(CountingService::default()));
        assert!(cache.is_released("v4.10").await);
        assert!(!cache.is_released("v4.99").await);
        assert!(!cache.is_released("v0.0").await);
        assert!(!cache.is_released("broken").await);
    }

    #[tokio::test]
    async fn test_lookups_are_memoized() {
        let service = Arc::new(CountingService::default());
        let cache = cache(service.clone());
        cache.is_released("v4.10").await;
        cache.is_released("v4.10").await;
        cache.is_released("v0.0").await;
        cache.is_released("v0.0").await;
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_override_wins() {
        let service = Arc::new(CountingService::default());
        let cache = cache(service.clone());
        cache.insert_override("v4.99", NaiveDate::from_ymd_opt(2022, 12, 31));
        assert!(cache.is_released("v4.99").await);
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }
}
