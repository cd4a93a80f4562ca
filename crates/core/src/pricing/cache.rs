//! Price statistics caching using Moka.
//!
//! Statistics are read far more often than observations are written (every
//! edited line item asks for them), so results are memoised per
//! (cost code, unit, window, as-of date) and dropped for a (cost code, unit)
//! pair as soon as a new observation for it is recorded.

use chrono::NaiveDate;
use moka::sync::Cache;
use std::time::Duration;
use tracing::warn;

use super::types::PriceStatistics;

/// Cache key for a statistics lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatsKey {
    /// Normalised cost code.
    pub cost_code: String,
    /// Normalised unit.
    pub unit: String,
    /// Window in days.
    pub window_days: u32,
    /// Last day included in the window.
    pub as_of: NaiveDate,
}

/// Cache for price statistics.
///
/// `None` results are cached too, so a pair with no history is not
/// re-queried on every keystroke.
#[derive(Clone)]
pub struct PriceStatsCache {
    cache: Cache<StatsKey, Option<PriceStatistics>>,
}

impl PriceStatsCache {
    /// Creates a cache with the given capacity and time-to-live.
    #[must_use]
    pub fn with_config(max_capacity: u64, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .support_invalidation_closures()
            .build();

        Self { cache }
    }

    /// Returns a cached lookup result, if present.
    #[must_use]
    pub fn get(&self, key: &StatsKey) -> Option<Option<PriceStatistics>> {
        self.cache.get(key)
    }

    /// Stores a lookup result.
    pub fn insert(&self, key: StatsKey, stats: Option<PriceStatistics>) {
        self.cache.insert(key, stats);
    }

    /// Drops every cached window for a (cost code, unit) pair.
    pub fn invalidate_pair(&self, cost_code: &str, unit: &str) {
        let cost_code = cost_code.to_string();
        let unit = unit.to_string();
        if let Err(e) = self
            .cache
            .invalidate_entries_if(move |key, _| key.cost_code == cost_code && key.unit == unit)
        {
            warn!(error = %e, "Failed to register cache invalidation, clearing cache");
            self.cache.invalidate_all();
        }
    }

    /// Invalidates all cached entries.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Runs cache maintenance tasks.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }

    /// Returns the number of entries currently in the cache.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
