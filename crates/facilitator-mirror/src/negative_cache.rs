//! Optional per-key negative cache: a brief, bounded memory of "not found"
//! answers so a burst of lookups against an unknown key doesn't repeatedly
//! walk the full mirror map. Per the design notes, this only matters when a
//! per-key view sits in front of the canonical full-mirror map; it is not
//! required for correctness, only to blunt a stampede.

use std::time::Duration;

use moka::future::Cache;

/// Bounded, TTL-expiring marker cache keyed by `svcKey`.
pub struct NegativeCache {
    cache: Cache<String, ()>,
}

impl NegativeCache {
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        Self {
            cache: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_entries)
                .build(),
        }
    }

    pub async fn mark_missing(&self, key: &str) {
        self.cache.insert(key.to_string(), ()).await;
    }

    pub async fn is_known_missing(&self, key: &str) -> bool {
        self.cache.get(key).await.is_some()
    }

    /// Called whenever the mirror is replaced (refresh or push); stale
    /// negative entries must not survive a change to the authoritative map.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}
