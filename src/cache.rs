//! Cache-aside reader.
//!
//! Reads attempt the live fetch first; success refreshes the local
//! snapshot, failure falls back to the last-known-good entry for the key.
//! The cache is independent of the write queue: a read failure enqueues
//! nothing, and a failed write never invalidates a cached read.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::sync_item::{epoch_millis, CacheEntry};
use crate::transport::TransportError;

/// Keyed snapshots of previously successful reads.
pub struct CacheAside {
    entries: DashMap<String, CacheEntry>,
    /// Entries older than this are not served; `None` disables expiry.
    max_age: Option<Duration>,

    refreshes: AtomicU64,
    fallbacks: AtomicU64,
    misses: AtomicU64,
}

impl CacheAside {
    #[must_use]
    pub fn new(max_age: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            max_age,
            refreshes: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fetch `key` via `fetch`, refreshing the snapshot on success and
    /// serving the last-known-good value on failure. Propagates the fetch
    /// error only when no usable snapshot exists.
    pub async fn read<F, Fut>(&self, key: &str, fetch: F) -> Result<Value, TransportError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, TransportError>>,
    {
        match fetch().await {
            Ok(value) => {
                self.entries
                    .insert(key.to_string(), CacheEntry::new(key, value.clone()));
                self.refreshes.fetch_add(1, Ordering::Relaxed);
                crate::metrics::record_cache_read("refresh");
                debug!(key, "Snapshot refreshed from live read");
                Ok(value)
            }
            Err(err) => {
                let now = epoch_millis();
                if let Some(entry) = self.entries.get(key) {
                    if !self.is_expired(&entry, now) {
                        self.fallbacks.fetch_add(1, Ordering::Relaxed);
                        crate::metrics::record_cache_read("fallback");
                        warn!(key, error = %err, "Serving cached snapshot after failed read");
                        return Ok(entry.value.clone());
                    }
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                crate::metrics::record_cache_read("miss");
                Err(err)
            }
        }
    }

    /// Last snapshot for `key`, expired or not.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|r| r.value().clone())
    }

    /// Drop entries past the max age. Returns how many were removed.
    /// No-op when expiry is disabled.
    pub fn purge_expired(&self) -> usize {
        let Some(max_age) = self.max_age else {
            return 0;
        };
        let now = epoch_millis();
        let cutoff = max_age.as_millis() as i64;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.age_millis(now) <= cutoff);
        let purged = before - self.entries.len();
        if purged > 0 {
            debug!(purged, "Expired cache entries purged");
        }
        purged
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lifetime counters: (refreshes, fallbacks, misses).
    #[must_use]
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.refreshes.load(Ordering::Relaxed),
            self.fallbacks.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    fn is_expired(&self, entry: &CacheEntry, now: i64) -> bool {
        match self.max_age {
            Some(max_age) => entry.age_millis(now) > max_age.as_millis() as i64,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transient() -> TransportError {
        TransportError::Transient("network unreachable".to_string())
    }

    #[tokio::test]
    async fn test_successful_read_refreshes_snapshot() {
        let cache = CacheAside::new(None);

        let value = cache
            .read("user-1:settings", || async { Ok(json!({"theme": "dark"})) })
            .await
            .unwrap();

        assert_eq!(value, json!({"theme": "dark"}));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.entry("user-1:settings").unwrap().value, value);
        assert_eq!(cache.stats(), (1, 0, 0));
    }

    #[tokio::test]
    async fn test_failed_read_serves_cached_value() {
        let cache = CacheAside::new(None);
        cache
            .read("user-1:settings", || async { Ok(json!({"theme": "dark"})) })
            .await
            .unwrap();

        let value = cache
            .read("user-1:settings", || async { Err(transient()) })
            .await
            .unwrap();

        assert_eq!(value, json!({"theme": "dark"}));
        assert_eq!(cache.stats(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_failed_read_without_snapshot_propagates() {
        let cache = CacheAside::new(None);

        let result = cache
            .read("user-1:settings", || async { Err(transient()) })
            .await;

        assert!(result.is_err());
        assert_eq!(cache.stats(), (0, 0, 1));
    }

    #[tokio::test]
    async fn test_successful_read_overwrites_previous_snapshot() {
        let cache = CacheAside::new(None);
        cache
            .read("k", || async { Ok(json!({"v": 1})) })
            .await
            .unwrap();
        cache
            .read("k", || async { Ok(json!({"v": 2})) })
            .await
            .unwrap();

        let value = cache.read("k", || async { Err(transient()) }).await.unwrap();
        assert_eq!(value, json!({"v": 2}));
    }

    #[tokio::test]
    async fn test_expired_snapshot_is_not_served() {
        let cache = CacheAside::new(Some(Duration::from_secs(60)));
        cache
            .read("k", || async { Ok(json!({"v": 1})) })
            .await
            .unwrap();

        // Age the entry past the limit.
        cache
            .entries
            .get_mut("k")
            .map(|mut e| e.cached_at -= 120_000)
            .unwrap();

        let result = cache.read("k", || async { Err(transient()) }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = CacheAside::new(Some(Duration::from_secs(60)));
        cache
            .read("fresh", || async { Ok(json!(1)) })
            .await
            .unwrap();
        cache
            .read("stale", || async { Ok(json!(2)) })
            .await
            .unwrap();
        cache
            .entries
            .get_mut("stale")
            .map(|mut e| e.cached_at -= 120_000)
            .unwrap();

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.entry("fresh").is_some());
    }

    #[tokio::test]
    async fn test_purge_noop_without_expiry() {
        let cache = CacheAside::new(None);
        cache.read("k", || async { Ok(json!(1)) }).await.unwrap();
        assert_eq!(cache.purge_expired(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let cache = CacheAside::new(None);
        cache
            .read("a", || async { Ok(json!("a-value")) })
            .await
            .unwrap();

        // A snapshot for "a" does not satisfy a failed read of "b".
        let result = cache.read("b", || async { Err(transient()) }).await;
        assert!(result.is_err());
    }
}
