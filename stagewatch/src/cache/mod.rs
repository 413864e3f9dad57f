//! Short-TTL memoization for idempotent aggregate reads.
//!
//! The cache is owned by whichever component composes the gateway (see
//! [`GatewayClient`](crate::client::GatewayClient)); there is no process-wide
//! instance. Invalidation is coarse: every successful mutation calls
//! [`ResultCache::clear`], which drops all entries and bumps a generation
//! counter so that reads already in flight cannot repopulate stale data.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default time-to-live for cached reads.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(60_000);

/// A cached value and the instant it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached value.
    pub value: serde_json::Value,
    /// When the value was stored.
    pub inserted_at: Instant,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
        }
    }

    /// An entry is valid iff `now - inserted_at < ttl`.
    #[must_use]
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) < ttl
    }
}

/// In-memory TTL cache keyed by read name.
#[derive(Debug)]
pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
    // Held for reading by generation-checked writes and for writing by clear().
    generation: RwLock<u64>,
    ttl: Duration,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl ResultCache {
    /// Creates an empty cache with the given TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            generation: RwLock::new(0),
            ttl,
        }
    }

    /// Returns the configured TTL.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the stored value if present and younger than the TTL.
    ///
    /// An expired entry is evicted and reported as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Instant::now();

        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_fresh(now, self.ttl) => {
                debug!(key, "Cache hit");
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            // Re-check under the shard lock so a concurrent set() survives.
            self.entries
                .remove_if(key, |_, entry| !entry.is_fresh(now, self.ttl));
            debug!(key, "Cache entry expired and evicted");
        }

        None
    }

    /// Stores `value` under `key`, overwriting any prior entry.
    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        let _generation = self.generation.read();
        self.entries.insert(key.into(), CacheEntry::new(value));
    }

    /// Stores `value` only if no [`clear`](Self::clear) happened since
    /// `generation` was observed.
    ///
    /// Returns true if the value was stored.
    pub fn set_if_generation(
        &self,
        key: impl Into<String>,
        value: serde_json::Value,
        generation: u64,
    ) -> bool {
        let current = self.generation.read();
        if *current != generation {
            debug!(
                observed = generation,
                current = *current,
                "Dropping cache write from a read that started before the last clear"
            );
            return false;
        }
        self.entries.insert(key.into(), CacheEntry::new(value));
        true
    }

    /// Drops every entry regardless of age.
    pub fn clear(&self) {
        let mut generation = self.generation.write();
        *generation += 1;
        let dropped = self.entries.len();
        self.entries.clear();
        debug!(dropped, generation = *generation, "Cache cleared");
    }

    /// Returns the current clear generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        *self.generation.read()
    }

    /// Returns the number of stored entries, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a fresh cached value, or runs `fetch` and caches its success.
    ///
    /// The generation is captured before `fetch` starts, so a `clear()` issued
    /// while the fetch is in flight prevents its result from being stored.
    /// Errors are returned as-is and never cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<serde_json::Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<serde_json::Value, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let generation = self.generation();
        let value = fetch().await?;
        self.set_if_generation(key, value.clone(), generation);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_get_after_set_returns_value() {
        let cache = ResultCache::default();
        cache.set("features", json!([{"patient": "p1"}]));

        assert_eq!(cache.get("features"), Some(json!([{"patient": "p1"}])));
        assert_eq!(cache.get("predictions"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites() {
        let cache = ResultCache::default();
        cache.set("stats", json!({"total_patients": 1}));
        cache.set("stats", json!({"total_patients": 2}));

        assert_eq!(cache.get("stats"), Some(json!({"total_patients": 2})));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_at_ttl_and_is_evicted() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.set("features", json!(1));

        tokio::time::advance(Duration::from_millis(59_999)).await;
        assert_eq!(cache.get("features"), Some(json!(1)));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("features"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_drops_everything() {
        let cache = ResultCache::default();
        cache.set("a", json!(1));
        tokio::time::advance(Duration::from_secs(30)).await;
        cache.set("b", json!(2));

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.generation(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_if_generation_rejects_after_clear() {
        let cache = ResultCache::default();
        let observed = cache.generation();

        cache.clear();

        assert!(!cache.set_if_generation("features", json!("stale"), observed));
        assert_eq!(cache.get("features"), None);
        assert!(cache.set_if_generation("features", json!("fresh"), cache.generation()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_fetch_memoizes() {
        let cache = ResultCache::default();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<_, ()> = cache
                .get_or_fetch("features", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(["x"]))
                })
                .await;
            assert_eq!(value, Ok(json!(["x"])));
            tokio::time::advance(Duration::from_secs(5)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_fetch_does_not_cache_errors() {
        let cache = ResultCache::default();

        let first: Result<serde_json::Value, &str> =
            cache.get_or_fetch("stats", || async { Err("boom") }).await;
        assert_eq!(first, Err("boom"));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_during_fetch_wins() {
        let cache = Arc::new(ResultCache::default());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch("features", || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok::<_, ()>(json!("stale"))
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        cache.clear();
        release_tx.send(()).unwrap();

        let value = reader.await.unwrap();
        assert_eq!(value, Ok(json!("stale")));
        assert_eq!(cache.get("features"), None);
    }
}
