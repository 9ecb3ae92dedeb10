//! Timestamped concurrent map with per-entry TTL.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::remote::types::OperationKey;

struct CacheEntry<V> {
    stored_at: Instant,
    ttl: Duration,
    value: V,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }

    /// Swept once older than twice the window it was stored with.
    fn is_sweepable(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= self.ttl.saturating_mul(2)
    }
}

/// Concurrent `OperationKey -> V` map whose entries expire.
///
/// Uses tokio's clock so tests can drive expiry with a paused runtime.
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// The stored value if it is younger than its TTL.
    pub fn get(&self, key: &OperationKey) -> Option<V> {
        let now = Instant::now();
        self.entries
            .get(key.as_str())
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: &OperationKey, value: V, ttl: Duration) {
        self.entries.insert(
            key.as_str().to_string(),
            CacheEntry {
                stored_at: Instant::now(),
                ttl,
                value,
            },
        );
    }

    pub fn remove(&self, key: &OperationKey) -> bool {
        self.entries.remove(key.as_str()).is_some()
    }

    /// Drop entries older than twice their TTL, returning how many went.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_sweepable(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::types::OperationKind;

    fn key(target: &str) -> OperationKey {
        OperationKey::new(OperationKind::DirectoryExists, 7, target)
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_served_until_ttl() {
        let cache = TtlCache::new();
        cache.insert(&key("/a"), 42u64, Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get(&key("/a")), Some(42));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&key("/a")), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_kept_until_sweep() {
        let cache = TtlCache::new();
        cache.insert(&key("/a"), (), Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(15)).await;
        assert!(cache.get(&key("/a")).is_none());
        assert_eq!(cache.sweep(), 0);
        assert_eq!(cache.len(), 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.sweep(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_respects_per_entry_ttl() {
        let cache = TtlCache::new();
        cache.insert(&key("/short"), 1u8, Duration::from_secs(5));
        cache.insert(&key("/long"), 2u8, Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.sweep(), 1);
        assert!(cache.get(&key("/long")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_refreshes_timestamp() {
        let cache = TtlCache::new();
        cache.insert(&key("/a"), 1u8, Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.insert(&key("/a"), 2u8, Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get(&key("/a")), Some(2));
    }

    #[tokio::test]
    async fn test_remove() {
        let cache = TtlCache::new();
        cache.insert(&key("/a"), 1u8, Duration::from_secs(10));
        assert!(cache.remove(&key("/a")));
        assert!(!cache.remove(&key("/a")));
    }
}
