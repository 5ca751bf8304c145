//! Size-bounded key → bytes store with per-entry expiry.
//!
//! Capacity is enforced by moka's admission and eviction policy, so a
//! full cache costs the same per insert as an empty one. Expiry is checked
//! on read, which lets callers tell an expired entry from a missing one.

use std::time::Duration;

use hyper::body::Bytes;
use moka::ops::compute::Op;
use moka::sync::Cache;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Bytes,
    expires_at: Instant,
}

/// Result of a cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Live entry.
    Hit(Bytes),
    /// An entry existed but its TTL had elapsed. It is gone now.
    Expired,
    /// No entry.
    Miss,
}

/// A thread-safe TTL cache.
#[derive(Clone)]
pub struct TtlCache {
    inner: Cache<String, CacheEntry>,
    max_size: usize,
}

impl std::fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.inner.entry_count())
            .field("max_size", &self.max_size)
            .finish()
    }
}

impl TtlCache {
    /// Create an empty cache holding at most `max_size` entries.
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Cache::new(max_size as u64),
            max_size,
        }
    }

    pub fn lookup(&self, key: &str) -> CacheLookup {
        let now = Instant::now();
        match self.inner.get(key) {
            Some(entry) if entry.expires_at > now => return CacheLookup::Hit(entry.value),
            Some(_) => {}
            None => return CacheLookup::Miss,
        }

        // A concurrent insert may have refreshed the entry since the read.
        self.inner.entry_by_ref(key).and_compute_with(|current| match current {
            Some(entry) if entry.value().expires_at <= now => Op::Remove,
            _ => Op::Nop,
        });
        CacheLookup::Expired
    }

    /// Store `value` for `ttl`. A zero TTL or zero capacity stores nothing.
    pub fn insert(&self, key: impl Into<String>, value: Bytes, ttl: Duration) {
        if ttl.is_zero() || self.max_size == 0 {
            return;
        }
        self.inner.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn remove(&self, key: &str) {
        self.inner.invalidate(key);
    }

    /// Number of entries, after applying pending evictions.
    pub fn len(&self) -> usize {
        self.inner.run_pending_tasks();
        self.inner.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hit_then_expired_then_miss() {
        tokio::time::pause();
        let cache = TtlCache::new(10);
        cache.insert("token", Bytes::from_static(b"{\"uid\":\"x\"}"), Duration::from_secs(60));

        assert_eq!(
            cache.lookup("token"),
            CacheLookup::Hit(Bytes::from_static(b"{\"uid\":\"x\"}"))
        );

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(matches!(cache.lookup("token"), CacheLookup::Hit(_)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.lookup("token"), CacheLookup::Expired);
        assert_eq!(cache.lookup("token"), CacheLookup::Miss);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_zero_ttl_is_not_stored() {
        let cache = TtlCache::new(10);
        cache.insert("token", Bytes::from_static(b"x"), Duration::ZERO);
        assert_eq!(cache.lookup("token"), CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_overwrite_refreshes_value() {
        let cache = TtlCache::new(1);
        cache.insert("token", Bytes::from_static(b"old"), Duration::from_secs(5));
        cache.insert("token", Bytes::from_static(b"new"), Duration::from_secs(5));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup("token"), CacheLookup::Hit(Bytes::from_static(b"new")));
    }

    #[tokio::test]
    async fn test_size_bound_holds_under_churn() {
        let cache = TtlCache::new(100);
        for i in 0..1_000 {
            cache.insert(format!("token-{}", i), Bytes::from_static(b"{}"), Duration::from_secs(60));
        }
        assert!(cache.len() <= 100);
        assert_eq!(cache.max_size(), 100);
    }

    #[tokio::test]
    async fn test_expired_entry_is_removed_on_read() {
        tokio::time::pause();
        let cache = TtlCache::new(10);
        cache.insert("short", Bytes::from_static(b"1"), Duration::from_secs(1));
        cache.insert("long", Bytes::from_static(b"2"), Duration::from_secs(100));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.lookup("short"), CacheLookup::Expired);
        assert_eq!(cache.len(), 1);
        assert!(matches!(cache.lookup("long"), CacheLookup::Hit(_)));
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let cache = TtlCache::new(1000);
        let mut tasks = Vec::new();
        for i in 0..8 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                for j in 0..100 {
                    let key = format!("k{}", (i * 100 + j) % 50);
                    cache.insert(key.clone(), Bytes::from(vec![i as u8]), Duration::from_secs(30));
                    assert!(matches!(cache.lookup(&key), CacheLookup::Hit(_)));
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(cache.len(), 50);
    }
}
