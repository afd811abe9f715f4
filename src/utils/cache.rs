//! In-Memory TTL Cache Module
//!
//! Thread-safe caching layer used for the remote notebook config list and
//! for COG metadata. Backed by DashMap so handlers never contend on a
//! global lock.
//!
//! Features:
//! - TTL-based expiration (per cache)
//! - Cache HIT/MISS logging
//! - Hit/miss counters for `/stats`

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Cache entry with creation time for TTL validation
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
        }
    }

    /// An entry is expired once its full TTL has elapsed
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }

    pub fn remaining_ttl(&self) -> Duration {
        self.ttl.saturating_sub(self.created_at.elapsed())
    }
}

/// Keyed cache with a single TTL for all entries
#[derive(Clone)]
pub struct TtlCache<V: Clone> {
    name: &'static str,
    store: Arc<DashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            store: Arc::new(DashMap::new()),
            ttl,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the cached value if present and not expired
    pub fn get(&self, key: &str) -> Option<V> {
        if let Some(entry) = self.store.get(key) {
            if entry.is_expired() {
                drop(entry);
                // A fresh `set` landing in between is kept
                self.store.remove_if(key, |_, e| e.is_expired());
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("📭 {} CACHE MISS (expired): {}", self.name, key);
                None
            } else {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "✅ {} CACHE HIT: {} (TTL: {}s remaining)",
                    self.name,
                    key,
                    entry.remaining_ttl().as_secs()
                );
                Some(entry.value.clone())
            }
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("📭 {} CACHE MISS: {}", self.name, key);
            None
        }
    }

    /// Store a value. Callers only store successful results.
    pub fn set(&self, key: &str, value: V) {
        self.store
            .insert(key.to_string(), CacheEntry::new(value, self.ttl));
        debug!("💾 {} CACHE SET: {} (TTL: {}s)", self.name, key, self.ttl.as_secs());
    }

    /// Drop every expired entry, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(self.store.len());
        if removed > 0 {
            info!("🧹 {} CACHE CLEANUP: {} expired entries removed", self.name, removed);
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            name: self.name,
            entries: self.store.len(),
            hits,
            misses,
            hit_rate,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub name: &'static str,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub ttl_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_set_get() {
        let cache = TtlCache::new("test", Duration::from_secs(60));
        cache.set("a", 1u32);
        assert_eq!(cache.get("a"), Some(1));
    }

    #[test]
    fn test_cache_miss() {
        let cache: TtlCache<u32> = TtlCache::new("test", Duration::from_secs(60));
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn test_cache_expires() {
        let cache = TtlCache::new("test", Duration::from_millis(20));
        cache.set("a", "value".to_string());
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get("a").is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_zero_ttl_never_hits() {
        let cache = TtlCache::new("test", Duration::ZERO);
        cache.set("a", 1u8);
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_expired_read_keeps_fresh_value() {
        let cache = TtlCache::new("test", Duration::from_millis(20));
        cache.set("a", 1u8);
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get("a").is_none());

        cache.set("a", 2u8);
        assert_eq!(cache.get("a"), Some(2));
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_cleanup_expired() {
        let cache = TtlCache::new("test", Duration::from_millis(10));
        cache.set("a", 1u8);
        cache.set("b", 2u8);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.cleanup_expired(), 2);
    }

    #[test]
    fn test_cache_stats() {
        let cache = TtlCache::new("test", Duration::from_secs(60));
        cache.set("a", 1u8);
        cache.get("a");
        cache.get("b");

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 50.0);
    }
}
