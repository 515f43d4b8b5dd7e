//! Bounded memoization for normalization
//!
//! [`LruMemo`] is a string-keyed map with a fixed capacity and strict LRU
//! eviction: every hit promotes the entry to most-recently-used, and inserting
//! into a full memo evicts the least-recently-used entry. A single
//! `parking_lot::Mutex` guards the map; the critical sections are a lookup or
//! an insert and never include the computation itself.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

use super::normalize;
use crate::config::DEFAULT_NORMALIZATION_CACHE_CAPACITY;

/// Usage counters for a memo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

/// Thread-safe LRU memo keyed on the raw input string
#[derive(Debug)]
pub struct LruMemo<V> {
    entries: Mutex<LruCache<String, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> LruMemo<V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the memoized value for `key`, computing and inserting it on a miss.
    ///
    /// Two threads missing on the same key may both compute it; the later
    /// insert wins, which is harmless for pure functions.
    pub fn get_or_insert_with(&self, key: &str, compute: impl FnOnce(&str) -> V) -> V {
        if let Some(value) = self.entries.lock().get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return value.clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute(key);
        self.entries.lock().put(key.to_string(), value.clone());
        value
    }

    /// Look up `key` without promoting it
    pub fn peek(&self, key: &str) -> Option<V> {
        self.entries.lock().peek(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains(key)
    }

    /// Keys from most- to least-recently used
    pub fn keys_by_recency(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// Drop every entry and reset the counters
    pub fn clear(&self) {
        self.entries.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            len: entries.len(),
            capacity: entries.cap().get(),
        }
    }
}

/// LRU memo in front of [`normalize`]
#[derive(Debug)]
pub struct NormalizationCache {
    memo: LruMemo<String>,
}

impl NormalizationCache {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            memo: LruMemo::new(capacity),
        }
    }

    pub fn cached_normalize(&self, text: &str) -> String {
        self.memo.get_or_insert_with(text, |raw| {
            tracing::trace!("normalization cache miss for {:?}", raw);
            normalize(raw)
        })
    }

    pub fn stats(&self) -> CacheStats {
        self.memo.stats()
    }

    pub fn clear(&self) {
        self.memo.clear();
        tracing::debug!("Normalization cache cleared");
    }
}

impl Default for NormalizationCache {
    fn default() -> Self {
        Self::new(DEFAULT_NORMALIZATION_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn memo(capacity: usize) -> LruMemo<usize> {
        LruMemo::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let memo = memo(2);
        memo.get_or_insert_with("a", str::len);
        memo.get_or_insert_with("bb", str::len);
        memo.get_or_insert_with("ccc", str::len);

        assert!(!memo.contains("a"));
        assert!(memo.contains("bb"));
        assert!(memo.contains("ccc"));
        assert_eq!(memo.len(), 2);
    }

    #[test]
    fn test_hit_promotes_entry() {
        let memo = memo(2);
        memo.get_or_insert_with("a", str::len);
        memo.get_or_insert_with("bb", str::len);
        // touching "a" makes "bb" the eviction candidate
        memo.get_or_insert_with("a", |_| unreachable!("should be a hit"));
        memo.get_or_insert_with("ccc", str::len);

        assert_eq!(memo.keys_by_recency(), ["ccc", "a"]);
    }

    #[test]
    fn test_peek_does_not_promote() {
        let memo = memo(2);
        memo.get_or_insert_with("a", str::len);
        memo.get_or_insert_with("bb", str::len);
        assert_eq!(memo.peek("a"), Some(1));
        memo.get_or_insert_with("ccc", str::len);

        assert!(!memo.contains("a"));
    }

    #[test]
    fn test_stats_count_hits_and_misses() {
        let memo = memo(4);
        memo.get_or_insert_with("x", str::len);
        memo.get_or_insert_with("x", str::len);
        memo.get_or_insert_with("y", str::len);

        let stats = memo.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.len, 2);
        assert_eq!(stats.capacity, 4);

        memo.clear();
        assert!(memo.is_empty());
        assert_eq!(memo.stats().hits, 0);
    }

    #[test]
    fn test_cached_normalize_matches_normalize() {
        let cache = NormalizationCache::new(8);
        assert_eq!(cache.cached_normalize(" Snowman "), normalize(" Snowman "));
        assert_eq!(cache.cached_normalize(" Snowman "), "snowman");
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = NormalizationCache::new(0);
        assert_eq!(cache.stats().capacity, 1);
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(NormalizationCache::new(16));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let raw = format!("Name {}", (i + t) % 32);
                        assert_eq!(cache.cached_normalize(&raw), normalize(&raw));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 8 * 200);
        assert!(stats.len <= 16);
    }
}
