//! Bounded LRU cache for immutable chain data, with hit/miss accounting.
//!
//! Entries are keyed by content hashes (block hash, or address plus block
//! hash), so a reorg can never make a cached value stale. There is no
//! invalidation API and no time-based expiry: entries leave only when
//! capacity pressure evicts the least recently used one.

use std::{
    hash::Hash,
    sync::atomic::{AtomicU64, Ordering},
};

use moka::{future::Cache, policy::EvictionPolicy};

use crate::{constants::DEFAULT_CACHE_SIZE, metrics as proposer_metrics};

/// Local hit/miss counters for a single cache.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheMetrics {
    /// Creates zeroed counters.
    pub const fn new() -> Self {
        Self { hits: AtomicU64::new(0), misses: AtomicU64::new(0) }
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of cache hits.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Returns the number of cache misses.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Returns the hit rate in `[0.0, 1.0]`, or 0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 {
            return 0.0;
        }
        self.hits() as f64 / total as f64
    }
}

/// A named, size-bounded LRU cache that reports hits and misses.
///
/// Safe to share across tasks; all operations take `&self`.
#[derive(Debug)]
pub struct MeteredCache<K, V>
where
    K: Hash + Eq + Send + Sync + Clone + 'static,
    V: Clone + Send + Sync + 'static,
{
    cache: Cache<K, V>,
    metrics: CacheMetrics,
    name: &'static str,
}

impl<K, V> MeteredCache<K, V>
where
    K: Hash + Eq + Send + Sync + Clone + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache holding at most [`DEFAULT_CACHE_SIZE`] entries.
    pub fn new(name: &'static str) -> Self {
        Self::with_capacity(name, DEFAULT_CACHE_SIZE)
    }

    /// Creates a cache holding at most `capacity` entries.
    pub fn with_capacity(name: &'static str, capacity: usize) -> Self {
        let cache = Cache::builder()
            .name(name)
            .max_capacity(capacity as u64)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { cache, metrics: CacheMetrics::new(), name }
    }

    /// Looks up `key`, marking it most recently used on a hit.
    pub async fn get(&self, key: &K) -> Option<V> {
        let value = self.cache.get(key).await;
        if value.is_some() {
            self.metrics.record_hit();
            metrics::counter!(
                proposer_metrics::CACHE_HITS_TOTAL,
                proposer_metrics::LABEL_CACHE_NAME => self.name
            )
            .increment(1);
        } else {
            self.metrics.record_miss();
            metrics::counter!(
                proposer_metrics::CACHE_MISSES_TOTAL,
                proposer_metrics::LABEL_CACHE_NAME => self.name
            )
            .increment(1);
        }
        value
    }

    /// Inserts or replaces the entry for `key`.
    pub async fn insert(&self, key: K, value: V) {
        self.cache.insert(key, value).await;
    }

    /// Returns the hit/miss counters.
    pub const fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Returns the cache name used as the metrics label.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the approximate number of live entries.
    ///
    /// Eviction is applied lazily; call [`Self::sync`] first for an exact count.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Applies pending inserts and evictions.
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }
}
