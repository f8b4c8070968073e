//! Bounded concurrent cache with hit/miss counters.
//!
//! Wraps [`moka::sync::Cache`] (TinyLFU admission and eviction). The cache is
//! internally synchronized and shared by reference; counters are atomics
//! updated outside of moka's own bookkeeping.

use moka::notification::RemovalCause;
use moka::sync::Cache;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct AtomicCacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// A frequency-aware cache holding at most `capacity` entries.
pub struct BoundedCache<K, V> {
    cache: Cache<K, V, ahash::RandomState>,
    stats: Arc<AtomicCacheStats>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache holding at most `capacity` entries. A capacity of zero
    /// stores nothing.
    pub fn new(capacity: usize) -> Self {
        let stats = Arc::new(AtomicCacheStats::default());
        let eviction_stats = stats.clone();

        let cache = Cache::builder()
            .max_capacity(capacity as u64)
            .eviction_listener(move |_key, _value, cause| {
                if cause == RemovalCause::Size {
                    eviction_stats.evictions.fetch_add(1, Ordering::Relaxed);
                }
            })
            .build_with_hasher(ahash::RandomState::new());

        Self { cache, stats }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let value = self.cache.get(key);
        let counter = if value.is_some() {
            &self.stats.hits
        } else {
            &self.stats.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    pub fn insert(&self, key: K, value: V) {
        self.cache.insert(key, value);
    }

    /// Number of cached entries once pending evictions have run
    pub fn len(&self) -> usize {
        self.cache.run_pending_tasks();
        self.cache.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks();
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
        }
    }

    /// Drop every entry, keeping the counters
    pub fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }
}
