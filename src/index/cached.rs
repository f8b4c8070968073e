//! Cache-by-query decorator.

use super::{HcqrIndex, QueryKind, QueryType, normalize_query};
use crate::error::Result;
use crate::hcqr::{Hcqr, HcqrContext};
use crate::utils::{BoundedCache, CacheStats};
use std::sync::Arc;

/// (kind, completion type, normalized text)
type CacheKey = (QueryKind, QueryType, String);

/// Caches results of the wrapped index in a bounded TinyLFU cache.
///
/// Nothing is held while the wrapped index computes, so concurrent misses on
/// the same key may both compute; the later insert wins.
pub struct CachedHcqrIndex {
    inner: Arc<dyn HcqrIndex>,
    cache: BoundedCache<CacheKey, Hcqr>,
}

impl CachedHcqrIndex {
    pub fn new(inner: Arc<dyn HcqrIndex>, capacity: usize) -> Self {
        Self {
            inner,
            cache: BoundedCache::new(capacity),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    fn lookup(&self, kind: QueryKind, text: &str, qt: QueryType) -> Result<Hcqr> {
        let (text, qt) = normalize_query(text, qt);
        let key = (kind, qt, text);

        if let Some(hit) = self.cache.get(&key) {
            log::debug!("query cache hit: {:?} {} '{}'", kind, qt, key.2);
            return Ok(hit);
        }
        log::debug!("query cache miss: {:?} {} '{}'", kind, qt, key.2);

        let result = self.inner.query(kind, &key.2, qt)?;
        self.cache.insert(key, result.clone());
        Ok(result)
    }
}

impl HcqrIndex for CachedHcqrIndex {
    fn complete(&self, text: &str, qt: QueryType) -> Result<Hcqr> {
        self.lookup(QueryKind::Mixed, text, qt)
    }

    fn items(&self, text: &str, qt: QueryType) -> Result<Hcqr> {
        self.lookup(QueryKind::Items, text, qt)
    }

    fn regions(&self, text: &str, qt: QueryType) -> Result<Hcqr> {
        self.lookup(QueryKind::Regions, text, qt)
    }

    fn context(&self) -> &HcqrContext {
        self.inner.context()
    }
}
