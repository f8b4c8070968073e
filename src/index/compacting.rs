use super::{HcqrIndex, QueryType};
use crate::error::Result;
use crate::grid::Level;
use crate::hcqr::{Hcqr, HcqrContext};
use std::sync::Arc;

/// Compactifies every result of the wrapped index
pub struct CompactifyingHcqrIndex {
    inner: Arc<dyn HcqrIndex>,
    max_partial_match_level: Level,
}

impl CompactifyingHcqrIndex {
    pub fn new(inner: Arc<dyn HcqrIndex>, max_partial_match_level: Level) -> Self {
        Self {
            inner,
            max_partial_match_level,
        }
    }

    pub fn max_partial_match_level(&self) -> Level {
        self.max_partial_match_level
    }
}

impl HcqrIndex for CompactifyingHcqrIndex {
    fn complete(&self, text: &str, qt: QueryType) -> Result<Hcqr> {
        self.inner.complete(text, qt)?.compactified(self.max_partial_match_level)
    }

    fn items(&self, text: &str, qt: QueryType) -> Result<Hcqr> {
        self.inner.items(text, qt)?.compactified(self.max_partial_match_level)
    }

    fn regions(&self, text: &str, qt: QueryType) -> Result<Hcqr> {
        self.inner.regions(text, qt)?.compactified(self.max_partial_match_level)
    }

    fn context(&self) -> &HcqrContext {
        self.inner.context()
    }
}
