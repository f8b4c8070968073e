use super::{HcqrIndex, QueryType};
use crate::error::{HcqrError, Result};
use crate::hcqr::{Hcqr, HcqrContext};
use std::sync::Arc;

/// Converts in-memory results of the wrapped index into the static
/// representation. A static result from below is a stacking error.
pub struct StaticHcqrIndex {
    inner: Arc<dyn HcqrIndex>,
}

impl StaticHcqrIndex {
    pub fn new(inner: Arc<dyn HcqrIndex>) -> Self {
        Self { inner }
    }

    fn convert(result: Hcqr) -> Result<Hcqr> {
        match result {
            Hcqr::InMemory(tree) => Ok(Hcqr::Static(tree.to_static()?)),
            other => Err(HcqrError::RepresentationMismatch {
                expected: "in-memory",
                actual: other.representation(),
            }),
        }
    }
}

impl HcqrIndex for StaticHcqrIndex {
    fn complete(&self, text: &str, qt: QueryType) -> Result<Hcqr> {
        Self::convert(self.inner.complete(text, qt)?)
    }

    fn items(&self, text: &str, qt: QueryType) -> Result<Hcqr> {
        Self::convert(self.inner.items(text, qt)?)
    }

    fn regions(&self, text: &str, qt: QueryType) -> Result<Hcqr> {
        Self::convert(self.inner.regions(text, qt)?)
    }

    fn context(&self) -> &HcqrContext {
        self.inner.context()
    }
}
