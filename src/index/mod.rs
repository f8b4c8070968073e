//! Query result indexes.
//!
//! [`HcqrIndex`] is the query surface: text in, HCQR out. The base layer
//! [`FromCellIndex`] converts flat [`CellIndex`] results into trees, and
//! decorators add compaction, conversion to the static representation and
//! caching on top. [`build_index`] stacks them as configured.

pub mod cached;
pub mod cell;
pub mod compacting;
pub mod from_cell;
pub mod item_store;
pub mod static_conv;
pub mod types;

pub use cached::CachedHcqrIndex;
pub use cell::{CellIndex, CellIndexSpec, CellMatch, CellMatchKind, CellQueryResult, MemoryCellIndex, PartialItems};
pub use compacting::CompactifyingHcqrIndex;
pub use from_cell::{CellGridInfo, FromCellIndex};
pub use item_store::{ItemIndexStore, MappedItemStore, MemoryItemStore};
pub use static_conv::StaticHcqrIndex;
pub use types::*;

use crate::config::IndexConfig;
use crate::error::Result;
use crate::hcqr::{Hcqr, HcqrContext};
use std::sync::Arc;

/// Text queries answered as HCQR trees
pub trait HcqrIndex: Send + Sync {
    /// Items and regions matching `text`
    fn complete(&self, text: &str, qt: QueryType) -> Result<Hcqr>;

    fn items(&self, text: &str, qt: QueryType) -> Result<Hcqr>;

    fn regions(&self, text: &str, qt: QueryType) -> Result<Hcqr>;

    /// Grid, grid info and item store shared by all results
    fn context(&self) -> &HcqrContext;

    /// Dispatch on the query kind
    fn query(&self, kind: QueryKind, text: &str, qt: QueryType) -> Result<Hcqr> {
        match kind {
            QueryKind::Mixed => self.complete(text, qt),
            QueryKind::Items => self.items(text, qt),
            QueryKind::Regions => self.regions(text, qt),
        }
    }
}

/// Stack the index layers selected by `config` on top of `cells`:
/// conversion, then compaction, then the static representation, then the
/// query cache
pub fn build_index(config: &IndexConfig, cells: Arc<dyn CellIndex>) -> Result<Arc<dyn HcqrIndex>> {
    config.validate()?;

    let mut index: Arc<dyn HcqrIndex> = Arc::new(FromCellIndex::new(cells, config.pixel_cache_size));
    let mut layers = vec!["cells"];
    if let Some(level) = config.compactify_level {
        index = Arc::new(CompactifyingHcqrIndex::new(index, level));
        layers.push("compactify");
    }
    if config.make_static {
        index = Arc::new(StaticHcqrIndex::new(index));
        layers.push("static");
    }
    if config.query_cache_size > 0 {
        index = Arc::new(CachedHcqrIndex::new(index, config.query_cache_size));
        layers.push("cache");
    }

    log::info!("hcqr index layers: {}", layers.join(" -> "));
    Ok(index)
}
