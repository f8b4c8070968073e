//! Conversion of flat cell results into HCQR trees.

use super::cell::{CellIndex, CellMatchKind, CellQueryResult, PartialItems};
use super::{HcqrIndex, QueryType};
use crate::error::{HcqrError, Result};
use crate::grid::{Grid, GridInfo, Level, PixelId};
use crate::hcqr::{Hcqr, HcqrContext, LeafValue, MemoryHcqrBuilder};
use crate::index::types::ItemSet;
use crate::utils::{BoundedCache, CacheStats};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// [`GridInfo`] backed by a cell index.
///
/// A pixel holding a cell reports the cell's items. A pixel above the native
/// level reports the union of its children, cached per pixel. Anything else
/// is empty.
pub struct CellGridInfo {
    cells: Arc<dyn CellIndex>,
    grid: Arc<dyn Grid>,
    native_level: Level,
    /// Strict ancestors of cell pixels; every other pixel is empty
    occupied: FxHashSet<PixelId>,
    cache: BoundedCache<PixelId, ItemSet>,
}

impl CellGridInfo {
    pub fn new(cells: Arc<dyn CellIndex>, cache_size: usize) -> Self {
        let grid = cells.grid();
        let mut occupied = FxHashSet::default();
        for cell in 0..cells.cell_count() as u32 {
            let Some(pixel) = cells.cell_pixel(cell) else {
                continue;
            };
            let mut current = grid.parent(pixel);
            while let Some(p) = current {
                if !occupied.insert(p) {
                    break;
                }
                current = grid.parent(p);
            }
        }
        Self {
            native_level: cells.native_level(),
            cells,
            grid,
            occupied,
            cache: BoundedCache::new(cache_size),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl GridInfo for CellGridInfo {
    fn items(&self, pixel: PixelId) -> ItemSet {
        if let Some(cell) = self.cells.pixel_cell(pixel) {
            return self.cells.cell_items(cell);
        }
        if self.grid.level(pixel) >= self.native_level || !self.occupied.contains(&pixel) {
            return ItemSet::new();
        }
        if let Some(items) = self.cache.get(&pixel) {
            return items;
        }

        // children recurse into the same cache
        let mut items = ItemSet::new();
        for n in 0..self.grid.children_count(pixel) {
            if let Some(child) = self.grid.index(pixel, n) {
                items |= self.items(child);
            }
        }
        self.cache.insert(pixel, items.clone());
        items
    }
}

/// Base [`HcqrIndex`]: answers queries from a [`CellIndex`]
pub struct FromCellIndex {
    cells: Arc<dyn CellIndex>,
    ctx: HcqrContext,
}

impl FromCellIndex {
    pub fn new(cells: Arc<dyn CellIndex>, pixel_cache_size: usize) -> Self {
        let grid_info = Arc::new(CellGridInfo::new(cells.clone(), pixel_cache_size));
        let ctx = HcqrContext::new(cells.grid(), grid_info, cells.item_store());
        Self { cells, ctx }
    }

    pub fn cell_index(&self) -> &Arc<dyn CellIndex> {
        &self.cells
    }

    /// Insert every matched cell as a leaf at the cell's pixel
    fn convert(&self, result: CellQueryResult) -> Result<Hcqr> {
        let mut builder = MemoryHcqrBuilder::new(self.ctx.clone());
        for entry in result.entries {
            let pixel = self.cells.cell_pixel(entry.cell).ok_or_else(|| {
                HcqrError::InvariantViolation(format!("cell {} has no pixel", entry.cell))
            })?;
            let value = match entry.kind {
                CellMatchKind::Full => LeafValue::FullMatch,
                CellMatchKind::Partial(PartialItems::Indexed(id)) => LeafValue::PartialMatch(id),
                CellMatchKind::Partial(PartialItems::Fetched(items)) => LeafValue::Fetched(items),
            };
            builder.insert(pixel, value)?;
        }
        Ok(Hcqr::InMemory(builder.finish()))
    }
}

impl HcqrIndex for FromCellIndex {
    fn complete(&self, text: &str, qt: QueryType) -> Result<Hcqr> {
        self.convert(self.cells.complete(text, qt)?)
    }

    fn items(&self, text: &str, qt: QueryType) -> Result<Hcqr> {
        self.convert(self.cells.items(text, qt)?)
    }

    fn regions(&self, text: &str, qt: QueryType) -> Result<Hcqr> {
        self.convert(self.cells.regions(text, qt)?)
    }

    fn context(&self) -> &HcqrContext {
        &self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridRegistry, QuadGrid};
    use crate::index::cell::{CellIndexSpec, MemoryCellIndex};

    fn quad_index() -> Arc<dyn CellIndex> {
        let grid: Arc<dyn Grid> = Arc::new(QuadGrid::new(2).unwrap());
        let mut builder = MemoryCellIndex::builder(grid);
        // 16, 17 below 4; 28 below 7
        builder
            .add_cell(16, [1u32, 2].into_iter().collect())
            .add_cell(17, [3u32].into_iter().collect())
            .add_cell(28, [4u32, 5].into_iter().collect())
            .add_name(1, "mill")
            .add_name(3, "mill")
            .add_name(4, "mill")
            .add_name(5, "pond");
        Arc::new(builder.build().unwrap())
    }

    #[test]
    fn test_grid_info_aggregates() {
        let info = CellGridInfo::new(quad_index(), 16);
        assert_eq!(info.items(16).iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(info.items(4).iter().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(info.items(1).iter().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert!(info.items(5).is_empty());
        // 18 sits at the native level without a cell
        assert!(info.items(18).is_empty());

        info.items(4);
        assert!(info.cache_stats().hits >= 1);
    }

    #[test]
    fn test_cold_cache_shared_across_threads() {
        let cells = quad_index();
        let expected: Vec<(PixelId, ItemSet)> = {
            let info = CellGridInfo::new(cells.clone(), 16);
            [1, 4, 5, 7, 16, 28].into_iter().map(|p| (p, info.items(p))).collect()
        };

        let info = Arc::new(CellGridInfo::new(cells, 16));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let info = info.clone();
                let mut pixels = expected.iter().map(|(p, _)| *p).collect::<Vec<_>>();
                let len = pixels.len();
                pixels.rotate_left(i % len);
                std::thread::spawn(move || pixels.into_iter().map(|p| (p, info.items(p))).collect::<Vec<_>>())
            })
            .collect();
        for handle in handles {
            let mut seen = handle.join().unwrap();
            seen.sort_by_key(|(p, _)| *p);
            assert_eq!(seen, expected);
        }
        assert_eq!(info.items(1).len(), 5);
    }

    #[test]
    fn test_converts_cells_to_leaves() {
        let index = FromCellIndex::new(quad_index(), 16);
        let result = index.items("mill", QueryType::EXACT).unwrap();
        result.validate().unwrap();
        assert_eq!(result.items().unwrap().iter().collect::<Vec<_>>(), vec![1, 3, 4]);
        assert_eq!(result.root_pixel_id().unwrap(), Some(1));
        let stats = result.stats().unwrap();
        assert_eq!(stats.full_match, 1);
        assert_eq!(stats.partial_match, 2);
    }

    #[test]
    fn test_unknown_text_is_empty() {
        let index = FromCellIndex::new(quad_index(), 16);
        assert!(index.complete("nothing", QueryType::EXACT).unwrap().is_empty());
    }

    #[test]
    fn test_hierarchy_fixture() {
        let spec = CellIndexSpec::from_json(
            r#"{"grid": {"root": 0, "pixels": [{"id": 1, "parent": 0}, {"id": 2, "parent": 1}]},
                "cells": [{"pixel": 2, "items": [7]}],
                "items": [{"id": 7, "names": ["well"]}]}"#,
        )
        .unwrap();
        let cells = MemoryCellIndex::from_spec(&spec, &GridRegistry::with_defaults()).unwrap();
        let index = FromCellIndex::new(Arc::new(cells), 4);
        let result = index.query(crate::index::QueryKind::Mixed, "well", QueryType::EXACT).unwrap();
        assert_eq!(result.number_of_nodes().unwrap(), 3);
        assert_eq!(result.number_of_items().unwrap(), 1);
    }
}
