//! Flat cell indexes: the source of HCQR trees.
//!
//! A cell index answers text queries with a list of matching native cells,
//! each either fully matched or matched by a subset of its items.

use crate::config::GridConfig;
use crate::error::{HcqrError, Result};
use crate::grid::{Grid, GridRegistry, HierarchyGrid, Level, PixelId};
use crate::grid::hierarchy::HierarchySpec;
use crate::index::item_store::{ItemIndexStore, MemoryItemStore};
use crate::index::types::{CellId, ItemId, ItemSet, QueryType, RegionId, normalize_query};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Items of a partially matched cell
#[derive(Debug, Clone, PartialEq)]
pub enum PartialItems {
    /// Entry of the index's item store
    Indexed(u32),
    /// Computed for this query only
    Fetched(ItemSet),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellMatchKind {
    Full,
    Partial(PartialItems),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellMatch {
    pub cell: CellId,
    pub kind: CellMatchKind,
}

/// Matching cells, ascending by cell id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellQueryResult {
    pub entries: Vec<CellMatch>,
}

impl CellQueryResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Text index over native cells
pub trait CellIndex: Send + Sync {
    /// Items and regions matching `text`
    fn complete(&self, text: &str, qt: QueryType) -> Result<CellQueryResult>;

    /// Items whose names match `text`
    fn items(&self, text: &str, qt: QueryType) -> Result<CellQueryResult>;

    /// Regions whose names match `text`
    fn regions(&self, text: &str, qt: QueryType) -> Result<CellQueryResult>;

    /// Number of cells; cell ids are `0..cell_count()`
    fn cell_count(&self) -> usize;

    /// All items of a cell
    fn cell_items(&self, cell: CellId) -> ItemSet;

    fn cell_pixel(&self, cell: CellId) -> Option<PixelId>;

    /// Cell stored at exactly this pixel
    fn pixel_cell(&self, pixel: PixelId) -> Option<CellId>;

    /// Cells making up a region
    fn region_cells(&self, region: RegionId) -> Vec<CellId>;

    fn grid(&self) -> Arc<dyn Grid>;

    /// Store backing [`PartialItems::Indexed`]
    fn item_store(&self) -> Arc<dyn ItemIndexStore>;

    /// Deepest level any cell sits at
    fn native_level(&self) -> Level;
}

#[derive(Debug, Clone)]
struct Cell {
    pixel: PixelId,
    items: ItemSet,
}

#[derive(Debug, Clone)]
struct Region {
    name: String,
    cells: Vec<CellId>,
}

/// In-memory [`CellIndex`] over item names and named regions
pub struct MemoryCellIndex {
    grid: Arc<dyn Grid>,
    cells: Vec<Cell>,
    pixel_cells: FxHashMap<PixelId, CellId>,
    /// Lowercased name -> items carrying it
    names: Vec<(String, ItemSet)>,
    regions: Vec<Region>,
    store: Arc<MemoryItemStore>,
    /// (name, cell) -> store entry for partially matched cells
    partial_ids: FxHashMap<(usize, CellId), u32>,
    native_level: Level,
}

impl MemoryCellIndex {
    pub fn builder(grid: Arc<dyn Grid>) -> MemoryCellIndexBuilder {
        MemoryCellIndexBuilder::new(grid)
    }

    /// Build from a fixture description. A fixture without a grid gets the
    /// default [`GridConfig`].
    pub fn from_spec(spec: &CellIndexSpec, registry: &GridRegistry) -> Result<Self> {
        Self::from_spec_with_grid(spec, registry, &GridConfig::default())
    }

    /// Build from a fixture description, creating `fallback` through the
    /// registry when the fixture names no grid of its own
    pub fn from_spec_with_grid(spec: &CellIndexSpec, registry: &GridRegistry, fallback: &GridConfig) -> Result<Self> {
        let grid = match &spec.grid {
            Some(grid) => grid.build(registry)?,
            None => registry.create(fallback)?,
        };
        let mut builder = MemoryCellIndexBuilder::new(grid);
        for cell in &spec.cells {
            builder.add_cell(cell.pixel, cell.items.iter().copied().collect());
        }
        for item in &spec.items {
            for name in &item.names {
                builder.add_name(item.id, name);
            }
        }
        for region in &spec.regions {
            builder.add_region(&region.name, region.cells.clone());
        }
        builder.build()
    }

    pub fn region_name(&self, region: RegionId) -> Option<&str> {
        self.regions.get(region as usize).map(|r| r.name.as_str())
    }

    fn matching_names(&self, text: &str, qt: QueryType) -> Vec<usize> {
        self.names
            .iter()
            .enumerate()
            .filter(|(_, (name, _))| qt.matches(name, text))
            .map(|(i, _)| i)
            .collect()
    }
}

impl CellIndex for MemoryCellIndex {
    fn complete(&self, text: &str, qt: QueryType) -> Result<CellQueryResult> {
        let items = self.items(text, qt)?;
        let regions = self.regions(text, qt)?;
        merge_results(self, items, regions)
    }

    fn items(&self, text: &str, qt: QueryType) -> Result<CellQueryResult> {
        let (text, qt) = normalize_query(text, qt);
        let names = self.matching_names(&text, qt);
        let mut matched = ItemSet::new();
        for &i in &names {
            matched |= &self.names[i].1;
        }
        if matched.is_empty() {
            return Ok(CellQueryResult::default());
        }

        let mut entries = Vec::new();
        for (cell_id, cell) in self.cells.iter().enumerate() {
            let cell_id = cell_id as CellId;
            let mut hit = cell.items.clone();
            hit &= &matched;
            if hit.is_empty() {
                continue;
            }
            let kind = if hit == cell.items {
                CellMatchKind::Full
            } else if let [name] = names.as_slice() {
                match self.partial_ids.get(&(*name, cell_id)) {
                    Some(&id) => CellMatchKind::Partial(PartialItems::Indexed(id)),
                    None => CellMatchKind::Partial(PartialItems::Fetched(hit)),
                }
            } else {
                CellMatchKind::Partial(PartialItems::Fetched(hit))
            };
            entries.push(CellMatch { cell: cell_id, kind });
        }
        Ok(CellQueryResult { entries })
    }

    fn regions(&self, text: &str, qt: QueryType) -> Result<CellQueryResult> {
        let (text, qt) = normalize_query(text, qt);
        let mut cells: Vec<CellId> = self
            .regions
            .iter()
            .filter(|r| qt.matches(&r.name, &text))
            .flat_map(|r| r.cells.iter().copied())
            .collect();
        cells.sort_unstable();
        cells.dedup();
        Ok(CellQueryResult {
            entries: cells
                .into_iter()
                .map(|cell| CellMatch {
                    cell,
                    kind: CellMatchKind::Full,
                })
                .collect(),
        })
    }

    fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn cell_items(&self, cell: CellId) -> ItemSet {
        self.cells
            .get(cell as usize)
            .map(|c| c.items.clone())
            .unwrap_or_default()
    }

    fn cell_pixel(&self, cell: CellId) -> Option<PixelId> {
        self.cells.get(cell as usize).map(|c| c.pixel)
    }

    fn pixel_cell(&self, pixel: PixelId) -> Option<CellId> {
        self.pixel_cells.get(&pixel).copied()
    }

    fn region_cells(&self, region: RegionId) -> Vec<CellId> {
        self.regions
            .get(region as usize)
            .map(|r| r.cells.clone())
            .unwrap_or_default()
    }

    fn grid(&self) -> Arc<dyn Grid> {
        self.grid.clone()
    }

    fn item_store(&self) -> Arc<dyn ItemIndexStore> {
        self.store.clone()
    }

    fn native_level(&self) -> Level {
        self.native_level
    }
}

/// Union of two results over the same cells. A cell fully matched on
/// either side is fully matched.
fn merge_results(index: &dyn CellIndex, a: CellQueryResult, b: CellQueryResult) -> Result<CellQueryResult> {
    let mut merged: BTreeMap<CellId, CellMatchKind> = BTreeMap::new();
    for entry in a.entries.into_iter().chain(b.entries) {
        let kind = match merged.remove(&entry.cell) {
            None => entry.kind,
            Some(CellMatchKind::Full) => CellMatchKind::Full,
            Some(CellMatchKind::Partial(existing)) => match entry.kind {
                CellMatchKind::Full => CellMatchKind::Full,
                CellMatchKind::Partial(other) => {
                    let mut items = partial_items(index, existing)?;
                    items |= partial_items(index, other)?;
                    if items == index.cell_items(entry.cell) {
                        CellMatchKind::Full
                    } else {
                        CellMatchKind::Partial(PartialItems::Fetched(items))
                    }
                }
            },
        };
        merged.insert(entry.cell, kind);
    }
    Ok(CellQueryResult {
        entries: merged
            .into_iter()
            .map(|(cell, kind)| CellMatch { cell, kind })
            .collect(),
    })
}

fn partial_items(index: &dyn CellIndex, items: PartialItems) -> Result<ItemSet> {
    match items {
        PartialItems::Indexed(id) => index.item_store().at(id),
        PartialItems::Fetched(items) => Ok(items),
    }
}

/// Collects cells, item names and regions for a [`MemoryCellIndex`]
pub struct MemoryCellIndexBuilder {
    grid: Arc<dyn Grid>,
    cells: BTreeMap<PixelId, ItemSet>,
    names: BTreeMap<String, ItemSet>,
    regions: BTreeMap<String, Vec<PixelId>>,
}

impl MemoryCellIndexBuilder {
    pub fn new(grid: Arc<dyn Grid>) -> Self {
        Self {
            grid,
            cells: BTreeMap::new(),
            names: BTreeMap::new(),
            regions: BTreeMap::new(),
        }
    }

    /// Add items to the cell at `pixel`
    pub fn add_cell(&mut self, pixel: PixelId, items: ItemSet) -> &mut Self {
        *self.cells.entry(pixel).or_default() |= items;
        self
    }

    pub fn add_name(&mut self, item: ItemId, name: &str) -> &mut Self {
        self.names
            .entry(name.trim().to_lowercase())
            .or_default()
            .insert(item);
        self
    }

    /// Add a named region made of the cells at `pixels`
    pub fn add_region(&mut self, name: &str, pixels: Vec<PixelId>) -> &mut Self {
        self.regions
            .entry(name.trim().to_lowercase())
            .or_default()
            .extend(pixels);
        self
    }

    pub fn build(self) -> Result<MemoryCellIndex> {
        let grid = self.grid;

        let mut cells = Vec::with_capacity(self.cells.len());
        let mut pixel_cells = FxHashMap::default();
        for (pixel, items) in self.cells {
            if pixel != grid.root_pixel_id() && grid.parent(pixel).is_none() {
                return Err(HcqrError::Config(format!("cell pixel {} is not part of the grid", pixel)));
            }
            pixel_cells.insert(pixel, cells.len() as CellId);
            cells.push(Cell { pixel, items });
        }
        for (i, a) in cells.iter().enumerate() {
            if let Some(b) = cells[i + 1..]
                .iter()
                .find(|b| grid.is_ancestor(a.pixel, b.pixel) || grid.is_ancestor(b.pixel, a.pixel))
            {
                return Err(HcqrError::Config(format!(
                    "cells at pixels {} and {} overlap",
                    a.pixel, b.pixel
                )));
            }
        }
        let native_level = cells.iter().map(|c| grid.level(c.pixel)).max().unwrap_or(0);

        let names: Vec<(String, ItemSet)> = self.names.into_iter().collect();
        let mut store = MemoryItemStore::new();
        let mut partial_ids = FxHashMap::default();
        for (name_idx, (_, items)) in names.iter().enumerate() {
            for (cell_id, cell) in cells.iter().enumerate() {
                let mut hit = cell.items.clone();
                hit &= items;
                if !hit.is_empty() && hit != cell.items {
                    partial_ids.insert((name_idx, cell_id as CellId), store.push(hit));
                }
            }
        }

        let mut regions = Vec::with_capacity(self.regions.len());
        for (name, pixels) in self.regions {
            let mut region_cells = Vec::with_capacity(pixels.len());
            for pixel in pixels {
                let cell = pixel_cells.get(&pixel).copied().ok_or_else(|| {
                    HcqrError::Config(format!("region {} references pixel {} without a cell", name, pixel))
                })?;
                region_cells.push(cell);
            }
            region_cells.sort_unstable();
            region_cells.dedup();
            regions.push(Region {
                name,
                cells: region_cells,
            });
        }

        log::debug!(
            "cell index built: {} cells, {} names, {} regions, {} stored partial sets",
            cells.len(),
            names.len(),
            regions.len(),
            store.len()
        );

        Ok(MemoryCellIndex {
            grid,
            cells,
            pixel_cells,
            names,
            regions,
            store: Arc::new(store),
            partial_ids,
            native_level,
        })
    }
}

/// Grid of a fixture: either an explicit hierarchy or a registered backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridSpec {
    Hierarchy(HierarchySpec),
    Registered(GridConfig),
}

impl GridSpec {
    pub fn build(&self, registry: &GridRegistry) -> Result<Arc<dyn Grid>> {
        match self {
            GridSpec::Hierarchy(spec) => Ok(Arc::new(HierarchyGrid::from_spec(spec)?)),
            GridSpec::Registered(config) => registry.create(config),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellSpec {
    pub pixel: PixelId,
    pub items: Vec<ItemId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSpec {
    pub id: ItemId,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSpec {
    pub name: String,
    /// Pixels of the cells making up the region
    pub cells: Vec<PixelId>,
}

/// JSON description of a [`MemoryCellIndex`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellIndexSpec {
    #[serde(default)]
    pub grid: Option<GridSpec>,
    pub cells: Vec<CellSpec>,
    #[serde(default)]
    pub items: Vec<ItemSpec>,
    #[serde(default)]
    pub regions: Vec<RegionSpec>,
}

impl CellIndexSpec {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| HcqrError::Config(format!("failed to parse cell index: {}", e)))
    }
}
