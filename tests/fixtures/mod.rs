//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use hcqr::error::Result;
use hcqr::grid::{GridRegistry, HierarchyGrid, MapGridInfo, PixelId, QuadGrid};
use hcqr::hcqr::{Hcqr, HcqrContext, LeafValue, MemoryHcqr, MemoryHcqrBuilder, TreeNode};
use hcqr::index::{CellIndexSpec, HcqrIndex, ItemSet, MemoryCellIndex, MemoryItemStore, QueryType};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn set(items: impl IntoIterator<Item = u32>) -> ItemSet {
    items.into_iter().collect()
}

pub fn sorted(items: &ItemSet) -> Vec<u32> {
    items.iter().collect()
}

/// Every pixel of the 3-level quad grid: root, level 1, level 2
pub const QUAD_PIXELS: [PixelId; 21] = [
    1, 4, 5, 6, 7, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31,
];

/// Level-2 pixel of item `id` in the quad fixture
pub fn quad_pixel_of(id: u32) -> PixelId {
    16 + (id % 16) as PixelId
}

/// 3-level quad grid with items 0..100 spread over the 16 level-2 pixels
pub fn quad_context() -> HcqrContext {
    let grid = QuadGrid::new(2).unwrap();
    let info = MapGridInfo::new(
        &grid,
        (16..32).map(|pixel| (pixel, set((0..100).filter(|&i| quad_pixel_of(i) == pixel)))),
    );
    let store = MemoryItemStore::from(vec![set([0, 16, 32]), set([1, 17]), set([5, 21, 37, 53])]);
    HcqrContext::new(Arc::new(grid), Arc::new(info), Arc::new(store))
}

/// Items of `pixel` selected by the bits of `mask`, in ascending order
pub fn masked_items(ctx: &HcqrContext, pixel: PixelId, mask: u64) -> ItemSet {
    ctx.grid_info
        .items(pixel)
        .iter()
        .enumerate()
        .filter(|(bit, _)| mask & (1 << (bit % 64)) != 0)
        .map(|(_, id)| id)
        .collect()
}

/// Build a tree from leaves, skipping any that overlap an earlier one
pub fn tree(ctx: &HcqrContext, leaves: &[(PixelId, LeafValue)]) -> Hcqr {
    let grid = ctx.grid.as_ref();
    let mut taken: Vec<PixelId> = Vec::new();
    let mut builder = MemoryHcqrBuilder::new(ctx.clone());
    for (pixel, value) in leaves {
        let overlaps = taken
            .iter()
            .any(|&t| t == *pixel || grid.is_ancestor(t, *pixel) || grid.is_ancestor(*pixel, t));
        if overlaps {
            continue;
        }
        builder.insert(*pixel, value.clone()).unwrap();
        taken.push(*pixel);
    }
    Hcqr::InMemory(builder.finish())
}

/// Hierarchy of four top-level regions A..D below the root 0, where A has
/// the children A0 and A1.
///
/// GridInfo: A0 -> {1, 2, 3}, A1 -> {4, 5}, B -> {3, 4}
pub mod abcd {
    use super::*;

    pub const ROOT: PixelId = 0;
    pub const A: PixelId = 10;
    pub const B: PixelId = 20;
    pub const C: PixelId = 30;
    pub const D: PixelId = 40;
    pub const A0: PixelId = 11;
    pub const A1: PixelId = 12;

    pub fn context() -> HcqrContext {
        context_with(Vec::<(PixelId, ItemSet)>::new())
    }

    /// The same hierarchy with additional GridInfo entries
    pub fn context_with(extra: impl IntoIterator<Item = (PixelId, ItemSet)>) -> HcqrContext {
        let grid = HierarchyGrid::new(ROOT, [(A, ROOT), (B, ROOT), (C, ROOT), (D, ROOT), (A0, A), (A1, A)]).unwrap();
        let mut leaves = vec![(A0, set([1, 2, 3])), (A1, set([4, 5])), (B, set([3, 4]))];
        leaves.extend(extra);
        let info = MapGridInfo::new(&grid, leaves);
        HcqrContext::new(Arc::new(grid), Arc::new(info), Arc::new(MemoryItemStore::new()))
    }

    /// A single leaf tree rooted at `pixel`
    pub fn leaf(ctx: &HcqrContext, pixel: PixelId, value: LeafValue) -> Hcqr {
        let (node, fetched) = match value {
            LeafValue::FullMatch => (TreeNode::full_match(pixel), vec![]),
            LeafValue::PartialMatch(idx) => (TreeNode::partial_match(pixel, idx), vec![]),
            LeafValue::Fetched(items) => (TreeNode::fetched(pixel, 0), vec![items]),
        };
        Hcqr::InMemory(MemoryHcqr::new(ctx.clone(), Some(node), fetched))
    }
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn cells_fixture() -> Arc<MemoryCellIndex> {
    let spec = CellIndexSpec::load(&fixture_path("cells.json")).unwrap();
    Arc::new(MemoryCellIndex::from_spec(&spec, &GridRegistry::with_defaults()).unwrap())
}

/// Counts the queries reaching the wrapped index
pub struct CountingIndex {
    inner: Arc<dyn HcqrIndex>,
    calls: AtomicUsize,
}

impl CountingIndex {
    pub fn new(inner: Arc<dyn HcqrIndex>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HcqrIndex for CountingIndex {
    fn complete(&self, text: &str, qt: QueryType) -> Result<Hcqr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.complete(text, qt)
    }

    fn items(&self, text: &str, qt: QueryType) -> Result<Hcqr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.items(text, qt)
    }

    fn regions(&self, text: &str, qt: QueryType) -> Result<Hcqr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.regions(text, qt)
    }

    fn context(&self) -> &HcqrContext {
        self.inner.context()
    }
}
