//! Hierarchical compressed query results.
//!
//! An HCQR is a tree over grid pixels. Leaves are full matches (every item
//! of the pixel matches), partial matches (an entry of the shared item store)
//! or fetched sets (held in the tree's own side table). Internal nodes
//! subdivide a pixel into some of its grid children.
//!
//! Two physical forms exist:
//!
//! - [`MemoryHcqr`] - an owned node tree
//! - [`StaticHcqr`] - the compact binary encoding, read in place
//!
//! Both expose their nodes through [`TreeCursor`] and are produced through
//! [`TreeSink`], so the set algebra and the reshaping transforms in
//! [`algebra`] and [`compact`] are written once for both.

pub mod algebra;
pub mod compact;
pub mod memory;
pub mod static_tree;

pub use algebra::SetOp;
pub use memory::{MemoryHcqr, MemoryHcqrBuilder, MemorySink, NodePayload, TreeNode};
pub use static_tree::{StaticCursor, StaticHcqr, StaticSink};

use crate::error::{HcqrError, Result};
use crate::grid::{Grid, GridInfo, Level, PixelId};
use crate::index::item_store::ItemIndexStore;
use crate::index::types::ItemSet;
use std::sync::Arc;

/// Shared collaborators every HCQR refers to without owning
#[derive(Clone)]
pub struct HcqrContext {
    pub grid: Arc<dyn Grid>,
    pub grid_info: Arc<dyn GridInfo>,
    pub item_store: Arc<dyn ItemIndexStore>,
}

impl HcqrContext {
    pub fn new(
        grid: Arc<dyn Grid>,
        grid_info: Arc<dyn GridInfo>,
        item_store: Arc<dyn ItemIndexStore>,
    ) -> Self {
        Self {
            grid,
            grid_info,
            item_store,
        }
    }
}

/// Node classification shared by both representations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Internal,
    FullMatch,
    /// Index into the shared item store
    PartialMatch(u32),
    /// Index into the owning tree's fetched side table
    Fetched(u32),
}

/// Leaf payload in transit between trees. Fetched sets travel by value and
/// are re-indexed into the destination's side table.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafValue {
    FullMatch,
    PartialMatch(u32),
    Fetched(ItemSet),
}

/// Read access to one node of an HCQR tree
pub trait TreeCursor: Sized {
    type Children: Iterator<Item = Result<Self>>;

    fn pixel_id(&self) -> PixelId;

    fn kind(&self) -> NodeKind;

    /// Children in ascending pixel order; empty for leaves
    fn children(&self) -> Self::Children;

    fn context(&self) -> &HcqrContext;

    /// Entry of the owning tree's fetched side table
    fn fetched_items(&self, index: u32) -> Result<ItemSet>;

    fn is_leaf(&self) -> bool {
        self.kind() != NodeKind::Internal
    }

    /// Leaf payload, with fetched sets materialized
    fn leaf_value(&self) -> Result<LeafValue> {
        match self.kind() {
            NodeKind::FullMatch => Ok(LeafValue::FullMatch),
            NodeKind::PartialMatch(idx) => Ok(LeafValue::PartialMatch(idx)),
            NodeKind::Fetched(idx) => Ok(LeafValue::Fetched(self.fetched_items(idx)?)),
            NodeKind::Internal => Err(HcqrError::InvariantViolation(format!(
                "internal node {} has no leaf value",
                self.pixel_id()
            ))),
        }
    }

    /// All items below this node
    fn items(&self) -> Result<ItemSet> {
        let ctx = self.context();
        match self.kind() {
            NodeKind::Internal => {
                let mut items = ItemSet::new();
                for child in self.children() {
                    items |= child?.items()?;
                }
                Ok(items)
            }
            NodeKind::FullMatch => Ok(ctx.grid_info.items(self.pixel_id())),
            NodeKind::PartialMatch(idx) => ctx.item_store.at(idx),
            NodeKind::Fetched(idx) => self.fetched_items(idx),
        }
    }

    /// Sum of per-leaf item counts. Items shared by several leaves are
    /// counted once per leaf.
    fn item_count(&self) -> Result<u64> {
        let ctx = self.context();
        match self.kind() {
            NodeKind::Internal => {
                let mut count = 0;
                for child in self.children() {
                    count += child?.item_count()?;
                }
                Ok(count)
            }
            NodeKind::FullMatch => Ok(ctx.grid_info.item_count(self.pixel_id())),
            NodeKind::PartialMatch(idx) => ctx.item_store.item_count(idx),
            NodeKind::Fetched(idx) => Ok(self.fetched_items(idx)?.len()),
        }
    }

    fn node_count(&self) -> Result<usize> {
        let mut count = 1;
        for child in self.children() {
            count += child?.node_count()?;
        }
        Ok(count)
    }

    /// Height of the subtree, leaves have depth 0
    fn depth(&self) -> Result<usize> {
        let mut depth = 0;
        for child in self.children() {
            depth = depth.max(child?.depth()? + 1);
        }
        Ok(depth)
    }
}

/// Write access for building a tree in pre-order
pub trait TreeSink {
    type Output;

    /// Start an internal node; its children follow until [`TreeSink::close`]
    fn open(&mut self, pixel: PixelId) -> Result<()>;

    /// Finish the innermost open node. A node without children is discarded
    /// and `false` is returned.
    fn close(&mut self) -> Result<bool>;

    fn leaf(&mut self, pixel: PixelId, value: LeafValue) -> Result<()>;

    fn finish(self) -> Result<Self::Output>;
}

/// Summary figures of a tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HcqrStats {
    pub nodes: usize,
    pub depth: usize,
    pub items: u64,
    pub internal: usize,
    pub full_match: usize,
    pub partial_match: usize,
    pub fetched: usize,
}

/// A query result in either representation
#[derive(Clone)]
pub enum Hcqr {
    InMemory(MemoryHcqr),
    Static(StaticHcqr),
}

/// Run `$body` with `$root` bound to the root cursor of `$hcqr`
macro_rules! with_root {
    ($hcqr:expr, |$root:ident| $body:expr) => {
        match $hcqr {
            Hcqr::InMemory(tree) => {
                let $root = tree.root();
                $body
            }
            Hcqr::Static(tree) => {
                let $root = tree.root()?;
                $body
            }
        }
    };
}

impl Hcqr {
    /// The empty result
    pub fn empty(ctx: HcqrContext) -> Self {
        Hcqr::InMemory(MemoryHcqr::empty(ctx))
    }

    pub fn context(&self) -> &HcqrContext {
        match self {
            Hcqr::InMemory(tree) => tree.context(),
            Hcqr::Static(tree) => tree.context(),
        }
    }

    /// Representation name, used in diagnostics
    pub fn representation(&self) -> &'static str {
        match self {
            Hcqr::InMemory(_) => "in-memory",
            Hcqr::Static(_) => "static",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Hcqr::InMemory(tree) => tree.root_node().is_none(),
            Hcqr::Static(tree) => tree.tree().is_empty(),
        }
    }

    pub fn root_pixel_id(&self) -> Result<Option<PixelId>> {
        with_root!(self, |root| Ok(root.map(|r| r.pixel_id())))
    }

    /// Union of the items of all leaves
    pub fn items(&self) -> Result<ItemSet> {
        with_root!(self, |root| match root {
            Some(root) => root.items(),
            None => Ok(ItemSet::new()),
        })
    }

    /// Leaf-local item count: the sum over leaves, not a deduplicated size
    pub fn number_of_items(&self) -> Result<u64> {
        with_root!(self, |root| match root {
            Some(root) => root.item_count(),
            None => Ok(0),
        })
    }

    pub fn number_of_nodes(&self) -> Result<usize> {
        with_root!(self, |root| match root {
            Some(root) => root.node_count(),
            None => Ok(0),
        })
    }

    pub fn depth(&self) -> Result<usize> {
        with_root!(self, |root| match root {
            Some(root) => root.depth(),
            None => Ok(0),
        })
    }

    pub fn intersect(&self, other: &Hcqr) -> Result<Hcqr> {
        self.combine(SetOp::Intersect, other)
    }

    pub fn union(&self, other: &Hcqr) -> Result<Hcqr> {
        self.combine(SetOp::Union, other)
    }

    pub fn difference(&self, other: &Hcqr) -> Result<Hcqr> {
        self.combine(SetOp::Difference, other)
    }

    /// Merge partial-match leaves below `max_partial_match_level` where that
    /// saves space, and collapse fully covered pixels into full matches
    pub fn compactified(&self, max_partial_match_level: Level) -> Result<Hcqr> {
        let ctx = self.context().clone();
        match self {
            Hcqr::InMemory(_) => Ok(Hcqr::InMemory(with_root!(self, |root| {
                compact::compactify(root, max_partial_match_level, MemorySink::new(ctx))
            })?)),
            Hcqr::Static(_) => Ok(Hcqr::Static(with_root!(self, |root| {
                compact::compactify(root, max_partial_match_level, StaticSink::new(ctx))
            })?)),
        }
    }

    /// Materialize implicit structure down to `to_level`
    pub fn expanded(&self, to_level: Level) -> Result<Hcqr> {
        let ctx = self.context().clone();
        match self {
            Hcqr::InMemory(_) => Ok(Hcqr::InMemory(with_root!(self, |root| {
                algebra::expand(root, to_level, MemorySink::new(ctx))
            })?)),
            Hcqr::Static(_) => Ok(Hcqr::Static(with_root!(self, |root| {
                algebra::expand(root, to_level, StaticSink::new(ctx))
            })?)),
        }
    }

    /// Replace every leaf by a full match at the same pixel
    pub fn all_to_full(&self) -> Result<Hcqr> {
        let ctx = self.context().clone();
        match self {
            Hcqr::InMemory(_) => Ok(Hcqr::InMemory(with_root!(self, |root| {
                algebra::all_to_full(root, MemorySink::new(ctx))
            })?)),
            Hcqr::Static(_) => Ok(Hcqr::Static(with_root!(self, |root| {
                algebra::all_to_full(root, StaticSink::new(ctx))
            })?)),
        }
    }

    /// Encode into the compact binary representation
    pub fn to_static(&self) -> Result<StaticHcqr> {
        match self {
            Hcqr::Static(tree) => Ok(tree.clone()),
            Hcqr::InMemory(tree) => tree.to_static(),
        }
    }

    /// Decode into an owned node tree
    pub fn to_memory(&self) -> Result<MemoryHcqr> {
        match self {
            Hcqr::InMemory(tree) => Ok(tree.clone()),
            Hcqr::Static(tree) => {
                let sink = MemorySink::new(tree.context().clone());
                algebra::copy_tree(tree.root()?, sink)
            }
        }
    }

    /// Check the structural invariants of the tree
    pub fn validate(&self) -> Result<()> {
        with_root!(self, |root| match root {
            Some(root) => algebra::validate(&root),
            None => Ok(()),
        })
    }

    pub fn stats(&self) -> Result<HcqrStats> {
        let mut stats = with_root!(self, |root| match root {
            Some(root) => algebra::collect_stats(&root),
            None => Ok(HcqrStats::default()),
        })?;
        stats.items = self.items()?.len();
        Ok(stats)
    }

    fn combine(&self, op: SetOp, other: &Hcqr) -> Result<Hcqr> {
        let ctx = self.context().clone();
        match self {
            Hcqr::InMemory(_) => Ok(Hcqr::InMemory(combine_into(op, self, other, MemorySink::new(ctx))?)),
            Hcqr::Static(_) => Ok(Hcqr::Static(combine_into(op, self, other, StaticSink::new(ctx))?)),
        }
    }
}

fn combine_into<S: TreeSink>(op: SetOp, a: &Hcqr, b: &Hcqr, sink: S) -> Result<S::Output> {
    with_root!(a, |ra| with_root!(b, |rb| algebra::combine(op, ra, rb, sink)))
}

impl From<MemoryHcqr> for Hcqr {
    fn from(tree: MemoryHcqr) -> Self {
        Hcqr::InMemory(tree)
    }
}

impl From<StaticHcqr> for Hcqr {
    fn from(tree: StaticHcqr) -> Self {
        Hcqr::Static(tree)
    }
}
