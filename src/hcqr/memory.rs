//! Owned node-tree representation.

use super::{HcqrContext, LeafValue, NodeKind, TreeCursor, TreeSink};
use crate::error::{HcqrError, Result};
use crate::grid::{PixelId, path_from_root};
use crate::hcqr::static_tree::{StaticHcqr, StaticSink};
use crate::index::types::ItemSet;

/// Payload of a tree node
#[derive(Debug, Clone, PartialEq)]
pub enum NodePayload {
    /// Children sorted by pixel id
    Internal(Vec<TreeNode>),
    FullMatch,
    PartialMatch(u32),
    Fetched(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pixel_id: PixelId,
    payload: NodePayload,
}

impl TreeNode {
    /// Internal node; children are sorted by pixel id
    pub fn internal(pixel_id: PixelId, mut children: Vec<TreeNode>) -> Self {
        children.sort_unstable_by_key(|c| c.pixel_id);
        Self {
            pixel_id,
            payload: NodePayload::Internal(children),
        }
    }

    pub fn full_match(pixel_id: PixelId) -> Self {
        Self {
            pixel_id,
            payload: NodePayload::FullMatch,
        }
    }

    pub fn partial_match(pixel_id: PixelId, item_index_id: u32) -> Self {
        Self {
            pixel_id,
            payload: NodePayload::PartialMatch(item_index_id),
        }
    }

    pub fn fetched(pixel_id: PixelId, fetched_index: u32) -> Self {
        Self {
            pixel_id,
            payload: NodePayload::Fetched(fetched_index),
        }
    }

    pub fn pixel_id(&self) -> PixelId {
        self.pixel_id
    }

    pub fn payload(&self) -> &NodePayload {
        &self.payload
    }

    pub fn children(&self) -> &[TreeNode] {
        match &self.payload {
            NodePayload::Internal(children) => children,
            _ => &[],
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self.payload {
            NodePayload::Internal(_) => NodeKind::Internal,
            NodePayload::FullMatch => NodeKind::FullMatch,
            NodePayload::PartialMatch(idx) => NodeKind::PartialMatch(idx),
            NodePayload::Fetched(idx) => NodeKind::Fetched(idx),
        }
    }
}

/// HCQR held as an owned node tree plus its fetched item sets
#[derive(Clone)]
pub struct MemoryHcqr {
    root: Option<TreeNode>,
    fetched: Vec<ItemSet>,
    ctx: HcqrContext,
}

impl MemoryHcqr {
    pub fn new(ctx: HcqrContext, root: Option<TreeNode>, fetched: Vec<ItemSet>) -> Self {
        Self { root, fetched, ctx }
    }

    pub fn empty(ctx: HcqrContext) -> Self {
        Self::new(ctx, None, Vec::new())
    }

    pub fn context(&self) -> &HcqrContext {
        &self.ctx
    }

    pub fn root_node(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    /// Fetched side table, addressed by [`NodePayload::Fetched`]
    pub fn fetched(&self) -> &[ItemSet] {
        &self.fetched
    }

    pub fn root(&self) -> Option<MemoryCursor<'_>> {
        self.root.as_ref().map(|node| MemoryCursor { tree: self, node })
    }

    /// Encode into the compact binary representation
    pub fn to_static(&self) -> Result<StaticHcqr> {
        super::algebra::copy_tree(self.root(), StaticSink::new(self.ctx.clone()))
    }
}

/// Cursor over a [`MemoryHcqr`] node
#[derive(Clone, Copy)]
pub struct MemoryCursor<'a> {
    tree: &'a MemoryHcqr,
    node: &'a TreeNode,
}

impl<'a> MemoryCursor<'a> {
    pub fn node(&self) -> &'a TreeNode {
        self.node
    }
}

pub struct MemoryChildren<'a> {
    tree: &'a MemoryHcqr,
    iter: std::slice::Iter<'a, TreeNode>,
}

impl<'a> Iterator for MemoryChildren<'a> {
    type Item = Result<MemoryCursor<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        self.iter.next().map(|node| Ok(MemoryCursor { tree, node }))
    }
}

impl<'a> TreeCursor for MemoryCursor<'a> {
    type Children = MemoryChildren<'a>;

    fn pixel_id(&self) -> PixelId {
        self.node.pixel_id
    }

    fn kind(&self) -> NodeKind {
        self.node.kind()
    }

    fn children(&self) -> Self::Children {
        MemoryChildren {
            tree: self.tree,
            iter: self.node.children().iter(),
        }
    }

    fn context(&self) -> &HcqrContext {
        &self.tree.ctx
    }

    fn fetched_items(&self, index: u32) -> Result<ItemSet> {
        self.tree.fetched.get(index as usize).cloned().ok_or_else(|| {
            HcqrError::InvariantViolation(format!(
                "fetched index {} out of range ({} sets)",
                index,
                self.tree.fetched.len()
            ))
        })
    }
}

struct Frame {
    pixel: PixelId,
    children: Vec<TreeNode>,
}

/// Builds a [`MemoryHcqr`] from a pre-order node stream
pub struct MemorySink {
    ctx: HcqrContext,
    fetched: Vec<ItemSet>,
    stack: Vec<Frame>,
    root: Option<TreeNode>,
}

impl MemorySink {
    pub fn new(ctx: HcqrContext) -> Self {
        Self {
            ctx,
            fetched: Vec::new(),
            stack: Vec::new(),
            root: None,
        }
    }

    fn attach(&mut self, node: TreeNode) -> Result<()> {
        match self.stack.last_mut() {
            Some(frame) => frame.children.push(node),
            None if self.root.is_some() => {
                return Err(HcqrError::InvariantViolation(format!(
                    "second root {} emitted",
                    node.pixel_id
                )));
            }
            None => self.root = Some(node),
        }
        Ok(())
    }
}

impl TreeSink for MemorySink {
    type Output = MemoryHcqr;

    fn open(&mut self, pixel: PixelId) -> Result<()> {
        self.stack.push(Frame {
            pixel,
            children: Vec::new(),
        });
        Ok(())
    }

    fn close(&mut self) -> Result<bool> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| HcqrError::InvariantViolation("close without open".to_string()))?;
        if frame.children.is_empty() {
            return Ok(false);
        }
        self.attach(TreeNode {
            pixel_id: frame.pixel,
            payload: NodePayload::Internal(frame.children),
        })?;
        Ok(true)
    }

    fn leaf(&mut self, pixel: PixelId, value: LeafValue) -> Result<()> {
        let payload = match value {
            LeafValue::FullMatch => NodePayload::FullMatch,
            LeafValue::PartialMatch(idx) => NodePayload::PartialMatch(idx),
            LeafValue::Fetched(items) => {
                self.fetched.push(items);
                NodePayload::Fetched((self.fetched.len() - 1) as u32)
            }
        };
        self.attach(TreeNode {
            pixel_id: pixel,
            payload,
        })
    }

    fn finish(self) -> Result<MemoryHcqr> {
        if !self.stack.is_empty() {
            return Err(HcqrError::InvariantViolation(format!(
                "{} nodes left open",
                self.stack.len()
            )));
        }
        Ok(MemoryHcqr::new(self.ctx, self.root, self.fetched))
    }
}

/// Builds a tree from leaves given in any order. Missing ancestors are
/// created as internal nodes along the grid path from the root.
pub struct MemoryHcqrBuilder {
    ctx: HcqrContext,
    root: Option<TreeNode>,
    fetched: Vec<ItemSet>,
}

impl MemoryHcqrBuilder {
    pub fn new(ctx: HcqrContext) -> Self {
        Self {
            ctx,
            root: None,
            fetched: Vec::new(),
        }
    }

    /// Insert a leaf at `pixel`. Fails if the pixel overlaps a leaf that is
    /// already present.
    pub fn insert(&mut self, pixel: PixelId, value: LeafValue) -> Result<()> {
        let path = path_from_root(self.ctx.grid.as_ref(), pixel);
        let payload = match value {
            LeafValue::FullMatch => NodePayload::FullMatch,
            LeafValue::PartialMatch(idx) => NodePayload::PartialMatch(idx),
            LeafValue::Fetched(items) => {
                self.fetched.push(items);
                NodePayload::Fetched((self.fetched.len() - 1) as u32)
            }
        };

        let pushed = matches!(payload, NodePayload::Fetched(_));
        let inserted = match &mut self.root {
            None => {
                self.root = Some(chain(&path, payload));
                Ok(())
            }
            Some(root) if root.pixel_id == path[0] => insert_path(root, &path, payload),
            Some(root) => Err(HcqrError::InvariantViolation(format!(
                "pixel {} is not below root {}",
                pixel, root.pixel_id
            ))),
        };
        if inserted.is_err() && pushed {
            self.fetched.pop();
        }
        inserted
    }

    pub fn finish(self) -> MemoryHcqr {
        MemoryHcqr::new(self.ctx, self.root, self.fetched)
    }
}

fn chain(path: &[PixelId], leaf: NodePayload) -> TreeNode {
    match path {
        [pixel] => TreeNode {
            pixel_id: *pixel,
            payload: leaf,
        },
        [pixel, rest @ ..] => TreeNode {
            pixel_id: *pixel,
            payload: NodePayload::Internal(vec![chain(rest, leaf)]),
        },
        [] => unreachable!("grid paths contain at least the pixel itself"),
    }
}

fn insert_path(node: &mut TreeNode, path: &[PixelId], leaf: NodePayload) -> Result<()> {
    let overlap = || {
        HcqrError::InvariantViolation(format!(
            "leaf at pixel {} overlaps an existing node",
            path[path.len() - 1]
        ))
    };
    if path.len() == 1 {
        return Err(overlap());
    }
    let NodePayload::Internal(children) = &mut node.payload else {
        return Err(overlap());
    };
    let next = path[1];
    match children.binary_search_by_key(&next, |c| c.pixel_id) {
        Ok(i) => insert_path(&mut children[i], &path[1..], leaf),
        Err(i) => {
            children.insert(i, chain(&path[1..], leaf));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Grid, MapGridInfo, QuadGrid};
    use crate::index::item_store::MemoryItemStore;
    use std::sync::Arc;

    fn context() -> HcqrContext {
        let grid = QuadGrid::new(2).unwrap();
        let leaves: Vec<_> = (0..4)
            .flat_map(|a| (0..4).map(move |b| (a, b)))
            .map(|(a, b)| {
                let pixel = grid.index(grid.index(1, a).unwrap(), b).unwrap();
                let items: ItemSet = [(a * 4 + b) as u32].into_iter().collect();
                (pixel, items)
            })
            .collect();
        let info = MapGridInfo::new(&grid, leaves);
        HcqrContext::new(Arc::new(grid), Arc::new(info), Arc::new(MemoryItemStore::new()))
    }

    #[test]
    fn test_builder_creates_ancestors() {
        let ctx = context();
        let mut builder = MemoryHcqrBuilder::new(ctx);
        // 1 -> 4 -> 17, 1 -> 7
        builder.insert(17, LeafValue::FullMatch).unwrap();
        builder.insert(7, LeafValue::Fetched([99u32].into_iter().collect())).unwrap();
        builder.insert(16, LeafValue::FullMatch).unwrap();
        let tree = builder.finish();

        let root = tree.root_node().unwrap();
        assert_eq!(root.pixel_id(), 1);
        let pixels: Vec<_> = root.children().iter().map(|c| c.pixel_id()).collect();
        assert_eq!(pixels, vec![4, 7]);
        let pixels: Vec<_> = root.children()[0].children().iter().map(|c| c.pixel_id()).collect();
        assert_eq!(pixels, vec![16, 17]);
        assert_eq!(tree.fetched().len(), 1);

        let cursor = tree.root().unwrap();
        assert_eq!(cursor.node_count().unwrap(), 5);
        assert_eq!(cursor.depth().unwrap(), 2);
        assert_eq!(cursor.items().unwrap().iter().collect::<Vec<_>>(), vec![0, 1, 99]);
    }

    #[test]
    fn test_builder_rejects_overlap() {
        let mut builder = MemoryHcqrBuilder::new(context());
        builder.insert(4, LeafValue::FullMatch).unwrap();
        assert!(builder.insert(17, LeafValue::FullMatch).is_err());
        assert!(builder.insert(4, LeafValue::FullMatch).is_err());
    }

    #[test]
    fn test_rejected_fetched_leaf_leaves_no_items_behind() {
        let mut builder = MemoryHcqrBuilder::new(context());
        builder.insert(4, LeafValue::Fetched([1u32].into_iter().collect())).unwrap();
        assert!(builder.insert(17, LeafValue::Fetched([5u32].into_iter().collect())).is_err());
        builder.insert(5, LeafValue::Fetched([4u32].into_iter().collect())).unwrap();

        let tree = builder.finish();
        assert_eq!(tree.fetched().len(), 2);
        assert_eq!(tree.fetched()[1].iter().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_sink_discards_empty_internal_nodes() {
        let mut sink = MemorySink::new(context());
        sink.open(1).unwrap();
        sink.open(4).unwrap();
        assert!(!sink.close().unwrap());
        sink.leaf(5, LeafValue::FullMatch).unwrap();
        assert!(sink.close().unwrap());
        let tree = sink.finish().unwrap();

        let root = tree.root_node().unwrap();
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.children()[0].pixel_id(), 5);
    }

    #[test]
    fn test_sink_rejects_unbalanced_stream() {
        let mut sink = MemorySink::new(context());
        sink.open(1).unwrap();
        assert!(sink.finish().is_err());

        let mut sink = MemorySink::new(context());
        assert!(sink.close().is_err());
    }
}
