//! Compaction of HCQR trees.
//!
//! Bottom-up, an internal node whose children are all leaves is replaced by
//! a single leaf when that is cheaper:
//!
//! - below `max_partial_match_level`, non-full children are merged into one
//!   fetched leaf if the merged set serializes smaller than the separate sets
//! - children covering every grid child position with full matches collapse
//!   into one full match
//!
//! Compaction never changes [`TreeCursor::items`] and is idempotent.

use super::{HcqrContext, LeafValue, TreeCursor, TreeSink};
use crate::error::Result;
use crate::grid::{Level, PixelId};
use crate::index::types::{ItemSet, byte_size};

enum Compacted {
    Leaf(PixelId, LeafValue),
    Internal(PixelId, Vec<Compacted>),
}

pub fn compactify<C: TreeCursor, S: TreeSink>(
    root: Option<C>,
    max_partial_match_level: Level,
    mut sink: S,
) -> Result<S::Output> {
    if let Some(root) = root {
        let ctx = root.context().clone();
        let compacted = compact_node(&ctx, &root, max_partial_match_level)?;
        emit(&compacted, &mut sink)?;
    }
    sink.finish()
}

fn compact_node<C: TreeCursor>(ctx: &HcqrContext, node: &C, max_level: Level) -> Result<Compacted> {
    let pixel = node.pixel_id();
    if node.is_leaf() {
        return Ok(Compacted::Leaf(pixel, node.leaf_value()?));
    }

    let children = node
        .children()
        .map(|child| compact_node(ctx, &child?, max_level))
        .collect::<Result<Vec<_>>>()?;

    let leaves: Option<Vec<&LeafValue>> = children
        .iter()
        .map(|c| match c {
            Compacted::Leaf(_, value) => Some(value),
            Compacted::Internal(..) => None,
        })
        .collect();
    let Some(leaves) = leaves.filter(|l| !l.is_empty()) else {
        return Ok(Compacted::Internal(pixel, children));
    };

    let any_full = leaves.iter().any(|v| matches!(v, LeafValue::FullMatch));
    if !any_full && ctx.grid.level(pixel) > max_level {
        let mut merged = ItemSet::new();
        let mut separate = 0usize;
        for value in &leaves {
            let items = leaf_items(ctx, value)?;
            separate += byte_size(&items);
            merged |= items;
        }
        if byte_size(&merged) < separate {
            return Ok(Compacted::Leaf(pixel, LeafValue::Fetched(merged)));
        }
    }

    let all_full = leaves.iter().all(|v| matches!(v, LeafValue::FullMatch));
    if all_full && leaves.len() == ctx.grid.children_count(pixel) as usize {
        return Ok(Compacted::Leaf(pixel, LeafValue::FullMatch));
    }

    Ok(Compacted::Internal(pixel, children))
}

fn leaf_items(ctx: &HcqrContext, value: &LeafValue) -> Result<ItemSet> {
    match value {
        LeafValue::FullMatch => Ok(ItemSet::new()),
        LeafValue::PartialMatch(idx) => ctx.item_store.at(*idx),
        LeafValue::Fetched(items) => Ok(items.clone()),
    }
}

fn emit<S: TreeSink>(node: &Compacted, sink: &mut S) -> Result<()> {
    match node {
        Compacted::Leaf(pixel, value) => sink.leaf(*pixel, value.clone()),
        Compacted::Internal(pixel, children) => {
            sink.open(*pixel)?;
            for child in children {
                emit(child, sink)?;
            }
            sink.close()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{HierarchyGrid, MapGridInfo};
    use crate::hcqr::{Hcqr, MemoryHcqr, NodeKind, TreeNode};
    use crate::index::item_store::MemoryItemStore;
    use std::sync::Arc;

    fn set(items: impl IntoIterator<Item = u32>) -> ItemSet {
        items.into_iter().collect()
    }

    // 0 -> {10, 20}, 10 -> {11, 12}, 20 -> {21, 22}
    fn context() -> HcqrContext {
        let grid = HierarchyGrid::new(0, vec![(10, 0), (20, 0), (11, 10), (12, 10), (21, 20), (22, 20)]).unwrap();
        let info = MapGridInfo::new(
            &grid,
            vec![
                (11, set(0..1000)),
                (12, set(1000..2000)),
                (21, set(2000..2010)),
                (22, set(3000..3010)),
            ],
        );
        // two partial sets that share a dense range
        let store = MemoryItemStore::from(vec![set(0..600), set(400..1000)]);
        HcqrContext::new(Arc::new(grid), Arc::new(info), Arc::new(store))
    }

    fn memory(hcqr: &Hcqr) -> MemoryHcqr {
        hcqr.to_memory().unwrap()
    }

    #[test]
    fn test_merges_overlapping_partials() {
        let ctx = context();
        let tree = Hcqr::InMemory(MemoryHcqr::new(
            ctx.clone(),
            Some(TreeNode::internal(
                0,
                vec![TreeNode::internal(
                    10,
                    vec![TreeNode::partial_match(11, 0), TreeNode::partial_match(12, 1)],
                )],
            )),
            vec![],
        ));

        let compacted = tree.compactified(0).unwrap();
        assert_eq!(compacted.items().unwrap(), tree.items().unwrap());
        let m = memory(&compacted);
        let ten = &m.root_node().unwrap().children()[0];
        assert!(matches!(ten.kind(), NodeKind::Fetched(_)));

        // at or above the level limit nothing is merged
        let untouched = tree.compactified(1).unwrap();
        assert_eq!(untouched.number_of_nodes().unwrap(), 4);
    }

    #[test]
    fn test_merges_root_leaf_children() {
        let ctx = context();
        let tree = Hcqr::InMemory(MemoryHcqr::new(
            ctx,
            Some(TreeNode::internal(
                20,
                vec![TreeNode::fetched(21, 0), TreeNode::fetched(22, 1)],
            )),
            vec![set([70_000]), set([140_000])],
        ));
        // one header instead of two
        let compacted = tree.compactified(0).unwrap();
        assert_eq!(compacted.number_of_nodes().unwrap(), 1);
        assert_eq!(compacted.root_pixel_id().unwrap(), Some(20));
        assert_eq!(compacted.items().unwrap(), tree.items().unwrap());
    }

    #[test]
    fn test_collapses_complete_full_children() {
        let ctx = context();
        let tree = Hcqr::InMemory(MemoryHcqr::new(
            ctx.clone(),
            Some(TreeNode::internal(
                0,
                vec![
                    TreeNode::internal(10, vec![TreeNode::full_match(11), TreeNode::full_match(12)]),
                    TreeNode::internal(20, vec![TreeNode::full_match(21)]),
                ],
            )),
            vec![],
        ));

        let compacted = tree.compactified(5).unwrap();
        let m = memory(&compacted);
        let root = m.root_node().unwrap();
        assert_eq!(root.children()[0].kind(), NodeKind::FullMatch);
        // 20 misses child 22
        assert_eq!(root.children()[1].kind(), NodeKind::Internal);
        assert_eq!(compacted.items().unwrap(), tree.items().unwrap());
    }

    #[test]
    fn test_idempotent() {
        let ctx = context();
        let tree = Hcqr::InMemory(MemoryHcqr::new(
            ctx,
            Some(TreeNode::internal(
                0,
                vec![
                    TreeNode::internal(10, vec![TreeNode::partial_match(11, 0), TreeNode::partial_match(12, 1)]),
                    TreeNode::internal(20, vec![TreeNode::full_match(21), TreeNode::full_match(22)]),
                ],
            )),
            vec![],
        ));
        let once = tree.compactified(0).unwrap();
        let twice = once.compactified(0).unwrap();
        assert_eq!(memory(&once).root_node(), memory(&twice).root_node());
        assert_eq!(memory(&once).fetched(), memory(&twice).fetched());
    }
}
