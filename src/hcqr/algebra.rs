//! Set algebra and reshaping transforms over HCQR trees.
//!
//! Every operation walks its operands through [`TreeCursor`] and writes its
//! result into a [`TreeSink`] in pre-order, so the same code serves both
//! representations and any mix of them.
//!
//! Pairing rules for two nodes `a` and `b`:
//!
//! - both leaves: materialize both item sets, restrict the shallower one to
//!   the items of its own pixel, combine, and emit a fetched leaf. Full
//!   matches short-circuit first (intersect copies the other side, union
//!   yields a full match, full minus full is empty).
//! - both internal: pixels must agree; children are merge-joined by pixel id.
//! - internal against a leaf at the same or a coarser pixel: the leaf is
//!   paired with every child.
//! - internal against a leaf strictly below it: the leaf is routed to the
//!   child covering it.
//!
//! Children present on one side only are dropped by intersect, kept from
//! both sides by union and kept from the left side by difference.

use super::{HcqrContext, HcqrStats, LeafValue, NodeKind, TreeCursor, TreeSink};
use crate::error::{HcqrError, Result};
use crate::grid::{Grid, Level, PixelId, common_ancestor};
use crate::index::types::ItemSet;
use std::cmp::Ordering;

/// Binary set operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOp {
    Intersect,
    Union,
    Difference,
}

impl SetOp {
    /// Whether nodes only present in the left operand survive
    fn keeps_left(self) -> bool {
        self != SetOp::Intersect
    }

    /// Whether nodes only present in the right operand survive
    fn keeps_right(self) -> bool {
        self == SetOp::Union
    }

    fn apply(self, a: ItemSet, b: ItemSet) -> ItemSet {
        match self {
            SetOp::Intersect => a & b,
            SetOp::Union => a | b,
            SetOp::Difference => a - b,
        }
    }
}

/// Combine two trees. A missing operand is the empty tree.
pub fn combine<A, B, S>(op: SetOp, a: Option<A>, b: Option<B>, mut sink: S) -> Result<S::Output>
where
    A: TreeCursor,
    B: TreeCursor,
    S: TreeSink,
{
    match (a, b) {
        (Some(a), Some(b)) => {
            combine_nodes(op, &a, &b, &mut sink)?;
        }
        (Some(a), None) if op.keeps_left() => {
            copy_subtree(&a, &mut sink)?;
        }
        (None, Some(b)) if op.keeps_right() => {
            copy_subtree(&b, &mut sink)?;
        }
        _ => {}
    }
    sink.finish()
}

/// Copy a whole tree into `sink`
pub fn copy_tree<C: TreeCursor, S: TreeSink>(root: Option<C>, mut sink: S) -> Result<S::Output> {
    if let Some(root) = root {
        copy_subtree(&root, &mut sink)?;
    }
    sink.finish()
}

/// Replace every leaf by a full match at the same pixel
pub fn all_to_full<C: TreeCursor, S: TreeSink>(root: Option<C>, mut sink: S) -> Result<S::Output> {
    if let Some(root) = root {
        all_to_full_node(&root, &mut sink)?;
    }
    sink.finish()
}

/// Materialize structure down to `to_level`. Nodes at or below that level are
/// copied unchanged. Full matches above it are subdivided into full-match
/// children, partial and fetched leaves are split into fetched children
/// holding the items of each child pixel.
pub fn expand<C: TreeCursor, S: TreeSink>(root: Option<C>, to_level: Level, mut sink: S) -> Result<S::Output> {
    if let Some(root) = root {
        let ctx = root.context().clone();
        expand_node(&ctx, &root, to_level, &mut sink)?;
    }
    sink.finish()
}

pub(crate) fn copy_subtree<C: TreeCursor, S: TreeSink>(node: &C, sink: &mut S) -> Result<bool> {
    if node.is_leaf() {
        sink.leaf(node.pixel_id(), node.leaf_value()?)?;
        return Ok(true);
    }
    sink.open(node.pixel_id())?;
    for child in node.children() {
        copy_subtree(&child?, sink)?;
    }
    sink.close()
}

fn combine_nodes<A, B, S>(op: SetOp, a: &A, b: &B, sink: &mut S) -> Result<bool>
where
    A: TreeCursor,
    B: TreeCursor,
    S: TreeSink,
{
    let grid = a.context().grid.clone();
    let (pa, pb) = (a.pixel_id(), b.pixel_id());

    if a.is_leaf() && b.is_leaf() {
        let pixel = result_pixel(grid.as_ref(), pa, pb);
        return combine_leaves(op, a, b, pixel, sink);
    }

    // One side is internal from here on. A full match only short-circuits
    // when it covers the internal node; a deeper one is routed below.
    let covers = |full: PixelId, other: PixelId| full == other || grid.is_ancestor(full, other);
    let a_full = a.kind() == NodeKind::FullMatch && covers(pa, pb);
    let b_full = b.kind() == NodeKind::FullMatch && covers(pb, pa);
    match op {
        SetOp::Intersect if a_full => return copy_subtree(b, sink),
        SetOp::Intersect if b_full => return copy_subtree(a, sink),
        SetOp::Union if a_full || b_full => {
            let pixel = if a_full { pa } else { pb };
            sink.leaf(pixel, LeafValue::FullMatch)?;
            return Ok(true);
        }
        _ => {}
    }

    match (a.is_leaf(), b.is_leaf()) {
        (false, false) => {
            if pa != pb {
                return Err(HcqrError::InvariantViolation(format!(
                    "internal nodes at different pixels {} and {}",
                    pa, pb
                )));
            }
            let left = a.children().collect::<Result<Vec<_>>>()?;
            let right = b.children().collect::<Result<Vec<_>>>()?;
            merge_children(op, pa, &left, &right, sink)
        }
        (false, true) => internal_with_leaf(op, grid.as_ref(), a, b, false, sink),
        (true, false) => internal_with_leaf(op, grid.as_ref(), b, a, true, sink),
        (true, true) => unreachable!("leaf pairs are handled above"),
    }
}

/// Combine two leaves into a single leaf at `pixel`
fn combine_leaves<A, B, S>(op: SetOp, a: &A, b: &B, pixel: PixelId, sink: &mut S) -> Result<bool>
where
    A: TreeCursor,
    B: TreeCursor,
    S: TreeSink,
{
    let a_full = a.kind() == NodeKind::FullMatch;
    let b_full = b.kind() == NodeKind::FullMatch;
    match op {
        SetOp::Intersect if a_full => {
            sink.leaf(pixel, b.leaf_value()?)?;
            return Ok(true);
        }
        SetOp::Intersect if b_full => {
            sink.leaf(pixel, a.leaf_value()?)?;
            return Ok(true);
        }
        SetOp::Union if a_full || b_full => {
            let grid = a.context().grid.as_ref();
            let (full, other) = if a_full {
                (a.pixel_id(), b.pixel_id())
            } else {
                (b.pixel_id(), a.pixel_id())
            };
            // only a covering full leaf stays full
            if full == other || grid.is_ancestor(full, other) {
                sink.leaf(full, LeafValue::FullMatch)?;
                return Ok(true);
            }
        }
        SetOp::Difference if a_full && b_full => return Ok(false),
        _ => {}
    }

    let ctx = a.context();
    let grid = ctx.grid.as_ref();
    let (pa, pb) = (a.pixel_id(), b.pixel_id());
    let mut items_a = a.items()?;
    let mut items_b = b.items()?;
    match grid.level(pa).cmp(&grid.level(pb)) {
        Ordering::Less => items_a &= ctx.grid_info.items(pa),
        Ordering::Greater => items_b &= ctx.grid_info.items(pb),
        Ordering::Equal => {}
    }

    let result = op.apply(items_a, items_b);
    if result.is_empty() {
        return Ok(false);
    }
    sink.leaf(pixel, LeafValue::Fetched(result))?;
    Ok(true)
}

/// Pixel of the result of two leaves: the deeper of two related pixels,
/// otherwise their lowest common ancestor
fn result_pixel(grid: &dyn Grid, a: PixelId, b: PixelId) -> PixelId {
    if a == b || grid.is_ancestor(b, a) {
        a
    } else if grid.is_ancestor(a, b) {
        b
    } else {
        common_ancestor(grid, a, b)
    }
}

fn merge_children<A, B, S>(op: SetOp, pixel: PixelId, left: &[A], right: &[B], sink: &mut S) -> Result<bool>
where
    A: TreeCursor,
    B: TreeCursor,
    S: TreeSink,
{
    sink.open(pixel)?;
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        let (x, y) = (&left[i], &right[j]);
        match x.pixel_id().cmp(&y.pixel_id()) {
            Ordering::Less => {
                if op.keeps_left() {
                    copy_subtree(x, sink)?;
                }
                i += 1;
            }
            Ordering::Greater => {
                if op.keeps_right() {
                    copy_subtree(y, sink)?;
                }
                j += 1;
            }
            Ordering::Equal => {
                combine_nodes(op, x, y, sink)?;
                i += 1;
                j += 1;
            }
        }
    }
    if op.keeps_left() {
        for x in &left[i..] {
            copy_subtree(x, sink)?;
        }
    }
    if op.keeps_right() {
        for y in &right[j..] {
            copy_subtree(y, sink)?;
        }
    }
    sink.close()
}

/// Pair an internal node with a leaf. `leaf_is_left` keeps the operand
/// order for difference.
fn internal_with_leaf<I, L, S>(
    op: SetOp,
    grid: &dyn Grid,
    internal: &I,
    leaf: &L,
    leaf_is_left: bool,
    sink: &mut S,
) -> Result<bool>
where
    I: TreeCursor,
    L: TreeCursor,
    S: TreeSink,
{
    let (pi, pl) = (internal.pixel_id(), leaf.pixel_id());

    if pl == pi || grid.is_ancestor(pl, pi) {
        sink.open(pi)?;
        for child in internal.children() {
            let child = child?;
            if leaf_is_left {
                combine_nodes(op, leaf, &child, sink)?;
            } else {
                combine_nodes(op, &child, leaf, sink)?;
            }
        }
        return sink.close();
    }

    if !grid.is_ancestor(pi, pl) {
        return Err(HcqrError::InvariantViolation(format!(
            "pixels {} and {} are not related",
            pi, pl
        )));
    }

    // The leaf lies strictly below the internal node: find the pixel one
    // level below `pi` on the way to the leaf.
    let mut covering = pl;
    while let Some(parent) = grid.parent(covering) {
        if parent == pi {
            break;
        }
        covering = parent;
    }

    let (keep_children, keep_leaf) = if leaf_is_left {
        (op.keeps_right(), op.keeps_left())
    } else {
        (op.keeps_left(), op.keeps_right())
    };

    sink.open(pi)?;
    let mut leaf_done = false;
    for child in internal.children() {
        let child = child?;
        let cp = child.pixel_id();
        if !leaf_done && cp > covering {
            if keep_leaf {
                sink.leaf(covering, coarsened_value(leaf)?)?;
            }
            leaf_done = true;
        }
        if cp != covering {
            if keep_children {
                copy_subtree(&child, sink)?;
            }
            continue;
        }
        leaf_done = true;
        match (child.is_leaf(), leaf_is_left) {
            // a child leaf is coarser than the routed leaf; the result stays
            // at the child's pixel
            (true, true) => combine_leaves(op, leaf, &child, cp, sink)?,
            (true, false) => combine_leaves(op, &child, leaf, cp, sink)?,
            (false, true) => combine_nodes(op, leaf, &child, sink)?,
            (false, false) => combine_nodes(op, &child, leaf, sink)?,
        };
    }
    if !leaf_done && keep_leaf {
        sink.leaf(covering, coarsened_value(leaf)?)?;
    }
    sink.close()
}

/// Value of a leaf moved up to a coarser pixel. A full match would claim
/// the whole coarser pixel, so it travels as its item set instead.
fn coarsened_value<L: TreeCursor>(leaf: &L) -> Result<LeafValue> {
    match leaf.kind() {
        NodeKind::FullMatch => Ok(LeafValue::Fetched(leaf.items()?)),
        _ => leaf.leaf_value(),
    }
}

fn all_to_full_node<C: TreeCursor, S: TreeSink>(node: &C, sink: &mut S) -> Result<bool> {
    if node.is_leaf() {
        sink.leaf(node.pixel_id(), LeafValue::FullMatch)?;
        return Ok(true);
    }
    sink.open(node.pixel_id())?;
    for child in node.children() {
        all_to_full_node(&child?, sink)?;
    }
    sink.close()
}

fn expand_node<C: TreeCursor, S: TreeSink>(
    ctx: &HcqrContext,
    node: &C,
    to_level: Level,
    sink: &mut S,
) -> Result<bool> {
    let pixel = node.pixel_id();
    if ctx.grid.level(pixel) >= to_level {
        return copy_subtree(node, sink);
    }
    match node.kind() {
        NodeKind::Internal => {
            sink.open(pixel)?;
            for child in node.children() {
                expand_node(ctx, &child?, to_level, sink)?;
            }
            sink.close()
        }
        NodeKind::FullMatch => expand_full(ctx, pixel, to_level, sink),
        NodeKind::PartialMatch(_) | NodeKind::Fetched(_) => {
            let items = node.items()?;
            expand_items(ctx, pixel, items, to_level, sink)
        }
    }
}

fn expand_full<S: TreeSink>(ctx: &HcqrContext, pixel: PixelId, to_level: Level, sink: &mut S) -> Result<bool> {
    let grid = ctx.grid.as_ref();
    if grid.level(pixel) >= to_level {
        sink.leaf(pixel, LeafValue::FullMatch)?;
        return Ok(true);
    }
    let count = grid.children_count(pixel);
    if count == 0 {
        let items = ctx.grid_info.items(pixel);
        if items.is_empty() {
            return Ok(false);
        }
        sink.leaf(pixel, LeafValue::Fetched(items))?;
        return Ok(true);
    }
    sink.open(pixel)?;
    for n in 0..count {
        if let Some(child) = grid.index(pixel, n) {
            expand_full(ctx, child, to_level, sink)?;
        }
    }
    sink.close()
}

fn expand_items<S: TreeSink>(
    ctx: &HcqrContext,
    pixel: PixelId,
    items: ItemSet,
    to_level: Level,
    sink: &mut S,
) -> Result<bool> {
    let grid = ctx.grid.as_ref();
    let count = grid.children_count(pixel);
    if grid.level(pixel) >= to_level || count == 0 {
        sink.leaf(pixel, LeafValue::Fetched(items))?;
        return Ok(true);
    }
    sink.open(pixel)?;
    for n in 0..count {
        let Some(child) = grid.index(pixel, n) else {
            continue;
        };
        let mut child_items = ctx.grid_info.items(child);
        child_items &= &items;
        if !child_items.is_empty() {
            expand_items(ctx, child, child_items, to_level, sink)?;
        }
    }
    if sink.close()? {
        return Ok(true);
    }
    // no child pixel claims any of the items; keep them where they were
    sink.leaf(pixel, LeafValue::Fetched(items))?;
    Ok(true)
}

/// Check structural invariants below `node`: children one level deeper,
/// direct grid children, strictly ascending, and no empty internal nodes
pub fn validate<C: TreeCursor>(node: &C) -> Result<()> {
    let grid = node.context().grid.clone();
    if node.is_leaf() {
        if let NodeKind::Fetched(idx) = node.kind() {
            node.fetched_items(idx)?;
        }
        return Ok(());
    }
    let pixel = node.pixel_id();
    let level = grid.level(pixel);
    let mut previous: Option<PixelId> = None;
    let mut count = 0usize;
    for child in node.children() {
        let child = child?;
        let cp = child.pixel_id();
        if grid.child_position(pixel, cp).is_none() {
            return Err(HcqrError::InvariantViolation(format!(
                "node {} is not a grid child of {}",
                cp, pixel
            )));
        }
        if grid.level(cp) != level + 1 {
            return Err(HcqrError::InvariantViolation(format!(
                "node {} is not one level below {}",
                cp, pixel
            )));
        }
        if previous.is_some_and(|p| p >= cp) {
            return Err(HcqrError::InvariantViolation(format!(
                "children of {} are not strictly ascending",
                pixel
            )));
        }
        previous = Some(cp);
        count += 1;
        validate(&child)?;
    }
    if count == 0 {
        return Err(HcqrError::InvariantViolation(format!(
            "internal node {} has no children",
            pixel
        )));
    }
    Ok(())
}

pub(crate) fn collect_stats<C: TreeCursor>(node: &C) -> Result<HcqrStats> {
    let mut stats = HcqrStats::default();
    stats_node(node, 0, &mut stats)?;
    Ok(stats)
}

fn stats_node<C: TreeCursor>(node: &C, depth: usize, stats: &mut HcqrStats) -> Result<()> {
    stats.nodes += 1;
    stats.depth = stats.depth.max(depth);
    match node.kind() {
        NodeKind::Internal => stats.internal += 1,
        NodeKind::FullMatch => stats.full_match += 1,
        NodeKind::PartialMatch(_) => stats.partial_match += 1,
        NodeKind::Fetched(_) => stats.fetched += 1,
    }
    for child in node.children() {
        stats_node(&child?, depth + 1, stats)?;
    }
    Ok(())
}
