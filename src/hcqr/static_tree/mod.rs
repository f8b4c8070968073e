//! Compact binary HCQR representation.
//!
//! Nodes are stored in pre-order as variable-length records (see [`node`]).
//! A node's first child directly follows it. Every other child is found
//! through the `next` offset of its previous sibling, and the last child
//! links back to its parent. Pixel ids are not stored; they are recomputed
//! from the parent pixel and the child position while walking down.
//!
//! Persisted file layout:
//!
//! ```text
//! u64         root pixel id
//! u32         dataSize
//! dataSize    node records
//! ...         item-set table of the fetched sets
//! ```

pub mod builder;
pub mod node;
pub mod sink;
pub mod tree;

pub use builder::{NodeHandle, StaticTreeBuilder};
pub use node::{NodeFlags, NodeRecord};
pub use sink::StaticSink;
pub use tree::StaticTree;

use super::{HcqrContext, NodeKind, TreeCursor};
use crate::error::{HcqrError, Result};
use crate::grid::PixelId;
use crate::index::types::ItemSet;
use crate::utils::{ItemSetTable, read_u64_at, write_item_sets, write_u64_le};
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tree::SharedBytes;

#[derive(Clone)]
enum FetchedItems {
    Owned(Arc<Vec<ItemSet>>),
    Table { bytes: SharedBytes, offset: usize, count: usize },
}

/// HCQR in the compact binary representation
#[derive(Clone)]
pub struct StaticHcqr {
    root_pixel: PixelId,
    tree: StaticTree,
    fetched: FetchedItems,
    ctx: HcqrContext,
}

impl StaticHcqr {
    pub fn new(ctx: HcqrContext, root_pixel: PixelId, tree: StaticTree, fetched: Vec<ItemSet>) -> Self {
        Self {
            root_pixel,
            tree,
            fetched: FetchedItems::Owned(Arc::new(fetched)),
            ctx,
        }
    }

    pub fn context(&self) -> &HcqrContext {
        &self.ctx
    }

    pub fn tree(&self) -> &StaticTree {
        &self.tree
    }

    pub fn root_pixel(&self) -> PixelId {
        self.root_pixel
    }

    /// Number of entries in the fetched side table
    pub fn fetched_len(&self) -> usize {
        match &self.fetched {
            FetchedItems::Owned(sets) => sets.len(),
            FetchedItems::Table { count, .. } => *count,
        }
    }

    pub fn fetched(&self, index: u32) -> Result<ItemSet> {
        let missing = || {
            HcqrError::InvariantViolation(format!(
                "fetched index {} out of range ({} sets)",
                index,
                self.fetched_len()
            ))
        };
        match &self.fetched {
            FetchedItems::Owned(sets) => sets.get(index as usize).cloned().ok_or_else(missing),
            FetchedItems::Table { bytes, offset, count } => {
                if index as usize >= *count {
                    return Err(missing());
                }
                let raw = (**bytes).as_ref();
                ItemSetTable::parse(&raw[*offset..])?.get(index as usize)
            }
        }
    }

    /// Cursor on the root node, `None` for the empty tree
    pub fn root(&self) -> Result<Option<StaticCursor<'_>>> {
        if self.tree.is_empty() {
            return Ok(None);
        }
        let (record, len) = self.tree.record_at(0)?;
        if !record.is_root() {
            return Err(HcqrError::Format("first record is not flagged as root".to_string()));
        }
        if record.next_node_offset as usize != self.tree.data_len() {
            return Err(HcqrError::Format(format!(
                "root next offset {} does not match data size {}",
                record.next_node_offset,
                self.tree.data_len()
            )));
        }
        Ok(Some(StaticCursor {
            hcqr: self,
            offset: 0,
            len,
            pixel: self.root_pixel,
            kind: record.kind()?,
            record,
        }))
    }

    /// Serialize tree and side table
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_u64_le(writer, self.root_pixel)?;
        writer.write_all(self.tree.container())?;
        match &self.fetched {
            FetchedItems::Owned(sets) => {
                write_item_sets(writer, sets)?;
            }
            FetchedItems::Table { bytes, offset, .. } => {
                let raw = (**bytes).as_ref();
                let len = ItemSetTable::parse(&raw[*offset..])?.byte_len()?;
                writer.write_all(&raw[*offset..*offset + len])?;
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Map a persisted tree; records and fetched sets are read in place
    pub fn open(path: &Path, ctx: HcqrContext) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: persisted trees are immutable once written
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_shared(Arc::new(mmap), ctx)
    }

    /// Decode a persisted tree held in memory
    pub fn from_bytes(bytes: Vec<u8>, ctx: HcqrContext) -> Result<Self> {
        Self::from_shared(Arc::new(bytes), ctx)
    }

    fn from_shared(bytes: SharedBytes, ctx: HcqrContext) -> Result<Self> {
        let root_pixel = read_u64_at((*bytes).as_ref(), 0)
            .ok_or_else(|| HcqrError::Format("static hcqr header truncated".to_string()))?;
        let tree = StaticTree::from_shared(bytes.clone(), 8)?;
        let offset = 8 + tree.container().len();
        let count = ItemSetTable::parse(&(*bytes).as_ref()[offset..])?.len();
        Ok(Self {
            root_pixel,
            tree,
            fetched: FetchedItems::Table { bytes, offset, count },
            ctx,
        })
    }

    /// Decode the sibling that `record` (at `offset`) links to, checking
    /// that links only move forward and stay inside the tree
    fn sibling_offset(&self, offset: u32, record: &NodeRecord) -> Result<u32> {
        let next = record.next_node_offset;
        if next <= offset || next as usize >= self.tree.data_len() {
            return Err(HcqrError::Format(format!(
                "node at offset {} links to invalid sibling offset {}",
                offset, next
            )));
        }
        Ok(next)
    }
}

/// Cursor over a [`StaticHcqr`] node
#[derive(Clone, Copy)]
pub struct StaticCursor<'a> {
    hcqr: &'a StaticHcqr,
    offset: u32,
    len: usize,
    pixel: PixelId,
    kind: NodeKind,
    record: NodeRecord,
}

impl<'a> StaticCursor<'a> {
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn record(&self) -> &NodeRecord {
        &self.record
    }

    /// Encoded size of this node's record
    pub fn record_len(&self) -> usize {
        self.len
    }

    /// Walk the sibling chain to the parent link
    pub fn parent(&self) -> Result<Option<StaticCursor<'a>>> {
        if self.record.is_root() {
            return Ok(None);
        }
        let hcqr = self.hcqr;
        let grid = hcqr.ctx.grid.as_ref();
        let parent_pixel = grid.parent(self.pixel).ok_or_else(|| {
            HcqrError::InvariantViolation(format!("pixel {} has no parent", self.pixel))
        })?;

        let (mut offset, mut record) = (self.offset, self.record);
        while !record.next_is_parent_link() {
            offset = hcqr.sibling_offset(offset, &record)?;
            record = hcqr.tree.record_at(offset)?.0;
        }

        let parent_offset = record.next_node_offset;
        let (parent, len) = hcqr.tree.record_at(parent_offset)?;
        if parent_offset >= self.offset || parent.kind()? != NodeKind::Internal {
            return Err(HcqrError::Format(format!(
                "node at offset {} has invalid parent link {}",
                offset, parent_offset
            )));
        }
        Ok(Some(StaticCursor {
            hcqr,
            offset: parent_offset,
            len,
            pixel: parent_pixel,
            kind: NodeKind::Internal,
            record: parent,
        }))
    }
}

/// Iterates the children of a static node through the sibling chain
pub struct ChildrenIterator<'a> {
    hcqr: &'a StaticHcqr,
    parent_pixel: PixelId,
    parent_offset: u32,
    next: Option<u32>,
}

impl<'a> ChildrenIterator<'a> {
    fn step(&mut self, offset: u32) -> Result<StaticCursor<'a>> {
        let hcqr = self.hcqr;
        let (record, len) = hcqr.tree.record_at(offset)?;
        if record.is_root() {
            return Err(HcqrError::Format(format!("root flag on child at offset {}", offset)));
        }
        let pixel = hcqr
            .ctx
            .grid
            .index(self.parent_pixel, record.child_position)
            .ok_or_else(|| {
                HcqrError::Format(format!(
                    "child position {} out of range below pixel {}",
                    record.child_position, self.parent_pixel
                ))
            })?;

        if record.next_is_parent_link() {
            if record.next_node_offset != self.parent_offset {
                return Err(HcqrError::Format(format!(
                    "node at offset {} links to {} instead of its parent {}",
                    offset, record.next_node_offset, self.parent_offset
                )));
            }
        } else {
            self.next = Some(hcqr.sibling_offset(offset, &record)?);
        }

        Ok(StaticCursor {
            hcqr,
            offset,
            len,
            pixel,
            kind: record.kind()?,
            record,
        })
    }
}

impl<'a> Iterator for ChildrenIterator<'a> {
    type Item = Result<StaticCursor<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.next.take()?;
        Some(self.step(offset))
    }
}

impl<'a> TreeCursor for StaticCursor<'a> {
    type Children = ChildrenIterator<'a>;

    fn pixel_id(&self) -> PixelId {
        self.pixel
    }

    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn children(&self) -> Self::Children {
        let next = match self.kind {
            NodeKind::Internal => Some(self.offset + self.len as u32),
            _ => None,
        };
        ChildrenIterator {
            hcqr: self.hcqr,
            parent_pixel: self.pixel,
            parent_offset: self.offset,
            next,
        }
    }

    fn context(&self) -> &HcqrContext {
        &self.hcqr.ctx
    }

    fn fetched_items(&self, index: u32) -> Result<ItemSet> {
        self.hcqr.fetched(index)
    }
}
