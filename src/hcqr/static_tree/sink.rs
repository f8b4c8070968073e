use super::builder::{NodeHandle, StaticTreeBuilder};
use super::node::{NodeFlags, NodeRecord};
use super::StaticHcqr;
use crate::error::{HcqrError, Result};
use crate::grid::PixelId;
use crate::hcqr::{HcqrContext, LeafValue, NodeKind, TreeSink};
use crate::index::types::ItemSet;

struct Frame {
    pixel: PixelId,
    handle: NodeHandle,
    /// Most recently pushed child, whose `next` is still to be fixed up
    last_child: Option<NodeHandle>,
    /// The parent's `last_child` before this node was pushed
    previous_sibling: Option<NodeHandle>,
    children: usize,
}

/// Encodes a pre-order node stream straight into a [`StaticHcqr`].
///
/// Sibling links are patched as soon as the next sibling is pushed; the last
/// child gets its parent link when the parent closes. A node closed without
/// children is truncated away again.
pub struct StaticSink {
    ctx: HcqrContext,
    builder: StaticTreeBuilder,
    fetched: Vec<ItemSet>,
    frames: Vec<Frame>,
    root_pixel: Option<PixelId>,
}

impl StaticSink {
    pub fn new(ctx: HcqrContext) -> Self {
        Self {
            ctx,
            builder: StaticTreeBuilder::new(),
            fetched: Vec::new(),
            frames: Vec::new(),
            root_pixel: None,
        }
    }

    fn push(&mut self, pixel: PixelId, mut record: NodeRecord) -> Result<NodeHandle> {
        let Some(parent) = self.frames.last() else {
            if self.root_pixel.is_some() {
                return Err(HcqrError::InvariantViolation(format!("second root {} emitted", pixel)));
            }
            record.flags.set(NodeFlags::IS_ROOT);
            let handle = self.builder.push(pixel, &record)?;
            self.root_pixel = Some(pixel);
            return Ok(handle);
        };

        let parent_pixel = parent.pixel;
        record.child_position = self
            .ctx
            .grid
            .child_position(parent_pixel, pixel)
            .ok_or_else(|| {
                HcqrError::InvariantViolation(format!("pixel {} is not a child of {}", pixel, parent_pixel))
            })?;
        let previous = parent.last_child;

        let handle = self.builder.push(parent_pixel, &record)?;
        if let Some(previous) = previous {
            let mut sibling = self.builder.node(previous)?;
            sibling.next_node_offset = handle.offset;
            self.builder.update(previous, &sibling)?;
        }
        if let Some(parent) = self.frames.last_mut() {
            parent.last_child = Some(handle);
            parent.children += 1;
        }
        Ok(handle)
    }

    /// Point `handle`'s `next` at `target`, optionally as a parent link
    fn link(&mut self, handle: NodeHandle, target: u32, parent_link: bool) -> Result<()> {
        let mut record = self.builder.node(handle)?;
        record.next_node_offset = target;
        if parent_link {
            record.flags.set(NodeFlags::NEXT_IS_PARENT_LINK);
        }
        self.builder.update(handle, &record)
    }

    fn data_len(&self) -> Result<u32> {
        u32::try_from(self.builder.len()).map_err(|_| HcqrError::Format("static tree exceeds 4 GiB".to_string()))
    }
}

impl TreeSink for StaticSink {
    type Output = StaticHcqr;

    fn open(&mut self, pixel: PixelId) -> Result<()> {
        let previous_sibling = self.frames.last().and_then(|f| f.last_child);
        let handle = self.push(pixel, NodeRecord::new(NodeKind::Internal))?;
        self.frames.push(Frame {
            pixel,
            handle,
            last_child: None,
            previous_sibling,
            children: 0,
        });
        Ok(())
    }

    fn close(&mut self) -> Result<bool> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| HcqrError::InvariantViolation("close without open".to_string()))?;

        let Some(last) = frame.last_child else {
            self.builder.pop(frame.handle);
            match self.frames.last_mut() {
                Some(parent) => {
                    parent.last_child = frame.previous_sibling;
                    parent.children -= 1;
                }
                None => self.root_pixel = None,
            }
            return Ok(false);
        };

        self.link(last, frame.handle.offset, true)?;
        if self.frames.is_empty() {
            let end = self.data_len()?;
            self.link(frame.handle, end, false)?;
        }
        Ok(true)
    }

    fn leaf(&mut self, pixel: PixelId, value: LeafValue) -> Result<()> {
        let kind = match value {
            LeafValue::FullMatch => NodeKind::FullMatch,
            LeafValue::PartialMatch(idx) => NodeKind::PartialMatch(idx),
            LeafValue::Fetched(items) => {
                self.fetched.push(items);
                NodeKind::Fetched((self.fetched.len() - 1) as u32)
            }
        };
        let handle = self.push(pixel, NodeRecord::new(kind))?;
        if self.frames.is_empty() {
            let end = self.data_len()?;
            self.link(handle, end, false)?;
        }
        Ok(())
    }

    fn finish(self) -> Result<StaticHcqr> {
        if !self.frames.is_empty() {
            return Err(HcqrError::InvariantViolation(format!(
                "{} nodes left open",
                self.frames.len()
            )));
        }
        let root_pixel = self
            .root_pixel
            .unwrap_or_else(|| self.ctx.grid.root_pixel_id());
        Ok(StaticHcqr::new(self.ctx, root_pixel, self.builder.finish(), self.fetched))
    }
}
