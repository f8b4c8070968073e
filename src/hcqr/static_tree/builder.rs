use super::node::NodeRecord;
use super::tree::StaticTree;
use crate::error::{HcqrError, Result};
use crate::grid::PixelId;

/// Position of a pushed record, used for later in-place updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle {
    /// Pixel of the parent node (the node's own pixel for the root)
    pub parent_pixel: PixelId,
    pub offset: u32,
}

/// Append-only writer of node records.
///
/// Records keep the size they were pushed with. An update that encodes
/// shorter is filled up with padding; one that encodes longer fails with
/// [`HcqrError::Overflow`]. The offset field is fixed width, so link fixups
/// always fit.
#[derive(Debug, Default)]
pub struct StaticTreeBuilder {
    data: Vec<u8>,
}

impl StaticTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn push(&mut self, parent_pixel: PixelId, record: &NodeRecord) -> Result<NodeHandle> {
        let offset = u32::try_from(self.data.len())
            .map_err(|_| HcqrError::Format("static tree exceeds 4 GiB".to_string()))?;
        record.encode(&mut self.data);
        Ok(NodeHandle { parent_pixel, offset })
    }

    /// Decode the record behind `handle`
    pub fn node(&self, handle: NodeHandle) -> Result<NodeRecord> {
        Ok(NodeRecord::decode(&self.data, handle.offset as usize)?.0)
    }

    /// Re-encode the record behind `handle` in place
    pub fn update(&mut self, handle: NodeHandle, record: &NodeRecord) -> Result<()> {
        let offset = handle.offset as usize;
        let (_, reserved) = NodeRecord::decode(&self.data, offset)?;

        let mut record = *record;
        record.flags.clear(super::NodeFlags::HAS_PADDING);
        record.padding = 0;
        let required = record.minimal_len();
        let overflow = || HcqrError::Overflow {
            offset: handle.offset,
            required,
            reserved,
        };

        if required > reserved {
            return Err(overflow());
        }
        if required < reserved {
            let padding = u8::try_from(reserved - required - 1).map_err(|_| overflow())?;
            record.flags.set(super::NodeFlags::HAS_PADDING);
            record.padding = padding;
        }

        let mut encoded = Vec::with_capacity(reserved);
        record.encode(&mut encoded);
        debug_assert_eq!(encoded.len(), reserved);
        self.data[offset..offset + reserved].copy_from_slice(&encoded);
        Ok(())
    }

    /// Drop the record behind `handle` and everything written after it
    pub fn pop(&mut self, handle: NodeHandle) {
        self.data.truncate(handle.offset as usize);
    }

    pub fn finish(self) -> StaticTree {
        StaticTree::from_data(self.data)
    }
}
