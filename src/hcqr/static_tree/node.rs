//! Node record encoding.
//!
//! Layout of one record, little endian:
//!
//! ```text
//! flags               u8
//! nextNodeOffset      u32      sibling offset, parent offset, or data size for the root
//! childPosition       varint   absent for the root
//! itemIndexId         varint   partial and fetched leaves only
//! paddingLen          u8       only with HAS_PADDING
//! padding             paddingLen zero bytes
//! ```

use crate::error::{HcqrError, Result};
use crate::hcqr::NodeKind;
use crate::utils::{decode_varint, encode_varint, read_u32_at, varint_len};

/// Record flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeFlags(pub u8);

impl NodeFlags {
    pub const INTERNAL: u8 = 0x01;
    pub const PARTIAL_MATCH: u8 = 0x02;
    pub const FULL_MATCH: u8 = 0x04;
    pub const FETCHED: u8 = 0x08;
    pub const HAS_PADDING: u8 = 0x10;
    pub const NEXT_IS_PARENT_LINK: u8 = 0x20;
    pub const IS_ROOT: u8 = 0x40;

    const KIND_MASK: u8 = Self::INTERNAL | Self::PARTIAL_MATCH | Self::FULL_MATCH | Self::FETCHED;

    #[inline]
    pub fn has(&self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    #[inline]
    pub fn set(&mut self, flag: u8) {
        self.0 |= flag;
    }

    #[inline]
    pub fn clear(&mut self, flag: u8) {
        self.0 &= !flag;
    }
}

/// Decoded node record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRecord {
    pub flags: NodeFlags,
    pub next_node_offset: u32,
    pub child_position: u32,
    pub item_index_id: u32,
    /// Number of padding bytes after the length byte
    pub padding: u8,
}

/// Smallest possible record: flags plus the offset field
pub const MIN_RECORD_LEN: usize = 5;

impl NodeRecord {
    pub fn new(kind: NodeKind) -> Self {
        let (flag, item_index_id) = match kind {
            NodeKind::Internal => (NodeFlags::INTERNAL, 0),
            NodeKind::FullMatch => (NodeFlags::FULL_MATCH, 0),
            NodeKind::PartialMatch(idx) => (NodeFlags::PARTIAL_MATCH, idx),
            NodeKind::Fetched(idx) => (NodeFlags::FETCHED, idx),
        };
        Self {
            flags: NodeFlags(flag),
            next_node_offset: 0,
            child_position: 0,
            item_index_id,
            padding: 0,
        }
    }

    /// Node kind; exactly one kind flag must be set
    pub fn kind(&self) -> Result<NodeKind> {
        match self.flags.0 & NodeFlags::KIND_MASK {
            NodeFlags::INTERNAL => Ok(NodeKind::Internal),
            NodeFlags::FULL_MATCH => Ok(NodeKind::FullMatch),
            NodeFlags::PARTIAL_MATCH => Ok(NodeKind::PartialMatch(self.item_index_id)),
            NodeFlags::FETCHED => Ok(NodeKind::Fetched(self.item_index_id)),
            bits => Err(HcqrError::InvariantViolation(format!(
                "node flags {:#04x} do not name exactly one kind",
                bits
            ))),
        }
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.flags.has(NodeFlags::IS_ROOT)
    }

    #[inline]
    pub fn next_is_parent_link(&self) -> bool {
        self.flags.has(NodeFlags::NEXT_IS_PARENT_LINK)
    }

    fn has_item_index(&self) -> bool {
        self.flags.has(NodeFlags::PARTIAL_MATCH) || self.flags.has(NodeFlags::FETCHED)
    }

    /// Encoded size without any padding
    pub fn minimal_len(&self) -> usize {
        let mut len = MIN_RECORD_LEN;
        if !self.is_root() {
            len += varint_len(self.child_position);
        }
        if self.has_item_index() {
            len += varint_len(self.item_index_id);
        }
        len
    }

    /// Encoded size including padding
    pub fn encoded_len(&self) -> usize {
        if self.flags.has(NodeFlags::HAS_PADDING) {
            self.minimal_len() + 1 + self.padding as usize
        } else {
            self.minimal_len()
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.flags.0);
        buf.extend_from_slice(&self.next_node_offset.to_le_bytes());
        if !self.is_root() {
            encode_varint(self.child_position, buf);
        }
        if self.has_item_index() {
            encode_varint(self.item_index_id, buf);
        }
        if self.flags.has(NodeFlags::HAS_PADDING) {
            buf.push(self.padding);
            buf.resize(buf.len() + self.padding as usize, 0);
        }
    }

    /// Decode the record at `offset`, returning it and its encoded length
    pub fn decode(data: &[u8], offset: usize) -> Result<(NodeRecord, usize)> {
        let truncated = || HcqrError::Format(format!("truncated node record at offset {}", offset));

        let flags = NodeFlags(*data.get(offset).ok_or_else(truncated)?);
        let next_node_offset = read_u32_at(data, offset + 1).ok_or_else(truncated)?;
        let mut pos = offset + MIN_RECORD_LEN;

        let mut record = NodeRecord {
            flags,
            next_node_offset,
            child_position: 0,
            item_index_id: 0,
            padding: 0,
        };
        if !record.is_root() {
            let (value, n) = decode_varint(data.get(pos..).ok_or_else(truncated)?).ok_or_else(truncated)?;
            record.child_position = value;
            pos += n;
        }
        if record.has_item_index() {
            let (value, n) = decode_varint(data.get(pos..).ok_or_else(truncated)?).ok_or_else(truncated)?;
            record.item_index_id = value;
            pos += n;
        }
        if flags.has(NodeFlags::HAS_PADDING) {
            record.padding = *data.get(pos).ok_or_else(truncated)?;
            pos += 1 + record.padding as usize;
            if pos > data.len() {
                return Err(truncated());
            }
        }
        Ok((record, pos - offset))
    }
}
