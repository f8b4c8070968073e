use super::node::NodeRecord;
use crate::error::{HcqrError, Result};
use crate::utils::read_u32_at;
use std::sync::Arc;

/// Byte buffer shared between trees and side tables (owned or mapped)
pub(crate) type SharedBytes = Arc<dyn AsRef<[u8]> + Send + Sync>;

/// Encoded node records behind a `u32` data size header.
///
/// Offsets inside records are relative to the first record.
#[derive(Clone)]
pub struct StaticTree {
    bytes: SharedBytes,
    /// Position of the data size header within `bytes`
    start: usize,
    data_len: usize,
}

impl StaticTree {
    /// Wrap raw record data
    pub fn from_data(data: Vec<u8>) -> Self {
        let mut bytes = Vec::with_capacity(4 + data.len());
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&data);
        Self {
            data_len: data.len(),
            bytes: Arc::new(bytes),
            start: 0,
        }
    }

    /// Read the container that starts at `start` within `bytes`
    pub(crate) fn from_shared(bytes: SharedBytes, start: usize) -> Result<Self> {
        let raw = (*bytes).as_ref();
        let data_len = read_u32_at(raw, start)
            .ok_or_else(|| HcqrError::Format("static tree header truncated".to_string()))?
            as usize;
        if start + 4 + data_len > raw.len() {
            return Err(HcqrError::Format(format!(
                "static tree claims {} bytes but only {} are present",
                data_len,
                raw.len() - start - 4
            )));
        }
        Ok(Self {
            bytes,
            start,
            data_len,
        })
    }

    /// Parse a standalone container
    pub fn from_container(container: Vec<u8>) -> Result<Self> {
        Self::from_shared(Arc::new(container), 0)
    }

    /// The node records
    pub fn data(&self) -> &[u8] {
        let raw = (*self.bytes).as_ref();
        &raw[self.start + 4..self.start + 4 + self.data_len]
    }

    /// Header plus node records, as persisted
    pub fn container(&self) -> &[u8] {
        let raw = (*self.bytes).as_ref();
        &raw[self.start..self.start + 4 + self.data_len]
    }

    pub fn data_len(&self) -> usize {
        self.data_len
    }

    pub fn is_empty(&self) -> bool {
        self.data_len == 0
    }

    pub(crate) fn shared_bytes(&self) -> &SharedBytes {
        &self.bytes
    }

    /// Decode the record at `offset`
    pub fn record_at(&self, offset: u32) -> Result<(NodeRecord, usize)> {
        let data = self.data();
        if offset as usize >= data.len() {
            return Err(HcqrError::Format(format!(
                "node offset {} outside tree of {} bytes",
                offset,
                data.len()
            )));
        }
        NodeRecord::decode(data, offset as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_round_trip() {
        let tree = StaticTree::from_data(vec![0x44, 5, 0, 0, 0]);
        assert_eq!(tree.container(), &[5, 0, 0, 0, 0x44, 5, 0, 0, 0]);
        let parsed = StaticTree::from_container(tree.container().to_vec()).unwrap();
        assert_eq!(parsed.data(), tree.data());
        assert!(!parsed.is_empty());
    }

    #[test]
    fn test_rejects_short_container() {
        assert!(StaticTree::from_container(vec![9, 0, 0, 0, 1]).is_err());
        assert!(StaticTree::from_container(vec![1, 0]).is_err());
        assert!(StaticTree::from_container(vec![0, 0, 0, 0]).unwrap().is_empty());
    }

    #[test]
    fn test_record_at_bounds() {
        let tree = StaticTree::from_data(vec![0x44, 5, 0, 0, 0]);
        assert!(tree.record_at(0).is_ok());
        assert!(tree.record_at(5).is_err());
    }
}
