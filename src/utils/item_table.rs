//! Serialized table of item sets.
//!
//! ```text
//! u32        count
//! u64[count] end offset of each blob, relative to the blob area
//! ...        portable roaring blobs, back to back
//! ```

use crate::error::{HcqrError, Result};
use crate::index::types::ItemSet;
use crate::utils::encoding::{read_u32_at, read_u64_at, write_u32_le, write_u64_le};
use std::io::Write;

/// Write `sets` as an item-set table. Returns the number of bytes written.
pub fn write_item_sets<W: Write>(writer: &mut W, sets: &[ItemSet]) -> Result<usize> {
    let count = u32::try_from(sets.len())
        .map_err(|_| HcqrError::Format(format!("too many item sets: {}", sets.len())))?;
    write_u32_le(writer, count)?;

    let mut end = 0u64;
    for set in sets {
        end += set.serialized_size() as u64;
        write_u64_le(writer, end)?;
    }
    for set in sets {
        set.serialize_into(&mut *writer)?;
    }

    Ok(4 + 8 * sets.len() + end as usize)
}

/// Zero-copy view over an item-set table
#[derive(Debug, Clone, Copy)]
pub struct ItemSetTable<'a> {
    data: &'a [u8],
    count: usize,
}

impl<'a> ItemSetTable<'a> {
    /// Parse the table header at the start of `data`. Trailing bytes after
    /// the table are allowed; see [`ItemSetTable::byte_len`].
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let count = read_u32_at(data, 0)
            .ok_or_else(|| HcqrError::Format("item table header truncated".to_string()))?
            as usize;

        let header_len = 4usize
            .checked_add(count.checked_mul(8).ok_or_else(overflow)?)
            .ok_or_else(overflow)?;
        if header_len > data.len() {
            return Err(HcqrError::Format(format!(
                "item table claims {} entries but holds {} bytes",
                count,
                data.len()
            )));
        }

        let table = Self { data, count };
        if table.byte_len()? > data.len() {
            return Err(HcqrError::Format("item table blobs truncated".to_string()));
        }
        Ok(table)
    }

    /// Number of item sets in the table
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Total encoded size of the table, header included
    pub fn byte_len(&self) -> Result<usize> {
        let blobs = if self.count == 0 {
            0
        } else {
            self.end_offset(self.count - 1)?
        };
        Ok(self.blob_start() + blobs)
    }

    /// Decode the item set at `index`
    pub fn get(&self, index: usize) -> Result<ItemSet> {
        if index >= self.count {
            return Err(HcqrError::Format(format!(
                "item set {} out of range ({} entries)",
                index, self.count
            )));
        }
        let start = if index == 0 {
            0
        } else {
            self.end_offset(index - 1)?
        };
        let end = self.end_offset(index)?;
        if start > end {
            return Err(HcqrError::Format(format!("item set {} has negative length", index)));
        }

        let base = self.blob_start();
        let blob = self
            .data
            .get(base + start..base + end)
            .ok_or_else(|| HcqrError::Format(format!("item set {} truncated", index)))?;
        ItemSet::deserialize_from(blob)
            .map_err(|e| HcqrError::Format(format!("item set {}: {}", index, e)))
    }

    fn blob_start(&self) -> usize {
        4 + 8 * self.count
    }

    fn end_offset(&self, index: usize) -> Result<usize> {
        let raw = read_u64_at(self.data, 4 + 8 * index)
            .ok_or_else(|| HcqrError::Format("item table offsets truncated".to_string()))?;
        usize::try_from(raw).map_err(|_| overflow())
    }
}

fn overflow() -> HcqrError {
    HcqrError::Format("item table size overflows".to_string())
}
