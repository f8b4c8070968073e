//! Shared stores of item sets referenced by partial-match leaves.

use crate::error::{HcqrError, Result};
use crate::index::types::ItemSet;
use crate::utils::{ItemSetTable, write_item_sets};
use memmap2::Mmap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Read-only store of item sets addressed by item index id
pub trait ItemIndexStore: Send + Sync {
    /// The item set stored under `id`
    fn at(&self, id: u32) -> Result<ItemSet>;

    /// Number of stored sets
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn item_count(&self, id: u32) -> Result<u64> {
        Ok(self.at(id)?.len())
    }
}

/// Item sets held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryItemStore {
    sets: Vec<ItemSet>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a set, returning its id
    pub fn push(&mut self, items: ItemSet) -> u32 {
        self.sets.push(items);
        (self.sets.len() - 1) as u32
    }

    pub fn sets(&self) -> &[ItemSet] {
        &self.sets
    }

    /// Persist as an item-set table readable by [`MappedItemStore`]
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        write_item_sets(&mut writer, &self.sets)?;
        std::io::Write::flush(&mut writer)?;
        Ok(())
    }
}

impl From<Vec<ItemSet>> for MemoryItemStore {
    fn from(sets: Vec<ItemSet>) -> Self {
        Self { sets }
    }
}

impl ItemIndexStore for MemoryItemStore {
    fn at(&self, id: u32) -> Result<ItemSet> {
        self.sets
            .get(id as usize)
            .cloned()
            .ok_or_else(|| out_of_range(id, self.sets.len()))
    }

    fn len(&self) -> usize {
        self.sets.len()
    }

    fn item_count(&self, id: u32) -> Result<u64> {
        self.sets
            .get(id as usize)
            .map(|s| s.len())
            .ok_or_else(|| out_of_range(id, self.sets.len()))
    }
}

/// Item-set table read in place from a memory-mapped file
pub struct MappedItemStore {
    mmap: Mmap,
    count: usize,
}

impl MappedItemStore {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the table is treated as immutable for the lifetime of the map
        let mmap = unsafe { Mmap::map(&file)? };
        let count = ItemSetTable::parse(&mmap)?.len();
        Ok(Self { mmap, count })
    }
}

impl ItemIndexStore for MappedItemStore {
    fn at(&self, id: u32) -> Result<ItemSet> {
        if id as usize >= self.count {
            return Err(out_of_range(id, self.count));
        }
        ItemSetTable::parse(&self.mmap)?.get(id as usize)
    }

    fn len(&self) -> usize {
        self.count
    }
}

fn out_of_range(id: u32, len: usize) -> HcqrError {
    HcqrError::Format(format!("item index {} out of range ({} sets)", id, len))
}
