#![no_main]

use hcqr::grid::{MapGridInfo, QuadGrid};
use hcqr::hcqr::{Hcqr, HcqrContext, StaticHcqr};
use hcqr::index::MemoryItemStore;
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let grid = QuadGrid::new(8).unwrap();
    let info = MapGridInfo::new(&grid, std::iter::empty());
    let ctx = HcqrContext::new(Arc::new(grid), Arc::new(info), Arc::new(MemoryItemStore::new()));

    // Garbled input must fail with an error, never panic or loop
    if let Ok(tree) = StaticHcqr::from_bytes(data.to_vec(), ctx) {
        let tree = Hcqr::Static(tree);
        let _ = tree.validate();
        let _ = tree.items();
        let _ = tree.number_of_nodes();
        let _ = tree.to_memory();
    }
});
