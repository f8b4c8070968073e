//! Utility functions and data structures.
//!
//! ## Modules
//!
//! - [`encoding`] - Variable-length integer encoding (varint) and fixed-width helpers
//! - [`item_table`] - Serialized tables of item sets (roaring blobs)
//! - [`cache`] - Bounded concurrent cache (moka) with hit/miss counters

pub mod cache;
pub mod encoding;
pub mod item_table;

pub use cache::*;
pub use encoding::*;
pub use item_table::*;
