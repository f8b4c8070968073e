//! # HCQR - Hierarchical Compressed Query Results
//!
//! Spatial-textual search results ("items matching text X inside region Y")
//! represented as trees over a discrete global grid. Each node is a full
//! match (every item of the pixel matches), a partial match (an explicit
//! item set) or an internal node subdividing its pixel.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`grid`] - Pixel navigation and per-pixel item lookup
//! - [`hcqr`] - The result trees: in-memory and compact binary forms, set
//!   algebra, compaction and expansion
//! - [`index`] - Cell indexes and the HCQR index decorator stack
//! - [`query`] - Query parsing and evaluation
//! - [`config`] - Index configuration
//! - [`utils`] - Varint encoding, item-set tables, bounded TinyLFU cache
//!
//! ## Quick Start
//!
//! ```ignore
//! use hcqr::config::IndexConfig;
//! use hcqr::grid::GridRegistry;
//! use hcqr::index::{build_index, CellIndexSpec, MemoryCellIndex};
//! use hcqr::query::{parse_query, QueryEvaluator};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let spec = CellIndexSpec::load(Path::new("cells.json")).unwrap();
//! let cells = MemoryCellIndex::from_spec(&spec, &GridRegistry::with_defaults()).unwrap();
//! let index = build_index(&IndexConfig::default(), Arc::new(cells)).unwrap();
//!
//! let result = QueryEvaluator::new(index.as_ref())
//!     .evaluate(&parse_query("mill - pond"))
//!     .unwrap();
//! println!("{} items in {} nodes", result.number_of_items().unwrap(), result.number_of_nodes().unwrap());
//! ```

pub mod config;
pub mod error;
pub mod grid;
pub mod hcqr;
pub mod index;
pub mod query;
pub mod utils;

pub use error::{HcqrError, Result};
