//! Discrete global grids.
//!
//! The HCQR engine only talks to a grid through the [`Grid`] trait (pixel
//! navigation) and to per-pixel item knowledge through [`GridInfo`]. Two
//! backends ship with the crate:
//!
//! - [`QuadGrid`] - a simple lat/lon quad grid
//! - [`HierarchyGrid`] - a grid derived from an explicit region hierarchy
//!
//! Backends are selected by name through an explicit [`GridRegistry`] built by
//! the host application.

pub mod hierarchy;
pub mod quad;

pub use hierarchy::HierarchyGrid;
pub use quad::QuadGrid;

use crate::config::GridConfig;
use crate::error::{HcqrError, Result};
use crate::index::types::ItemSet;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Opaque grid cell identifier
pub type PixelId = u64;

/// Depth of a pixel, root = 0
pub type Level = u32;

/// Geographic bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// The whole globe
    pub fn world() -> Self {
        Self::new(-90.0, -180.0, 90.0, 180.0)
    }

    /// Smallest box containing both
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.min_lat.min(other.min_lat),
            self.min_lon.min(other.min_lon),
            self.max_lat.max(other.max_lat),
            self.max_lon.max(other.max_lon),
        )
    }

    /// Area on a spherical earth in square kilometers
    pub fn area_km2(&self) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0088;
        let lat1 = self.min_lat.to_radians();
        let lat2 = self.max_lat.to_radians();
        let dlon = (self.max_lon - self.min_lon).to_radians();
        (EARTH_RADIUS_KM * EARTH_RADIUS_KM * dlon * (lat2.sin() - lat1.sin())).abs()
    }
}

/// Pixel navigation over a discrete global grid.
///
/// Children of a pixel are enumerated by child number `0..children_count`,
/// and their pixel ids must ascend with the child number. The tree
/// representations rely on this to keep children sorted by pixel id.
pub trait Grid: Send + Sync {
    /// Backend name, as registered in a [`GridRegistry`]
    fn name(&self) -> &str;

    /// The sentinel pixel covering the whole grid
    fn root_pixel_id(&self) -> PixelId;

    fn level(&self, pixel: PixelId) -> Level;

    /// Parent pixel, `None` for the root
    fn parent(&self, pixel: PixelId) -> Option<PixelId>;

    /// Child number of `child` below `parent`, `None` if `child` is not a
    /// direct child of `parent`
    fn child_position(&self, parent: PixelId, child: PixelId) -> Option<u32>;

    fn children_count(&self, pixel: PixelId) -> u32;

    /// The `child_num`-th child of `parent`
    fn index(&self, parent: PixelId, child_num: u32) -> Option<PixelId>;

    /// Whether `ancestor` is a strict ancestor of `descendant`
    fn is_ancestor(&self, ancestor: PixelId, descendant: PixelId) -> bool {
        let mut current = descendant;
        while let Some(parent) = self.parent(current) {
            if parent == ancestor {
                return true;
            }
            current = parent;
        }
        false
    }

    fn area(&self, pixel: PixelId) -> f64;

    fn bbox(&self, pixel: PixelId) -> BoundingBox;
}

/// Deepest pixel that is an ancestor-or-self of both `a` and `b`
pub fn common_ancestor(grid: &dyn Grid, a: PixelId, b: PixelId) -> PixelId {
    let (mut a, mut b) = (a, b);
    while grid.level(a) > grid.level(b) {
        match grid.parent(a) {
            Some(p) => a = p,
            None => break,
        }
    }
    while grid.level(b) > grid.level(a) {
        match grid.parent(b) {
            Some(p) => b = p,
            None => break,
        }
    }
    while a != b {
        match (grid.parent(a), grid.parent(b)) {
            (Some(pa), Some(pb)) => {
                a = pa;
                b = pb;
            }
            _ => return grid.root_pixel_id(),
        }
    }
    a
}

/// Chain of pixels from the root down to `pixel`, both included
pub fn path_from_root(grid: &dyn Grid, pixel: PixelId) -> Vec<PixelId> {
    let mut path = vec![pixel];
    let mut current = pixel;
    while let Some(parent) = grid.parent(current) {
        path.push(parent);
        current = parent;
    }
    path.reverse();
    path
}

/// Per-pixel "full match" item knowledge
pub trait GridInfo: Send + Sync {
    /// All items located (at least partially) in `pixel`
    fn items(&self, pixel: PixelId) -> ItemSet;

    fn item_count(&self, pixel: PixelId) -> u64 {
        self.items(pixel).len()
    }
}

/// Precomputed [`GridInfo`]: items are given for some pixels and every
/// ancestor aggregates the union of its descendants.
pub struct MapGridInfo {
    items: FxHashMap<PixelId, ItemSet>,
}

impl MapGridInfo {
    pub fn new(grid: &dyn Grid, pixels: impl IntoIterator<Item = (PixelId, ItemSet)>) -> Self {
        let mut items: FxHashMap<PixelId, ItemSet> = FxHashMap::default();
        for (pixel, set) in pixels {
            let mut current = Some(pixel);
            while let Some(p) = current {
                *items.entry(p).or_default() |= &set;
                current = grid.parent(p);
            }
        }
        Self { items }
    }
}

impl GridInfo for MapGridInfo {
    fn items(&self, pixel: PixelId) -> ItemSet {
        self.items.get(&pixel).cloned().unwrap_or_default()
    }

    fn item_count(&self, pixel: PixelId) -> u64 {
        self.items.get(&pixel).map(|s| s.len()).unwrap_or(0)
    }
}

/// Builds a grid from configuration
pub type GridFactory = Box<dyn Fn(&GridConfig) -> Result<Arc<dyn Grid>> + Send + Sync>;

/// Name -> factory map of grid backends, assembled by the host at startup
#[derive(Default)]
pub struct GridRegistry {
    factories: BTreeMap<String, GridFactory>,
}

impl GridRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in configurable backends
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            QuadGrid::NAME,
            Box::new(|config: &GridConfig| {
                Ok(Arc::new(QuadGrid::new(config.max_level)?) as Arc<dyn Grid>)
            }),
        );
        registry
    }

    /// Register (or replace) a backend
    pub fn register(&mut self, name: &str, factory: GridFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn create(&self, config: &GridConfig) -> Result<Arc<dyn Grid>> {
        let factory = self
            .factories
            .get(&config.kind)
            .ok_or_else(|| HcqrError::UnknownGrid(config.kind.clone()))?;
        factory(config)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}
