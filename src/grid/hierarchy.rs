//! Grid derived from an explicit region hierarchy.
//!
//! Every pixel names its parent; levels follow from the distance to the root.
//! Children are kept sorted by pixel id, which is also their child number
//! order. Pixels may have any number of children, so coverage is irregular.

use super::{BoundingBox, Grid, Level, PixelId};
use crate::error::{HcqrError, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Serialized form of one pixel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelSpec {
    pub id: PixelId,
    pub parent: PixelId,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
}

/// Serialized form of a whole hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchySpec {
    pub root: PixelId,
    pub pixels: Vec<PixelSpec>,
}

#[derive(Debug, Clone)]
struct HierarchyNode {
    parent: Option<PixelId>,
    level: Level,
    children: Vec<PixelId>,
    bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone)]
pub struct HierarchyGrid {
    root: PixelId,
    nodes: FxHashMap<PixelId, HierarchyNode>,
}

impl HierarchyGrid {
    pub const NAME: &'static str = "hierarchy";

    /// Build from `(pixel, parent)` pairs
    pub fn new(root: PixelId, edges: impl IntoIterator<Item = (PixelId, PixelId)>) -> Result<Self> {
        let pixels = edges
            .into_iter()
            .map(|(id, parent)| PixelSpec {
                id,
                parent,
                bbox: None,
            })
            .collect();
        Self::from_spec(&HierarchySpec { root, pixels })
    }

    pub fn from_spec(spec: &HierarchySpec) -> Result<Self> {
        let mut nodes: FxHashMap<PixelId, HierarchyNode> = FxHashMap::default();
        nodes.insert(
            spec.root,
            HierarchyNode {
                parent: None,
                level: 0,
                children: Vec::new(),
                bbox: None,
            },
        );

        for pixel in &spec.pixels {
            if pixel.id == spec.root {
                if let Some(root) = nodes.get_mut(&spec.root) {
                    root.bbox = pixel.bbox;
                }
                continue;
            }
            if nodes.contains_key(&pixel.id) {
                return Err(HcqrError::Config(format!("pixel {} defined twice", pixel.id)));
            }
            nodes.insert(
                pixel.id,
                HierarchyNode {
                    parent: Some(pixel.parent),
                    level: 0,
                    children: Vec::new(),
                    bbox: pixel.bbox,
                },
            );
        }

        for pixel in &spec.pixels {
            if pixel.id == spec.root {
                continue;
            }
            match nodes.get_mut(&pixel.parent) {
                Some(parent) => parent.children.push(pixel.id),
                None => {
                    return Err(HcqrError::Config(format!(
                        "pixel {} has unknown parent {}",
                        pixel.id, pixel.parent
                    )));
                }
            }
        }
        for node in nodes.values_mut() {
            node.children.sort_unstable();
        }

        // Assign levels breadth-first; anything unreachable sits on a cycle.
        let mut queue = VecDeque::from([(spec.root, 0)]);
        let mut reached = 0usize;
        while let Some((pixel, level)) = queue.pop_front() {
            reached += 1;
            let children = match nodes.get_mut(&pixel) {
                Some(node) => {
                    node.level = level;
                    node.children.clone()
                }
                None => continue,
            };
            queue.extend(children.into_iter().map(|c| (c, level + 1)));
        }
        if reached != nodes.len() {
            return Err(HcqrError::Config(format!(
                "{} pixels are not reachable from root {}",
                nodes.len() - reached,
                spec.root
            )));
        }

        Ok(Self {
            root: spec.root,
            nodes,
        })
    }

    /// Number of pixels, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, pixel: PixelId) -> bool {
        self.nodes.contains_key(&pixel)
    }
}

impl Grid for HierarchyGrid {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn root_pixel_id(&self) -> PixelId {
        self.root
    }

    fn level(&self, pixel: PixelId) -> Level {
        self.nodes.get(&pixel).map(|n| n.level).unwrap_or(0)
    }

    fn parent(&self, pixel: PixelId) -> Option<PixelId> {
        self.nodes.get(&pixel).and_then(|n| n.parent)
    }

    fn child_position(&self, parent: PixelId, child: PixelId) -> Option<u32> {
        let node = self.nodes.get(&parent)?;
        node.children.binary_search(&child).ok().map(|i| i as u32)
    }

    fn children_count(&self, pixel: PixelId) -> u32 {
        self.nodes
            .get(&pixel)
            .map(|n| n.children.len() as u32)
            .unwrap_or(0)
    }

    fn index(&self, parent: PixelId, child_num: u32) -> Option<PixelId> {
        self.nodes
            .get(&parent)?
            .children
            .get(child_num as usize)
            .copied()
    }

    fn area(&self, pixel: PixelId) -> f64 {
        self.bbox(pixel).area_km2()
    }

    fn bbox(&self, pixel: PixelId) -> BoundingBox {
        let Some(node) = self.nodes.get(&pixel) else {
            return BoundingBox::world();
        };
        if let Some(bbox) = node.bbox {
            return bbox;
        }
        node.children
            .iter()
            .map(|&c| self.bbox(c))
            .reduce(|a, b| a.union(&b))
            .unwrap_or_else(BoundingBox::world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HierarchyGrid {
        // 0 -> {10, 20, 30, 40}, 10 -> {11, 12}
        HierarchyGrid::new(0, vec![(20, 0), (10, 0), (40, 0), (30, 0), (12, 10), (11, 10)]).unwrap()
    }

    #[test]
    fn test_levels_and_children() {
        let grid = sample();
        assert_eq!(grid.len(), 7);
        assert_eq!(grid.level(0), 0);
        assert_eq!(grid.level(10), 1);
        assert_eq!(grid.level(12), 2);
        assert_eq!(grid.children_count(0), 4);
        assert_eq!(grid.index(0, 0), Some(10));
        assert_eq!(grid.index(0, 3), Some(40));
        assert_eq!(grid.child_position(10, 12), Some(1));
        assert_eq!(grid.child_position(20, 12), None);
        assert_eq!(grid.children_count(20), 0);
        assert!(grid.is_ancestor(0, 11));
        assert!(grid.is_ancestor(10, 11));
        assert!(!grid.is_ancestor(20, 11));
    }

    #[test]
    fn test_rejects_unknown_parent() {
        assert!(HierarchyGrid::new(0, vec![(1, 7)]).is_err());
    }

    #[test]
    fn test_rejects_cycles() {
        assert!(HierarchyGrid::new(0, vec![(1, 2), (2, 1)]).is_err());
    }

    #[test]
    fn test_bbox_from_children() {
        let spec = HierarchySpec {
            root: 0,
            pixels: vec![
                PixelSpec {
                    id: 1,
                    parent: 0,
                    bbox: Some(BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
                },
                PixelSpec {
                    id: 2,
                    parent: 0,
                    bbox: Some(BoundingBox::new(-5.0, 5.0, 1.0, 20.0)),
                },
            ],
        };
        let grid = HierarchyGrid::from_spec(&spec).unwrap();
        assert_eq!(grid.bbox(0), BoundingBox::new(-5.0, 0.0, 10.0, 20.0));
    }
}
