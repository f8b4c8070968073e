//! Simple lat/lon quad grid.
//!
//! Pixel ids use a sentinel-bit encoding: the root is `1` and child `i` of
//! pixel `p` is `p << 2 | i`. Child bit 0 selects the eastern half, bit 1 the
//! northern half. Ids of siblings therefore ascend with the child number.

use super::{BoundingBox, Grid, Level, PixelId};
use crate::error::{HcqrError, Result};

/// Deepest level representable with 64-bit ids
pub const MAX_QUAD_LEVEL: Level = 31;

#[derive(Debug, Clone)]
pub struct QuadGrid {
    max_level: Level,
}

impl QuadGrid {
    pub const NAME: &'static str = "quad";
    const ROOT: PixelId = 1;

    pub fn new(max_level: Level) -> Result<Self> {
        if max_level > MAX_QUAD_LEVEL {
            return Err(HcqrError::Config(format!(
                "quad grid supports at most {} levels, got {}",
                MAX_QUAD_LEVEL, max_level
            )));
        }
        Ok(Self { max_level })
    }

    pub fn max_level(&self) -> Level {
        self.max_level
    }

    /// Pixel containing the given coordinate at `level`
    pub fn pixel_at(&self, lat: f64, lon: f64, level: Level) -> PixelId {
        let level = level.min(self.max_level);
        let mut bbox = BoundingBox::world();
        let mut pixel = Self::ROOT;
        for _ in 0..level {
            let mid_lat = (bbox.min_lat + bbox.max_lat) / 2.0;
            let mid_lon = (bbox.min_lon + bbox.max_lon) / 2.0;
            let mut child = 0;
            if lon >= mid_lon {
                child |= 1;
                bbox.min_lon = mid_lon;
            } else {
                bbox.max_lon = mid_lon;
            }
            if lat >= mid_lat {
                child |= 2;
                bbox.min_lat = mid_lat;
            } else {
                bbox.max_lat = mid_lat;
            }
            pixel = (pixel << 2) | child;
        }
        pixel
    }

    #[inline]
    fn raw_level(pixel: PixelId) -> Level {
        if pixel == 0 {
            return 0;
        }
        (63 - pixel.leading_zeros()) / 2
    }
}

impl Grid for QuadGrid {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn root_pixel_id(&self) -> PixelId {
        Self::ROOT
    }

    fn level(&self, pixel: PixelId) -> Level {
        Self::raw_level(pixel)
    }

    fn parent(&self, pixel: PixelId) -> Option<PixelId> {
        if pixel <= Self::ROOT {
            None
        } else {
            Some(pixel >> 2)
        }
    }

    fn child_position(&self, parent: PixelId, child: PixelId) -> Option<u32> {
        if child > Self::ROOT && child >> 2 == parent && Self::raw_level(child) <= self.max_level {
            Some((child & 3) as u32)
        } else {
            None
        }
    }

    fn children_count(&self, pixel: PixelId) -> u32 {
        if pixel != 0 && Self::raw_level(pixel) < self.max_level {
            4
        } else {
            0
        }
    }

    fn index(&self, parent: PixelId, child_num: u32) -> Option<PixelId> {
        if child_num < self.children_count(parent) {
            Some((parent << 2) | child_num as PixelId)
        } else {
            None
        }
    }

    fn is_ancestor(&self, ancestor: PixelId, descendant: PixelId) -> bool {
        let (la, ld) = (Self::raw_level(ancestor), Self::raw_level(descendant));
        ancestor != 0 && la < ld && descendant >> (2 * (ld - la)) == ancestor
    }

    fn area(&self, pixel: PixelId) -> f64 {
        self.bbox(pixel).area_km2()
    }

    fn bbox(&self, pixel: PixelId) -> BoundingBox {
        let mut bbox = BoundingBox::world();
        let level = Self::raw_level(pixel);
        for depth in (0..level).rev() {
            let child = (pixel >> (2 * depth)) & 3;
            let mid_lat = (bbox.min_lat + bbox.max_lat) / 2.0;
            let mid_lon = (bbox.min_lon + bbox.max_lon) / 2.0;
            if child & 1 != 0 {
                bbox.min_lon = mid_lon;
            } else {
                bbox.max_lon = mid_lon;
            }
            if child & 2 != 0 {
                bbox.min_lat = mid_lat;
            } else {
                bbox.max_lat = mid_lat;
            }
        }
        bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation() {
        let grid = QuadGrid::new(2).unwrap();
        let root = grid.root_pixel_id();
        assert_eq!(grid.level(root), 0);
        assert_eq!(grid.children_count(root), 4);

        let children: Vec<_> = (0..4).map(|i| grid.index(root, i).unwrap()).collect();
        assert!(children.windows(2).all(|w| w[0] < w[1]));
        for (i, &c) in children.iter().enumerate() {
            assert_eq!(grid.level(c), 1);
            assert_eq!(grid.parent(c), Some(root));
            assert_eq!(grid.child_position(root, c), Some(i as u32));
        }

        let leaf = grid.index(children[3], 2).unwrap();
        assert_eq!(grid.level(leaf), 2);
        assert_eq!(grid.children_count(leaf), 0);
        assert_eq!(grid.index(leaf, 0), None);
        assert!(grid.is_ancestor(root, leaf));
        assert!(grid.is_ancestor(children[3], leaf));
        assert!(!grid.is_ancestor(children[2], leaf));
        assert!(!grid.is_ancestor(leaf, leaf));
        assert_eq!(grid.parent(root), None);
    }

    #[test]
    fn test_pixel_at_matches_bbox() {
        let grid = QuadGrid::new(8).unwrap();
        let pixel = grid.pixel_at(48.137, 11.575, 8);
        let bbox = grid.bbox(pixel);
        assert!(bbox.min_lat <= 48.137 && 48.137 < bbox.max_lat);
        assert!(bbox.min_lon <= 11.575 && 11.575 < bbox.max_lon);
        assert_eq!(grid.level(pixel), 8);
    }

    #[test]
    fn test_children_partition_area() {
        let grid = QuadGrid::new(3).unwrap();
        let pixel = grid.index(grid.root_pixel_id(), 2).unwrap();
        let sum: f64 = (0..4).map(|i| grid.area(grid.index(pixel, i).unwrap())).sum();
        assert!((sum - grid.area(pixel)).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_too_many_levels() {
        assert!(QuadGrid::new(MAX_QUAD_LEVEL + 1).is_err());
    }
}
