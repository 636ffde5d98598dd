//! Tile grid utilities for the tiled heightmap.
//!
//! This module defines [`BBox`], [`HeightmapLayout`] and [`TileGrid`]. A layout partitions
//! a 2D pixel domain into equally sized tiles; every tile stores its interior plus an
//! `overlap` band of cells on each side that mirrors the neighbouring tiles.
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// World-space bounding box `(xmin, xmax, ymin, ymax)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub xmin: f32,
    pub xmax: f32,
    pub ymin: f32,
    pub ymax: f32,
}

impl BBox {
    pub const UNIT: BBox = BBox {
        xmin: 0.0,
        xmax: 1.0,
        ymin: 0.0,
        ymax: 1.0,
    };

    pub fn new(xmin: f32, xmax: f32, ymin: f32, ymax: f32) -> Self {
        Self {
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    pub fn width(&self) -> f32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f32 {
        self.ymax - self.ymin
    }

    /// Returns `true` if `p` lies inside the box (max edges exclusive).
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.xmin && p.x < self.xmax && p.y >= self.ymin && p.y < self.ymax
    }
}

impl Default for BBox {
    fn default() -> Self {
        BBox::UNIT
    }
}

/// Identifier of a tile inside a heightmap, `(column, row)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(
    /// Tile index along the X axis.
    pub usize,
    /// Tile index along the Y axis.
    pub usize,
);

/// Global geometry shared by every heightmap built from it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeightmapLayout {
    /// Pixel count `(nx, ny)` of the whole domain.
    pub shape: (usize, usize),
    /// Tile count `(ntx, nty)`.
    pub tiling: (usize, usize),
    /// Width of the border band each tile shares with its neighbours, in cells.
    pub overlap: usize,
    /// World-space extent of the domain.
    pub bbox: BBox,
}

impl Default for HeightmapLayout {
    fn default() -> Self {
        Self {
            shape: (256, 256),
            tiling: (4, 4),
            overlap: 2,
            bbox: BBox::UNIT,
        }
    }
}

impl HeightmapLayout {
    pub fn new(shape: (usize, usize), tiling: (usize, usize), overlap: usize) -> Self {
        Self {
            shape,
            tiling,
            overlap,
            bbox: BBox::UNIT,
        }
    }

    /// Sets the world-space bounding box.
    pub fn with_bbox(mut self, bbox: BBox) -> Self {
        self.bbox = bbox;
        self
    }

    /// Checks that the tiling evenly divides the shape and that the overlap fits a tile.
    pub fn validate(&self) -> Result<()> {
        let (nx, ny) = self.shape;
        let (tx, ty) = self.tiling;
        if nx == 0 || ny == 0 {
            return Err(Error::InvalidShape(format!(
                "shape must be non-empty, got {nx}x{ny}"
            )));
        }
        if tx == 0 || ty == 0 {
            return Err(Error::InvalidShape(format!(
                "tiling must be non-empty, got {tx}x{ty}"
            )));
        }
        if nx % tx != 0 || ny % ty != 0 {
            return Err(Error::InvalidShape(format!(
                "shape {nx}x{ny} is not divisible by tiling {tx}x{ty}"
            )));
        }
        let (w, h) = self.tile_shape();
        if self.overlap > w || self.overlap > h {
            return Err(Error::InvalidShape(format!(
                "overlap {} exceeds tile shape {w}x{h}",
                self.overlap
            )));
        }
        if self.bbox.width() <= 0.0 || self.bbox.height() <= 0.0 {
            return Err(Error::InvalidShape("bbox must have a positive area".into()));
        }
        Ok(())
    }

    /// Interior shape `(tx, ty)` of every tile.
    pub fn tile_shape(&self) -> (usize, usize) {
        (
            self.shape.0 / self.tiling.0.max(1),
            self.shape.1 / self.tiling.1.max(1),
        )
    }

    pub fn tile_count(&self) -> usize {
        self.tiling.0 * self.tiling.1
    }

    /// World size of one cell.
    pub fn cell_size(&self) -> Vec2 {
        Vec2::new(
            self.bbox.width() / self.shape.0 as f32,
            self.bbox.height() / self.shape.1 as f32,
        )
    }

    /// World position of the center of global pixel `(i, j)`.
    pub fn pixel_to_world(&self, i: isize, j: isize) -> Vec2 {
        let cell = self.cell_size();
        Vec2::new(
            self.bbox.xmin + (i as f32 + 0.5) * cell.x,
            self.bbox.ymin + (j as f32 + 0.5) * cell.y,
        )
    }

    /// Converts a world position to the global pixel containing it (unclamped).
    pub fn world_to_pixel(&self, p: Vec2) -> (isize, isize) {
        let cell = self.cell_size();
        let px = (p.x - self.bbox.xmin) / cell.x;
        let py = (p.y - self.bbox.ymin) / cell.y;
        (px.floor() as isize, py.floor() as isize)
    }

    /// Tile owning global pixel `(i, j)` in its interior.
    pub fn owner_of(&self, i: usize, j: usize) -> TileId {
        let (w, h) = self.tile_shape();
        TileId(i / w, j / h)
    }

    /// Geometry of a single tile.
    pub fn tile_grid(&self, id: TileId) -> TileGrid {
        let (w, h) = self.tile_shape();
        let origin = (id.0 * w, id.1 * h);
        let x0 = self.edge_x(origin.0);
        let x1 = self.edge_x(origin.0 + w);
        let y0 = self.edge_y(origin.1);
        let y1 = self.edge_y(origin.1 + h);
        TileGrid {
            id,
            origin_px: origin,
            width: w,
            height: h,
            halo: self.overlap,
            bbox: BBox::new(x0, x1, y0, y1),
            domain_shape: self.shape,
            cell_size: self.cell_size(),
            domain_min: Vec2::new(self.bbox.xmin, self.bbox.ymin),
        }
    }

    /// Iterates tile ids in row-major order.
    pub fn tile_ids(&self) -> impl Iterator<Item = TileId> + '_ {
        (0..self.tiling.1).flat_map(move |ty| (0..self.tiling.0).map(move |tx| TileId(tx, ty)))
    }

    // Edges are derived from integer pixel offsets so that adjacent tiles share
    // bit-identical boundaries.
    fn edge_x(&self, px: usize) -> f32 {
        if px == self.shape.0 {
            return self.bbox.xmax;
        }
        self.bbox.xmin + self.bbox.width() * (px as f32 / self.shape.0 as f32)
    }

    fn edge_y(&self, py: usize) -> f32 {
        if py == self.shape.1 {
            return self.bbox.ymax;
        }
        self.bbox.ymin + self.bbox.height() * (py as f32 / self.shape.1 as f32)
    }
}

/// Geometry of one tile: interior size, halo (overlap) and world bounding box.
#[derive(Clone, Debug, PartialEq)]
pub struct TileGrid {
    /// Position of the tile in the tiling.
    pub id: TileId,
    /// Global pixel of the first interior cell.
    pub origin_px: (usize, usize),
    /// Number of interior cells in X, excluding halo.
    pub width: usize,
    /// Number of interior cells in Y, excluding halo.
    pub height: usize,
    /// Halo cell count on each side.
    pub halo: usize,
    /// World-space bounding box of the interior.
    pub bbox: BBox,
    /// Pixel count of the whole domain.
    pub domain_shape: (usize, usize),
    /// World size of one cell.
    pub cell_size: Vec2,
    /// World-space lower-left corner of the whole domain.
    pub domain_min: Vec2,
}

impl TileGrid {
    /// Total width including halo regions.
    pub fn total_width(&self) -> usize {
        self.width + 2 * self.halo
    }

    /// Total height including halo regions.
    pub fn total_height(&self) -> usize {
        self.height + 2 * self.halo
    }

    /// Converts local (halo-inclusive) indices to global pixel indices. The result may
    /// lie outside the domain for halo cells of edge tiles.
    pub fn local_to_global(&self, ix: usize, iy: usize) -> (isize, isize) {
        (
            self.origin_px.0 as isize + ix as isize - self.halo as isize,
            self.origin_px.1 as isize + iy as isize - self.halo as isize,
        )
    }

    /// Converts global pixel indices to local (halo-inclusive) indices, if covered.
    pub fn global_to_local(&self, i: isize, j: isize) -> Option<(usize, usize)> {
        let lx = i - self.origin_px.0 as isize + self.halo as isize;
        let ly = j - self.origin_px.1 as isize + self.halo as isize;
        if lx < 0 || ly < 0 || lx >= self.total_width() as isize || ly >= self.total_height() as isize
        {
            return None;
        }
        Some((lx as usize, ly as usize))
    }

    /// Returns `true` if the global pixel lies inside the domain.
    pub fn in_domain(&self, i: isize, j: isize) -> bool {
        i >= 0 && j >= 0 && (i as usize) < self.domain_shape.0 && (j as usize) < self.domain_shape.1
    }

    /// Returns `true` if local cell `(ix, iy)` is part of the interior.
    pub fn is_interior(&self, ix: usize, iy: usize) -> bool {
        ix >= self.halo
            && iy >= self.halo
            && ix < self.halo + self.width
            && iy < self.halo + self.height
    }

    /// Distance, in cells, of a local halo cell from the interior (0 for interior cells).
    pub fn halo_depth(&self, ix: usize, iy: usize) -> usize {
        let dx = if ix < self.halo {
            self.halo - ix
        } else if ix >= self.halo + self.width {
            ix + 1 - (self.halo + self.width)
        } else {
            0
        };
        let dy = if iy < self.halo {
            self.halo - iy
        } else if iy >= self.halo + self.height {
            iy + 1 - (self.halo + self.height)
        } else {
            0
        };
        dx.max(dy)
    }

    /// World position of the center of local cell `(ix, iy)`, accounting for halo.
    pub fn index_to_world(&self, ix: usize, iy: usize) -> Vec2 {
        let (i, j) = self.local_to_global(ix, iy);
        Vec2::new(
            self.domain_min.x + (i as f32 + 0.5) * self.cell_size.x,
            self.domain_min.y + (j as f32 + 0.5) * self.cell_size.y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> HeightmapLayout {
        HeightmapLayout::new((8, 4), (2, 2), 1)
    }

    #[test]
    fn validate_rejects_uneven_tiling() {
        let bad = HeightmapLayout::new((10, 8), (3, 2), 1);
        assert!(matches!(bad.validate(), Err(Error::InvalidShape(_))));
        assert!(layout().validate().is_ok());
    }

    #[test]
    fn validate_rejects_oversized_overlap() {
        let bad = HeightmapLayout::new((8, 8), (4, 4), 3);
        assert!(matches!(bad.validate(), Err(Error::InvalidShape(_))));
    }

    #[test]
    fn tile_bboxes_partition_the_domain() {
        let layout = HeightmapLayout::new((12, 9), (4, 3), 1).with_bbox(BBox::new(
            -1.0, 2.0, 0.5, 1.7,
        ));
        for id in layout.tile_ids() {
            let grid = layout.tile_grid(id);
            if id.0 + 1 < layout.tiling.0 {
                let right = layout.tile_grid(TileId(id.0 + 1, id.1));
                assert_eq!(grid.bbox.xmax, right.bbox.xmin);
            } else {
                assert_eq!(grid.bbox.xmax, 2.0);
            }
            if id.1 + 1 < layout.tiling.1 {
                let up = layout.tile_grid(TileId(id.0, id.1 + 1));
                assert_eq!(grid.bbox.ymax, up.bbox.ymin);
            } else {
                assert_eq!(grid.bbox.ymax, 1.7);
            }
        }
        assert_eq!(layout.tile_grid(TileId(0, 0)).bbox.xmin, -1.0);
    }

    #[test]
    fn total_dimensions_include_halo() {
        let grid = layout().tile_grid(TileId(1, 0));
        assert_eq!((grid.width, grid.height), (4, 2));
        assert_eq!(grid.total_width(), 6);
        assert_eq!(grid.total_height(), 4);
    }

    #[test]
    fn local_global_roundtrip() {
        let grid = layout().tile_grid(TileId(1, 1));
        let (i, j) = grid.local_to_global(0, 0);
        assert_eq!((i, j), (3, 1));
        assert_eq!(grid.global_to_local(i, j), Some((0, 0)));
        assert_eq!(grid.global_to_local(0, 0), None);
    }

    #[test]
    fn halo_depth_counts_cells_from_interior() {
        let grid = HeightmapLayout::new((8, 8), (2, 2), 2).tile_grid(TileId(0, 0));
        assert_eq!(grid.halo_depth(2, 2), 0);
        assert_eq!(grid.halo_depth(1, 3), 1);
        assert_eq!(grid.halo_depth(0, 3), 2);
        assert_eq!(grid.halo_depth(6, 3), 1);
        assert_eq!(grid.halo_depth(7, 7), 2);
    }

    #[test]
    fn index_to_world_uses_cell_centers() {
        let layout = HeightmapLayout::new((4, 4), (2, 2), 1);
        let grid = layout.tile_grid(TileId(0, 0));
        let p = grid.index_to_world(1, 1);
        assert_eq!(p, Vec2::new(0.125, 0.125));
        assert_eq!(layout.world_to_pixel(p), (0, 0));
        assert_eq!(layout.pixel_to_world(0, 0), p);
    }
}
