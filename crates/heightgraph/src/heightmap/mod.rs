//! Tiled heightmap primitive.
//!
//! A [`Heightmap`] is a fixed-resolution 2D float field partitioned into equally sized
//! [`Tile`]s. Each tile carries an overlap band mirroring its neighbours, so per-tile
//! operators can read a little past their interior. Operators that write tiles
//! independently must finish with [`Heightmap::smooth_overlap_buffers`] to blend the seams.
pub mod grid;
pub mod seed;
pub mod tile;
pub mod transform;

use glam::Vec2;

pub use grid::{BBox, HeightmapLayout, TileGrid, TileId};
pub use seed::{hash_cell, mix_u64, seed_for_tile};
pub use tile::Tile;
pub use transform::{transform, BackendTag, GpuRuntime, TransformMode};

use crate::error::{Error, Result};

/// A 2D float field split into overlapping tiles.
#[derive(Clone, Debug, PartialEq)]
pub struct Heightmap {
    layout: HeightmapLayout,
    tiles: Vec<Tile>,
}

impl Heightmap {
    /// Creates a zero-filled heightmap.
    pub fn new(layout: HeightmapLayout) -> Result<Self> {
        Self::filled(layout, 0.0)
    }

    /// Creates a heightmap with every cell set to `value`.
    pub fn filled(layout: HeightmapLayout, value: f32) -> Result<Self> {
        layout.validate()?;
        let tiles = layout
            .tile_ids()
            .map(|id| Tile::new(layout.tile_grid(id), value))
            .collect();
        Ok(Self { layout, tiles })
    }

    /// Builds a heightmap from a row-major array of `nx * ny` values. Halo cells
    /// outside the domain replicate the nearest edge value.
    pub fn from_array(layout: HeightmapLayout, values: &[f32]) -> Result<Self> {
        let (nx, ny) = layout.shape;
        if values.len() != nx * ny {
            return Err(Error::InvalidShape(format!(
                "expected {} values for shape {nx}x{ny}, got {}",
                nx * ny,
                values.len()
            )));
        }
        let mut hm = Self::new(layout)?;
        hm.fill_from_fn(|i, j| values[j * nx + i]);
        Ok(hm)
    }

    pub fn layout(&self) -> &HeightmapLayout {
        &self.layout
    }

    pub fn shape(&self) -> (usize, usize) {
        self.layout.shape
    }

    pub fn tiling(&self) -> (usize, usize) {
        self.layout.tiling
    }

    pub fn overlap(&self) -> usize {
        self.layout.overlap
    }

    pub fn bbox(&self) -> BBox {
        self.layout.bbox
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tiles_mut(&mut self) -> &mut [Tile] {
        &mut self.tiles
    }

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        if id.0 >= self.layout.tiling.0 || id.1 >= self.layout.tiling.1 {
            return None;
        }
        self.tiles.get(id.1 * self.layout.tiling.0 + id.0)
    }

    /// Fails with [`Error::InvalidShape`] unless `other` shares this heightmap's layout.
    pub fn ensure_same_layout(&self, other: &Heightmap) -> Result<()> {
        if self.layout != other.layout {
            return Err(Error::InvalidShape(format!(
                "layout mismatch: {:?} vs {:?}",
                self.layout, other.layout
            )));
        }
        Ok(())
    }

    /// Value of global pixel `(i, j)`, read from its owning tile.
    pub fn get(&self, i: usize, j: usize) -> f32 {
        let (nx, ny) = self.layout.shape;
        let i = i.min(nx - 1);
        let j = j.min(ny - 1);
        let owner = self.layout.owner_of(i, j);
        self.tile(owner)
            .and_then(|t| t.get_global(i as isize, j as isize))
            .unwrap_or(0.0)
    }

    /// Sets global pixel `(i, j)` in every tile that stores it.
    pub fn set(&mut self, i: usize, j: usize, value: f32) {
        let (nx, ny) = self.layout.shape;
        if i >= nx || j >= ny {
            return;
        }
        for tile in &mut self.tiles {
            if let Some((ix, iy)) = tile.grid.global_to_local(i as isize, j as isize) {
                tile.set(ix, iy, value);
            }
        }
    }

    /// Fills every stored cell from `f(i, j)` evaluated on the (clamped) global pixel.
    pub fn fill_from_fn(&mut self, f: impl Fn(usize, usize) -> f32) {
        let (nx, ny) = self.layout.shape;
        for tile in &mut self.tiles {
            let (w, h) = tile.size();
            for iy in 0..h {
                for ix in 0..w {
                    let (i, j) = tile.grid.local_to_global(ix, iy);
                    let ci = i.clamp(0, nx as isize - 1) as usize;
                    let cj = j.clamp(0, ny as isize - 1) as usize;
                    let idx = tile.index(ix, iy);
                    tile.data[idx] = f(ci, cj);
                }
            }
        }
    }

    pub fn fill(&mut self, value: f32) {
        for tile in &mut self.tiles {
            tile.data.fill(value);
        }
    }

    /// Row-major copy of the interior values.
    pub fn to_array(&self) -> Vec<f32> {
        let (nx, ny) = self.layout.shape;
        let mut out = vec![0.0; nx * ny];
        for tile in &self.tiles {
            let (ox, oy) = tile.grid.origin_px;
            let halo = tile.grid.halo;
            let (w, h) = tile.shape();
            for y in 0..h {
                for x in 0..w {
                    out[(oy + y) * nx + ox + x] = tile.data[tile.index(x + halo, y + halo)];
                }
            }
        }
        out
    }

    /// Iterates every interior value, tile by tile.
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.tiles.iter().flat_map(|t| t.interior())
    }

    pub fn min(&self) -> f32 {
        self.values().fold(f32::INFINITY, f32::min)
    }

    pub fn max(&self) -> f32 {
        self.values().fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn sum(&self) -> f32 {
        self.values().sum()
    }

    pub fn mean(&self) -> f32 {
        let (nx, ny) = self.layout.shape;
        self.sum() / (nx * ny) as f32
    }

    /// Largest absolute difference between interior values of two heightmaps.
    pub fn max_abs_diff(&self, other: &Heightmap) -> Result<f32> {
        self.ensure_same_layout(other)?;
        Ok(self
            .values()
            .zip(other.values())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max))
    }

    /// Linearly maps the current `[min, max]` range onto `[vmin, vmax]`. A constant
    /// field has no range to stretch and is left untouched.
    pub fn remap(&mut self, vmin: f32, vmax: f32) {
        let lo = self.min();
        let hi = self.max();
        let range = hi - lo;
        if !range.is_finite() || range <= f32::EPSILON {
            return;
        }
        let scale = (vmax - vmin) / range;
        for tile in &mut self.tiles {
            for v in &mut tile.data {
                *v = vmin + (*v - lo) * scale;
            }
        }
    }

    pub fn clamp(&mut self, lo: f32, hi: f32) {
        for tile in &mut self.tiles {
            for v in &mut tile.data {
                *v = v.clamp(lo, hi);
            }
        }
    }

    /// Mirrors values around the field's mid-range: `max + min - v`.
    pub fn invert(&mut self) {
        let lo = self.min();
        let hi = self.max();
        for tile in &mut self.tiles {
            for v in &mut tile.data {
                *v = hi + lo - *v;
            }
        }
    }

    /// Blends every overlap band so that all copies of a global pixel agree.
    ///
    /// Each stored copy contributes with a weight that decreases linearly with its depth
    /// inside the halo; the interior owner always weighs 1. Halo cells outside the domain
    /// replicate the nearest edge value. Applying this twice yields the same values as
    /// applying it once, up to floating-point rounding.
    pub fn smooth_overlap_buffers(&mut self) {
        let (nx, ny) = self.layout.shape;
        let overlap = self.layout.overlap;
        if overlap == 0 {
            return;
        }
        let mut sum = vec![0.0f32; nx * ny];
        let mut weight = vec![0.0f32; nx * ny];

        for tile in &self.tiles {
            let (w, h) = tile.size();
            for iy in 0..h {
                for ix in 0..w {
                    let (i, j) = tile.grid.local_to_global(ix, iy);
                    if !tile.grid.in_domain(i, j) {
                        continue;
                    }
                    let depth = tile.grid.halo_depth(ix, iy);
                    let wgt = 1.0 - depth as f32 / (overlap + 1) as f32;
                    let g = j as usize * nx + i as usize;
                    sum[g] += wgt * tile.data[tile.index(ix, iy)];
                    weight[g] += wgt;
                }
            }
        }

        for tile in &mut self.tiles {
            let (w, h) = tile.size();
            for iy in 0..h {
                for ix in 0..w {
                    let (i, j) = tile.grid.local_to_global(ix, iy);
                    let ci = i.clamp(0, nx as isize - 1) as usize;
                    let cj = j.clamp(0, ny as isize - 1) as usize;
                    let g = cj * nx + ci;
                    if weight[g] > 0.0 {
                        let idx = tile.index(ix, iy);
                        tile.data[idx] = sum[g] / weight[g];
                    }
                }
            }
        }
    }

    /// Bilinear sample at a world position, clamped to the domain.
    pub fn sample_bilinear(&self, p: Vec2) -> f32 {
        let (nx, ny) = self.layout.shape;
        let cell = self.layout.cell_size();
        let fx = (p.x - self.layout.bbox.xmin) / cell.x - 0.5;
        let fy = (p.y - self.layout.bbox.ymin) / cell.y - 0.5;
        let fx = fx.clamp(0.0, (nx - 1) as f32);
        let fy = fy.clamp(0.0, (ny - 1) as f32);
        let i0 = fx.floor() as usize;
        let j0 = fy.floor() as usize;
        let i1 = (i0 + 1).min(nx - 1);
        let j1 = (j0 + 1).min(ny - 1);
        let tx = fx - i0 as f32;
        let ty = fy - j0 as f32;
        let a = self.get(i0, j0) * (1.0 - tx) + self.get(i1, j0) * tx;
        let b = self.get(i0, j1) * (1.0 - tx) + self.get(i1, j1) * tx;
        a * (1.0 - ty) + b * ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> HeightmapLayout {
        HeightmapLayout::new((8, 8), (2, 2), 2)
    }

    fn ramp() -> Heightmap {
        let values: Vec<f32> = (0..64).map(|k| (k % 8) as f32 + (k / 8) as f32 * 0.5).collect();
        Heightmap::from_array(layout(), &values).expect("valid layout")
    }

    fn approx_eq(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-5, "{a} != {b}");
    }

    #[test]
    fn new_rejects_invalid_layout() {
        let err = Heightmap::new(HeightmapLayout::new((7, 8), (2, 2), 1))
            .expect_err("uneven tiling must fail");
        assert!(matches!(err, Error::InvalidShape(_)));
    }

    #[test]
    fn from_array_rejects_wrong_length() {
        let err = Heightmap::from_array(layout(), &[0.0; 10]).expect_err("length mismatch");
        assert!(matches!(err, Error::InvalidShape(_)));
    }

    #[test]
    fn array_roundtrip_preserves_values() {
        let hm = ramp();
        let arr = hm.to_array();
        assert_eq!(arr.len(), 64);
        assert_eq!(arr[9], 1.5);
        assert_eq!(hm.get(1, 1), 1.5);
        assert_eq!(hm.get(7, 7), 10.5);
    }

    #[test]
    fn halos_mirror_neighbours_after_from_array() {
        let hm = ramp();
        let left = hm.tile(TileId(0, 0)).expect("tile");
        // Global pixel (4, 0) is owned by tile (1, 0) and stored in the halo of (0, 0).
        assert_eq!(left.get_global(4, 0), Some(hm.get(4, 0)));
    }

    #[test]
    fn set_updates_every_copy() {
        let mut hm = Heightmap::new(layout()).expect("layout");
        hm.set(4, 4, 2.0);
        let copies: Vec<f32> = hm
            .tiles()
            .iter()
            .filter_map(|t| t.get_global(4, 4))
            .collect();
        assert_eq!(copies.len(), 4);
        assert!(copies.iter().all(|v| *v == 2.0));
    }

    #[test]
    fn remap_stretches_range_monotonically() {
        let mut hm = ramp();
        hm.remap(-1.0, 1.0);
        approx_eq(hm.min(), -1.0);
        approx_eq(hm.max(), 1.0);
        assert!(hm.get(0, 0) < hm.get(1, 0));
        assert!(hm.get(1, 0) < hm.get(2, 0));
    }

    #[test]
    fn remap_leaves_constant_field_untouched() {
        let mut hm = Heightmap::filled(layout(), 0.5).expect("layout");
        hm.remap(0.0, 1.0);
        assert!(hm.values().all(|v| v == 0.5));
    }

    #[test]
    fn invert_mirrors_range() {
        let mut hm = ramp();
        let lo = hm.min();
        let hi = hm.max();
        hm.invert();
        approx_eq(hm.get(0, 0), hi);
        approx_eq(hm.get(7, 7), lo);
    }

    #[test]
    fn smooth_overlap_buffers_reconciles_and_is_idempotent() {
        let mut hm = ramp();
        // Write tiles independently with disagreeing halos.
        for (k, tile) in hm.tiles_mut().iter_mut().enumerate() {
            for v in &mut tile.data {
                *v += k as f32;
            }
        }
        hm.smooth_overlap_buffers();
        for j in 0..8 {
            for i in 0..8 {
                let copies: Vec<f32> = hm
                    .tiles()
                    .iter()
                    .filter_map(|t| t.get_global(i, j))
                    .collect();
                for c in &copies {
                    approx_eq(*c, copies[0]);
                }
            }
        }
        let once = hm.clone();
        hm.smooth_overlap_buffers();
        assert!(hm.max_abs_diff(&once).expect("same layout") < 1e-5);
    }

    #[test]
    fn smooth_overlap_buffers_keeps_consistent_fields() {
        let mut hm = ramp();
        let before = hm.to_array();
        hm.smooth_overlap_buffers();
        for (a, b) in before.iter().zip(hm.to_array()) {
            approx_eq(*a, b);
        }
    }

    #[test]
    fn sample_bilinear_interpolates_between_centers() {
        let hm = ramp();
        let p0 = hm.layout().pixel_to_world(2, 3);
        let p1 = hm.layout().pixel_to_world(3, 3);
        approx_eq(hm.sample_bilinear(p0), hm.get(2, 3));
        approx_eq(hm.sample_bilinear((p0 + p1) * 0.5), 0.5 * (hm.get(2, 3) + hm.get(3, 3)));
    }

    #[test]
    fn ensure_same_layout_reports_invalid_shape() {
        let a = Heightmap::new(layout()).expect("layout");
        let b = Heightmap::new(HeightmapLayout::new((4, 4), (1, 1), 0)).expect("layout");
        assert!(matches!(a.ensure_same_layout(&b), Err(Error::InvalidShape(_))));
    }
}
