//! Tile storage for heightmap values.
//!
//! A [`Tile`] stores the cells of one [`TileGrid`], halo included, in row-major order.
use glam::Vec2;

use super::grid::{BBox, TileGrid};

/// A rectangular float grid with its halo band and its world-space reference.
#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    pub grid: TileGrid,
    pub data: Vec<f32>,
}

impl Tile {
    /// Create a new tile for the given grid, initializing all values to `value`.
    pub fn new(grid: TileGrid, value: f32) -> Self {
        let len = grid.total_width() * grid.total_height();
        Self {
            grid,
            data: vec![value; len],
        }
    }

    /// Get the size of the tile as `(width, height)`, including halo regions.
    pub fn size(&self) -> (usize, usize) {
        (self.grid.total_width(), self.grid.total_height())
    }

    /// Interior shape `(width, height)`, excluding halo.
    pub fn shape(&self) -> (usize, usize) {
        (self.grid.width, self.grid.height)
    }

    pub fn bbox(&self) -> BBox {
        self.grid.bbox
    }

    #[inline]
    pub fn index(&self, ix: usize, iy: usize) -> usize {
        iy * self.grid.total_width() + ix
    }

    /// Get the value at local (halo-inclusive) indices, returning `0.0` if out of bounds.
    pub fn get(&self, ix: isize, iy: isize) -> f32 {
        let (w, h) = self.size();
        if ix < 0 || iy < 0 || ix >= w as isize || iy >= h as isize {
            return 0.0;
        }
        self.data[self.index(ix as usize, iy as usize)]
    }

    /// Get the value at local indices, clamping to the stored area.
    pub fn get_clamped(&self, ix: isize, iy: isize) -> f32 {
        let (w, h) = self.size();
        let cx = ix.clamp(0, w as isize - 1) as usize;
        let cy = iy.clamp(0, h as isize - 1) as usize;
        self.data[self.index(cx, cy)]
    }

    /// Set the value at local indices; out of bounds writes are ignored.
    pub fn set(&mut self, ix: usize, iy: usize, value: f32) {
        let (w, h) = self.size();
        if ix < w && iy < h {
            let i = self.index(ix, iy);
            self.data[i] = value;
        }
    }

    /// Value stored for a global pixel, if this tile covers it.
    pub fn get_global(&self, i: isize, j: isize) -> Option<f32> {
        self.grid
            .global_to_local(i, j)
            .map(|(ix, iy)| self.data[self.index(ix, iy)])
    }

    /// World position of the center of local cell `(ix, iy)`.
    pub fn world_position(&self, ix: usize, iy: usize) -> Vec2 {
        self.grid.index_to_world(ix, iy)
    }

    /// Applies `f(world_position, value) -> value` to every stored cell, halo included.
    pub fn map_cells(&mut self, mut f: impl FnMut(Vec2, f32) -> f32) {
        let (w, h) = self.size();
        for iy in 0..h {
            for ix in 0..w {
                let p = self.grid.index_to_world(ix, iy);
                let idx = self.index(ix, iy);
                self.data[idx] = f(p, self.data[idx]);
            }
        }
    }

    /// Iterates the interior values in row-major order.
    pub fn interior(&self) -> impl Iterator<Item = f32> + '_ {
        let halo = self.grid.halo;
        let (w, h) = self.shape();
        (halo..halo + h)
            .flat_map(move |iy| (halo..halo + w).map(move |ix| self.data[self.index(ix, iy)]))
    }
}
