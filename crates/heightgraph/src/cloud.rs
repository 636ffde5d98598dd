//! Point clouds: scattered weighted positions exchanged between operators.
use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::heightmap::{mix_u64, BBox, Heightmap, HeightmapLayout};
use crate::error::Result;

/// A single weighted point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CloudPoint {
    pub position: Vec2,
    pub value: f32,
}

/// An unordered set of weighted points in world space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cloud {
    pub points: Vec<CloudPoint>,
}

impl Cloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uniformly random points inside `bbox`, with values in `[0, 1)`. Deterministic per seed.
    pub fn random(count: usize, seed: u64, bbox: BBox) -> Self {
        let mut rng = StdRng::seed_from_u64(mix_u64(seed));
        let points = (0..count)
            .map(|_| {
                let x = bbox.xmin + rand01(&mut rng) * bbox.width();
                let y = bbox.ymin + rand01(&mut rng) * bbox.height();
                CloudPoint {
                    position: Vec2::new(x, y),
                    value: rand01(&mut rng),
                }
            })
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Splats every point onto a heightmap as a cone of the given world radius; overlapping
    /// cones keep the maximum.
    pub fn to_heightmap(&self, layout: HeightmapLayout, radius: f32) -> Result<Heightmap> {
        let mut hm = Heightmap::new(layout)?;
        let radius = radius.max(f32::EPSILON);
        // Halo cells reach `overlap` cells past the tile bbox.
        let margin = layout.cell_size() * layout.overlap as f32 + Vec2::splat(radius);
        for tile in hm.tiles_mut() {
            let bbox = tile.bbox();
            let near: Vec<&CloudPoint> = self
                .points
                .iter()
                .filter(|p| {
                    p.position.x >= bbox.xmin - margin.x
                        && p.position.x <= bbox.xmax + margin.x
                        && p.position.y >= bbox.ymin - margin.y
                        && p.position.y <= bbox.ymax + margin.y
                })
                .collect();
            if near.is_empty() {
                continue;
            }
            tile.map_cells(|world, _| {
                near.iter()
                    .map(|p| {
                        let d = world.distance(p.position);
                        p.value * (1.0 - d / radius).max(0.0)
                    })
                    .fold(0.0, f32::max)
            });
        }
        Ok(hm)
    }
}

/// Generate a random float in the range [0, 1).
#[inline]
pub(crate) fn rand01(rng: &mut dyn Rng) -> f32 {
    (rng.next_u32() as f32) / ((u32::MAX as f32) + 1.0)
}
