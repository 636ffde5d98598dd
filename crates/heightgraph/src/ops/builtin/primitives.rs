//! Generators: operators without inputs that fill a heightmap from their attributes.
use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::attribute::Attribute;
use crate::cloud::rand01;
use crate::data::{DataType, PortData};
use crate::error::Result;
use crate::heightmap::seed::unit_from_hash;
use crate::heightmap::{hash_cell, seed_for_tile, BBox};
use crate::ops::descriptor::{ComputeContext, OperatorDescriptor};

pub fn constant_heightmap() -> OperatorDescriptor {
    OperatorDescriptor::new("ConstantHeightmap", "Primitive/Function", compute_constant)
        .output("out", DataType::Heightmap)
        .attribute("value", Attribute::float(0.5, -1.0, 2.0))
        .gpu_kernel("fill")
}

fn compute_constant(ctx: &mut ComputeContext<'_>) -> Result<()> {
    let value = ctx.attributes().float("value")?;
    let mut out = ctx.new_heightmap()?;
    ctx.transform(&mut [&mut out], &[], move |outs, _| outs[0].data.fill(value))?;
    ctx.set_output("out", PortData::Heightmap(out))
}

pub fn gradient_linear() -> OperatorDescriptor {
    OperatorDescriptor::new("GradientLinear", "Primitive/Function", compute_gradient)
        .output("out", DataType::Heightmap)
        .attribute("angle", Attribute::float(0.0, -180.0, 180.0))
        .separator()
        .attribute("center", Attribute::vec2(Vec2::splat(0.5), 0.0, 1.0))
}

/// Projection of the unit domain onto the gradient direction, scaled to `[0, 1]` over
/// the domain's extent along that direction.
fn compute_gradient(ctx: &mut ComputeContext<'_>) -> Result<()> {
    let angle = ctx.attributes().float("angle")?.to_radians();
    let center = ctx.attributes().vec2("center")?;
    let bbox = ctx.layout().bbox;
    let dir = Vec2::new(angle.cos(), angle.sin());
    let half_extent = 0.5 * (dir.x.abs() + dir.y.abs());

    let mut out = ctx.new_heightmap()?;
    ctx.transform(&mut [&mut out], &[], move |outs, _| {
        outs[0].map_cells(|p, _| {
            let u = unit_coords(bbox, p);
            0.5 + (u - center).dot(dir) / (2.0 * half_extent)
        })
    })?;
    ctx.set_output("out", PortData::Heightmap(out))
}

pub fn noise() -> OperatorDescriptor {
    OperatorDescriptor::new("Noise", "Primitive/Coherent Noise", compute_noise)
        .output("out", DataType::Heightmap)
        .attribute("kw", Attribute::wave_nb(Vec2::splat(2.0), 0.0, 64.0))
        .attribute("seed", Attribute::seed(1))
        .separator()
        .label("Fractal")
        .attribute("octaves", Attribute::int(6, 1, 12))
        .attribute("persistence", Attribute::float(0.5, 0.0, 1.0))
        .attribute("lacunarity", Attribute::float(2.0, 1.0, 4.0))
        .gpu_kernel("noise_fbm")
}

#[derive(Clone, Copy)]
struct Fbm {
    kw: Vec2,
    seed: u64,
    octaves: i32,
    persistence: f32,
    lacunarity: f32,
}

impl Fbm {
    /// Fractal value noise at unit-domain coordinates, normalised to roughly `[0, 1]`.
    fn sample(&self, u: Vec2) -> f32 {
        let mut sum = 0.0;
        let mut norm = 0.0;
        let mut amp = 1.0;
        let mut freq = 1.0;
        for octave in 0..self.octaves {
            let seed = self.seed.wrapping_add(octave as u64);
            sum += amp * value_noise(seed, u * self.kw * freq);
            norm += amp;
            amp *= self.persistence;
            freq *= self.lacunarity;
        }
        if norm > 0.0 {
            sum / norm
        } else {
            0.0
        }
    }
}

fn value_noise(seed: u64, p: Vec2) -> f32 {
    let i = p.x.floor();
    let j = p.y.floor();
    let fx = smoothstep(p.x - i);
    let fy = smoothstep(p.y - j);
    let (i, j) = (i as i64, j as i64);
    let v = |di: i64, dj: i64| unit_from_hash(hash_cell(seed, i + di, j + dj));
    let a = v(0, 0) + (v(1, 0) - v(0, 0)) * fx;
    let b = v(0, 1) + (v(1, 1) - v(0, 1)) * fx;
    a + (b - a) * fy
}

#[inline]
fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn compute_noise(ctx: &mut ComputeContext<'_>) -> Result<()> {
    let attrs = ctx.attributes();
    let fbm = Fbm {
        kw: attrs.vec2("kw")?,
        seed: attrs.seed("seed")? as u64,
        octaves: attrs.int("octaves")?,
        persistence: attrs.float("persistence")?,
        lacunarity: attrs.float("lacunarity")?,
    };
    let bbox = ctx.layout().bbox;
    let mut out = ctx.new_heightmap()?;
    ctx.transform(&mut [&mut out], &[], move |outs, _| {
        outs[0].map_cells(|p, _| fbm.sample(unit_coords(bbox, p)))
    })?;
    ctx.set_output("out", PortData::Heightmap(out))
}

pub fn white_noise() -> OperatorDescriptor {
    OperatorDescriptor::new("WhiteNoise", "Primitive/Random", compute_white_noise)
        .output("out", DataType::Heightmap)
        .attribute("seed", Attribute::seed(1))
}

/// Each tile draws from its own generator, so the overlap bands disagree until smoothed.
fn compute_white_noise(ctx: &mut ComputeContext<'_>) -> Result<()> {
    let seed = ctx.attributes().seed("seed")? as u64;
    let mut out = ctx.new_heightmap()?;
    ctx.transform(&mut [&mut out], &[], move |outs, _| {
        let tile = &mut outs[0];
        let mut rng = StdRng::seed_from_u64(seed_for_tile(seed, tile.grid.id));
        for v in tile.data.iter_mut() {
            *v = rand01(&mut rng);
        }
    })?;
    out.smooth_overlap_buffers();
    ctx.set_output("out", PortData::Heightmap(out))
}

fn unit_coords(bbox: BBox, p: Vec2) -> Vec2 {
    Vec2::new(
        (p.x - bbox.xmin) / bbox.width(),
        (p.y - bbox.ymin) / bbox.height(),
    )
}
