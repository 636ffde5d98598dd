//! Single-input heightmap filters.
use crate::attribute::Attribute;
use crate::data::{DataType, PortData};
use crate::error::Result;
use crate::heightmap::Heightmap;
use crate::ops::descriptor::{ComputeContext, OperatorDescriptor};

/// The heightmap feeding `label`, if connected and computed.
pub(super) fn field_input(ctx: &ComputeContext<'_>, label: &str) -> Result<Option<Heightmap>> {
    Ok(ctx
        .input(label)?
        .and_then(|data| data.as_field().cloned()))
}

pub fn remap_range() -> OperatorDescriptor {
    OperatorDescriptor::new("RemapRange", "Filter/Range", compute_remap)
        .input("in", DataType::Heightmap)
        .output("out", DataType::Heightmap)
        .attribute("vmin", Attribute::float(0.0, -10.0, 10.0))
        .attribute("vmax", Attribute::float(1.0, -10.0, 10.0))
}

fn compute_remap(ctx: &mut ComputeContext<'_>) -> Result<()> {
    let Some(mut field) = field_input(ctx, "in")? else {
        return Ok(());
    };
    let vmin = ctx.attributes().float("vmin")?;
    let vmax = ctx.attributes().float("vmax")?;
    field.remap(vmin, vmax);
    ctx.set_output("out", PortData::Heightmap(field))
}

pub fn clamp() -> OperatorDescriptor {
    OperatorDescriptor::new("Clamp", "Filter/Range", compute_clamp)
        .input("in", DataType::Heightmap)
        .output("out", DataType::Heightmap)
        .attribute("clamp", Attribute::range(0.0, 1.0, -10.0, 10.0))
        .gpu_kernel("clamp")
}

fn compute_clamp(ctx: &mut ComputeContext<'_>) -> Result<()> {
    let Some(input) = field_input(ctx, "in")? else {
        return Ok(());
    };
    let (lo, hi) = ctx.attributes().range("clamp")?;
    let mut out = ctx.new_heightmap()?;
    ctx.transform(&mut [&mut out], &[&input], move |outs, ins| {
        for (o, i) in outs[0].data.iter_mut().zip(&ins[0].data) {
            *o = i.clamp(lo, hi);
        }
    })?;
    ctx.set_output("out", PortData::Heightmap(out))
}

pub fn invert() -> OperatorDescriptor {
    OperatorDescriptor::new("Invert", "Filter/Range", compute_invert)
        .input("in", DataType::Heightmap)
        .output("out", DataType::Heightmap)
}

fn compute_invert(ctx: &mut ComputeContext<'_>) -> Result<()> {
    let Some(mut field) = field_input(ctx, "in")? else {
        return Ok(());
    };
    field.invert();
    ctx.set_output("out", PortData::Heightmap(field))
}

pub fn smooth() -> OperatorDescriptor {
    OperatorDescriptor::new("Smooth", "Filter/Smoothing", compute_smooth)
        .input("in", DataType::Heightmap)
        .output("out", DataType::Heightmap)
        .attribute("radius", Attribute::int(1, 0, 16))
        .gpu_kernel("smooth_cpulse")
}

/// Box blur inside each tile. Cells closer than `radius` to the stored edge read clamped
/// values, so the seams are reconciled afterwards.
fn compute_smooth(ctx: &mut ComputeContext<'_>) -> Result<()> {
    let Some(input) = field_input(ctx, "in")? else {
        return Ok(());
    };
    let radius = ctx.attributes().int("radius")?.max(0) as isize;
    if radius == 0 {
        return ctx.set_output("out", PortData::Heightmap(input));
    }
    let mut out = ctx.new_heightmap()?;
    ctx.transform(&mut [&mut out], &[&input], move |outs, ins| {
        let src = ins[0];
        let (w, h) = src.size();
        let n = ((2 * radius + 1) * (2 * radius + 1)) as f32;
        for iy in 0..h {
            for ix in 0..w {
                let mut acc = 0.0;
                for dy in -radius..=radius {
                    for dx in -radius..=radius {
                        acc += src.get_clamped(ix as isize + dx, iy as isize + dy);
                    }
                }
                outs[0].set(ix, iy, acc / n);
            }
        }
    })?;
    out.smooth_overlap_buffers();
    ctx.set_output("out", PortData::Heightmap(out))
}
