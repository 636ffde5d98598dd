//! Operators combining heightmaps and masks.
use crate::attribute::Attribute;
use crate::data::{DataType, PortData};
use crate::error::{Error, Result};
use crate::ops::descriptor::{ComputeContext, OperatorDescriptor};

use super::filters::field_input;

pub const BLEND_METHODS: [&str; 5] = ["add", "multiply", "min", "max", "lerp"];

pub fn blend() -> OperatorDescriptor {
    OperatorDescriptor::new("Blend", "Operator/Blend", compute_blend)
        .input("input 1", DataType::Heightmap)
        .input("input 2", DataType::Heightmap)
        .output("out", DataType::Heightmap)
        .attribute("method", Attribute::choice("add", &BLEND_METHODS))
        .attribute("k", Attribute::float(0.5, 0.0, 1.0))
        .gpu_kernel("blend")
}

fn compute_blend(ctx: &mut ComputeContext<'_>) -> Result<()> {
    let a = field_input(ctx, "input 1")?;
    let b = field_input(ctx, "input 2")?;
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        (Some(only), None) | (None, Some(only)) => {
            return ctx.set_output("out", PortData::Heightmap(only));
        }
        (None, None) => return Ok(()),
    };
    let k = ctx.attributes().float("k")?;
    let op: fn(f32, f32, f32) -> f32 = match ctx.attributes().choice("method")? {
        "add" => |a, b, _| a + b,
        "multiply" => |a, b, _| a * b,
        "min" => |a, b, _| a.min(b),
        "max" => |a, b, _| a.max(b),
        "lerp" => |a, b, k| a + (b - a) * k,
        other => {
            return Err(Error::InvalidAttribute {
                key: "method".into(),
                reason: format!("unknown blend method '{other}'"),
            })
        }
    };
    let mut out = ctx.new_heightmap()?;
    ctx.transform(&mut [&mut out], &[&a, &b], move |outs, ins| {
        for ((o, x), y) in outs[0].data.iter_mut().zip(&ins[0].data).zip(&ins[1].data) {
            *o = op(*x, *y, k);
        }
    })?;
    ctx.set_output("out", PortData::Heightmap(out))
}

pub fn select_range() -> OperatorDescriptor {
    OperatorDescriptor::new("SelectRange", "Mask/Selector", compute_select_range)
        .input("in", DataType::Heightmap)
        .output("mask", DataType::Mask)
        .attribute("range", Attribute::range(0.25, 0.75, -10.0, 10.0))
}

/// 1 where the input lies inside the range, 0 elsewhere.
fn compute_select_range(ctx: &mut ComputeContext<'_>) -> Result<()> {
    let Some(input) = field_input(ctx, "in")? else {
        return Ok(());
    };
    let (lo, hi) = ctx.attributes().range("range")?;
    let mut mask = ctx.new_heightmap()?;
    ctx.transform(&mut [&mut mask], &[&input], move |outs, ins| {
        for (o, v) in outs[0].data.iter_mut().zip(&ins[0].data) {
            *o = if (lo..=hi).contains(v) { 1.0 } else { 0.0 };
        }
    })?;
    ctx.set_output("mask", PortData::Mask(mask))
}

pub fn apply_mask() -> OperatorDescriptor {
    OperatorDescriptor::new("ApplyMask", "Mask/Operator", compute_apply_mask)
        .input("in", DataType::Heightmap)
        .input("mask", DataType::Mask)
        .output("out", DataType::Heightmap)
        .attribute("inverse", Attribute::boolean(false))
}

fn compute_apply_mask(ctx: &mut ComputeContext<'_>) -> Result<()> {
    let Some(input) = field_input(ctx, "in")? else {
        return Ok(());
    };
    let Some(mask) = field_input(ctx, "mask")? else {
        return ctx.set_output("out", PortData::Heightmap(input));
    };
    let inverse = ctx.attributes().boolean("inverse")?;
    let mut out = ctx.new_heightmap()?;
    ctx.transform(&mut [&mut out], &[&input, &mask], move |outs, ins| {
        for ((o, v), m) in outs[0].data.iter_mut().zip(&ins[0].data).zip(&ins[1].data) {
            let m = m.clamp(0.0, 1.0);
            *o = v * if inverse { 1.0 - m } else { m };
        }
    })?;
    ctx.set_output("out", PortData::Heightmap(out))
}
