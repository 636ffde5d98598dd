//! Point cloud operators.
use crate::attribute::Attribute;
use crate::cloud::Cloud;
use crate::data::{DataType, PortData};
use crate::error::Result;
use crate::ops::descriptor::{ComputeContext, OperatorDescriptor};

pub fn cloud_random() -> OperatorDescriptor {
    OperatorDescriptor::new("CloudRandom", "Geometry/Cloud", compute_cloud_random)
        .output("cloud", DataType::Cloud)
        .attribute("npoints", Attribute::int(50, 1, 10_000))
        .attribute("seed", Attribute::seed(1))
}

fn compute_cloud_random(ctx: &mut ComputeContext<'_>) -> Result<()> {
    let count = ctx.attributes().int("npoints")?.max(0) as usize;
    let seed = ctx.attributes().seed("seed")? as u64;
    let cloud = Cloud::random(count, seed, ctx.layout().bbox);
    ctx.set_output("cloud", PortData::Cloud(cloud))
}

pub fn cloud_to_heightmap() -> OperatorDescriptor {
    OperatorDescriptor::new("CloudToHeightmap", "Geometry/Cloud", compute_cloud_to_heightmap)
        .input("cloud", DataType::Cloud)
        .output("out", DataType::Heightmap)
        .attribute("radius", Attribute::float(0.05, 0.001, 1.0))
}

fn compute_cloud_to_heightmap(ctx: &mut ComputeContext<'_>) -> Result<()> {
    let Some(input) = ctx.input("cloud")? else {
        return Ok(());
    };
    let Some(cloud) = input.as_cloud() else {
        return Ok(());
    };
    let radius = ctx.attributes().float("radius")?;
    let out = cloud.to_heightmap(ctx.layout(), radius)?;
    ctx.set_output("out", PortData::Heightmap(out))
}
