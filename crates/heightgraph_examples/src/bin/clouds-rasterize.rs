use heightgraph::prelude::*;
use heightgraph_examples::{init_tracing, render_heightmap_to_png, ColorMap, RenderConfig};

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = GraphConfig::default().with_layout(HeightmapLayout::new((128, 128), (2, 2), 1));
    let mut graph = Graph::new(config);
    let cloud = graph.add_node("CloudRandom")?;
    let raster = graph.add_node("CloudToHeightmap")?;
    graph.new_link(cloud, "cloud", raster, "cloud")?;

    for (key, value) in [("npoints", AttrValue::Int(200)), ("seed", AttrValue::Seed(3))] {
        graph
            .require_node_mut(cloud)?
            .attributes
            .get_mut(key)
            .ok_or_else(|| anyhow::anyhow!("CloudRandom has no '{key}' attribute"))?
            .set(key, value)?;
    }

    graph.compute_all(&graph.node_ids())?;

    let points = graph
        .output_data(cloud, "cloud")
        .and_then(|d| d.as_cloud().map(|c| c.len()))
        .unwrap_or(0);
    println!("rasterized {points} points");

    let out = graph
        .output_data(raster, "out")
        .ok_or_else(|| anyhow::anyhow!("raster output missing"))?;
    let field = out
        .as_field()
        .ok_or_else(|| anyhow::anyhow!("expected a heightmap"))?;
    let rc = RenderConfig::default().with_scale(4).with_color_map(ColorMap::Terrain);
    render_heightmap_to_png(field, &rc, "clouds-rasterize.png")?;

    Ok(())
}
