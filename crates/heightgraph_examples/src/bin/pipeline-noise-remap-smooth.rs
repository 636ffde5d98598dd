use glam::Vec2;
use heightgraph::prelude::*;
use heightgraph_examples::{init_tracing, render_heightmap_to_png, ColorMap, RenderConfig};

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = GraphConfig::default().with_layout(HeightmapLayout::new((256, 256), (4, 4), 2));
    let mut controller = GraphController::new(Graph::new(config));

    let noise = controller.new_node("Noise", Vec2::new(0.0, 0.0))?;
    let remap = controller.new_node("RemapRange", Vec2::new(200.0, 0.0))?;
    let smooth = controller.new_node("Smooth", Vec2::new(400.0, 0.0))?;
    controller.change_attribute(noise, "seed", AttrValue::Seed(7))?;
    controller.change_attribute(smooth, "radius", AttrValue::Int(2))?;

    controller.new_link(noise, "out", remap, "in")?;
    controller.new_link(remap, "out", smooth, "in")?;
    controller.wait()?;

    for event in controller.drain_events() {
        if let ComputeEvent::NodeExecutionTime { node_id, ms, backend } = event {
            println!("node {node_id}: {ms:.2} ms on {backend:?}");
        }
    }

    let graph = controller.lock();
    let out = graph
        .output_data(smooth, "out")
        .ok_or_else(|| anyhow::anyhow!("smooth output missing"))?;
    let field = out
        .as_field()
        .ok_or_else(|| anyhow::anyhow!("expected a heightmap"))?;
    let rc = RenderConfig::default().with_color_map(ColorMap::Terrain);
    render_heightmap_to_png(field, &rc, "pipeline-noise-remap-smooth.png")?;

    Ok(())
}
