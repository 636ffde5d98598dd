use heightgraph::prelude::*;
use heightgraph_examples::{init_tracing, render_heightmap_to_png, RenderConfig};

fn main() -> anyhow::Result<()> {
    init_tracing();

    // Keep the gradient only where the noise lies in the selected band.
    let config = GraphConfig::default().with_layout(HeightmapLayout::new((256, 256), (2, 2), 2));
    let mut graph = Graph::new(config);
    let gradient = graph.add_node("GradientLinear")?;
    let noise = graph.add_node("Noise")?;
    let select = graph.add_node("SelectRange")?;
    let apply = graph.add_node("ApplyMask")?;

    graph
        .require_node_mut(select)?
        .attributes
        .get_mut("range")
        .ok_or_else(|| anyhow::anyhow!("SelectRange has no 'range' attribute"))?
        .set("range", AttrValue::Range(0.4, 0.6))?;

    graph.new_link(noise, "out", select, "in")?;
    graph.new_link(gradient, "out", apply, "in")?;
    graph.new_link(select, "mask", apply, "mask")?;

    let order = graph.topological_sort(&graph.node_ids())?;
    let mut sink = VecSink::new();
    let report = run_batch(&mut graph, &order, &CancelToken::new(), &mut sink);
    println!(
        "computed {} nodes ({} failed), {} events",
        report.computed.len(),
        report.failed.len(),
        sink.len()
    );

    for (id, name) in [(select, "masks-select.png"), (apply, "masks-apply.png")] {
        let node = graph.require_node(id)?;
        let port = &node.descriptor().outputs[0].label;
        let data = graph
            .output_data(id, port)
            .ok_or_else(|| anyhow::anyhow!("node {id} has no output"))?;
        if let Some(field) = data.as_field() {
            render_heightmap_to_png(field, &RenderConfig::default().with_normalize(false), name)?;
        }
    }

    Ok(())
}
