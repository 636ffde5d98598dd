use glam::Vec2;
use heightgraph::prelude::*;
use heightgraph_examples::init_tracing;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut controller = GraphController::new(Graph::default());
    let a = controller.new_node("Noise", Vec2::ZERO)?;
    let b = controller.new_node("Invert", Vec2::ZERO)?;
    let c = controller.new_node("Clamp", Vec2::ZERO)?;
    controller.new_link(a, "out", b, "in")?;
    controller.new_link(b, "out", c, "in")?;
    controller.auto_layout()?;
    controller.wait()?;

    let mut project = ProjectDocument::new();
    project.insert_graph(&controller.lock());
    let path = std::env::temp_dir().join("heightgraph-project.json");
    project.save(&path)?;

    let loaded = ProjectDocument::load(&path)?;
    for id in loaded.graph_ids() {
        let doc = loaded
            .graph(id)
            .ok_or_else(|| anyhow::anyhow!("graph '{id}' listed but missing"))?;
        let mut restored = GraphController::new(Graph::default());
        restored.load_json(&doc.to_value()?)?;
        let report = restored.wait()?.unwrap_or_default();
        println!(
            "graph '{id}': {} nodes, {} computed",
            restored.lock().len(),
            report.computed.len()
        );
    }

    Ok(())
}
