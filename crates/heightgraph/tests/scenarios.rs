use std::sync::Arc;
use std::time::Duration;

use glam::Vec2;
use heightgraph::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};

fn layout() -> HeightmapLayout {
    HeightmapLayout::new((16, 16), (2, 2), 1)
}

fn registry() -> Arc<OperatorRegistry> {
    let mut registry = OperatorRegistry::builtin();
    registry.register(
        OperatorDescriptor::new("Slow", "Test", compute_slow)
            .input("in", DataType::Heightmap)
            .output("out", DataType::Heightmap),
    );
    registry.register(
        OperatorDescriptor::new("Failing", "Test", compute_failing).output("out", DataType::Heightmap),
    );
    Arc::new(registry)
}

fn compute_slow(ctx: &mut ComputeContext<'_>) -> Result<()> {
    std::thread::sleep(Duration::from_millis(200));
    let field = match ctx.input("in")? {
        Some(data) => data.as_field().cloned().ok_or("expected a field")?,
        None => ctx.new_heightmap()?,
    };
    ctx.set_output("out", PortData::Heightmap(field))
}

fn compute_failing(_ctx: &mut ComputeContext<'_>) -> Result<()> {
    Err(Error::Other("boom".into()))
}

fn graph() -> Graph {
    Graph::with_registry(GraphConfig::default().with_layout(layout()), registry())
}

fn controller() -> GraphController {
    GraphController::new(graph())
}

fn settle(c: &mut GraphController) -> (Option<BatchReport>, Vec<ComputeEvent>) {
    let report = c.wait().expect("worker joins");
    (report, c.drain_events())
}

fn started(events: &[ComputeEvent]) -> Vec<NodeId> {
    events
        .iter()
        .filter_map(|e| match e {
            ComputeEvent::NodeComputeStarted { node_id } => Some(*node_id),
            _ => None,
        })
        .collect()
}

type Fingerprint = (Vec<(NodeId, String, Vec2, Map<String, Value>)>, Vec<Link>);

/// Graph content in node insertion order.
fn fingerprint(g: &Graph) -> Fingerprint {
    let nodes = g
        .nodes()
        .map(|n| (n.id(), n.type_name().to_string(), n.position, n.attributes.to_json()))
        .collect();
    (nodes, g.links().cloned().collect())
}

#[test]
fn two_node_pipeline_compute() {
    let mut c = controller();
    let a = c.new_node("ConstantHeightmap", Vec2::ZERO).expect("builtin");
    let b = c.new_node("RemapRange", Vec2::new(200.0, 0.0)).expect("builtin");
    c.change_attribute(b, "vmin", AttrValue::Float(0.0)).expect("valid");
    c.change_attribute(b, "vmax", AttrValue::Float(1.0)).expect("valid");
    settle(&mut c);
    c.new_link(a, "out", b, "in").expect("compatible ports");
    let (_, events) = settle(&mut c);
    assert!(events.last().is_some_and(|e| e.is_batch_end()));

    let g = c.lock();
    let out = g.output_data(b, "out").expect("computed");
    let field = out.as_field().expect("heightmap output");
    assert!(field.values().all(|v| v == 0.5));
    assert_eq!(g.node(b).map(|n| n.last_backend), Some(BackendTag::Cpu));
}

#[test]
fn delete_with_undo_rebuild() {
    let mut c = controller();
    let a = c.new_node("ConstantHeightmap", Vec2::ZERO).expect("builtin");
    let b = c.new_node("Invert", Vec2::new(1.0, 0.0)).expect("builtin");
    let d = c.new_node("Smooth", Vec2::new(2.0, 0.0)).expect("builtin");
    c.new_link(a, "out", b, "in").expect("link");
    c.new_link(b, "out", d, "in").expect("link");
    settle(&mut c);
    let before = c.save_json().expect("serialisable");

    c.delete_selected(&[b]).expect("delete");
    settle(&mut c);
    {
        let g = c.lock();
        assert_eq!(g.node_ids(), vec![a, d]);
        assert_eq!(g.link_count(), 0);
    }

    assert!(c.undo().expect("undo"));
    settle(&mut c);
    assert_eq!(c.save_json().expect("serialisable"), before);
    let g = c.lock();
    assert_eq!(g.node_ids(), vec![a, b, d]);
    assert!(g.has_link(&Link::new(a, "out", b, "in")));
    assert!(g.has_link(&Link::new(b, "out", d, "in")));
    assert!(g.dirty_ids().is_empty());
}

#[test]
fn cycle_rejection() {
    let mut c = controller();
    let a = c.new_node("Invert", Vec2::ZERO).expect("builtin");
    let b = c.new_node("Invert", Vec2::ZERO).expect("builtin");
    let d = c.new_node("Invert", Vec2::ZERO).expect("builtin");
    c.new_link(a, "out", b, "in").expect("link");
    c.new_link(b, "out", d, "in").expect("link");
    settle(&mut c);
    let before = fingerprint(&c.lock());
    let history = c.history().len();

    let err = c.new_link(d, "out", a, "in").expect_err("closes a cycle");
    matches!(err, Error::WouldCycle(_))
        .then_some(())
        .expect("expected WouldCycle");
    assert_eq!(fingerprint(&c.lock()), before);
    assert_eq!(c.history().len(), history);
    assert!(!c.is_computing());
}

#[test]
fn drop_on_link_rewires_and_computes_from_dropped_node() {
    let mut c = controller();
    let a = c.new_node("ConstantHeightmap", Vec2::ZERO).expect("builtin");
    let sink = c.new_node("Invert", Vec2::ZERO).expect("builtin");
    let link = c.new_link(a, "out", sink, "in").expect("link");
    settle(&mut c);

    let b = c.new_node("Smooth", Vec2::ZERO).expect("builtin");
    assert!(c.drop_node_on_link(b, &link).expect("rewire"));
    let (_, events) = settle(&mut c);
    {
        let g = c.lock();
        assert!(!g.has_link(&link));
        assert!(g.has_link(&Link::new(a, "out", b, "in")));
        assert!(g.has_link(&Link::new(b, "out", sink, "in")));
    }
    assert_eq!(started(&events), vec![b, sink]);

    // One undo entry restores the original link.
    assert!(c.undo().expect("undo"));
    settle(&mut c);
    assert!(c.lock().has_link(&link));
    assert_eq!(c.lock().link_count(), 1);
}

#[test]
fn drop_on_link_without_matching_ports_is_a_noop() {
    let mut c = controller();
    let a = c.new_node("ConstantHeightmap", Vec2::ZERO).expect("builtin");
    let sink = c.new_node("Invert", Vec2::ZERO).expect("builtin");
    let link = c.new_link(a, "out", sink, "in").expect("link");
    settle(&mut c);
    let cloud = c.new_node("CloudRandom", Vec2::ZERO).expect("builtin");
    let history = c.history().len();

    assert!(!c.drop_node_on_link(cloud, &link).expect("no-op"));
    assert!(c.lock().has_link(&link));
    assert_eq!(c.history().len(), history);
}

#[test]
fn cancellation_mid_batch() {
    let mut c = controller();
    let mut ids = vec![c.new_node("Slow", Vec2::ZERO).expect("registered")];
    for _ in 0..4 {
        let n = c.new_node("Slow", Vec2::ZERO).expect("registered");
        let prev = *ids.last().expect("non-empty");
        c.lock().new_link(prev, "out", n, "in").expect("chain link");
        ids.push(n);
    }
    c.reload_all().expect("dispatch");

    let mut events = Vec::new();
    loop {
        let e = c
            .events()
            .recv_timeout(Duration::from_secs(30))
            .expect("batch makes progress");
        let third = e == ComputeEvent::NodeComputeStarted { node_id: ids[2] };
        events.push(e);
        if third {
            c.cancel();
            break;
        }
    }
    let (report, rest) = settle(&mut c);
    events.extend(rest);

    let report = report.expect("a batch ran");
    assert!(report.cancelled);
    assert_eq!(report.computed, ids[..3].to_vec());
    assert!(events.contains(&ComputeEvent::NodeComputeFinished { node_id: ids[2] }));
    assert_eq!(
        events.last(),
        Some(&ComputeEvent::ComputeAllFinished {
            cancelled: true,
            processed: 3
        })
    );
    assert!(events.iter().all(|e| e.node_id() != Some(ids[3]) && e.node_id() != Some(ids[4])));
    assert_eq!(c.lock().dirty_ids(), ids[2..].to_vec());
}

#[test]
fn cancelled_nodes_are_recomputed_by_the_next_dispatch() {
    let mut c = controller();
    let s1 = c.new_node("Slow", Vec2::ZERO).expect("registered");
    let s2 = c.new_node("Slow", Vec2::new(1.0, 0.0)).expect("registered");
    let other = c.new_node("ConstantHeightmap", Vec2::new(0.0, 1.0)).expect("builtin");
    c.new_link(s1, "out", s2, "in").expect("link");
    settle(&mut c);

    c.reload_node(s1).expect("dispatch");
    loop {
        let e = c
            .events()
            .recv_timeout(Duration::from_secs(30))
            .expect("batch makes progress");
        if e == (ComputeEvent::NodeComputeStarted { node_id: s1 }) {
            break;
        }
    }
    // Cancels the reload before `s2` is reached.
    assert!(c
        .change_attribute(other, "value", AttrValue::Float(1.5))
        .expect("valid"));
    let (report, _) = settle(&mut c);

    let report = report.expect("a batch ran");
    assert!(!report.cancelled);
    assert!(report.computed.contains(&s2));
    let g = c.lock();
    assert!(g.dirty_ids().is_empty());
    assert!(g.output_data(s2, "out").is_some());
    assert!(g.output_data(other, "out").is_some());
}

#[test]
fn paste_with_malformed_settings_changes_nothing() {
    let mut c = controller();
    let a = c.new_node("ConstantHeightmap", Vec2::ZERO).expect("builtin");
    settle(&mut c);
    let before = c.save_json().expect("serialisable");
    let history = c.history().len();

    let clip = serde_json::json!({
        "nodes": [
            { "id": 0, "type": "Invert", "settings": {} },
            { "id": 1, "type": "Noise", "settings": { "seed": "bad" } }
        ]
    });
    let err = c.paste(&clip, Vec2::new(50.0, 50.0)).expect_err("seed is not a number");
    assert!(matches!(err, Error::InvalidAttribute { ref key, .. } if key == "seed"));
    assert_eq!(c.save_json().expect("serialisable"), before);
    assert_eq!(c.lock().node_ids(), vec![a]);
    assert_eq!(c.history().len(), history);
}

#[test]
fn paste_preserves_relative_layout_and_undoes_cleanly() {
    let mut c = controller();
    let a = c.new_node("ConstantHeightmap", Vec2::new(100.0, 100.0)).expect("builtin");
    let b = c.new_node("Invert", Vec2::new(140.0, 130.0)).expect("builtin");
    c.new_link(a, "out", b, "in").expect("link");
    settle(&mut c);
    let before = fingerprint(&c.lock());

    let clip = c.copy(&[a, b]).expect("copy");
    let pasted = c.paste(&clip, Vec2::new(300.0, 200.0)).expect("paste");
    let (_, events) = settle(&mut c);
    assert_eq!(pasted.len(), 2);
    assert!(pasted.iter().all(|id| *id != a && *id != b));
    assert_eq!(started(&events), pasted);
    {
        let g = c.lock();
        assert_eq!(g.node(pasted[0]).map(|n| n.position), Some(Vec2::new(300.0, 200.0)));
        assert_eq!(g.node(pasted[1]).map(|n| n.position), Some(Vec2::new(340.0, 230.0)));
        assert!(g.has_link(&Link::new(pasted[0], "out", pasted[1], "in")));
    }

    assert!(c.undo().expect("undo"));
    settle(&mut c);
    assert_eq!(fingerprint(&c.lock()), before);
}

#[test]
fn add_then_remove_link_restores_graph() {
    let mut c = controller();
    let a = c.new_node("ConstantHeightmap", Vec2::ZERO).expect("builtin");
    let b = c.new_node("Invert", Vec2::ZERO).expect("builtin");
    let before = fingerprint(&c.lock());

    let link = c.new_link(a, "out", b, "in").expect("link");
    c.remove_link(&link, false).expect("present");
    settle(&mut c);
    assert_eq!(fingerprint(&c.lock()), before);

    let err = c.remove_link(&link, false).expect_err("already removed");
    assert!(matches!(err, Error::NoSuchLink(_)));
    assert_eq!(fingerprint(&c.lock()), before);
}

#[test]
fn attribute_change_then_undo_restores_values() {
    let mut c = controller();
    let n = c.new_node("Noise", Vec2::ZERO).expect("builtin");
    let before = c.lock().node(n).map(|n| n.attributes.to_json());

    assert!(c.change_attribute(n, "seed", AttrValue::Seed(77)).expect("valid"));
    assert!(c.change_attribute(n, "octaves", AttrValue::Int(99)).expect("clamped"));
    assert_eq!(c.lock().node(n).and_then(|n| n.attributes.int("octaves").ok()), Some(12));
    assert!(c.undo().expect("undo octaves"));
    assert!(c.undo().expect("undo seed"));
    settle(&mut c);
    assert_eq!(c.lock().node(n).map(|n| n.attributes.to_json()), before);
    assert!(c.redo().expect("redo seed"));
    settle(&mut c);
    assert_eq!(c.lock().node(n).and_then(|n| n.attributes.seed("seed").ok()), Some(77));
}

#[test]
fn failing_node_gets_empty_outputs_and_batch_continues() {
    let mut c = controller();
    let f = c.new_node("Failing", Vec2::ZERO).expect("registered");
    let inv = c.new_node("Invert", Vec2::ZERO).expect("builtin");
    c.new_link(f, "out", inv, "in").expect("link");
    let (report, events) = settle(&mut c);
    let report = report.expect("a batch ran");

    assert_eq!(report.failed, vec![f]);
    assert_eq!(report.computed, vec![f, inv]);
    assert!(events.last().is_some_and(|e| e.is_batch_end()));
    let g = c.lock();
    let node = g.node(f).expect("exists");
    assert!(node.dirty);
    assert_eq!(node.last_backend, BackendTag::None);
    let empty = g.output_data(f, "out").expect("empty output stored");
    assert!(empty.as_field().expect("field").values().all(|v| v == 0.0));
    assert!(g.output_data(inv, "out").is_some());
}

#[test]
fn json_roundtrip_with_mixed_types() {
    let mut g = graph();
    let cloud = g.add_node("CloudRandom").expect("builtin");
    let raster = g.add_node("CloudToHeightmap").expect("builtin");
    let noise = g.add_node("Noise").expect("builtin");
    let mask = g.add_node("SelectRange").expect("builtin");
    let apply = g.add_node("ApplyMask").expect("builtin");
    g.new_link(cloud, "cloud", raster, "cloud").expect("cloud link");
    g.new_link(noise, "out", mask, "in").expect("link");
    g.new_link(raster, "out", apply, "in").expect("link");
    g.new_link(mask, "mask", apply, "mask").expect("mask link");
    g.require_node_mut(noise).expect("exists").position = Vec2::new(-3.0, 4.5);

    let doc = json_to(&g).expect("serialise");
    let mut h = graph();
    let order = json_from(&mut h, &doc).expect("load");
    assert_eq!(fingerprint(&h), fingerprint(&g));
    assert_eq!(order.len(), 5);
    assert_eq!(h.dirty_ids().len(), 5);

    h.compute_all(&order).expect("acyclic");
    let out = h.output_data(apply, "out").expect("computed");
    assert_eq!(out.data_type(), DataType::Heightmap);
}

#[test]
fn graph_invariants_hold() {
    let mut g = graph();
    let a = g.add_node("ConstantHeightmap").expect("builtin");
    let b = g.add_node("Noise").expect("builtin");
    let blend = g.add_node("Blend").expect("builtin");
    let inv = g.add_node("Invert").expect("builtin");
    let lone = g.add_node("GradientLinear").expect("builtin");
    g.new_link(a, "out", blend, "input 1").expect("link");
    g.new_link(b, "out", blend, "input 2").expect("link");
    g.new_link(blend, "out", inv, "in").expect("link");

    // One link per IN port.
    let err = g.new_link(lone, "out", blend, "input 1").expect_err("occupied");
    assert!(matches!(err, Error::PortOccupied { .. }));
    assert_eq!(g.link_count(), 3);

    // Topological sort is a permutation respecting every link.
    let ids = g.node_ids();
    let sorted = g.topological_sort(&ids).expect("acyclic");
    let mut check = sorted.clone();
    check.sort();
    let mut expected = ids.clone();
    expected.sort();
    assert_eq!(check, expected);
    let pos = |id: NodeId| sorted.iter().position(|n| *n == id).expect("present");
    assert!(g.links().all(|l| pos(l.from) < pos(l.to)));

    // The update set of a node is the node plus its descendants.
    assert_eq!(g.get_nodes_to_update(b).expect("exists"), vec![b, blend, inv]);
    assert_eq!(g.get_nodes_to_update(lone).expect("exists"), vec![lone]);
}

#[test]
fn deterministic_operators_are_bitwise_reproducible() {
    for type_name in ["Noise", "WhiteNoise", "CloudRandom"] {
        let run = || {
            let mut g = graph();
            let id = g.add_node(type_name).expect("builtin");
            g.compute_node(id).expect("computes");
            let port = g.node(id).expect("exists").descriptor().outputs[0].label.clone();
            g.output_data(id, &port).expect("computed")
        };
        assert_eq!(run(), run(), "{type_name} is not reproducible");
    }
}

#[test]
fn overlap_smoothing_is_idempotent() {
    let mut field = Heightmap::new(HeightmapLayout::new((24, 20), (3, 2), 2)).expect("valid layout");
    let mut rng = StdRng::seed_from_u64(5);
    for tile in field.tiles_mut() {
        for v in &mut tile.data {
            *v = (rng.next_u32() as f32) / u32::MAX as f32;
        }
    }
    field.smooth_overlap_buffers();
    let once = field.clone();
    field.smooth_overlap_buffers();
    assert!(field.max_abs_diff(&once).expect("same layout") < 1e-5);
}

#[test]
fn empty_batch_emits_only_finish() {
    let mut g = graph();
    let mut sink = VecSink::new();
    run_batch(&mut g, &[], &CancelToken::new(), &mut sink);
    assert_eq!(
        sink.as_slice(),
        &[ComputeEvent::ComputeAllFinished {
            cancelled: false,
            processed: 0
        }]
    );
}
