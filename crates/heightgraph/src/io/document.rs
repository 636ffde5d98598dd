//! Graph documents: the structured form of one graph and its attributes.
//!
//! ```text
//! { id, current_link_type,
//!   nodes:  [ { id, type, scene_position.x, scene_position.y, settings: {attrs} } ],
//!   links:  [ { node_out_id, port_out_id, node_in_id, port_in_id } ],
//!   groups: [...], comments: [...], config }
//! ```
//!
//! Unknown keys are ignored and missing optional keys take their defaults.
use glam::Vec2;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::graph::{Graph, GraphConfig, Link, NodeId};

pub const DEFAULT_LINK_TYPE: &str = "Curved";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphDocument {
    pub id: String,
    pub current_link_type: String,
    pub nodes: Vec<NodeRecord>,
    pub links: Vec<LinkRecord>,
    pub groups: Vec<Value>,
    pub comments: Vec<Value>,
    /// Graph configuration; the loader keeps the target's configuration when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<GraphConfig>,
}

impl Default for GraphDocument {
    fn default() -> Self {
        Self {
            id: crate::graph::DEFAULT_GRAPH_ID.to_string(),
            current_link_type: DEFAULT_LINK_TYPE.to_string(),
            nodes: Vec::new(),
            links: Vec::new(),
            groups: Vec::new(),
            comments: Vec::new(),
            config: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Generated on load when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(rename = "scene_position.x", default)]
    pub x: f32,
    #[serde(rename = "scene_position.y", default)]
    pub y: f32,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl NodeRecord {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub node_out_id: NodeId,
    pub port_out_id: String,
    pub node_in_id: NodeId,
    pub port_in_id: String,
}

impl From<&Link> for LinkRecord {
    fn from(link: &Link) -> Self {
        Self {
            node_out_id: link.from,
            port_out_id: link.from_port.clone(),
            node_in_id: link.to,
            port_in_id: link.to_port.clone(),
        }
    }
}

impl LinkRecord {
    pub fn to_link(&self) -> Link {
        Link::new(
            self.node_out_id,
            self.port_out_id.clone(),
            self.node_in_id,
            self.port_in_id.clone(),
        )
    }
}

impl GraphDocument {
    /// Projects a graph, or the subset `ids` of it with the links among them.
    pub fn from_graph(graph: &Graph, ids: Option<&[NodeId]>) -> Self {
        let keep = |id: NodeId| ids.is_none_or(|ids| ids.contains(&id));
        let nodes = graph
            .nodes()
            .filter(|n| keep(n.id()))
            .map(|n| NodeRecord {
                id: Some(n.id()),
                type_name: n.type_name().to_string(),
                x: n.position.x,
                y: n.position.y,
                settings: n.attributes.to_json(),
            })
            .collect();
        let links = graph
            .links()
            .filter(|l| keep(l.from) && keep(l.to))
            .map(LinkRecord::from)
            .collect();
        Self {
            id: graph.id().to_string(),
            nodes,
            links,
            config: Some(*graph.config()),
            ..Default::default()
        }
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::UnsupportedSchema(
                "graph document must be an object".into(),
            ));
        }
        Self::deserialize(value).map_err(|e| Error::UnsupportedSchema(e.to_string()))
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Node ids in record order: explicit ids are kept, absent ones continue after the
    /// largest explicit id. Duplicate explicit ids are a schema error.
    pub fn resolve_ids(&self) -> Result<Vec<NodeId>> {
        let mut next = self
            .nodes
            .iter()
            .filter_map(|n| n.id)
            .map(|id| id.0 + 1)
            .max()
            .unwrap_or(0);
        let mut seen = std::collections::HashSet::new();
        self.nodes
            .iter()
            .map(|n| {
                let id = n.id.unwrap_or_else(|| {
                    let id = NodeId(next);
                    next += 1;
                    id
                });
                if !seen.insert(id) {
                    return Err(Error::UnsupportedSchema(format!("duplicate node id {id}")));
                }
                Ok(id)
            })
            .collect()
    }
}

/// Serialises a whole graph.
pub fn json_to(graph: &Graph) -> Result<Value> {
    GraphDocument::from_graph(graph, None).to_value()
}

/// Replaces the content of `graph` with the document. Per-link recompute is not
/// triggered; every node ends up dirty and the returned ids are the full evaluation
/// order for a single dispatch. On any error `graph` is left unchanged.
pub fn json_from(graph: &mut Graph, value: &Value) -> Result<Vec<NodeId>> {
    let doc = GraphDocument::from_value(value)?;
    let loaded = build_graph(graph, &doc)?;
    *graph = loaded;
    graph.mark_all_dirty();
    info!(
        "Loaded graph '{}': {} nodes, {} links.",
        graph.id(),
        graph.len(),
        graph.link_count()
    );
    graph.topological_sort(&graph.node_ids())
}

fn build_graph(target: &Graph, doc: &GraphDocument) -> Result<Graph> {
    let config = match doc.config {
        Some(config) => {
            config.validate()?;
            config
        }
        None => *target.config(),
    };
    let mut graph = Graph::with_registry(config, target.registry().clone());
    graph.set_id(doc.id.clone());
    graph.set_gpu_runtime(target.gpu_runtime().cloned());

    for (record, id) in doc.nodes.iter().zip(doc.resolve_ids()?) {
        graph.add_node_with_id(&record.type_name, id)?;
        let node = graph.require_node_mut(id)?;
        node.position = record.position();
        node.attributes.load_json(&record.settings)?;
    }
    for record in &doc.links {
        graph.new_link(
            record.node_out_id,
            &record.port_out_id,
            record.node_in_id,
            &record.port_in_id,
        )?;
    }
    debug!("Built graph '{}' from document.", doc.id);
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::heightmap::HeightmapLayout;
    use crate::ops::OperatorRegistry;

    fn graph() -> Graph {
        let config = GraphConfig::default().with_layout(HeightmapLayout::new((8, 8), (2, 2), 1));
        Graph::with_registry(config, Arc::new(OperatorRegistry::builtin()))
    }

    #[test]
    fn node_record_uses_dotted_position_keys() {
        let record: NodeRecord = serde_json::from_value(json!({
            "id": 4,
            "type": "Noise",
            "scene_position.x": 10.0,
            "scene_position.y": -2.5,
            "caption": "ignored"
        }))
        .expect("valid record");
        assert_eq!(record.id, Some(NodeId(4)));
        assert_eq!(record.position(), Vec2::new(10.0, -2.5));
        assert!(record.settings.is_empty());
        let back = serde_json::to_value(&record).expect("serialise");
        assert_eq!(back["scene_position.x"], json!(10.0));
    }

    #[test]
    fn missing_ids_are_generated_after_explicit_ones() {
        let doc = GraphDocument::from_value(&json!({
            "nodes": [
                { "type": "Noise" },
                { "id": 7, "type": "Invert" },
                { "type": "Clamp" }
            ]
        }))
        .expect("valid document");
        assert_eq!(
            doc.resolve_ids().expect("unique"),
            vec![NodeId(8), NodeId(7), NodeId(9)]
        );
    }

    #[test]
    fn duplicate_ids_are_unsupported() {
        let doc = GraphDocument::from_value(&json!({
            "nodes": [ { "id": 1, "type": "Noise" }, { "id": 1, "type": "Invert" } ]
        }))
        .expect("parses");
        assert!(matches!(doc.resolve_ids(), Err(Error::UnsupportedSchema(_))));
    }

    #[test]
    fn wrong_structure_is_unsupported_schema() {
        let mut g = graph();
        let a = g.add_node("Noise").expect("builtin");
        let err = json_from(&mut g, &json!({ "nodes": 5 })).expect_err("nodes must be a list");
        assert!(matches!(err, Error::UnsupportedSchema(_)));
        assert_eq!(g.node_ids(), vec![a]);
    }

    #[test]
    fn failed_load_leaves_graph_unchanged() {
        let mut g = graph();
        let a = g.add_node("Noise").expect("builtin");
        let bad = json!({
            "nodes": [ { "id": 1, "type": "Noise" }, { "id": 2, "type": "Invert" } ],
            "links": [ { "node_out_id": 2, "port_out_id": "out", "node_in_id": 1, "port_in_id": "in" } ]
        });
        assert!(json_from(&mut g, &bad).is_err());
        assert_eq!(g.node_ids(), vec![a]);
        assert!(matches!(
            json_from(&mut g, &json!([1, 2])),
            Err(Error::UnsupportedSchema(_))
        ));
    }

    #[test]
    fn roundtrip_preserves_nodes_links_and_attributes() {
        let mut g = graph();
        let a = g.add_node("ConstantHeightmap").expect("builtin");
        let b = g.add_node("RemapRange").expect("builtin");
        g.new_link(a, "out", b, "in").expect("link");
        g.node_mut(b)
            .expect("exists")
            .attributes
            .get_mut("vmax")
            .expect("declared")
            .set("vmax", crate::attribute::AttrValue::Float(3.0))
            .expect("in bounds");
        g.node_mut(a).expect("exists").position = Vec2::new(5.0, 6.0);

        let value = json_to(&g).expect("serialise");
        let mut h = graph();
        let order = json_from(&mut h, &value).expect("load");
        assert_eq!(order, vec![a, b]);
        assert_eq!(h.dirty_ids(), vec![a, b]);
        assert!(h.has_link(&Link::new(a, "out", b, "in")));
        assert_eq!(h.node(a).map(|n| n.position), Some(Vec2::new(5.0, 6.0)));
        assert_eq!(
            h.node(b).map(|n| n.attributes.to_json()),
            g.node(b).map(|n| n.attributes.to_json())
        );
        assert_eq!(json_to(&h).expect("serialise"), value);
    }
}
