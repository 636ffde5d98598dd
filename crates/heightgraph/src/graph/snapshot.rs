//! Serialisable captures of a node subset, used by delete-with-restore and copy.
use glam::Vec2;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Link, NodeId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub type_name: String,
    pub position: Vec2,
    pub attributes: Map<String, Value>,
    /// Position in the graph's insertion order when captured.
    #[serde(default)]
    pub rank: usize,
}

/// Nodes plus their incident links, split into links between captured nodes
/// (`internal_links`) and links to nodes outside the capture (`external_links`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub internal_links: Vec<Link>,
    pub external_links: Vec<Link>,
}

impl GraphSnapshot {
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
