//! Nodes, node ids and ports.
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::attribute::Attributes;
use crate::data::{DataType, PortData};
use crate::error::{Error, Result};
use crate::heightmap::{BackendTag, HeightmapLayout};
use crate::ops::OperatorDescriptor;

/// Stable node identity inside one graph. Never reused for a different node.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(NodeId)
            .map_err(|e| Error::Other(format!("invalid node id '{s}': {e}")))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    In,
    Out,
}

/// A typed connection endpoint. Ports are fixed at node construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Port {
    pub label: String,
    pub direction: PortDirection,
    pub data_type: DataType,
}

impl Port {
    pub fn new(label: &str, direction: PortDirection, data_type: DataType) -> Self {
        Self {
            label: label.to_string(),
            direction,
            data_type,
        }
    }
}

/// An operator instance: ports, attributes, cached outputs and compute bookkeeping.
#[derive(Clone)]
pub struct Node {
    id: NodeId,
    descriptor: Arc<OperatorDescriptor>,
    ports: Vec<Port>,
    pub attributes: Attributes,
    outputs: Vec<Option<Arc<PortData>>>,
    /// Cached outputs are stale.
    pub dirty: bool,
    pub last_time_ms: f64,
    pub last_backend: BackendTag,
    /// Scene position; presentational only.
    pub position: Vec2,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("type_name", &self.type_name())
            .field("dirty", &self.dirty)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl Node {
    /// Creates a node and runs the descriptor's `setup` on it.
    pub fn new(id: NodeId, descriptor: Arc<OperatorDescriptor>) -> Self {
        let mut node = Self {
            id,
            descriptor: descriptor.clone(),
            ports: Vec::new(),
            attributes: Attributes::new(),
            outputs: Vec::new(),
            dirty: true,
            last_time_ms: 0.0,
            last_backend: BackendTag::None,
            position: Vec2::ZERO,
        };
        descriptor.setup(&mut node);
        node
    }

    pub(crate) fn install(&mut self, ports: Vec<Port>, attributes: Attributes, n_outputs: usize) {
        self.ports = ports;
        self.attributes = attributes;
        self.outputs = vec![None; n_outputs];
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn type_name(&self) -> &str {
        &self.descriptor.type_name
    }

    pub fn descriptor(&self) -> &Arc<OperatorDescriptor> {
        &self.descriptor
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, label: &str, direction: PortDirection) -> Option<&Port> {
        self.ports
            .iter()
            .find(|p| p.label == label && p.direction == direction)
    }

    /// Like [`Node::port`] but fails with [`Error::NoSuchPort`].
    pub fn require_port(&self, label: &str, direction: PortDirection) -> Result<&Port> {
        self.port(label, direction).ok_or_else(|| Error::NoSuchPort {
            node: self.id,
            port: label.to_string(),
        })
    }

    pub fn input_ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.direction == PortDirection::In)
    }

    pub fn output_ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.direction == PortDirection::Out)
    }

    /// Last value produced on output `label`.
    pub fn output(&self, label: &str) -> Option<&Arc<PortData>> {
        let idx = self.descriptor.output_index(label)?;
        self.outputs.get(idx).and_then(|o| o.as_ref())
    }

    /// Returns `true` when every output port holds a value.
    pub fn has_outputs(&self) -> bool {
        self.outputs.iter().all(|o| o.is_some())
    }

    pub(crate) fn set_outputs(&mut self, outputs: Vec<Option<Arc<PortData>>>) {
        self.outputs = outputs;
    }

    /// Drops cached outputs; they are reallocated by the next compute.
    pub fn clear_outputs(&mut self) {
        self.outputs.iter_mut().for_each(|o| *o = None);
    }

    /// Replaces every output with the empty value of its declared type.
    pub(crate) fn reset_outputs(&mut self, layout: HeightmapLayout) -> Result<()> {
        self.outputs = self
            .descriptor
            .outputs
            .iter()
            .map(|spec| PortData::empty(spec.data_type, layout).map(|d| Some(Arc::new(d))))
            .collect::<Result<_>>()?;
        Ok(())
    }
}
