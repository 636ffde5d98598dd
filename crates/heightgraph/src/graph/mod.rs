//! Graph model: nodes, typed links, ordering and dirty tracking.
//!
//! A [`Graph`] owns its nodes (keyed by [`NodeId`]) and its links (as a set). Every
//! mutation keeps three invariants: each link endpoint resolves to an existing port,
//! each IN port has at most one incoming link, and the link set is acyclic.
//!
//! Nodes are kept in insertion order; [`Graph::topological_sort`] uses that order to
//! break ties.
pub mod compute;
pub mod config;
pub mod layout;
pub mod link;
pub mod node;
pub mod snapshot;
mod topo;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use glam::Vec2;
use tracing::{debug, error, info};

pub use compute::{ComputeJob, ComputeOutcome};
pub use config::GraphConfig;
pub use link::Link;
pub use node::{Node, NodeId, Port, PortDirection};
pub use snapshot::{GraphSnapshot, NodeSnapshot};

use crate::data::PortData;
use crate::error::{Error, Result};
use crate::heightmap::{BackendTag, GpuRuntime};
use crate::ops::{registry, OperatorRegistry};

/// Default graph id used in documents.
pub const DEFAULT_GRAPH_ID: &str = "graph";

pub struct Graph {
    id: String,
    config: GraphConfig,
    registry: Arc<OperatorRegistry>,
    nodes: HashMap<NodeId, Node>,
    order: Vec<NodeId>,
    links: BTreeSet<Link>,
    next_id: u64,
    gpu: Option<Arc<dyn GpuRuntime>>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("nodes", &self.order)
            .field("links", &self.links)
            .finish_non_exhaustive()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(GraphConfig::default())
    }
}

impl Graph {
    /// Creates an empty graph using the process-wide operator registry.
    pub fn new(config: GraphConfig) -> Self {
        Self::with_registry(config, registry::global())
    }

    pub fn with_registry(config: GraphConfig, registry: Arc<OperatorRegistry>) -> Self {
        Self {
            id: DEFAULT_GRAPH_ID.to_string(),
            config,
            registry,
            nodes: HashMap::new(),
            order: Vec::new(),
            links: BTreeSet::new(),
            next_id: 0,
            gpu: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<OperatorRegistry> {
        &self.registry
    }

    /// Sets the GPU runtime used by nodes when the transform mode is GPU.
    pub fn set_gpu_runtime(&mut self, gpu: Option<Arc<dyn GpuRuntime>>) {
        self.gpu = gpu;
    }

    pub fn gpu_runtime(&self) -> Option<&Arc<dyn GpuRuntime>> {
        self.gpu.as_ref()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Like [`Graph::node`] but fails with [`Error::NoSuchNode`].
    pub fn require_node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(Error::NoSuchNode { id })
    }

    pub fn require_node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(Error::NoSuchNode { id })
    }

    /// Node ids in insertion order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.order.clone()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.iter()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn has_link(&self, link: &Link) -> bool {
        self.links.contains(link)
    }

    /// Returns `true` iff no node currently uses `id`.
    pub fn is_node_id_available(&self, id: NodeId) -> bool {
        !self.nodes.contains_key(&id)
    }

    /// The id the next [`Graph::add_node`] will use. Ids count up and are never reused.
    pub fn next_node_id(&self) -> NodeId {
        NodeId(self.next_id)
    }

    /// Creates a node of the given operator type with a fresh id.
    pub fn add_node(&mut self, type_name: &str) -> Result<NodeId> {
        let id = NodeId(self.next_id);
        self.add_node_with_id(type_name, id)
    }

    /// Creates a node with an explicit id, used when restoring or loading nodes.
    pub fn add_node_with_id(&mut self, type_name: &str, id: NodeId) -> Result<NodeId> {
        let rank = self.order.len();
        self.insert_node(type_name, id, rank)
    }

    /// Creates a node and places it at `rank` in the insertion order (clamped to the end).
    fn insert_node(&mut self, type_name: &str, id: NodeId, rank: usize) -> Result<NodeId> {
        let descriptor = self.registry.get(type_name)?;
        if !self.is_node_id_available(id) {
            return Err(Error::Other(format!("node id {id} is already in use")));
        }
        self.nodes.insert(id, Node::new(id, descriptor));
        self.order.insert(rank.min(self.order.len()), id);
        self.next_id = self.next_id.max(id.0 + 1);
        debug!("Added node {} ('{}').", id, type_name);
        Ok(id)
    }

    /// Removes every incident link, then the node. Returns the removed links.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Vec<Link>> {
        if !self.contains(id) {
            return Err(Error::NoSuchNode { id });
        }
        let incident: Vec<Link> = self.links.iter().filter(|l| l.touches(id)).cloned().collect();
        for link in &incident {
            self.links.remove(link);
            if link.from == id && self.contains(link.to) {
                self.mark_dirty(link.to);
            }
        }
        self.nodes.remove(&id);
        self.order.retain(|n| *n != id);
        debug!("Removed node {} and {} links.", id, incident.len());
        Ok(incident)
    }

    /// Connects `from.from_port` (OUT) to `to.to_port` (IN).
    ///
    /// Fails without mutating on a missing node or port ([`Error::NoSuchNode`],
    /// [`Error::NoSuchPort`]), differing data types ([`Error::TypeMismatch`]), an already
    /// connected IN port ([`Error::PortOccupied`]) or a link that would close a cycle
    /// ([`Error::WouldCycle`]). The target node and its descendants become dirty.
    pub fn new_link(
        &mut self,
        from: NodeId,
        from_port: &str,
        to: NodeId,
        to_port: &str,
    ) -> Result<Link> {
        let link = Link::new(from, from_port, to, to_port);
        if let Err(e) = self.check_link(&link) {
            debug!("Rejected link {}: {}", link, e);
            return Err(e);
        }
        self.links.insert(link.clone());
        self.mark_dirty(to);
        debug!("Added link {}.", link);
        Ok(link)
    }

    fn check_link(&self, link: &Link) -> Result<()> {
        let src = self
            .require_node(link.from)?
            .require_port(&link.from_port, PortDirection::Out)?;
        let dst = self
            .require_node(link.to)?
            .require_port(&link.to_port, PortDirection::In)?;
        if src.data_type != dst.data_type {
            return Err(Error::TypeMismatch(format!(
                "{} carries {}, {}.{} expects {}",
                link, src.data_type, link.to, link.to_port, dst.data_type
            )));
        }
        if self.link_into(link.to, &link.to_port).is_some() {
            return Err(Error::PortOccupied {
                node: link.to,
                port: link.to_port.clone(),
            });
        }
        if topo::reaches(link.to, link.from, &self.links) {
            return Err(Error::WouldCycle(link.to_string()));
        }
        Ok(())
    }

    /// Removes a link; fails with [`Error::NoSuchLink`] if absent. The target node and its
    /// descendants become dirty.
    pub fn remove_link(
        &mut self,
        from: NodeId,
        from_port: &str,
        to: NodeId,
        to_port: &str,
    ) -> Result<()> {
        let link = Link::new(from, from_port, to, to_port);
        if !self.links.remove(&link) {
            return Err(Error::NoSuchLink(link.to_string()));
        }
        self.mark_dirty(to);
        debug!("Removed link {}.", link);
        Ok(())
    }

    /// The link feeding IN port `to_port` of `to`, if any.
    pub fn link_into(&self, to: NodeId, to_port: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.to == to && l.to_port == to_port)
    }

    pub fn incoming(&self, id: NodeId) -> Vec<&Link> {
        self.links.iter().filter(|l| l.to == id).collect()
    }

    pub fn outgoing(&self, id: NodeId) -> Vec<&Link> {
        self.links.iter().filter(|l| l.from == id).collect()
    }

    /// Direct predecessors of `id`, deduplicated and sorted.
    pub fn upstream(&self, id: NodeId) -> Vec<NodeId> {
        let set: BTreeSet<NodeId> = self.incoming(id).into_iter().map(|l| l.from).collect();
        set.into_iter().collect()
    }

    /// Direct successors of `id`, deduplicated and sorted.
    pub fn downstream(&self, id: NodeId) -> Vec<NodeId> {
        let set: BTreeSet<NodeId> = self.outgoing(id).into_iter().map(|l| l.to).collect();
        set.into_iter().collect()
    }

    /// Orders `ids` so that every node comes after its dependencies. Ties follow node
    /// insertion order. Duplicates are dropped.
    pub fn topological_sort(&self, ids: &[NodeId]) -> Result<Vec<NodeId>> {
        let wanted: HashSet<NodeId> = ids.iter().copied().collect();
        if let Some(id) = wanted.iter().find(|id| !self.contains(**id)) {
            return Err(Error::NoSuchNode { id: *id });
        }
        Ok(topo::topo_sort(&self.order, &self.links)?
            .into_iter()
            .filter(|id| wanted.contains(id))
            .collect())
    }

    /// `id` and all its descendants, in evaluation order.
    pub fn get_nodes_to_update(&self, id: NodeId) -> Result<Vec<NodeId>> {
        if !self.contains(id) {
            return Err(Error::NoSuchNode { id });
        }
        let closure: Vec<NodeId> = topo::descendants(id, &self.links).into_iter().collect();
        self.topological_sort(&closure)
    }

    /// Marks `id` and all its descendants dirty. Unknown ids are ignored.
    pub fn mark_dirty(&mut self, id: NodeId) {
        if !self.contains(id) {
            return;
        }
        for n in topo::descendants(id, &self.links) {
            if let Some(node) = self.nodes.get_mut(&n) {
                node.dirty = true;
            }
        }
    }

    pub fn mark_all_dirty(&mut self) {
        self.nodes.values_mut().for_each(|n| n.dirty = true);
    }

    /// Dirty node ids in insertion order.
    pub fn dirty_ids(&self) -> Vec<NodeId> {
        self.nodes().filter(|n| n.dirty).map(|n| n.id()).collect()
    }

    /// The value currently read by IN port `port` of `id`: the upstream output it is linked to.
    pub fn input_data(&self, id: NodeId, port: &str) -> Option<Arc<PortData>> {
        let link = self.link_into(id, port)?;
        self.output_data(link.from, &link.from_port)
    }

    pub fn output_data(&self, id: NodeId, port: &str) -> Option<Arc<PortData>> {
        self.nodes.get(&id)?.output(port).cloned()
    }

    /// Swaps the graph configuration. Every node becomes dirty and drops its outputs.
    pub fn change_config_values(&mut self, config: GraphConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        for node in self.nodes.values_mut() {
            node.dirty = true;
            node.clear_outputs();
        }
        info!("Graph '{}' configuration changed: {:?}.", self.id, self.config.layout);
        Ok(())
    }

    /// Suggested scene positions from a layered layout.
    pub fn compute_graph_layout_sugiyama(&self) -> Result<BTreeMap<NodeId, Vec2>> {
        layout::sugiyama(&self.order, &self.links, layout::DEFAULT_SPACING)
    }

    /// Removes every node and link. Ids are not reused afterwards.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.order.clear();
        self.links.clear();
    }

    /// Captures `ids` with their positions, attributes and incident links.
    pub fn snapshot(&self, ids: &[NodeId]) -> Result<GraphSnapshot> {
        let wanted: HashSet<NodeId> = ids.iter().copied().collect();
        for id in &wanted {
            self.require_node(*id)?;
        }
        let nodes = self
            .nodes()
            .enumerate()
            .filter(|(_, n)| wanted.contains(&n.id()))
            .map(|(rank, n)| NodeSnapshot {
                id: n.id(),
                type_name: n.type_name().to_string(),
                position: n.position,
                attributes: n.attributes.to_json(),
                rank,
            })
            .collect();
        let mut snapshot = GraphSnapshot {
            nodes,
            ..Default::default()
        };
        for link in &self.links {
            match (wanted.contains(&link.from), wanted.contains(&link.to)) {
                (true, true) => snapshot.internal_links.push(link.clone()),
                (true, false) | (false, true) => snapshot.external_links.push(link.clone()),
                (false, false) => {}
            }
        }
        Ok(snapshot)
    }

    /// Rebuilds captured nodes under their original ids and insertion ranks: nodes first,
    /// then internal links, then external links. On error the graph is left as it was.
    pub fn restore(&mut self, snapshot: &GraphSnapshot) -> Result<()> {
        let mut added = Vec::with_capacity(snapshot.nodes.len());
        let result = self.restore_into(snapshot, &mut added);
        if result.is_err() {
            for id in added.into_iter().rev() {
                let _ = self.remove_node(id);
            }
        }
        result
    }

    fn restore_into(&mut self, snapshot: &GraphSnapshot, added: &mut Vec<NodeId>) -> Result<()> {
        let mut nodes: Vec<&NodeSnapshot> = snapshot.nodes.iter().collect();
        nodes.sort_by_key(|n| n.rank);
        for n in nodes {
            self.insert_node(&n.type_name, n.id, n.rank)?;
            added.push(n.id);
            let node = self.require_node_mut(n.id)?;
            node.position = n.position;
            node.attributes.load_json(&n.attributes)?;
        }
        for link in snapshot.internal_links.iter().chain(&snapshot.external_links) {
            self.new_link(link.from, &link.from_port, link.to, &link.to_port)?;
        }
        Ok(())
    }

    /// Captures what computing `id` needs: attributes, input values and configuration.
    pub fn prepare_compute(&self, id: NodeId) -> Result<ComputeJob> {
        let node = self.require_node(id)?;
        let descriptor = node.descriptor().clone();
        let inputs = descriptor
            .inputs
            .iter()
            .map(|spec| self.input_data(id, &spec.label))
            .collect();
        Ok(ComputeJob {
            node_id: id,
            descriptor,
            attributes: node.attributes.clone(),
            config: self.config,
            inputs,
            gpu: self.gpu.clone(),
        })
    }

    /// Stores a compute outcome on its node and dirties the node's descendants.
    ///
    /// `keep_dirty` leaves the node itself dirty (used when a cancel arrived during the
    /// compute). A failed compute is logged, stored as empty outputs with
    /// [`BackendTag::None`], leaves the node dirty and is returned as the error.
    pub fn apply_outcome(&mut self, outcome: ComputeOutcome, keep_dirty: bool) -> Result<()> {
        let ComputeOutcome {
            node_id,
            elapsed_ms,
            backend,
            outputs,
            error,
        } = outcome;
        let node = self.require_node_mut(node_id)?;
        node.set_outputs(outputs.into_iter().map(Some).collect());
        node.last_time_ms = elapsed_ms;
        node.last_backend = backend;
        node.dirty = keep_dirty || error.is_some();
        let type_name = node.type_name().to_string();

        for child in self.downstream(node_id) {
            self.mark_dirty(child);
        }

        match error {
            Some(e) => {
                error!("Compute failed on node {} ('{}'): {}", node_id, type_name, e);
                Err(e)
            }
            None => Ok(()),
        }
    }

    /// Synchronously recomputes `id` alone, regardless of its dirty flag.
    pub fn update(&mut self, id: NodeId) -> Result<BackendTag> {
        self.compute_node(id)
    }

    /// Computes one node in place and returns the backend that ran it.
    pub fn compute_node(&mut self, id: NodeId) -> Result<BackendTag> {
        let outcome = self.prepare_compute(id)?.run();
        let backend = outcome.backend;
        self.apply_outcome(outcome, false)?;
        Ok(backend)
    }

    /// Synchronously computes the dirty nodes among `ids`, in evaluation order.
    pub fn compute_all(&mut self, ids: &[NodeId]) -> Result<()> {
        for id in self.topological_sort(ids)? {
            let needs = self.require_node(id).map(|n| n.dirty || !n.has_outputs())?;
            if needs {
                // Failures are logged and stored as empty outputs.
                let _ = self.compute_node(id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataType;
    use crate::heightmap::HeightmapLayout;

    fn graph() -> Graph {
        let config = GraphConfig::default().with_layout(HeightmapLayout::new((16, 16), (2, 2), 1));
        Graph::with_registry(config, Arc::new(OperatorRegistry::builtin()))
    }

    fn chain(g: &mut Graph) -> (NodeId, NodeId, NodeId) {
        let a = g.add_node("ConstantHeightmap").expect("builtin");
        let b = g.add_node("RemapRange").expect("builtin");
        let c = g.add_node("Invert").expect("builtin");
        g.new_link(a, "out", b, "in").expect("a -> b");
        g.new_link(b, "out", c, "in").expect("b -> c");
        (a, b, c)
    }

    #[test]
    fn add_node_unknown_operator_fails() {
        let mut g = graph();
        assert!(matches!(
            g.add_node("GlacierFormation"),
            Err(Error::UnknownOperator { .. })
        ));
        assert!(g.is_empty());
    }

    #[test]
    fn ids_are_never_reused() {
        let mut g = graph();
        let a = g.add_node("Invert").expect("builtin");
        g.remove_node(a).expect("exists");
        let b = g.add_node("Invert").expect("builtin");
        assert_ne!(a, b);
        assert!(g.is_node_id_available(a));
        assert!(!g.is_node_id_available(b));
    }

    #[test]
    fn add_node_with_taken_id_fails() {
        let mut g = graph();
        let a = g.add_node("Invert").expect("builtin");
        assert!(g.add_node_with_id("Invert", a).is_err());
        let b = g.add_node_with_id("Invert", NodeId(10)).expect("free id");
        assert_eq!(b, NodeId(10));
        assert_eq!(g.add_node("Invert").expect("builtin"), NodeId(11));
    }

    #[test]
    fn new_link_validates_without_mutating() {
        let mut g = graph();
        let (a, b, c) = chain(&mut g);
        let cloud = g.add_node("CloudRandom").expect("builtin");
        let before: Vec<Link> = g.links().cloned().collect();

        assert!(matches!(
            g.new_link(c, "out", a, "in"),
            Err(Error::NoSuchPort { .. })
        ));
        assert!(matches!(
            g.new_link(c, "out", b, "in"),
            Err(Error::PortOccupied { .. })
        ));
        assert!(matches!(
            g.new_link(cloud, "cloud", c, "in"),
            Err(Error::PortOccupied { .. }) | Err(Error::TypeMismatch(_))
        ));
        let d = g.add_node("Invert").expect("builtin");
        assert!(matches!(
            g.new_link(cloud, "cloud", d, "in"),
            Err(Error::TypeMismatch(_))
        ));
        assert!(matches!(
            g.new_link(a, "nope", d, "in"),
            Err(Error::NoSuchPort { .. })
        ));
        assert!(matches!(
            g.new_link(NodeId(99), "out", d, "in"),
            Err(Error::NoSuchNode { .. })
        ));
        let after: Vec<Link> = g.links().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn cycle_is_rejected() {
        let mut g = graph();
        let blend = g.add_node("Blend").expect("builtin");
        let inv = g.add_node("Invert").expect("builtin");
        g.new_link(blend, "out", inv, "in").expect("blend -> inv");
        let err = g
            .new_link(inv, "out", blend, "input 1")
            .expect_err("closes a cycle");
        assert!(matches!(err, Error::WouldCycle(_)));
        assert_eq!(g.link_count(), 1);
        assert!(matches!(
            g.new_link(blend, "out", blend, "input 2"),
            Err(Error::WouldCycle(_))
        ));
    }

    #[test]
    fn remove_link_absent_fails() {
        let mut g = graph();
        let (a, b, _) = chain(&mut g);
        g.remove_link(a, "out", b, "in").expect("present");
        assert!(matches!(
            g.remove_link(a, "out", b, "in"),
            Err(Error::NoSuchLink(_))
        ));
    }

    #[test]
    fn remove_node_drops_incident_links() {
        let mut g = graph();
        let (a, b, c) = chain(&mut g);
        let removed = g.remove_node(b).expect("exists");
        assert_eq!(removed.len(), 2);
        assert_eq!(g.link_count(), 0);
        assert_eq!(g.node_ids(), vec![a, c]);
        assert!(matches!(g.remove_node(b), Err(Error::NoSuchNode { .. })));
    }

    #[test]
    fn topological_sort_respects_links_and_insertion_order() {
        let mut g = graph();
        let inv = g.add_node("Invert").expect("builtin");
        let k = g.add_node("ConstantHeightmap").expect("builtin");
        let lone = g.add_node("Noise").expect("builtin");
        g.new_link(k, "out", inv, "in").expect("k -> inv");
        let sorted = g.topological_sort(&g.node_ids()).expect("acyclic");
        assert_eq!(sorted, vec![k, inv, lone]);
        assert!(matches!(
            g.topological_sort(&[NodeId(42)]),
            Err(Error::NoSuchNode { .. })
        ));
    }

    #[test]
    fn nodes_to_update_is_downstream_closure() {
        let mut g = graph();
        let (a, b, c) = chain(&mut g);
        let other = g.add_node("Noise").expect("builtin");
        assert_eq!(g.get_nodes_to_update(a).expect("exists"), vec![a, b, c]);
        assert_eq!(g.get_nodes_to_update(b).expect("exists"), vec![b, c]);
        assert_eq!(g.get_nodes_to_update(other).expect("exists"), vec![other]);
    }

    #[test]
    fn compute_propagates_values_and_dirty_flags() {
        let mut g = graph();
        let (a, b, c) = chain(&mut g);
        g.compute_all(&g.node_ids()).expect("sorted");
        assert!(g.dirty_ids().is_empty());

        let out = g.output_data(b, "out").expect("computed");
        assert_eq!(out.data_type(), DataType::Heightmap);
        assert!(out.as_field().expect("field").values().all(|v| v == 0.5));
        assert_eq!(g.node(a).map(|n| n.last_backend), Some(BackendTag::Cpu));

        g.mark_dirty(b);
        assert_eq!(g.dirty_ids(), vec![b, c]);
    }

    #[test]
    fn unconnected_input_yields_empty_output() {
        let mut g = graph();
        let mask = g.add_node("SelectRange").expect("builtin");
        g.update(mask).expect("computes");
        let out = g.output_data(mask, "mask").expect("empty mask");
        assert_eq!(out.data_type(), DataType::Mask);
        assert_eq!(out.as_field().map(|h| h.max()), Some(0.0));
    }

    #[test]
    fn change_config_dirties_and_resets_outputs() {
        let mut g = graph();
        let (a, _, _) = chain(&mut g);
        g.compute_all(&g.node_ids()).expect("sorted");
        let config = GraphConfig::default().with_layout(HeightmapLayout::new((8, 8), (1, 1), 0));
        g.change_config_values(config).expect("valid");
        assert_eq!(g.dirty_ids().len(), 3);
        assert!(g.output_data(a, "out").is_none());

        let bad = GraphConfig::default().with_layout(HeightmapLayout::new((7, 8), (2, 1), 0));
        assert!(matches!(
            g.change_config_values(bad),
            Err(Error::InvalidConfig(_))
        ));
        assert_eq!(g.config().layout.shape, (8, 8));
    }

    #[test]
    fn snapshot_and_restore_rebuild_nodes_and_links() {
        let mut g = graph();
        let (a, b, c) = chain(&mut g);
        g.node_mut(b).expect("exists").position = Vec2::new(3.0, 4.0);
        let snapshot = g.snapshot(&[b]).expect("exists");
        assert!(snapshot.internal_links.is_empty());
        assert_eq!(snapshot.external_links.len(), 2);

        g.remove_node(b).expect("exists");
        assert_eq!(g.node_ids(), vec![a, c]);
        g.restore(&snapshot).expect("restorable");
        assert_eq!(g.node_ids(), vec![a, b, c]);
        assert!(g.has_link(&Link::new(a, "out", b, "in")));
        assert!(g.has_link(&Link::new(b, "out", c, "in")));
        assert_eq!(g.node(b).map(|n| n.position), Some(Vec2::new(3.0, 4.0)));
    }

    #[test]
    fn failed_restore_leaves_graph_untouched() {
        let mut g = graph();
        let (a, b, c) = chain(&mut g);
        let mut snapshot = g.snapshot(&[b]).expect("exists");
        g.remove_node(b).expect("exists");
        snapshot.external_links.push(Link::new(b, "out", c, "missing"));

        assert!(g.restore(&snapshot).is_err());
        assert_eq!(g.node_ids(), vec![a, c]);
        assert_eq!(g.link_count(), 0);
    }

    #[test]
    fn sugiyama_places_chain_left_to_right() {
        let mut g = graph();
        let (a, b, c) = chain(&mut g);
        let pos = g.compute_graph_layout_sugiyama().expect("acyclic");
        assert!(pos[&a].x < pos[&b].x && pos[&b].x < pos[&c].x);
    }
}
