//! Coordination of user intents: validate, mutate, record, dispatch.
//!
//! A [`GraphController`] owns a shared [`Graph`], its [`UndoStack`] and at most one
//! running [`ComputeWorker`]. Every mutating intent first settles the running batch
//! according to [`BusyPolicy`], applies its change, pushes the matching [`Command`] and
//! hands the affected nodes to a new worker. Scheduler events arrive on a channel
//! drained with [`GraphController::drain_events`] or read from
//! [`GraphController::events`].
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use glam::Vec2;
use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use tracing::{debug, info};

use crate::attribute::AttrValue;
use crate::error::{Error, Result};
use crate::graph::{Graph, GraphConfig, Link, NodeId, PortDirection};
use crate::history::{Command, UndoStack, DEFAULT_UNDO_LIMIT};
use crate::io::{json_from, json_to, GraphDocument};
use crate::scheduler::{BatchReport, ChannelSink, ComputeEvent, ComputeWorker, WorkerHandle};

/// What a mutating intent does while a batch is running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BusyPolicy {
    /// Cancel the batch, wait for its current node, then mutate.
    #[default]
    CancelAndJoin,
    /// Fail with [`Error::Busy`] and leave everything untouched.
    Reject,
}

/// Configuration for a [`GraphController`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Maximum number of undo entries.
    pub undo_limit: usize,
    pub busy_policy: BusyPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            undo_limit: DEFAULT_UNDO_LIMIT,
            busy_policy: BusyPolicy::default(),
        }
    }
}

impl ControllerConfig {
    pub fn with_undo_limit(mut self, undo_limit: usize) -> Self {
        self.undo_limit = undo_limit;
        self
    }

    pub fn with_busy_policy(mut self, busy_policy: BusyPolicy) -> Self {
        self.busy_policy = busy_policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.undo_limit == 0 {
            return Err(Error::InvalidConfig("undo_limit must be at least 1".into()));
        }
        Ok(())
    }
}

pub struct GraphController {
    graph: Arc<Mutex<Graph>>,
    config: ControllerConfig,
    history: UndoStack,
    worker: Option<WorkerHandle>,
    /// Evaluation order of the running batch.
    in_flight: Vec<NodeId>,
    /// Nodes a cancelled batch left dirty; merged into the next dispatch.
    carried: BTreeSet<NodeId>,
    last_report: Option<BatchReport>,
    events_tx: Sender<ComputeEvent>,
    events_rx: Receiver<ComputeEvent>,
    last_node_created_id: Option<NodeId>,
}

impl GraphController {
    pub fn new(graph: Graph) -> Self {
        let config = ControllerConfig::default();
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            graph: Arc::new(Mutex::new(graph)),
            history: UndoStack::new(config.undo_limit),
            config,
            worker: None,
            in_flight: Vec::new(),
            carried: BTreeSet::new(),
            last_report: None,
            events_tx,
            events_rx,
            last_node_created_id: None,
        }
    }

    pub fn with_config(graph: Graph, config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        let mut controller = Self::new(graph);
        controller.history = UndoStack::new(config.undo_limit);
        controller.config = config;
        Ok(controller)
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Shared handle to the graph. Lock it briefly; the worker needs it between nodes.
    pub fn graph(&self) -> &Arc<Mutex<Graph>> {
        &self.graph
    }

    /// Locks the graph for reading or presentational edits.
    pub fn lock(&self) -> MutexGuard<'_, Graph> {
        self.graph.lock()
    }

    pub fn history(&self) -> &UndoStack {
        &self.history
    }

    pub fn last_node_created_id(&self) -> Option<NodeId> {
        self.last_node_created_id
    }

    /// Report of the last batch that was joined.
    pub fn last_report(&self) -> Option<&BatchReport> {
        self.last_report.as_ref()
    }

    pub fn is_computing(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Receiver of scheduler events, for blocking reads.
    pub fn events(&self) -> &Receiver<ComputeEvent> {
        &self.events_rx
    }

    /// Takes every event queued so far.
    pub fn drain_events(&self) -> Vec<ComputeEvent> {
        self.events_rx.try_iter().collect()
    }

    /// Requests cancellation of the running batch without waiting for it.
    pub fn cancel(&self) {
        if let Some(worker) = &self.worker {
            worker.cancel();
        }
    }

    /// Blocks until the running batch ends.
    pub fn wait(&mut self) -> Result<Option<BatchReport>> {
        let Some(worker) = self.worker.take() else {
            return Ok(None);
        };
        let report = worker.join()?;
        self.settle(report.clone());
        Ok(Some(report))
    }

    /// Records a joined batch. When it was cancelled, its still-dirty nodes are kept for
    /// the next dispatch; failed nodes are not retried.
    fn settle(&mut self, report: BatchReport) {
        let in_flight = std::mem::take(&mut self.in_flight);
        if report.cancelled {
            let g = self.graph.lock();
            let left: Vec<NodeId> = in_flight
                .into_iter()
                .filter(|id| !report.failed.contains(id))
                .filter(|id| g.node(*id).is_some_and(|n| n.dirty))
                .collect();
            if !left.is_empty() {
                debug!("Carrying {} unfinished nodes to the next dispatch.", left.len());
            }
            self.carried.extend(left);
        }
        self.last_report = Some(report);
    }

    /// Settles the running batch before a mutation, per the busy policy.
    fn ready(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        if !worker.is_finished() {
            if self.config.busy_policy == BusyPolicy::Reject {
                self.worker = Some(worker);
                debug!("Rejecting intent: a compute batch is running.");
                return Err(Error::Busy);
            }
            debug!("Cancelling the running compute batch.");
            worker.cancel();
        }
        let report = worker.join()?;
        self.settle(report);
        Ok(())
    }

    /// Computes `ids` plus every ancestor lacking valid outputs, in evaluation order.
    /// Nodes left over by a cancelled batch join the dispatch.
    fn dispatch(&mut self, ids: &[NodeId]) -> Result<()> {
        let carried = std::mem::take(&mut self.carried);
        let sorted = {
            let g = self.graph.lock();
            let mut wanted: BTreeSet<NodeId> = ids
                .iter()
                .copied()
                .chain(carried)
                .filter(|id| g.contains(*id))
                .collect();
            let mut stack: Vec<NodeId> = wanted.iter().copied().collect();
            let mut seen: HashSet<NodeId> = wanted.iter().copied().collect();
            while let Some(id) = stack.pop() {
                for parent in g.upstream(id) {
                    if !seen.insert(parent) {
                        continue;
                    }
                    stack.push(parent);
                    if g.node(parent).is_some_and(|n| n.dirty || !n.has_outputs()) {
                        wanted.insert(parent);
                    }
                }
            }
            let wanted: Vec<NodeId> = wanted.into_iter().collect();
            g.topological_sort(&wanted)?
        };
        if sorted.is_empty() {
            return Ok(());
        }
        debug!("Dispatching {} nodes.", sorted.len());
        let sink = ChannelSink::new(self.events_tx.clone());
        self.worker = Some(ComputeWorker::spawn(
            Arc::downgrade(&self.graph),
            sorted.clone(),
            sink,
        )?);
        self.in_flight = sorted;
        Ok(())
    }

    /// Dispatches `id` and its descendants.
    fn dispatch_from(&mut self, id: NodeId) -> Result<()> {
        let ids = self.graph.lock().get_nodes_to_update(id)?;
        self.dispatch(&ids)
    }

    /// Dispatches the union of the descendant closures of `ids`.
    fn dispatch_stale(&mut self, ids: &[NodeId]) -> Result<()> {
        let closure = {
            let mut g = self.graph.lock();
            let mut closure = BTreeSet::new();
            for &id in ids {
                if g.contains(id) {
                    g.mark_dirty(id);
                    closure.extend(g.get_nodes_to_update(id)?);
                }
            }
            closure.into_iter().collect::<Vec<_>>()
        };
        self.dispatch(&closure)
    }

    /// Creates a node at `position`. It is not computed until something links into or
    /// reloads it.
    pub fn new_node(&mut self, type_name: &str, position: Vec2) -> Result<NodeId> {
        self.ready()?;
        let (id, attributes) = {
            let mut g = self.graph.lock();
            let id = g.add_node(type_name)?;
            let node = g.require_node_mut(id)?;
            node.position = position;
            (id, node.attributes.to_json())
        };
        self.history.push(Command::AddNode {
            id,
            type_name: type_name.to_string(),
            position,
            attributes,
        });
        self.last_node_created_id = Some(id);
        Ok(id)
    }

    /// Links `from.from_port` to `to.to_port` and recomputes from `to`. A rejected link
    /// leaves graph, history and scheduler untouched.
    pub fn new_link(&mut self, from: NodeId, from_port: &str, to: NodeId, to_port: &str) -> Result<Link> {
        self.ready()?;
        let link = self.graph.lock().new_link(from, from_port, to, to_port)?;
        self.history.push(Command::AddLink(link.clone()));
        self.dispatch_from(to)?;
        Ok(link)
    }

    /// Removes `link`. Unless `prevent_graph_update` is set, the downstream node is
    /// recomputed.
    pub fn remove_link(&mut self, link: &Link, prevent_graph_update: bool) -> Result<()> {
        self.ready()?;
        self.graph
            .lock()
            .remove_link(link.from, &link.from_port, link.to, &link.to_port)?;
        self.history.push(Command::RemoveLink(link.clone()));
        if !prevent_graph_update {
            self.dispatch_from(link.to)?;
        }
        Ok(())
    }

    /// Deletes `ids` with all their links; the nodes they fed are recomputed.
    pub fn delete_selected(&mut self, ids: &[NodeId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.ready()?;
        let (cmd, stale) = {
            let mut g = self.graph.lock();
            let cmd = Command::DeleteNodes {
                snapshot: g.snapshot(ids)?,
            };
            let stale = cmd.redo(&mut g)?;
            (cmd, stale)
        };
        info!("Deleted {} nodes.", ids.len());
        self.history.push(cmd);
        self.dispatch_stale(&stale)
    }

    /// Splices `dropped` into `link`: the link is replaced by `link.from -> dropped` and
    /// `dropped -> link.to` through the first IN port matching the source type and the
    /// first OUT port matching the sink type. Returns `false` (and changes nothing) when
    /// no such pair of ports exists.
    pub fn drop_node_on_link(&mut self, dropped: NodeId, link: &Link) -> Result<bool> {
        self.ready()?;
        let cmd = {
            let mut g = self.graph.lock();
            if !g.has_link(link) {
                return Err(Error::NoSuchLink(link.to_string()));
            }
            if dropped == link.from || dropped == link.to {
                return Ok(false);
            }
            let src_type = g
                .require_node(link.from)?
                .require_port(&link.from_port, PortDirection::Out)?
                .data_type;
            let dst_type = g
                .require_node(link.to)?
                .require_port(&link.to_port, PortDirection::In)?
                .data_type;
            let node = g.require_node(dropped)?;
            let port_in = node.input_ports().find(|p| p.data_type == src_type);
            let port_out = node.output_ports().find(|p| p.data_type == dst_type);
            let (Some(port_in), Some(port_out)) = (port_in, port_out) else {
                debug!("Node {} has no ports matching {}.", dropped, link);
                return Ok(false);
            };
            let cmd = Command::Batch {
                label: "insert node on link".into(),
                commands: vec![
                    Command::RemoveLink(link.clone()),
                    Command::AddLink(Link::new(link.from, link.from_port.clone(), dropped, port_in.label.clone())),
                    Command::AddLink(Link::new(dropped, port_out.label.clone(), link.to, link.to_port.clone())),
                ],
            };
            cmd.redo(&mut g)?;
            cmd
        };
        self.history.push(cmd);
        self.dispatch_from(dropped)?;
        Ok(true)
    }

    /// Sets attribute `key` of `node_id`. Returns `false` when the stored value did not
    /// change (after clamping), in which case nothing is recorded or recomputed.
    pub fn change_attribute(&mut self, node_id: NodeId, key: &str, value: AttrValue) -> Result<bool> {
        self.ready()?;
        let cmd = {
            let mut g = self.graph.lock();
            let node = g.require_node_mut(node_id)?;
            let old = node.attributes.to_json();
            node.attributes
                .get_mut(key)
                .ok_or_else(|| Error::NoSuchAttribute {
                    node: node_id,
                    key: key.to_string(),
                })?
                .set(key, value)?;
            let new = node.attributes.to_json();
            if old == new {
                return Ok(false);
            }
            g.mark_dirty(node_id);
            Command::PropertyChange { node_id, old, new }
        };
        self.history.push(cmd);
        self.dispatch_from(node_id)?;
        Ok(true)
    }

    /// Moves nodes to new scene positions. Positions are never read by compute, so this
    /// does not wait for a running batch. Consecutive moves of the same selection merge
    /// into one undo entry.
    pub fn move_nodes(&mut self, positions: &[(NodeId, Vec2)]) -> Result<()> {
        let moves = {
            let mut g = self.graph.lock();
            for (id, _) in positions {
                g.require_node(*id)?;
            }
            let mut moves = Vec::with_capacity(positions.len());
            for &(id, to) in positions {
                let node = g.require_node_mut(id)?;
                moves.push((id, node.position, to));
                node.position = to;
            }
            moves
        };
        if !moves.is_empty() {
            self.history.push(Command::MoveNodes { moves });
        }
        Ok(())
    }

    /// Repositions every node with the layered layout, as one undoable move.
    pub fn auto_layout(&mut self) -> Result<()> {
        let positions: Vec<(NodeId, Vec2)> = self
            .graph
            .lock()
            .compute_graph_layout_sugiyama()?
            .into_iter()
            .collect();
        self.move_nodes(&positions)
    }

    /// Serialises `ids` and the links among them.
    pub fn copy(&self, ids: &[NodeId]) -> Result<Value> {
        let g = self.graph.lock();
        for id in ids {
            g.require_node(*id)?;
        }
        GraphDocument::from_graph(&g, Some(ids)).to_value()
    }

    /// Inserts the nodes of a graph document under fresh ids, shifted so that the
    /// top-left corner of their bounding box lands on `anchor`. Links among the pasted
    /// nodes are rebuilt; links to nodes outside the document are dropped. The whole
    /// paste is one undo entry and all pasted nodes are computed. Returns the new ids
    /// in document order.
    pub fn paste(&mut self, json: &Value, anchor: Vec2) -> Result<Vec<NodeId>> {
        let doc = GraphDocument::from_value(json)?;
        if doc.nodes.is_empty() {
            return Ok(Vec::new());
        }
        self.ready()?;
        let source_ids = doc.resolve_ids()?;
        let origin = doc
            .nodes
            .iter()
            .map(|n| n.position())
            .fold(Vec2::splat(f32::INFINITY), Vec2::min);
        let offset = anchor - origin;

        let (cmd, new_ids) = {
            let mut g = self.graph.lock();
            let first = g.next_node_id().0;
            let remap: HashMap<NodeId, NodeId> = source_ids
                .iter()
                .enumerate()
                .map(|(k, &old)| (old, NodeId(first + k as u64)))
                .collect();
            let mut commands: Vec<Command> = doc
                .nodes
                .iter()
                .zip(&source_ids)
                .map(|(record, old)| Command::AddNode {
                    id: remap[old],
                    type_name: record.type_name.clone(),
                    position: record.position() + offset,
                    attributes: record.settings.clone(),
                })
                .collect();
            commands.extend(doc.links.iter().filter_map(|l| {
                let from = *remap.get(&l.node_out_id)?;
                let to = *remap.get(&l.node_in_id)?;
                Some(Command::AddLink(Link::new(from, l.port_out_id.clone(), to, l.port_in_id.clone())))
            }));
            let cmd = Command::Batch {
                label: "paste".into(),
                commands,
            };
            cmd.redo(&mut g)?;
            let new_ids: Vec<NodeId> = source_ids.iter().map(|old| remap[old]).collect();
            for id in &new_ids {
                g.mark_dirty(*id);
            }
            (cmd, new_ids)
        };
        info!("Pasted {} nodes.", new_ids.len());
        self.history.push(cmd);
        self.dispatch(&new_ids)?;
        Ok(new_ids)
    }

    /// Recomputes `id` and its descendants.
    pub fn reload_node(&mut self, id: NodeId) -> Result<()> {
        self.ready()?;
        self.graph.lock().require_node(id)?;
        self.dispatch_stale(&[id])
    }

    /// Recomputes the whole graph.
    pub fn reload_all(&mut self) -> Result<()> {
        self.ready()?;
        let ids = {
            let mut g = self.graph.lock();
            g.mark_all_dirty();
            g.node_ids()
        };
        self.dispatch(&ids)
    }

    /// Reverts the last entry and recomputes what it made stale. Returns `false` when
    /// there was nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        self.ready()?;
        let stale = self.history.undo(&mut self.graph.lock())?;
        match stale {
            Some(stale) => {
                self.dispatch_stale(&stale)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Re-applies the next entry and recomputes what it made stale.
    pub fn redo(&mut self) -> Result<bool> {
        self.ready()?;
        let stale = self.history.redo(&mut self.graph.lock())?;
        match stale {
            Some(stale) => {
                self.dispatch_stale(&stale)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Replaces the graph with a document and computes it in one batch. History is
    /// cleared. On error the current graph is kept.
    pub fn load_json(&mut self, value: &Value) -> Result<()> {
        self.ready()?;
        let order = json_from(&mut self.graph.lock(), value)?;
        self.history.clear();
        self.last_node_created_id = None;
        self.dispatch(&order)
    }

    pub fn save_json(&self) -> Result<Value> {
        json_to(&self.graph.lock())
    }

    /// Applies a new graph configuration and recomputes everything.
    pub fn change_config_values(&mut self, config: GraphConfig) -> Result<()> {
        self.ready()?;
        let ids = {
            let mut g = self.graph.lock();
            g.change_config_values(config)?;
            g.node_ids()
        };
        self.dispatch(&ids)
    }
}

impl std::fmt::Debug for GraphController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphController")
            .field("config", &self.config)
            .field("history_len", &self.history.len())
            .field("computing", &self.is_computing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightmap::HeightmapLayout;
    use crate::ops::OperatorRegistry;

    fn controller() -> GraphController {
        let config = GraphConfig::default().with_layout(HeightmapLayout::new((16, 16), (2, 2), 1));
        GraphController::new(Graph::with_registry(config, Arc::new(OperatorRegistry::builtin())))
    }

    fn settle(c: &mut GraphController) -> Vec<ComputeEvent> {
        c.wait().expect("worker joins");
        c.drain_events()
    }

    #[test]
    fn config_validation() {
        assert!(ControllerConfig::default().with_undo_limit(0).validate().is_err());
        let c = GraphController::with_config(
            Graph::default(),
            ControllerConfig::default().with_undo_limit(3),
        )
        .expect("valid config");
        assert_eq!(c.history().limit(), 3);
    }

    #[test]
    fn new_node_records_without_computing() {
        let mut c = controller();
        let a = c.new_node("Noise", Vec2::new(1.0, 2.0)).expect("builtin");
        assert_eq!(c.last_node_created_id(), Some(a));
        assert!(!c.is_computing());
        assert!(c.drain_events().is_empty());
        assert_eq!(c.lock().node(a).map(|n| n.position), Some(Vec2::new(1.0, 2.0)));
        assert!(c.history().can_undo());
        assert!(matches!(c.new_node("Nope", Vec2::ZERO), Err(Error::UnknownOperator { .. })));
    }

    #[test]
    fn new_link_computes_dirty_upstream_first() {
        let mut c = controller();
        let a = c.new_node("ConstantHeightmap", Vec2::ZERO).expect("builtin");
        let b = c.new_node("Invert", Vec2::ZERO).expect("builtin");
        c.new_link(a, "out", b, "in").expect("link");
        let events = settle(&mut c);
        let started: Vec<NodeId> = events
            .iter()
            .filter_map(|e| match e {
                ComputeEvent::NodeComputeStarted { node_id } => Some(*node_id),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec![a, b]);
        assert!(c.lock().dirty_ids().is_empty());
    }

    #[test]
    fn rejected_link_pushes_nothing() {
        let mut c = controller();
        let a = c.new_node("ConstantHeightmap", Vec2::ZERO).expect("builtin");
        let m = c.new_node("CloudToHeightmap", Vec2::ZERO).expect("builtin");
        let before = c.history().len();
        assert!(matches!(c.new_link(a, "out", m, "cloud"), Err(Error::TypeMismatch(_))));
        assert_eq!(c.history().len(), before);
        assert!(!c.is_computing());
    }

    #[test]
    fn unchanged_attribute_is_not_recorded() {
        let mut c = controller();
        let a = c.new_node("ConstantHeightmap", Vec2::ZERO).expect("builtin");
        let len = c.history().len();
        assert!(!c.change_attribute(a, "value", AttrValue::Float(0.5)).expect("valid"));
        assert_eq!(c.history().len(), len);
        assert!(c.change_attribute(a, "value", AttrValue::Float(0.25)).expect("valid"));
        assert_eq!(c.history().len(), len + 1);
        settle(&mut c);
        assert!(matches!(
            c.change_attribute(a, "missing", AttrValue::Float(1.0)),
            Err(Error::NoSuchAttribute { .. })
        ));
    }

    #[test]
    fn moves_merge_and_undo() {
        let mut c = controller();
        let a = c.new_node("Noise", Vec2::ZERO).expect("builtin");
        c.move_nodes(&[(a, Vec2::new(5.0, 0.0))]).expect("move");
        c.move_nodes(&[(a, Vec2::new(9.0, 0.0))]).expect("move");
        assert_eq!(c.history().len(), 2);
        assert!(c.undo().expect("undo"));
        assert_eq!(c.lock().node(a).map(|n| n.position), Some(Vec2::ZERO));
    }

    #[test]
    fn reject_policy_reports_busy() {
        let config = ControllerConfig::default().with_busy_policy(BusyPolicy::Reject);
        let graph = Graph::with_registry(
            GraphConfig::default().with_layout(HeightmapLayout::new((64, 64), (4, 4), 2)),
            Arc::new(OperatorRegistry::builtin()),
        );
        let mut c = GraphController::with_config(graph, config).expect("valid");
        let a = c.new_node("Noise", Vec2::ZERO).expect("builtin");
        c.reload_node(a).expect("dispatch");
        // Either the batch is still running (Busy) or it already ended (accepted).
        match c.new_node("Invert", Vec2::ZERO) {
            Err(Error::Busy) => assert_eq!(c.history().len(), 1),
            Ok(_) => assert_eq!(c.history().len(), 2),
            Err(e) => panic!("unexpected error: {e}"),
        }
        c.wait().expect("joins");
    }

    #[test]
    fn save_and_load_roundtrip_clears_history() {
        let mut c = controller();
        let a = c.new_node("ConstantHeightmap", Vec2::ZERO).expect("builtin");
        let b = c.new_node("RemapRange", Vec2::ZERO).expect("builtin");
        c.new_link(a, "out", b, "in").expect("link");
        settle(&mut c);
        let doc = c.save_json().expect("serialise");

        let mut d = controller();
        d.load_json(&doc).expect("load");
        assert!(!d.history().can_undo());
        let events = settle(&mut d);
        assert_eq!(events.last().map(|e| e.is_batch_end()), Some(true));
        assert_eq!(d.save_json().expect("serialise"), doc);
    }
}
