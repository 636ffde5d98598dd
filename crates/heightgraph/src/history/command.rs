//! Reversible graph edits.
//!
//! Commands hold ids and serialised snapshots only, never live node references, so a
//! replayed command stays valid across reloads.
use std::collections::BTreeSet;

use glam::Vec2;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::graph::{Graph, GraphSnapshot, Link, NodeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    AddNode,
    DeleteNodes,
    AddLink,
    RemoveLink,
    MoveNodes,
    PropertyChange,
    Batch,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// A node created eagerly by the caller; `attributes` is the post-creation state.
    AddNode {
        id: NodeId,
        type_name: String,
        position: Vec2,
        attributes: Map<String, Value>,
    },
    DeleteNodes { snapshot: GraphSnapshot },
    AddLink(Link),
    RemoveLink(Link),
    /// `(id, old_position, new_position)` per moved node.
    MoveNodes { moves: Vec<(NodeId, Vec2, Vec2)> },
    PropertyChange {
        node_id: NodeId,
        old: Map<String, Value>,
        new: Map<String, Value>,
    },
    /// Sub-commands applied in order and undone in reverse, as one history entry.
    Batch { label: String, commands: Vec<Command> },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::AddNode { .. } => CommandKind::AddNode,
            Command::DeleteNodes { .. } => CommandKind::DeleteNodes,
            Command::AddLink(_) => CommandKind::AddLink,
            Command::RemoveLink(_) => CommandKind::RemoveLink,
            Command::MoveNodes { .. } => CommandKind::MoveNodes,
            Command::PropertyChange { .. } => CommandKind::PropertyChange,
            Command::Batch { .. } => CommandKind::Batch,
        }
    }

    /// Applies the command. Returns the nodes whose outputs are now stale.
    pub fn redo(&self, graph: &mut Graph) -> Result<Vec<NodeId>> {
        match self {
            Command::AddNode {
                id,
                type_name,
                position,
                attributes,
            } => {
                graph.add_node_with_id(type_name, *id)?;
                let node = graph.require_node_mut(*id)?;
                node.position = *position;
                if let Err(e) = node.attributes.load_json(attributes) {
                    graph.remove_node(*id)?;
                    return Err(e);
                }
                Ok(Vec::new())
            }
            Command::DeleteNodes { snapshot } => {
                let mut stale = Vec::new();
                for id in snapshot.node_ids() {
                    stale.extend(
                        graph
                            .remove_node(id)?
                            .into_iter()
                            .filter(|l| l.from == id)
                            .map(|l| l.to),
                    );
                }
                stale.retain(|id| graph.contains(*id));
                Ok(stale)
            }
            Command::AddLink(link) => {
                graph.new_link(link.from, &link.from_port, link.to, &link.to_port)?;
                Ok(vec![link.to])
            }
            Command::RemoveLink(link) => {
                graph.remove_link(link.from, &link.from_port, link.to, &link.to_port)?;
                Ok(vec![link.to])
            }
            Command::MoveNodes { moves } => {
                for (id, _, new) in moves {
                    graph.require_node_mut(*id)?.position = *new;
                }
                Ok(Vec::new())
            }
            Command::PropertyChange { node_id, new, .. } => {
                graph.require_node_mut(*node_id)?.attributes.load_json(new)?;
                Ok(vec![*node_id])
            }
            Command::Batch { commands, .. } => {
                let mut stale = Vec::new();
                for (k, cmd) in commands.iter().enumerate() {
                    match cmd.redo(graph) {
                        Ok(ids) => stale.extend(ids),
                        Err(e) => {
                            // Roll back the applied prefix so the batch is all or nothing.
                            for done in commands[..k].iter().rev() {
                                let _ = done.undo(graph);
                            }
                            return Err(e);
                        }
                    }
                }
                stale.retain(|id| graph.contains(*id));
                Ok(stale)
            }
        }
    }

    /// Reverts the command. Returns the nodes whose outputs are now stale.
    pub fn undo(&self, graph: &mut Graph) -> Result<Vec<NodeId>> {
        match self {
            Command::AddNode { id, .. } => {
                let stale = graph
                    .remove_node(*id)?
                    .into_iter()
                    .filter(|l| l.from == *id)
                    .map(|l| l.to)
                    .collect();
                Ok(stale)
            }
            Command::DeleteNodes { snapshot } => {
                graph.restore(snapshot)?;
                Ok(snapshot.node_ids())
            }
            Command::AddLink(link) => {
                graph.remove_link(link.from, &link.from_port, link.to, &link.to_port)?;
                Ok(vec![link.to])
            }
            Command::RemoveLink(link) => {
                graph.new_link(link.from, &link.from_port, link.to, &link.to_port)?;
                Ok(vec![link.to])
            }
            Command::MoveNodes { moves } => {
                for (id, old, _) in moves {
                    graph.require_node_mut(*id)?.position = *old;
                }
                Ok(Vec::new())
            }
            Command::PropertyChange { node_id, old, .. } => {
                graph.require_node_mut(*node_id)?.attributes.load_json(old)?;
                Ok(vec![*node_id])
            }
            Command::Batch { commands, .. } => {
                let mut stale = Vec::new();
                for (k, cmd) in commands.iter().enumerate().rev() {
                    match cmd.undo(graph) {
                        Ok(ids) => stale.extend(ids),
                        Err(e) => {
                            // Re-apply what was already reverted, oldest first.
                            for done in &commands[k + 1..] {
                                let _ = done.redo(graph);
                            }
                            return Err(e);
                        }
                    }
                }
                stale.retain(|id| graph.contains(*id));
                Ok(stale)
            }
        }
    }

    /// Folds `next` into `self` when both move the same node set. The merged command
    /// keeps the earlier old positions and the later new positions.
    pub fn try_merge(&mut self, next: &Command) -> bool {
        let (Command::MoveNodes { moves }, Command::MoveNodes { moves: next_moves }) = (self, next)
        else {
            return false;
        };
        let ids: BTreeSet<NodeId> = moves.iter().map(|m| m.0).collect();
        let next_ids: BTreeSet<NodeId> = next_moves.iter().map(|m| m.0).collect();
        if ids != next_ids {
            return false;
        }
        for (id, _, new) in moves.iter_mut() {
            if let Some((_, _, later)) = next_moves.iter().find(|m| m.0 == *id) {
                *new = *later;
            }
        }
        true
    }
}
