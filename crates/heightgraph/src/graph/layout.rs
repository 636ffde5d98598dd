//! Layered (Sugiyama-style) placement of nodes for display.
//!
//! Layers come from longest-path ranking; the order within each layer is refined by
//! alternating barycenter sweeps. The result is presentational only.
use std::collections::{BTreeMap, BTreeSet, HashMap};

use glam::Vec2;

use super::topo::topo_sort;
use super::{Link, NodeId};
use crate::error::Result;

const SWEEPS: usize = 4;

/// Horizontal distance between layers and vertical distance between rows.
pub const DEFAULT_SPACING: Vec2 = Vec2::new(200.0, 120.0);

pub(crate) fn sugiyama(
    order: &[NodeId],
    links: &BTreeSet<Link>,
    spacing: Vec2,
) -> Result<BTreeMap<NodeId, Vec2>> {
    let sorted = topo_sort(order, links)?;

    let mut parents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for link in links {
        parents.entry(link.to).or_default().push(link.from);
        children.entry(link.from).or_default().push(link.to);
    }

    let mut layer_of: HashMap<NodeId, usize> = HashMap::new();
    for id in &sorted {
        let layer = parents
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|p| layer_of.get(p))
            .map(|l| l + 1)
            .max()
            .unwrap_or(0);
        layer_of.insert(*id, layer);
    }

    let n_layers = layer_of.values().copied().max().map_or(0, |m| m + 1);
    let mut layers: Vec<Vec<NodeId>> = vec![Vec::new(); n_layers];
    for id in &sorted {
        layers[layer_of[id]].push(*id);
    }

    for sweep in 0..SWEEPS {
        if sweep % 2 == 0 {
            for k in 1..layers.len() {
                let (before, after) = layers.split_at_mut(k);
                reorder(&mut after[0], &before[k - 1], &parents);
            }
        } else {
            for k in (0..layers.len().saturating_sub(1)).rev() {
                let (before, after) = layers.split_at_mut(k + 1);
                reorder(&mut before[k], &after[0], &children);
            }
        }
    }

    let mut positions = BTreeMap::new();
    for (l, layer) in layers.iter().enumerate() {
        for (row, id) in layer.iter().enumerate() {
            positions.insert(*id, Vec2::new(l as f32 * spacing.x, row as f32 * spacing.y));
        }
    }
    Ok(positions)
}

/// Sorts `layer` by the mean row of each node's neighbours in `reference`. Nodes without
/// neighbours there keep their current row as key.
fn reorder(layer: &mut [NodeId], reference: &[NodeId], neighbours: &HashMap<NodeId, Vec<NodeId>>) {
    let row: HashMap<NodeId, usize> = reference.iter().enumerate().map(|(r, id)| (*id, r)).collect();
    let mut keyed: Vec<(f32, usize, NodeId)> = layer
        .iter()
        .enumerate()
        .map(|(current, id)| {
            let rows: Vec<usize> = neighbours
                .get(id)
                .into_iter()
                .flatten()
                .filter_map(|n| row.get(n).copied())
                .collect();
            let key = if rows.is_empty() {
                current as f32
            } else {
                rows.iter().sum::<usize>() as f32 / rows.len() as f32
            };
            (key, current, *id)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    for (slot, (_, _, id)) in layer.iter_mut().zip(keyed) {
        *slot = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(a: u64, b: u64) -> Link {
        Link::new(NodeId(a), "out", NodeId(b), "in")
    }

    #[test]
    fn layers_follow_longest_path() {
        let order = [NodeId(1), NodeId(2), NodeId(3), NodeId(4)];
        let links = BTreeSet::from([link(1, 2), link(2, 3), link(1, 3), link(4, 3)]);
        let pos = sugiyama(&order, &links, Vec2::new(10.0, 1.0)).expect("acyclic");
        assert_eq!(pos[&NodeId(1)].x, 0.0);
        assert_eq!(pos[&NodeId(4)].x, 0.0);
        assert_eq!(pos[&NodeId(2)].x, 10.0);
        assert_eq!(pos[&NodeId(3)].x, 20.0);
    }

    #[test]
    fn rows_within_a_layer_are_distinct() {
        let order = [NodeId(1), NodeId(2), NodeId(3)];
        let links = BTreeSet::new();
        let pos = sugiyama(&order, &links, DEFAULT_SPACING).expect("acyclic");
        let rows: BTreeSet<i64> = pos.values().map(|p| p.y as i64).collect();
        assert_eq!(rows.len(), 3);
    }
}
