//! Ordering and reachability over the link set.
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};

use super::{Link, NodeId};
use crate::error::{Error, Result};

/// Kahn's algorithm over every node in `order`; ties go to the node inserted first.
pub(crate) fn topo_sort(order: &[NodeId], links: &BTreeSet<Link>) -> Result<Vec<NodeId>> {
    let rank: HashMap<NodeId, usize> = order.iter().enumerate().map(|(k, id)| (*id, k)).collect();
    let mut indeg: Vec<usize> = vec![0; order.len()];
    let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();

    for link in links {
        let (Some(&from), Some(&to)) = (rank.get(&link.from), rank.get(&link.to)) else {
            continue;
        };
        indeg[to] += 1;
        dependents.entry(from).or_default().push(to);
    }

    let mut q: BinaryHeap<Reverse<usize>> = indeg
        .iter()
        .enumerate()
        .filter_map(|(k, &d)| if d == 0 { Some(Reverse(k)) } else { None })
        .collect();
    let mut out = Vec::with_capacity(order.len());

    while let Some(Reverse(n)) = q.pop() {
        out.push(order[n]);
        if let Some(children) = dependents.get(&n) {
            for &child in children {
                indeg[child] = indeg[child].saturating_sub(1);
                if indeg[child] == 0 {
                    q.push(Reverse(child));
                }
            }
        }
    }

    if out.len() != order.len() {
        return Err(Error::NotAcyclic);
    }
    Ok(out)
}

fn children_map(links: &BTreeSet<Link>) -> HashMap<NodeId, Vec<NodeId>> {
    let mut map: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for link in links {
        map.entry(link.from).or_default().push(link.to);
    }
    map
}

/// `id` and every node reachable from it.
pub(crate) fn descendants(id: NodeId, links: &BTreeSet<Link>) -> HashSet<NodeId> {
    let children = children_map(links);
    let mut seen = HashSet::from([id]);
    let mut stack = vec![id];
    while let Some(n) = stack.pop() {
        for &c in children.get(&n).into_iter().flatten() {
            if seen.insert(c) {
                stack.push(c);
            }
        }
    }
    seen
}

/// Returns `true` if `to` can be reached from `from` (a node reaches itself).
pub(crate) fn reaches(from: NodeId, to: NodeId, links: &BTreeSet<Link>) -> bool {
    from == to || descendants(from, links).contains(&to)
}
