//! Shortest Paths and Center Election
//!
//! Breadth-first search producing per-node distance and first hop, and the
//! witness-sampled approximation of the graph center used to pick a root
//! for the spanning tree.

use super::Graph;
use crate::identity::NodeId;
use std::collections::HashMap;

/// Shortest-path result for one reachable node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShortestPath {
    /// Number of edges on a shortest path from the start node.
    pub distance: usize,
    /// The node immediately after the start on some shortest path.
    /// For the start node itself this is the start node (placeholder).
    pub initial: NodeId,
}

/// Find shortest paths from `start` to every reachable node.
///
/// Iterative BFS with frontier swapping. The first ring is special-cased so
/// `initial` records the first hop rather than the start node. Stable if
/// the graph is stable: the recorded `initial` is the earliest-discovered
/// witness in edge order.
pub fn find_shortest_paths(g: &Graph, start: &NodeId) -> HashMap<NodeId, ShortestPath> {
    let mut res = HashMap::new();
    res.insert(
        start.clone(),
        ShortestPath {
            distance: 0,
            initial: start.clone(),
        },
    );

    // First ring: each neighbor is its own initial hop.
    let mut todo: Vec<(NodeId, NodeId)> = Vec::new();
    for n in g.edges(start) {
        if !res.contains_key(n) {
            res.insert(
                n.clone(),
                ShortestPath {
                    distance: 1,
                    initial: n.clone(),
                },
            );
            todo.push((n.clone(), n.clone()));
        }
    }

    let mut dist = 1;
    let mut todo_next: Vec<(NodeId, NodeId)> = Vec::new();
    while !todo.is_empty() {
        dist += 1;
        for (node, initial) in &todo {
            for n in g.edges(node) {
                if !res.contains_key(n) {
                    res.insert(
                        n.clone(),
                        ShortestPath {
                            distance: dist,
                            initial: initial.clone(),
                        },
                    );
                    todo_next.push((n.clone(), initial.clone()));
                }
            }
        }

        std::mem::swap(&mut todo, &mut todo_next);
        todo_next.clear();
    }

    res
}

/// Find a pseudo-central node: the node with lowest eccentricity with
/// respect to a bounded sample of witness nodes.
///
/// The true center costs a BFS per node; instead, distances **to** each
/// witness are computed on the transposed graph and the node whose maximum
/// witness distance is minimal wins, ties broken by lowest id. Witnesses
/// are every node when the graph is small enough, otherwise a sample taken
/// alternately from both ends of the sorted node list.
///
/// Returns `None` for an empty graph (or a witness sample of zero).
pub fn find_pseudo_central_node(g: &Graph, witnesses: usize) -> Option<NodeId> {
    // Pseudo-eccentricity per node: maximum distance to any witness.
    let mut eccs: HashMap<NodeId, usize> = HashMap::new();

    let tg = g.transpose();
    let fill_eccs_from = |witness: &NodeId, eccs: &mut HashMap<NodeId, usize>| {
        for (m, sp) in find_shortest_paths(&tg, witness) {
            let e = eccs.entry(m).or_insert(0);
            if sp.distance > *e {
                *e = sp.distance;
            }
        }
    };

    if g.nodes().len() <= witnesses {
        for n in g.nodes() {
            fill_eccs_from(n, &mut eccs);
        }
    } else {
        let mut nodes = g.nodes().to_vec();
        nodes.sort();

        let mut a = 0;
        let mut b = nodes.len() - 1;
        let mut remaining = witnesses;
        while remaining > 0 {
            fill_eccs_from(&nodes[a], &mut eccs);
            a += 1;
            remaining -= 1;
            if remaining == 0 {
                break;
            }
            fill_eccs_from(&nodes[b], &mut eccs);
            b -= 1;
            remaining -= 1;
        }
    }

    let mut best: Option<(usize, NodeId)> = None;
    for (n, e) in eccs {
        match &best {
            Some((be, bn)) if e > *be || (e == *be && n >= *bn) => {}
            _ => best = Some((e, n)),
        }
    }

    best.map(|(_, n)| n)
}
