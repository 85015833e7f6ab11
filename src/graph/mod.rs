//! Graph Primitives
//!
//! A small directed-graph toolkit for the mesh view: transposition, edge-set
//! union and intersection, reachability closure, and connectivity checks,
//! plus shortest-path search, pseudo-central-node election, and the bushy
//! spanning-tree builder.
//!
//! A graph is **stable** when its node list and every per-node edge list
//! come back in the same order across calls for identical input. Everything
//! here preserves stability of stable inputs, and the tree and election
//! algorithms depend on it: repeated recomputation over an unchanged mesh
//! must yield an identical tree, or link classification would oscillate.

mod paths;
pub mod testutils;
mod tree;

#[cfg(test)]
mod tests;

pub use paths::{find_pseudo_central_node, find_shortest_paths, ShortestPath};
pub use tree::{make_bushy_spanning_tree, SpanningTree};

use crate::identity::NodeId;
use std::collections::{BTreeSet, HashMap, HashSet};

const NO_EDGES: &[NodeId] = &[];

/// A directed graph: an ordered node list plus per-node ordered edge lists.
///
/// The structure is materialized (no lazy edge functions), so a `Graph` is
/// stable by construction: iteration order is fixed at build time.
#[derive(Clone, Debug)]
pub struct Graph {
    nodes: Vec<NodeId>,
    edges: HashMap<NodeId, Vec<NodeId>>,
}

impl Graph {
    /// Build a graph from a node list and adjacency map.
    ///
    /// Nodes absent from the map simply have no outgoing edges.
    pub fn new(nodes: Vec<NodeId>, edges: HashMap<NodeId, Vec<NodeId>>) -> Self {
        Self { nodes, edges }
    }

    /// The node list, in stable order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Outgoing edges of `node`, in stable order. Empty for unknown nodes.
    pub fn edges(&self, node: &NodeId) -> &[NodeId] {
        self.edges.get(node).map_or(NO_EDGES, Vec::as_slice)
    }

    /// Reverse every edge. The node list is preserved.
    pub fn transpose(&self) -> Graph {
        let mut reversed: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for n in &self.nodes {
            for m in self.edges(n) {
                reversed.entry(m.clone()).or_default().push(n.clone());
            }
        }
        Graph::new(self.nodes.clone(), reversed)
    }

    /// Edge-set union. Node list is the sorted union of both node sets;
    /// per-node edge lists are sorted and de-duplicated.
    pub fn union(&self, other: &Graph) -> Graph {
        self.merge(other, |a, b| {
            a.iter().chain(b).cloned().collect::<BTreeSet<_>>()
        })
    }

    /// Edge-set intersection: only edges present in both graphs survive.
    /// Node list is the sorted union of both node sets; per-node edge lists
    /// are sorted and de-duplicated.
    pub fn intersect(&self, other: &Graph) -> Graph {
        self.merge(other, |a, b| {
            let right: HashSet<&NodeId> = b.iter().collect();
            a.iter()
                .filter(|e| right.contains(e))
                .cloned()
                .collect::<BTreeSet<_>>()
        })
    }

    fn merge(
        &self,
        other: &Graph,
        combine: impl Fn(&[NodeId], &[NodeId]) -> BTreeSet<NodeId>,
    ) -> Graph {
        let nodes: BTreeSet<NodeId> = self
            .nodes
            .iter()
            .chain(other.nodes.iter())
            .cloned()
            .collect();

        let mut edges = HashMap::new();
        for n in &nodes {
            let combined = combine(self.edges(n), other.edges(n));
            if !combined.is_empty() {
                edges.insert(n.clone(), combined.into_iter().collect());
            }
        }

        Graph::new(nodes.into_iter().collect(), edges)
    }

    /// Whether the undirected closure from any node covers every node.
    /// The empty graph counts as connected.
    pub fn connected(&self) -> bool {
        let Some(start) = self.nodes.first() else {
            return true;
        };

        let mut undirected: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
        for n in &self.nodes {
            for m in self.edges(n) {
                undirected.entry(n).or_default().push(m);
                undirected.entry(m).or_default().push(n);
            }
        }

        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(n) = stack.pop() {
            if !visited.insert(n) {
                continue;
            }
            if let Some(neighbors) = undirected.get(n) {
                stack.extend(neighbors.iter().copied().filter(|m| !visited.contains(m)));
            }
        }

        self.nodes.iter().all(|n| visited.contains(n))
    }
}

/// The subgraph reachable from `start` under the given edge function.
///
/// Depth-first traversal; the result contains exactly the nodes reached and
/// their edges as `edges_fn` reported them. No symmetry is forced: an edge
/// to a node also present in the result does not imply the reverse edge.
pub fn reachable_graph(
    start: &NodeId,
    mut edges_fn: impl FnMut(&NodeId) -> Vec<NodeId>,
) -> Graph {
    let mut nodes = Vec::new();
    let mut edges: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

    let mut stack = vec![start.clone()];
    while let Some(n) = stack.pop() {
        if edges.contains_key(&n) {
            continue;
        }
        let e = edges_fn(&n);
        // Push in reverse so traversal order matches a recursive descent.
        stack.extend(e.iter().rev().cloned());
        edges.insert(n.clone(), e);
        nodes.push(n);
    }

    Graph::new(nodes, edges)
}
