//! Graph Construction Utilities
//!
//! Map-based constructors and random mesh generators. Used by the test
//! suites and the benchmarks; the generators produce the connected
//! undirected meshes the propagation simulations run on.

use super::Graph;
use crate::identity::NodeId;
use rand::Rng;
use std::collections::{HashMap, HashSet};

/// Build a graph from an adjacency map. The node list is the sorted key
/// set, so the result is stable.
pub fn map_graph(map: HashMap<NodeId, Vec<NodeId>>) -> Graph {
    let mut nodes: Vec<NodeId> = map.keys().cloned().collect();
    nodes.sort();
    Graph::new(nodes, map)
}

/// An undirected edge, stored in canonical (low, high) order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub a: NodeId,
    pub b: NodeId,
}

impl Edge {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        Self { a, b }
    }

    pub fn reverse(&self) -> Edge {
        Edge::new(self.b.clone(), self.a.clone())
    }

    pub fn reflexive(&self) -> bool {
        self.a == self.b
    }

    pub fn canonical(&self) -> Edge {
        if self.a <= self.b {
            self.clone()
        } else {
            self.reverse()
        }
    }
}

/// An undirected graph represented as a set of canonical edges.
#[derive(Clone, Debug, Default)]
pub struct UndirectedEdges {
    pub nodes: Vec<NodeId>,
    edges: HashSet<Edge>,
}

impl UndirectedEdges {
    pub fn new(nodes: Vec<NodeId>) -> Self {
        Self {
            nodes,
            edges: HashSet::new(),
        }
    }

    /// Add an edge. Reflexive edges are ignored.
    pub fn add(&mut self, e: Edge) {
        if !e.reflexive() {
            self.edges.insert(e.canonical());
        }
    }

    pub fn remove(&mut self, e: &Edge) {
        if !e.reflexive() {
            self.edges.remove(&e.canonical());
        }
    }

    pub fn contains(&self, e: &Edge) -> bool {
        e.reflexive() || self.edges.contains(&e.canonical())
    }

    pub fn sorted_edges(&self) -> Vec<Edge> {
        let mut es: Vec<Edge> = self.edges.iter().cloned().collect();
        es.sort();
        es
    }

    /// A random (not necessarily present) non-reflexive edge between two of
    /// the graph's nodes. Requires at least two nodes.
    pub fn random_edge<R: Rng>(&self, rng: &mut R) -> Edge {
        let a = rng.gen_range(1..self.nodes.len());
        Edge::new(
            self.nodes[rng.gen_range(0..a)].clone(),
            self.nodes[a].clone(),
        )
    }

    /// The corresponding directed [`Graph`]: every edge in both directions,
    /// plus a reflexive edge on every node. Edge lists are sorted.
    pub fn graph(&self) -> Graph {
        let mut map: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

        // Symmetry
        for e in &self.edges {
            map.entry(e.a.clone()).or_default().push(e.b.clone());
            map.entry(e.b.clone()).or_default().push(e.a.clone());
        }

        // Reflexivity
        for n in &self.nodes {
            map.entry(n.clone()).or_default().push(n.clone());
        }

        for list in map.values_mut() {
            list.sort();
        }

        Graph::new(self.nodes.clone(), map)
    }
}

/// Generate a connected sparse mesh: a random tree over `size` nodes plus a
/// few extra edges.
pub fn generate_sparse<R: Rng>(rng: &mut R, size: usize) -> UndirectedEdges {
    let mut u = UndirectedEdges::new(vec![NodeId::from("0")]);

    // Form a random tree
    for i in 1..size {
        let n = NodeId::from(i.to_string());
        let peer = u.nodes[rng.gen_range(0..u.nodes.len())].clone();
        u.add(Edge::new(n.clone(), peer));
        u.nodes.push(n);
    }

    // Add a few extra edges
    for _ in 0..rng.gen_range(0..size) {
        let e = u.random_edge(rng);
        u.add(e);
    }

    u
}

/// Generate a connected dense mesh: a complete graph over `size` nodes with
/// some random edges removed (retrying until still connected).
pub fn generate_dense<R: Rng>(rng: &mut R, size: usize) -> UndirectedEdges {
    loop {
        let mut u = UndirectedEdges::new(
            (0..size).map(|i| NodeId::from(i.to_string())).collect(),
        );

        for i in 0..size {
            for j in 0..i {
                u.add(Edge::new(u.nodes[i].clone(), u.nodes[j].clone()));
            }
        }

        for _ in 0..rng.gen_range(0..size) {
            let e = u.random_edge(rng);
            u.remove(&e);
        }

        if u.graph().connected() {
            return u;
        }
    }
}

/// A seeded RNG whose seed is printed, so a failing randomized test can be
/// replayed.
pub fn seeded_rng(label: &str) -> impl Rng {
    use rand::SeedableRng;
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    println!("RNG seed for {}: {}", label, seed);
    rand::rngs::StdRng::seed_from_u64(seed)
}
