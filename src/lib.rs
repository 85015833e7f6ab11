//! CANOPY: Convergent state-propagation mesh
//!
//! A peer-to-peer overlay in which every node converges on the same
//! per-node state map. Each node advertises its own link set as a
//! versioned entry in a gossip store; from everyone's advertisements the
//! mesh view is rebuilt, a pseudo-central root is elected, and a
//! degree-constrained spanning tree is derived. Updates flow only along
//! tree edges, and per-neighbor delivery bits make retransmission and
//! duplicate suppression cheap.

pub mod graph;
pub mod identity;
pub mod node;
pub mod propagation;
pub mod wire;

// Re-export identity types
pub use identity::NodeId;

// Re-export graph types
pub use graph::{
    find_pseudo_central_node, find_shortest_paths, make_bushy_spanning_tree, reachable_graph,
    Graph, ShortestPath, SpanningTree,
};

// Re-export propagation types
pub use propagation::{
    Connectivity, ConnectivityError, NeighborId, PendingFn, Propagation, Update, Version,
};

// Re-export wire types
pub use wire::{ConnectivityUpdate, FrameReader, FrameWriter, WireError};

// Re-export node types
pub use node::{Node, NodeError};
