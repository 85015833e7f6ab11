//! Connectivity Controller
//!
//! Ties the propagation engine to the graph algorithms. Each node
//! advertises its own link set as a propagation entry; from everyone's
//! advertisements the controller rebuilds a view of the mesh, elects a
//! pseudo-central root, derives a bushy spanning tree, and classifies each
//! local link as a tree link or not. Only tree links carry outgoing
//! updates, which confines steady-state traffic to the spanning tree while
//! the version discipline guarantees convergence.

use super::{NeighborId, Propagation, Update};
use crate::graph::{
    find_pseudo_central_node, make_bushy_spanning_tree, reachable_graph, Graph,
};
use crate::identity::NodeId;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

/// Witness sample size for the pseudo-central-node election.
const WITNESS_SAMPLE: usize = 10;

/// Soft fanout limit for the spanning tree.
const SOFT_CHILD_LIMIT: usize = 4;

/// Per-link schedule-send callback. Invoked under the controller lock, so
/// it must not block; the intended shape is a non-blocking signal onto a
/// capacity-1 channel drained by the link's writer task.
pub type PendingFn = Box<dyn FnMut() + Send>;

/// Errors related to link management.
#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error("already linked to {0}")]
    AlreadyLinked(NodeId),
}

struct Link {
    neighbor: NeighborId,
    tree_link: bool,
    pending: Option<PendingFn>,
}

/// The connectivity controller: one propagation (the connectivity topic)
/// plus the live link map.
///
/// All methods are synchronous and bounded; callers serialize access with
/// a single lock and hold per-peer handles as `(lock, peer id)` pairs.
pub struct Connectivity {
    id: NodeId,
    prop: Propagation<Vec<NodeId>>,
    links: HashMap<NodeId, Link>,
}

impl Connectivity {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            prop: Propagation::new(),
            links: HashMap::new(),
        }
    }

    /// This node's id.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// The currently linked peers, sorted.
    pub fn linked_peers(&self) -> Vec<NodeId> {
        let mut peers: Vec<NodeId> = self.links.keys().cloned().collect();
        peers.sort();
        peers
    }

    /// Whether the link to `peer` is currently a tree link.
    pub fn is_tree_link(&self, peer: &NodeId) -> bool {
        self.links.get(peer).is_some_and(|l| l.tree_link)
    }

    /// Register a new link to `peer`. Linking the same peer twice is a
    /// caller bug and is reported as an error.
    pub fn link(&mut self, peer: NodeId) -> Result<(), ConnectivityError> {
        if self.links.contains_key(&peer) {
            return Err(ConnectivityError::AlreadyLinked(peer));
        }

        let neighbor = self.prop.add_neighbor();
        self.links.insert(
            peer,
            Link {
                neighbor,
                tree_link: false,
                pending: None,
            },
        );

        self.links_changed();
        Ok(())
    }

    /// Tear down the link to `peer`. A no-op for unknown peers, so the
    /// transport may call it unconditionally on its teardown path.
    pub fn close(&mut self, peer: &NodeId) {
        let Some(link) = self.links.remove(peer) else {
            return;
        };
        self.prop.remove_neighbor(link.neighbor);
        self.links_changed();
    }

    /// Install the schedule-send callback for `peer`. If the link is
    /// currently a tree link with pending updates, the callback fires
    /// immediately. A no-op for unknown peers.
    pub fn set_pending_fn(&mut self, peer: &NodeId, pending: PendingFn) {
        let Some(link) = self.links.get_mut(peer) else {
            return;
        };
        link.pending = Some(pending);
        if link.tree_link && self.prop.has_outgoing(link.neighbor) {
            if let Some(pending) = link.pending.as_mut() {
                pending();
            }
        }
    }

    /// The updates owed to `peer`, empty unless the link is currently a
    /// tree link. This gate confines inter-node traffic to tree edges.
    pub fn outgoing(&self, peer: &NodeId) -> Vec<Update<Vec<NodeId>>> {
        match self.links.get(peer) {
            Some(link) if link.tree_link => self.prop.outgoing(link.neighbor),
            _ => Vec::new(),
        }
    }

    /// Record that `peer` acknowledged delivery of these updates. A no-op
    /// for unknown peers.
    pub fn delivered(&mut self, peer: &NodeId, updates: &[Update<Vec<NodeId>>]) {
        if let Some(link) = self.links.get(peer) {
            self.prop.delivered(link.neighbor, updates);
        }
    }

    /// Apply updates received from `peer`, recomputing the tree if any of
    /// them was news. A no-op for unknown peers.
    pub fn incoming(&mut self, peer: &NodeId, updates: Vec<Update<Vec<NodeId>>>) {
        let Some(link) = self.links.get(peer) else {
            return;
        };
        let neighbor = link.neighbor;
        if self.prop.incoming(neighbor, updates) {
            self.connectivity_change();
        }
    }

    /// Snapshot of every known node's advertised link set.
    pub fn dump(&self) -> BTreeMap<NodeId, Vec<NodeId>> {
        self.prop.dump()
    }

    /// Publish the current link set under our own key and recompute.
    fn links_changed(&mut self) {
        let peers = self.linked_peers();
        self.prop.set(self.id.clone(), peers);
        self.connectivity_change();
    }

    /// Recompute which links are tree links from the advertised mesh view.
    fn connectivity_change(&mut self) {
        // The mesh as reachable through everyone's most recent
        // advertisements.
        let g = reachable_graph(&self.id, |node| {
            self.prop.get(node).cloned().unwrap_or_default()
        });

        // TODO: prune propagation entries for nodes that fell out of g.

        // Advertisements from the two ends of a link may arrive out of
        // order, so g can be asymmetric. Keeping only edges with a
        // confirmed reverse edge avoids tree edges that don't correspond
        // to a working connection; unioning the symmetric local view back
        // in closes the bootstrap hole where a fresh peer hasn't had time
        // to advertise us yet.
        let local = self.local_view();
        let g = g.intersect(&g.transpose()).union(&local);

        let Some(root) = find_pseudo_central_node(&g, WITNESS_SAMPLE) else {
            return;
        };
        let tree = make_bushy_spanning_tree(&g, &root, SOFT_CHILD_LIMIT);

        let undirected = tree.undirected();
        let tree_peers: HashSet<&NodeId> = undirected.edges(&self.id).iter().collect();
        debug!(
            id = %self.id,
            root = %root,
            mesh_nodes = g.nodes().len(),
            tree_peers = tree_peers.len(),
            "recomputed spanning tree"
        );

        for (peer, link) in self.links.iter_mut() {
            let now_tree = tree_peers.contains(peer);
            if now_tree != link.tree_link {
                link.tree_link = now_tree;
                // The undelivered mirror is only paid for on tree links.
                if now_tree {
                    self.prop.activate(link.neighbor);
                } else {
                    self.prop.deactivate(link.neighbor);
                }
            }

            if now_tree && self.prop.has_outgoing(link.neighbor) {
                if let Some(pending) = link.pending.as_mut() {
                    pending();
                }
            }
        }
    }

    /// The symmetric single-hop graph around us: ourselves plus every
    /// linked peer, regardless of what anyone has advertised yet.
    fn local_view(&self) -> Graph {
        let peers = self.linked_peers();

        let mut nodes = peers.clone();
        nodes.push(self.id.clone());
        nodes.sort();

        let mut edges: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for peer in &peers {
            edges.insert(peer.clone(), vec![self.id.clone()]);
        }
        edges.insert(self.id.clone(), peers);

        Graph::new(nodes, edges)
    }
}
