//! State Propagation Engine
//!
//! A [`Propagation`] holds one versioned entry per node and tracks, per
//! neighbor, which entries that neighbor is known to hold. An entry counts
//! as held by a neighbor when that neighbor either sent it to us or
//! acknowledged delivery of it; anything else is owed and will be offered
//! by [`Propagation::outgoing`] until acknowledged or superseded.
//!
//! Delivery state is a bitset per entry, indexed by dense neighbor slot.
//! Removing a neighbor swap-removes its slot: the last slot's bit moves
//! into the vacated column in every entry, so slots always form the
//! contiguous range `[0, N)`.
//!
//! Mutating operations return a news flag; the owner reacts to it (the
//! connectivity controller recomputes its spanning tree).

mod connectivity;


pub use connectivity::{Connectivity, ConnectivityError, PendingFn};

use crate::identity::NodeId;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Entry version, scoped to one (node, propagation) pair. Higher wins.
pub type Version = u64;

/// One versioned state announcement for a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Update<T> {
    pub node: NodeId,
    pub version: Version,
    pub state: T,
}

/// Handle to a neighbor registered with a [`Propagation`].
///
/// The token stays valid until the neighbor is removed; operations using a
/// removed token panic. Tokens are resolved to dense slots internally, so
/// holders are unaffected by slot compaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NeighborId(u64);

/// Growable bitset. Bits beyond the allocated blocks read as zero.
#[derive(Clone, Debug, Default)]
struct BitSet {
    blocks: Vec<u64>,
}

impl BitSet {
    fn test(&self, i: usize) -> bool {
        self.blocks
            .get(i / 64)
            .is_some_and(|b| b & (1 << (i % 64)) != 0)
    }

    fn set(&mut self, i: usize) {
        let block = i / 64;
        if block >= self.blocks.len() {
            self.blocks.resize(block + 1, 0);
        }
        self.blocks[block] |= 1 << (i % 64);
    }

    fn clear(&mut self, i: usize) {
        if let Some(b) = self.blocks.get_mut(i / 64) {
            *b &= !(1 << (i % 64));
        }
    }

    fn set_to(&mut self, i: usize, value: bool) {
        if value {
            self.set(i);
        } else {
            self.clear(i);
        }
    }

    fn clear_all(&mut self) {
        self.blocks.clear();
    }
}

/// The stored entry for one node: its current update plus the per-neighbor
/// delivered bits.
#[derive(Clone, Debug)]
struct NodeState<T> {
    update: Update<T>,
    delivered: BitSet,
}

struct NeighborSlot {
    token: NeighborId,
    /// Mirror of this slot's zero bits, maintained while the neighbor is
    /// activated. Gives O(1) `has_outgoing` for tree links.
    undelivered: Option<BTreeSet<NodeId>>,
}

/// Versioned per-node state store with per-neighbor delivery tracking.
pub struct Propagation<T> {
    nodes: BTreeMap<NodeId, NodeState<T>>,
    neighbors: Vec<NeighborSlot>,
    slots: HashMap<NeighborId, usize>,
    next_token: u64,
}

impl<T: Clone> Propagation<T> {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            neighbors: Vec::new(),
            slots: HashMap::new(),
            next_token: 0,
        }
    }

    /// The current state for `node`, if any.
    pub fn get(&self, node: &NodeId) -> Option<&T> {
        self.nodes.get(node).map(|ns| &ns.update.state)
    }

    /// The current version for `node`, if any.
    pub fn version(&self, node: &NodeId) -> Option<Version> {
        self.nodes.get(node).map(|ns| ns.update.version)
    }

    /// Number of live neighbors.
    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Register a new neighbor at the next free slot. Every existing entry
    /// starts owed to it.
    pub fn add_neighbor(&mut self) -> NeighborId {
        let token = NeighborId(self.next_token);
        self.next_token += 1;
        self.slots.insert(token, self.neighbors.len());
        self.neighbors.push(NeighborSlot {
            token,
            undelivered: None,
        });
        token
    }

    /// Remove a neighbor, compacting the slot range: the last slot moves
    /// into the vacated one, carrying its bit column in every entry. The
    /// token is invalidated.
    pub fn remove_neighbor(&mut self, neighbor: NeighborId) {
        let index = self
            .slots
            .remove(&neighbor)
            .expect("neighbor token already removed");
        let last = self.neighbors.len() - 1;

        for ns in self.nodes.values_mut() {
            let moved_bit = ns.delivered.test(last);
            ns.delivered.set_to(index, moved_bit);
            ns.delivered.clear(last);
        }

        // The slot (with its undelivered mirror) moves along with the bits.
        self.neighbors.swap_remove(index);
        if index < self.neighbors.len() {
            self.slots.insert(self.neighbors[index].token, index);
        }
    }

    /// Publish a local update for `node`. A new node starts at version 0;
    /// an existing one has its version bumped and its state replaced. All
    /// delivered bits clear: the new version is owed to every neighbor.
    ///
    /// Returns the news flag (always true).
    pub fn set(&mut self, node: NodeId, state: T) -> bool {
        match self.nodes.entry(node.clone()) {
            Entry::Vacant(e) => {
                e.insert(NodeState {
                    update: Update {
                        node: node.clone(),
                        version: 0,
                        state,
                    },
                    delivered: BitSet::default(),
                });
            }
            Entry::Occupied(mut e) => {
                let ns = e.get_mut();
                ns.update.version += 1;
                ns.update.state = state;
                ns.delivered.clear_all();
            }
        }
        self.mark_undelivered(&node, None);
        true
    }

    /// Apply updates received from `neighbor`. Per update: an unknown node
    /// is installed at the received version; a version at or below the
    /// stored one is dropped; a higher version replaces the entry and
    /// clears all delivered bits. Every accepted update marks the sender's
    /// own bit, since the sender evidently holds it.
    ///
    /// Returns true if any update was news.
    pub fn incoming(&mut self, neighbor: NeighborId, updates: Vec<Update<T>>) -> bool {
        let index = self.slots[&neighbor];
        let mut news = false;

        for u in updates {
            let node = u.node.clone();
            let accepted = match self.nodes.entry(node.clone()) {
                Entry::Vacant(e) => {
                    let mut delivered = BitSet::default();
                    delivered.set(index);
                    e.insert(NodeState {
                        update: u,
                        delivered,
                    });
                    true
                }
                Entry::Occupied(mut e) => {
                    let ns = e.get_mut();
                    if ns.update.version >= u.version {
                        false
                    } else {
                        ns.update = u;
                        ns.delivered.clear_all();
                        ns.delivered.set(index);
                        true
                    }
                }
            };

            if accepted {
                self.mark_undelivered(&node, Some(index));
                news = true;
            }
        }

        news
    }

    /// The updates still owed to `neighbor`, in ascending node order.
    pub fn outgoing(&self, neighbor: NeighborId) -> Vec<Update<T>> {
        let index = self.slots[&neighbor];
        match &self.neighbors[index].undelivered {
            Some(mirror) => mirror
                .iter()
                .filter_map(|node| self.nodes.get(node))
                .map(|ns| ns.update.clone())
                .collect(),
            None => self
                .nodes
                .values()
                .filter(|ns| !ns.delivered.test(index))
                .map(|ns| ns.update.clone())
                .collect(),
        }
    }

    /// Whether anything is owed to `neighbor`. O(1) while activated.
    pub fn has_outgoing(&self, neighbor: NeighborId) -> bool {
        let index = self.slots[&neighbor];
        match &self.neighbors[index].undelivered {
            Some(mirror) => !mirror.is_empty(),
            None => self.nodes.values().any(|ns| !ns.delivered.test(index)),
        }
    }

    /// Record that `neighbor` acknowledged these updates. Only an exact
    /// version match marks the bit; a mismatch means the entry advanced
    /// while the acknowledgement was in flight, and the newer version is
    /// still owed.
    pub fn delivered(&mut self, neighbor: NeighborId, updates: &[Update<T>]) {
        let index = self.slots[&neighbor];
        for u in updates {
            if let Some(ns) = self.nodes.get_mut(&u.node) {
                if ns.update.version == u.version {
                    ns.delivered.set(index);
                    if let Some(mirror) = self.neighbors[index].undelivered.as_mut() {
                        mirror.remove(&u.node);
                    }
                }
            }
        }
    }

    /// Start maintaining the undelivered mirror for `neighbor`, making
    /// `has_outgoing` O(1). Idempotent.
    pub fn activate(&mut self, neighbor: NeighborId) {
        let index = self.slots[&neighbor];
        if self.neighbors[index].undelivered.is_some() {
            return;
        }
        let mirror = self
            .nodes
            .iter()
            .filter(|(_, ns)| !ns.delivered.test(index))
            .map(|(node, _)| node.clone())
            .collect();
        self.neighbors[index].undelivered = Some(mirror);
    }

    /// Drop the undelivered mirror for `neighbor`, bounding cache memory to
    /// the activated (tree-link) neighbors.
    pub fn deactivate(&mut self, neighbor: NeighborId) {
        let index = self.slots[&neighbor];
        self.neighbors[index].undelivered = None;
    }

    /// Snapshot of every node's current state.
    pub fn dump(&self) -> BTreeMap<NodeId, T> {
        self.nodes
            .iter()
            .map(|(node, ns)| (node.clone(), ns.update.state.clone()))
            .collect()
    }

    /// Propagate a bit change into every active mirror: `node` became owed
    /// to all neighbors except (optionally) the one whose bit was just set.
    fn mark_undelivered(&mut self, node: &NodeId, delivered_to: Option<usize>) {
        for (i, slot) in self.neighbors.iter_mut().enumerate() {
            if let Some(mirror) = slot.undelivered.as_mut() {
                if delivered_to == Some(i) {
                    mirror.remove(node);
                } else {
                    mirror.insert(node.clone());
                }
            }
        }
    }
}

impl<T: Clone> Default for Propagation<T> {
    fn default() -> Self {
        Self::new()
    }
}
