//! Node Identity
//!
//! Every mesh participant is named by an opaque [`NodeId`]. Identifiers are
//! interned byte strings: clones share one allocation, so ids are cheap to
//! copy into maps, edge lists, and wire messages. Ordering is lexicographic
//! on the raw bytes, which gives the graph algorithms a total order to break
//! ties with.

use rand::RngCore;
use std::fmt;
use std::sync::Arc;

/// Number of random bytes in a generated identifier.
const GENERATED_ID_BYTES: usize = 8;

/// Opaque node identifier.
///
/// A `NodeId` is not necessarily human-readable; generated ids are random
/// bytes in hex, but anything a peer presents in its handshake is accepted
/// verbatim.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(Arc<[u8]>);

impl NodeId {
    /// Generate a fresh random identifier: 8 random bytes, hex-encoded.
    pub fn generate() -> Self {
        let mut bytes = [0u8; GENERATED_ID_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_bytes(hex::encode(bytes).as_bytes())
    }

    /// Create a NodeId from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self::from_bytes(s.as_bytes())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self)
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
