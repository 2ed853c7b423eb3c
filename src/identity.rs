//! Topology Identity System
//!
//! Node and link identifiers derived from descriptive content via
//! truncated SHA-256. Two participants that independently describe the
//! same logical node (same location, role, version, and hosted-producer
//! list) derive the same id, which is the network-wide de-duplication
//! mechanism: no registry hands out ids, they converge.
//!
//! Link ids hash the ordered (active, passive, role) triple, so both
//! endpoints of a connection compute the same id regardless of which
//! side derives it first.

use crate::descriptor::{LinkDescriptor, NodeDescriptor};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;


/// 8-byte node identifier, the first word of SHA-256 over the node's
/// canonical descriptor fields.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Reserved null id: "no node" / "broadcast destination".
    pub const NULL: NodeId = NodeId(0);

    /// Create a NodeId from a raw value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Whether this is the reserved null id.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({:016x})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{:016x}", self.0)
    }
}

/// 8-byte link identifier, derived from the (active, passive, role)
/// triple of the link's descriptor.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkId(u64);

impl LinkId {
    /// Reserved null id: "no link" / "no cached route".
    pub const NULL: LinkId = LinkId(0);

    /// Create a LinkId from a raw value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Whether this is the reserved null id.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkId({:016x})", self.0)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link:{:016x}", self.0)
    }
}

/// 32-byte chain block identifier. Opaque to the topology core; carried
/// in deviation records so reports can name the block where a producer
/// diverged.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId([u8; 32]);

impl BlockId {
    /// Create a BlockId from a 32-byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self([0u8; 32])
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Block-producer account name.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProducerName(String);

impl ProducerName {
    /// Create a producer name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProducerName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Debug for ProducerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProducerName({})", self.0)
    }
}

impl fmt::Display for ProducerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the full 32-byte digest over a node descriptor's canonical
/// fields: location, role string, version, and each hosted producer name
/// in declared order.
///
/// The node id is a truncation of this digest; the full form exists for
/// collaborators that want the whole hash.
pub fn node_long_identity(desc: &NodeDescriptor) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(desc.location.as_bytes());
    hasher.update(desc.role.as_str().as_bytes());
    hasher.update(desc.version.as_bytes());
    for producer in &desc.producers {
        hasher.update(producer.as_str().as_bytes());
    }
    hasher.finalize().into()
}

/// Derive a node id from its descriptor: the first 8 bytes of the long
/// identity, big-endian.
///
/// Descriptors with identical canonical fields collide intentionally.
/// Independently-run observers reporting the same logical node converge
/// on the same id.
pub fn node_identity(desc: &NodeDescriptor) -> NodeId {
    let digest = node_long_identity(desc);
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    NodeId::new(u64::from_be_bytes(word))
}

/// Derive a link id from the ordered (active, passive, role) triple.
///
/// The active/passive ordering is part of the descriptor, not the call
/// order, so both endpoints derive the same id independently.
pub fn link_identity(desc: &LinkDescriptor) -> LinkId {
    let mut hasher = Sha256::new();
    hasher.update(desc.active.as_u64().to_be_bytes());
    hasher.update(desc.passive.as_u64().to_be_bytes());
    hasher.update(desc.role.as_str().as_bytes());
    let digest = hasher.finalize();
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    LinkId::new(u64::from_be_bytes(word))
}
