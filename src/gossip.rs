//! Topology Gossip Messages
//!
//! The bounded-flood unit exchanged between participants. A message
//! carries one or more typed payloads plus the flood-control header:
//! origin, optional destination, forward count, and time-to-live.
//!
//! Messages are immutable value objects copied at each hop; only the
//! forward count changes, monotonically, as a message travels. Two
//! comparisons bound the flood without any global coordination: `ttl >
//! fwds` gates continued forwarding at every hop, and a receiver whose
//! shortest-hop distance from the origin is less than the message's
//! forward count refuses to forward (the message has already traveled
//! farther than the shortest path, so re-sending it cannot reach anyone
//! new).

use crate::deviation::ForkReport;
use crate::graph::MapUpdate;
use crate::identity::NodeId;
use crate::metrics::LinkSample;
use serde::{Deserialize, Serialize};

/// One typed payload of a topology message.
///
/// Dispatch is by variant: map deltas go to the graph store, samples to
/// the metric accumulators, fork reports to the deviation histories. An
/// unrecognized payload deserializes to nothing and is simply ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyPayload {
    /// A batch of graph mutations.
    Map(MapUpdate),
    /// A directional traffic sample.
    Sample(LinkSample),
    /// A producer-deviation episode.
    Fork(ForkReport),
}

/// A bounded-flood gossip message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopologyMessage {
    /// Node that originated the message.
    pub origin: NodeId,
    /// Addressed node, or `NodeId::NULL` for no destination constraint.
    pub destination: NodeId,
    /// Hops traveled so far; incremented at each forwarding hop.
    pub fwds: u16,
    /// Maximum hops; forwarding continues while `ttl > fwds`.
    pub ttl: u16,
    /// Typed payloads, applied in order by the receiver.
    pub payload: Vec<TopologyPayload>,
}

impl TopologyMessage {
    /// Create an empty broadcast message.
    pub fn new(origin: NodeId, ttl: u16) -> Self {
        Self {
            origin,
            destination: NodeId::NULL,
            fwds: 0,
            ttl,
            payload: Vec::new(),
        }
    }

    /// Whether the message is addressed to everyone.
    pub fn is_broadcast(&self) -> bool {
        self.destination.is_null()
    }
}

/// Outbound boundary to the host's peer-connection subsystem.
///
/// Implementations deliver the message to the addressed peer, or to all
/// peers when the destination is null. Delivery is fire-and-forget: the
/// core never blocks on network I/O and nothing is reported back.
pub trait MessageSink: Send + Sync {
    /// Hand a message to the transport for delivery.
    fn send(&self, message: TopologyMessage);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_is_broadcast() {
        let msg = TopologyMessage::new(NodeId::new(7), 6);
        assert!(msg.is_broadcast());
        assert_eq!(msg.fwds, 0);
        assert_eq!(msg.ttl, 6);
        assert!(msg.payload.is_empty());
    }

    #[test]
    fn test_addressed_message_not_broadcast() {
        let mut msg = TopologyMessage::new(NodeId::new(7), 1);
        msg.destination = NodeId::new(9);
        assert!(!msg.is_broadcast());
    }

    #[test]
    fn test_payload_variants_round_trip_yaml() {
        // Wire encoding is the host's concern; this only pins the serde
        // shape of the tagged union.
        let msg = TopologyMessage {
            origin: NodeId::new(1),
            destination: NodeId::NULL,
            fwds: 0,
            ttl: 6,
            payload: vec![TopologyPayload::Map(MapUpdate::new())],
        };
        let encoded = serde_yaml::to_string(&msg).unwrap();
        let decoded: TopologyMessage = serde_yaml::from_str(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }
}
