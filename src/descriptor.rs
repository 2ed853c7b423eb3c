//! Node and Link Descriptors
//!
//! Value types describing participants and the connections between them.
//! Descriptors are the canonical input to identity derivation and the
//! payload of map updates: what a node gossips about itself and its
//! connections is exactly what peers hash to agree on its id.

use crate::identity::{LinkId, NodeId, ProducerName};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing role strings in filter expressions.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("unknown node role: {0}")]
    UnknownNodeRole(String),

    #[error("unknown link role: {0}")]
    UnknownLinkRole(String),
}

/// Declared role of a node in the monitored network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Hosts active block producers.
    Producer,
    /// Standby producer host.
    Backup,
    /// Serves client API traffic.
    Api,
    /// Full history node.
    Full,
    /// Bridges network segments.
    Gateway,
    /// Operator-defined role outside the standard set.
    Special,
}

impl NodeRole {
    /// Stable lowercase string form, used in identity derivation.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Producer => "producer",
            NodeRole::Backup => "backup",
            NodeRole::Api => "api",
            NodeRole::Full => "full",
            NodeRole::Gateway => "gateway",
            NodeRole::Special => "special",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NodeRole {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "producer" => Ok(NodeRole::Producer),
            "backup" => Ok(NodeRole::Backup),
            "api" => Ok(NodeRole::Api),
            "full" => Ok(NodeRole::Full),
            "gateway" => Ok(NodeRole::Gateway),
            "special" => Ok(NodeRole::Special),
            other => Err(DescriptorError::UnknownNodeRole(other.to_string())),
        }
    }
}

/// Operational status of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Announced but not yet serving.
    Starting,
    /// In normal operation.
    Running,
    /// Announced an orderly shutdown.
    Shutdown,
    /// Removed from the live map; record retained for history.
    Dropped,
}

impl NodeStatus {
    /// Stable lowercase string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Starting => "starting",
            NodeStatus::Running => "running",
            NodeStatus::Shutdown => "shutdown",
            NodeStatus::Dropped => "dropped",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Traffic class carried by a link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkRole {
    /// Block propagation.
    Blocks,
    /// Transaction relay.
    Transactions,
    /// Control-plane traffic.
    Control,
    /// All of the above on one connection.
    Combined,
}

impl LinkRole {
    /// Stable lowercase string form, used in identity derivation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkRole::Blocks => "blocks",
            LinkRole::Transactions => "transactions",
            LinkRole::Control => "control",
            LinkRole::Combined => "combined",
        }
    }
}

impl fmt::Display for LinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LinkRole {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blocks" => Ok(LinkRole::Blocks),
            "transactions" => Ok(LinkRole::Transactions),
            "control" => Ok(LinkRole::Control),
            "combined" => Ok(LinkRole::Combined),
            other => Err(DescriptorError::UnknownLinkRole(other.to_string())),
        }
    }
}

/// Description of a participant node.
///
/// `id` is derived from the other fields; a descriptor arriving with a
/// null id gets its id filled in by `add_node`. The location string is
/// free-form but conventionally "<reporter-name>:<address>".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Content-derived id; `NodeId::NULL` until derived.
    #[serde(default)]
    pub id: NodeId,
    /// Human-readable location, conventionally "<reporter>:<address>".
    pub location: String,
    /// Declared role.
    pub role: NodeRole,
    /// Protocol version string.
    pub version: String,
    /// Block-producer account names hosted on this node.
    #[serde(default)]
    pub producers: Vec<ProducerName>,
    /// Operational status.
    pub status: NodeStatus,
}

impl NodeDescriptor {
    /// Build the descriptor for the locally running node.
    ///
    /// Location is "<bp_name>:<address>", role producer, status running,
    /// hosting the configured producer accounts. The id is left null and
    /// derived on insertion.
    pub fn for_local(
        bp_name: &str,
        address: &str,
        version: &str,
        producers: Vec<ProducerName>,
    ) -> Self {
        Self {
            id: NodeId::NULL,
            location: format!("{}:{}", bp_name, address),
            role: NodeRole::Producer,
            version: version.to_string(),
            producers,
            status: NodeStatus::Running,
        }
    }
}

/// Description of a connection between two nodes.
///
/// "Active" is the endpoint that initiated the connection, "passive" the
/// one that accepted it. `hops` counts intermediate devices (routers,
/// firewalls) between the endpoints, as declared by the reporter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDescriptor {
    /// Content-derived id; `LinkId::NULL` until derived.
    #[serde(default)]
    pub id: LinkId,
    /// Connection-initiating endpoint.
    pub active: NodeId,
    /// Accepting endpoint.
    pub passive: NodeId,
    /// Traffic class carried.
    pub role: LinkRole,
    /// Declared count of intermediate devices.
    #[serde(default)]
    pub hops: u16,
}

impl LinkDescriptor {
    /// Create a descriptor with a null id, to be derived on insertion.
    pub fn new(active: NodeId, passive: NodeId, role: LinkRole, hops: u16) -> Self {
        Self {
            id: LinkId::NULL,
            active,
            passive,
            role,
            hops,
        }
    }

    /// The endpoint on the far side of `from`, if `from` is an endpoint.
    pub fn peer_of(&self, from: NodeId) -> Option<NodeId> {
        if self.active == from {
            Some(self.passive)
        } else if self.passive == from {
            Some(self.active)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_role_round_trip() {
        for role in [
            NodeRole::Producer,
            NodeRole::Backup,
            NodeRole::Api,
            NodeRole::Full,
            NodeRole::Gateway,
            NodeRole::Special,
        ] {
            assert_eq!(role.as_str().parse::<NodeRole>().unwrap(), role);
        }
    }

    #[test]
    fn test_link_role_round_trip() {
        for role in [
            LinkRole::Blocks,
            LinkRole::Transactions,
            LinkRole::Control,
            LinkRole::Combined,
        ] {
            assert_eq!(role.as_str().parse::<LinkRole>().unwrap(), role);
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!(matches!(
            "observer".parse::<NodeRole>(),
            Err(DescriptorError::UnknownNodeRole(_))
        ));
        assert!(matches!(
            "telemetry".parse::<LinkRole>(),
            Err(DescriptorError::UnknownLinkRole(_))
        ));
    }

    #[test]
    fn test_local_descriptor_fields() {
        let nd = NodeDescriptor::for_local(
            "acme",
            "10.0.0.1:9876",
            "v2.1",
            vec![ProducerName::from("acmeprod")],
        );
        assert_eq!(nd.location, "acme:10.0.0.1:9876");
        assert_eq!(nd.role, NodeRole::Producer);
        assert_eq!(nd.status, NodeStatus::Running);
        assert!(nd.id.is_null());
    }

    #[test]
    fn test_peer_of() {
        let a = NodeId::new(1);
        let b = NodeId::new(2);
        let ld = LinkDescriptor::new(a, b, LinkRole::Blocks, 0);
        assert_eq!(ld.peer_of(a), Some(b));
        assert_eq!(ld.peer_of(b), Some(a));
        assert_eq!(ld.peer_of(NodeId::new(3)), None);
    }
}
