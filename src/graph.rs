//! Topology Graph Store
//!
//! The node and link tables and their adjacency. Every participant holds
//! an eventually-consistent partial view of the same global graph,
//! converged through gossip rather than coordination: all mutations are
//! keyed by content-derived ids, so applying the same update twice (or
//! applying it on two nodes independently) is always safe.
//!
//! Both tables, the per-node route caches, and the graph version stamp
//! live behind a single reader-writer lock. Mutations take the write
//! guard for the duration of a whole batch; queries take the read guard,
//! so a long-running projection never observes a torn graph.
//!
//! Node and link records are never deleted. Dropping a node severs its
//! incident links (closure-counting each) and marks the record dropped;
//! dropping a link only increments its closure counter. Historical
//! metrics and old route caches therefore stay interpretable for the
//! lifetime of the process.

use crate::descriptor::{LinkDescriptor, NodeDescriptor, NodeRole, NodeStatus};
use crate::identity::{link_identity, node_identity, LinkId, NodeId, ProducerName};
use crate::metrics::{LinkMetrics, LinkSample};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

mod route;

pub use route::RouteOutcome;

/// A node record: descriptor, incident links, and the route cache for
/// destinations queried from this node.
#[derive(Clone, Debug)]
pub struct TopoNode {
    /// The node's descriptor as last gossiped.
    pub info: NodeDescriptor,
    /// Links incident to this node.
    pub links: BTreeSet<LinkId>,
    /// Best-known routes from this node, stamped with the graph version
    /// they were computed against.
    pub routes: HashMap<NodeId, RouteEntry>,
}

impl TopoNode {
    fn new(info: NodeDescriptor) -> Self {
        Self {
            info,
            links: BTreeSet::new(),
            routes: HashMap::new(),
        }
    }
}

/// A link record: descriptor, one metrics accumulator per direction, and
/// the closure counter.
#[derive(Clone, Debug)]
pub struct TopoLink {
    /// The link's descriptor as last gossiped.
    pub info: LinkDescriptor,
    /// Active-to-passive metrics.
    pub up: LinkMetrics,
    /// Passive-to-active metrics.
    pub down: LinkMetrics,
    /// Times the underlying connection was reported torn down.
    pub closures: u32,
}

impl TopoLink {
    fn new(info: LinkDescriptor) -> Self {
        Self {
            info,
            up: LinkMetrics::new(),
            down: LinkMetrics::new(),
            closures: 0,
        }
    }
}

/// A cached route answer, valid only while its version stamp matches the
/// graph. A stale stamp is a cache miss and forces recomputation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteEntry {
    /// The cached answer.
    pub outcome: RouteOutcome,
    /// Graph version this answer was computed against.
    pub version: u64,
}

/// A batch of graph mutations, the unit gossiped between participants.
///
/// Application order is fixed: node additions, link additions, node
/// removals, link removals. Links added in the same batch as their
/// endpoints therefore always find them, and a removal cannot race an
/// addition of the same id within one batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapUpdate {
    /// Nodes to add.
    #[serde(default)]
    pub add_nodes: Vec<NodeDescriptor>,
    /// Links to add.
    #[serde(default)]
    pub add_links: Vec<LinkDescriptor>,
    /// Nodes to drop.
    #[serde(default)]
    pub drop_nodes: Vec<NodeId>,
    /// Links to drop.
    #[serde(default)]
    pub drop_links: Vec<LinkId>,
}

impl MapUpdate {
    /// An empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the batch carries no mutations.
    pub fn is_empty(&self) -> bool {
        self.add_nodes.is_empty()
            && self.add_links.is_empty()
            && self.drop_nodes.is_empty()
            && self.drop_links.is_empty()
    }
}

/// The lock-protected tables.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub(crate) nodes: HashMap<NodeId, TopoNode>,
    pub(crate) links: HashMap<LinkId, TopoLink>,
    /// Bumped on every mutation; stamps route cache entries.
    pub(crate) version: u64,
}

impl Tables {
    fn add_node(&mut self, desc: &mut NodeDescriptor) -> NodeId {
        if desc.id.is_null() {
            desc.id = node_identity(desc);
        }
        let id = desc.id;
        match self.nodes.get_mut(&id) {
            None => {
                debug!(node = %id, location = %desc.location, "adding node table entry");
                self.nodes.insert(id, TopoNode::new(desc.clone()));
                self.version += 1;
            }
            Some(existing) if existing.info.status == NodeStatus::Dropped => {
                // A dropped node reappearing in the gossip stream rejoins
                // with its announced status.
                info!(node = %id, status = %desc.status, "dropped node rejoined");
                existing.info.status = desc.status;
                self.version += 1;
            }
            Some(_) => {}
        }
        id
    }

    fn drop_node(&mut self, id: NodeId) {
        let incident: Vec<LinkId> = match self.nodes.get(&id) {
            Some(node) => node.links.iter().copied().collect(),
            None => {
                debug!(node = %id, "drop for unknown node ignored");
                return;
            }
        };
        // Sever incident links before the node leaves the live map, so
        // no link's endpoint ever points at a live-but-unreachable hole.
        for link in incident {
            self.drop_link(link);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.info.status = NodeStatus::Dropped;
        }
        self.version += 1;
        info!(node = %id, "node dropped from live map");
    }

    fn add_link(&mut self, desc: &mut LinkDescriptor) -> LinkId {
        if desc.id.is_null() {
            desc.id = link_identity(desc);
        }
        let id = desc.id;
        for endpoint in [desc.active, desc.passive] {
            match self.nodes.get_mut(&endpoint) {
                Some(node) => {
                    if node.links.insert(id) {
                        self.version += 1;
                    }
                }
                None => {
                    // Tolerated: the endpoint's add may still be in
                    // flight. The link is stored regardless.
                    info!(link = %id, node = %endpoint, "no node table entry for link endpoint");
                }
            }
        }
        if !self.links.contains_key(&id) {
            debug!(link = %id, active = %desc.active, passive = %desc.passive,
                   "adding link table entry");
            self.links.insert(id, TopoLink::new(desc.clone()));
            self.version += 1;
        }
        id
    }

    fn drop_link(&mut self, id: LinkId) {
        match self.links.get_mut(&id) {
            Some(link) => {
                link.closures += 1;
                self.version += 1;
                debug!(link = %id, closures = link.closures, "link closure recorded");
            }
            None => {
                debug!(link = %id, "drop for unknown link ignored");
            }
        }
    }

    fn apply_map_update(&mut self, update: &MapUpdate) {
        for desc in &update.add_nodes {
            let mut desc = desc.clone();
            self.add_node(&mut desc);
        }
        for desc in &update.add_links {
            let mut desc = desc.clone();
            self.add_link(&mut desc);
        }
        for id in &update.drop_nodes {
            self.drop_node(*id);
        }
        for id in &update.drop_links {
            self.drop_link(*id);
        }
    }

    fn record_sample(&mut self, sample: &LinkSample, reversed: bool) {
        match self.links.get_mut(&sample.link) {
            Some(link) => {
                // A reversed sample is framed from the remote peer's
                // perspective: its "up" half describes our "down" flow.
                if reversed {
                    link.up.sample(&sample.down);
                    link.down.sample(&sample.up);
                } else {
                    link.up.sample(&sample.up);
                    link.down.sample(&sample.down);
                }
            }
            None => {
                // Duplicate or late delivery for a link we never saw.
                debug!(link = %sample.link, "sample for unknown link dropped");
            }
        }
    }

    fn peer_node(&self, on_link: LinkId, from: NodeId) -> Option<NodeId> {
        match self.links.get(&on_link) {
            Some(link) => link.info.peer_of(from),
            None => {
                warn!(link = %on_link, "peer lookup for unknown link");
                None
            }
        }
    }
}

/// The topology graph store.
///
/// All operations are internally synchronized; the store is shared
/// between the host's network-event handlers, sampling timers, and
/// reporting paths as a plain `Arc<TopologyGraph>`.
#[derive(Debug, Default)]
pub struct TopologyGraph {
    inner: RwLock<Tables>,
}

impl TopologyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, deriving its id if the descriptor carries none.
    /// Idempotent on the derived id; returns the id either way.
    pub fn add_node(&self, desc: &mut NodeDescriptor) -> NodeId {
        self.inner.write().add_node(desc)
    }

    /// Drop a node from the live map: sever (closure-count) all incident
    /// links, then mark the record dropped. The record is retained.
    pub fn drop_node(&self, id: NodeId) {
        self.inner.write().drop_node(id);
    }

    /// Add a link, deriving its id if the descriptor carries none, and
    /// register it with both endpoint nodes where they exist. A missing
    /// endpoint is logged but not an error; the link is stored anyway.
    pub fn add_link(&self, desc: &mut LinkDescriptor) -> LinkId {
        self.inner.write().add_link(desc)
    }

    /// Record a closure of the link. The record is retained along with
    /// its accumulated metrics.
    pub fn drop_link(&self, id: LinkId) {
        self.inner.write().drop_link(id);
    }

    /// Apply a whole mutation batch under one write-lock acquisition:
    /// node additions, link additions, node removals, link removals,
    /// in that order.
    pub fn apply_map_update(&self, update: &MapUpdate) {
        self.inner.write().apply_map_update(update);
    }

    /// Fold a directional sample into the link's accumulators. When
    /// `reversed` is set the sample is framed from the remote peer's
    /// perspective and its halves swap. Unknown link: logged no-op.
    pub fn record_sample(&self, sample: &LinkSample, reversed: bool) {
        self.inner.write().record_sample(sample, reversed);
    }

    /// Shortest hop count from `from` to `to`, or `None` when either
    /// endpoint is unknown or no path exists. Consults the source node's
    /// version-stamped route cache and repopulates it on a miss.
    pub fn find_route(&self, from: NodeId, to: NodeId) -> Option<u16> {
        self.inner.write().find_route(from, to)
    }

    /// The cached route answer for a pair, if one is stored at the
    /// current graph version.
    pub fn cached_route(&self, from: NodeId, to: NodeId) -> Option<RouteOutcome> {
        let tables = self.inner.read();
        let node = tables.nodes.get(&from)?;
        let entry = node.routes.get(&to)?;
        (entry.version == tables.version).then_some(entry.outcome)
    }

    /// The node on the far side of `on_link` as seen from `from`.
    pub fn peer_node(&self, on_link: LinkId, from: NodeId) -> Option<NodeId> {
        self.inner.read().peer_node(on_link, from)
    }

    /// Descriptors of nodes matching any of the given roles; an empty
    /// filter matches every node.
    pub fn nodes_matching(&self, roles: &[NodeRole]) -> Vec<NodeDescriptor> {
        let tables = self.inner.read();
        tables
            .nodes
            .values()
            .filter(|n| roles.is_empty() || roles.contains(&n.info.role))
            .map(|n| n.info.clone())
            .collect()
    }

    /// Descriptors of links incident to the given node.
    pub fn links_of(&self, node: NodeId) -> Vec<LinkDescriptor> {
        let tables = self.inner.read();
        tables
            .links
            .values()
            .filter(|l| l.info.active == node || l.info.passive == node)
            .map(|l| l.info.clone())
            .collect()
    }

    /// The node hosting the given producer account, if any.
    pub fn find_producer_node(&self, producer: &ProducerName) -> Option<NodeId> {
        let tables = self.inner.read();
        tables
            .nodes
            .values()
            .find(|n| n.info.producers.contains(producer))
            .map(|n| n.info.id)
    }

    /// Snapshot of a link record, for reporting collaborators.
    pub fn link_snapshot(&self, id: LinkId) -> Option<TopoLink> {
        self.inner.read().links.get(&id).cloned()
    }

    /// Snapshot of a node record, for reporting collaborators.
    pub fn node_snapshot(&self, id: NodeId) -> Option<TopoNode> {
        self.inner.read().nodes.get(&id).cloned()
    }

    /// Number of node records (including dropped ones).
    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }

    /// Number of link records.
    pub fn link_count(&self) -> usize {
        self.inner.read().links.len()
    }

    /// Current graph version stamp.
    pub fn version(&self) -> u64 {
        self.inner.read().version
    }
}
