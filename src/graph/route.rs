//! Shortest-route computation.
//!
//! Breadth-first search over link adjacency from the query source. BFS
//! yields true shortest hop counts in time linear in the explored edges,
//! and one search discovers the best route from the source to every
//! reachable node, so the whole frontier is cached in a single pass.
//!
//! Cache entries are stamped with the graph version they were computed
//! against; any mutation bumps the version, so a stale answer is never
//! served as current. Disconnection is cached too, as a negative entry,
//! so repeated queries against an unchanged graph stay cheap.

use super::{RouteEntry, Tables};
use crate::descriptor::NodeStatus;
use crate::identity::{LinkId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// The answer a route query can cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteOutcome {
    /// No path at the version this was computed.
    Unreachable,
    /// Source and destination are the same node.
    Local,
    /// Reachable in `length` hops, leaving the source via `first_hop`.
    Via {
        /// Shortest hop count.
        length: u16,
        /// Link to take out of the source node.
        first_hop: LinkId,
    },
}

impl RouteOutcome {
    /// Hop count, or `None` for unreachable.
    pub fn length(&self) -> Option<u16> {
        match self {
            RouteOutcome::Unreachable => None,
            RouteOutcome::Local => Some(0),
            RouteOutcome::Via { length, .. } => Some(*length),
        }
    }

    /// First-hop link, for routed outcomes.
    pub fn first_hop(&self) -> Option<LinkId> {
        match self {
            RouteOutcome::Via { first_hop, .. } => Some(*first_hop),
            _ => None,
        }
    }
}

impl Tables {
    /// Shortest hop count from `from` to `to`; `None` when either
    /// endpoint is unknown or no path exists.
    pub(crate) fn find_route(&mut self, from: NodeId, to: NodeId) -> Option<u16> {
        if !self.nodes.contains_key(&to) {
            warn!(node = %to, "no table entry for route target");
            return None;
        }
        if !self.nodes.contains_key(&from) {
            warn!(node = %from, "no table entry for route source");
            return None;
        }

        if let Some(entry) = self.nodes[&from].routes.get(&to) {
            if entry.version == self.version {
                return entry.outcome.length();
            }
        }

        if from == to {
            let entry = RouteEntry {
                outcome: RouteOutcome::Local,
                version: self.version,
            };
            self.cache_route(from, to, entry);
            return Some(0);
        }

        let discovered = self.breadth_first(from);
        let version = self.version;

        // One search resolves the whole reachable frontier; cache it all
        // on the source node, plus a negative entry for an unreached
        // destination.
        let target_length = discovered.get(&to).map(|(length, _)| *length);
        if let Some(node) = self.nodes.get_mut(&from) {
            for (dest, (length, first_hop)) in discovered {
                node.routes.insert(
                    dest,
                    RouteEntry {
                        outcome: RouteOutcome::Via { length, first_hop },
                        version,
                    },
                );
            }
            if target_length.is_none() {
                node.routes.insert(
                    to,
                    RouteEntry {
                        outcome: RouteOutcome::Unreachable,
                        version,
                    },
                );
                debug!(from = %from, to = %to, "no route found");
            }
        }
        target_length
    }

    /// BFS from `source`: hop count and first-hop link for every node
    /// reached. Dropped nodes do not relay; links whose far endpoint is
    /// missing from the node table are skipped.
    fn breadth_first(&self, source: NodeId) -> HashMap<NodeId, (u16, LinkId)> {
        let mut reached: HashMap<NodeId, (u16, LinkId)> = HashMap::new();
        let mut frontier: VecDeque<NodeId> = VecDeque::new();
        frontier.push_back(source);

        while let Some(current) = frontier.pop_front() {
            let (depth, inherited_hop) = match reached.get(&current) {
                Some((d, h)) => (*d, *h),
                None => (0, LinkId::NULL),
            };
            let node = match self.nodes.get(&current) {
                Some(n) => n,
                None => continue,
            };
            // A dropped node is still addressable but no longer relays.
            if current != source && node.info.status == NodeStatus::Dropped {
                continue;
            }
            for link_id in &node.links {
                let link = match self.links.get(link_id) {
                    Some(l) => l,
                    None => {
                        warn!(link = %link_id, "link id in node adjacency not found");
                        continue;
                    }
                };
                let peer = match link.info.peer_of(current) {
                    Some(p) => p,
                    None => continue,
                };
                if peer == source || reached.contains_key(&peer) {
                    continue;
                }
                if !self.nodes.contains_key(&peer) {
                    debug!(link = %link_id, node = %peer, "skipping link with unknown endpoint");
                    continue;
                }
                let first_hop = if current == source {
                    *link_id
                } else {
                    inherited_hop
                };
                reached.insert(peer, (depth + 1, first_hop));
                frontier.push_back(peer);
            }
        }
        reached
    }

    fn cache_route(&mut self, from: NodeId, to: NodeId, entry: RouteEntry) {
        if let Some(node) = self.nodes.get_mut(&from) {
            node.routes.insert(to, entry);
        }
    }
}
