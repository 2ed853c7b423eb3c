//! Topology Service
//!
//! The shell tying the graph store, routing engine, deviation detector,
//! and gossip dispatch together behind the four inbound entry points the
//! host calls: `apply_map_update`, `record_sample`, `on_block_received`,
//! and `handle_message`.
//!
//! The service pulls chain state through the [`ChainView`] boundary and
//! hands outbound messages to the [`MessageSink`] boundary; it never
//! performs network or chain I/O itself.

use crate::config::{ConfigError, TopologyConfig};
use crate::descriptor::NodeDescriptor;
use crate::deviation::{ChainStatus, DeviationDetector};
use crate::gossip::{MessageSink, TopologyMessage, TopologyPayload};
use crate::graph::{MapUpdate, TopologyGraph};
use crate::identity::{BlockId, LinkId, NodeId, ProducerName};
use crate::metrics::LinkSample;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};


/// Pull-boundary to the host's chain and block-production subsystem.
pub trait ChainView: Send + Sync {
    /// Head block plus head and pending producer identity, or `None`
    /// before the chain is ready.
    fn chain_status(&self) -> Option<ChainStatus>;

    /// The active producer schedule for the current round, in order.
    fn producer_schedule(&self) -> Vec<ProducerName>;
}

/// The topology mapper service.
pub struct TopologyService {
    config: TopologyConfig,
    local_node_id: NodeId,
    graph: TopologyGraph,
    detector: Mutex<DeviationDetector>,
    chain: Arc<dyn ChainView>,
    sink: Arc<dyn MessageSink>,
}

impl TopologyService {
    /// Create the service: validate configuration, derive the local
    /// node's identity, and seed the graph with it.
    ///
    /// `local_address` and `version` come from the host's peer
    /// subsystem; they become part of the local node's canonical
    /// identity.
    pub fn new(
        config: TopologyConfig,
        local_address: &str,
        version: &str,
        chain: Arc<dyn ChainView>,
        sink: Arc<dyn MessageSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let graph = TopologyGraph::new();
        let mut local = NodeDescriptor::for_local(
            &config.bp_name,
            local_address,
            version,
            config.producer_names(),
        );
        let local_node_id = graph.add_node(&mut local);
        info!(node = %local_node_id, location = %local.location, "topology service initialized");

        let detector = Mutex::new(DeviationDetector::new(config.production_quota));
        Ok(Self {
            config,
            local_node_id,
            graph,
            detector,
            chain,
            sink,
        })
    }

    /// The local node's content-derived id.
    pub fn local_node_id(&self) -> NodeId {
        self.local_node_id
    }

    /// The underlying graph store, for reporting collaborators.
    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    /// The validated configuration.
    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    /// The active producer schedule, pulled from the chain subsystem.
    pub fn producer_schedule(&self) -> Vec<ProducerName> {
        self.chain.producer_schedule()
    }

    /// A fresh locally originated broadcast message.
    pub fn new_message(&self) -> TopologyMessage {
        TopologyMessage::new(self.local_node_id, self.config.max_hops)
    }

    // ===== Inbound entry points =====

    /// Apply a mutation batch to the local graph.
    pub fn apply_map_update(&self, update: &MapUpdate) {
        self.graph.apply_map_update(update);
    }

    /// Fold a directional sample into the sampled link's accumulators.
    /// `reversed` marks samples framed from the remote peer's
    /// perspective.
    pub fn record_sample(&self, sample: &LinkSample, reversed: bool) {
        self.graph.record_sample(sample, reversed);
    }

    /// Examine a newly arrived block for producer-timing deviations.
    /// A detected deviation is recorded locally and gossiped to peers.
    pub fn on_block_received(&self, src: LinkId, block_id: BlockId, producer: &ProducerName) {
        let status = match self.chain.chain_status() {
            Some(s) => s,
            None => {
                warn!(block = %block_id, "unable to process block: no chain status");
                return;
            }
        };
        let report = self
            .detector
            .lock()
            .observe_block(src, block_id, producer, &status);
        if let Some(report) = report {
            let mut message = self.new_message();
            message.payload.push(TopologyPayload::Fork(report));
            self.sink.send(message);
        }
    }

    /// Apply a received gossip message and re-broadcast it while its
    /// time-to-live allows.
    pub fn handle_message(&self, message: &TopologyMessage) {
        debug!(
            origin = %message.origin,
            fwds = message.fwds,
            ttl = message.ttl,
            payloads = message.payload.len(),
            "handling topology message"
        );
        for payload in &message.payload {
            match payload {
                TopologyPayload::Map(update) => self.graph.apply_map_update(update),
                // Samples arrive framed from the sender's perspective.
                TopologyPayload::Sample(sample) => self.graph.record_sample(sample, true),
                TopologyPayload::Fork(report) => self.detector.lock().apply_fork_report(report),
            }
        }

        let mut copy = message.clone();
        // A wrapped forward count would reset the flood bound.
        copy.fwds = copy.fwds.saturating_add(1);
        if copy.ttl > copy.fwds {
            debug!(ttl = copy.ttl, fwds = copy.fwds, "forwarding topology message");
            self.sink.send(copy);
        }
    }

    // ===== Forward decision =====

    /// Whether a received message should be propagated over further
    /// links.
    ///
    /// Refused when the message is our own echo (originated locally and
    /// already forwarded), or when it has already traveled farther than
    /// our shortest-hop distance to its origin, in which case it cannot
    /// reach anyone new through us.
    pub fn should_forward(&self, message: &TopologyMessage, inbound: LinkId) -> bool {
        if message.origin == self.local_node_id && message.fwds > 0 {
            debug!(link = %inbound, "refusing to re-flood our own message");
            return false;
        }
        match self.graph.find_route(self.local_node_id, message.origin) {
            Some(distance) => {
                if distance < message.fwds {
                    debug!(
                        origin = %message.origin,
                        distance = distance,
                        fwds = message.fwds,
                        "message traveled beyond shortest path, dropping"
                    );
                    false
                } else {
                    true
                }
            }
            // Unknown origin distance: let a fresh message through, but
            // never one that is already traveling.
            None => message.fwds == 0,
        }
    }

    // ===== Outbound wrapping =====

    /// Apply a locally built mutation batch and flood it to peers.
    pub fn broadcast_map_update(&self, update: MapUpdate) {
        self.graph.apply_map_update(&update);
        let mut message = self.new_message();
        message.payload.push(TopologyPayload::Map(update));
        info!("sending a map update message");
        self.sink.send(message);
    }

    /// Record a locally captured sample and send it to the sampled
    /// link's peer as a point-to-point hint (ttl 1, not a flood).
    pub fn send_sample(&self, sample: LinkSample) {
        self.graph.record_sample(&sample, false);
        let mut message = self.new_message();
        message.ttl = 1;
        if let Some(peer) = self.graph.peer_node(sample.link, self.local_node_id) {
            message.destination = peer;
        }
        info!(link = %sample.link, "sending new link sample message");
        message.payload.push(TopologyPayload::Sample(sample));
        self.sink.send(message);
    }

    // ===== Queries =====

    /// Shortest hop count between two nodes, or `None` when unknown or
    /// disconnected.
    pub fn find_route(&self, from: NodeId, to: NodeId) -> Option<u16> {
        self.graph.find_route(from, to)
    }

    /// Producers with recorded deviation episodes, with their episode
    /// counts, for reporting collaborators.
    pub fn flagged_producers(&self) -> Vec<(ProducerName, usize)> {
        self.detector
            .lock()
            .flagged_producers()
            .into_iter()
            .map(|(name, count)| (name.clone(), count))
            .collect()
    }
}
