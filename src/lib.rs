//! topomap: live topology mapping for block-producing p2p networks.
//!
//! Maintains an eventually-consistent map of a peer-to-peer network's
//! nodes and links, computes shortest hop-count routes over it, folds
//! per-link performance samples into rolling statistics, watches block
//! production for producer-timing deviations, and disseminates topology
//! changes through a self-terminating bounded flood.
//!
//! The host process supplies chain state through [`ChainView`] and
//! message delivery through [`MessageSink`]; everything else lives here.

pub mod config;
pub mod descriptor;
pub mod deviation;
pub mod gossip;
pub mod graph;
pub mod identity;
pub mod metrics;
pub mod service;

// Re-export identity types
pub use identity::{
    link_identity, node_identity, node_long_identity, BlockId, LinkId, NodeId, ProducerName,
};

// Re-export descriptor types
pub use descriptor::{
    DescriptorError, LinkDescriptor, LinkRole, NodeDescriptor, NodeRole, NodeStatus,
};

// Re-export metric types
pub use metrics::{LinkMetrics, LinkSample, MetricAggregate, MetricKind, SampleBundle};

// Re-export graph types
pub use graph::{MapUpdate, RouteEntry, RouteOutcome, TopoLink, TopoNode, TopologyGraph};

// Re-export deviation types
pub use deviation::{
    ChainStatus, DeviationDetector, ForkDescriptor, ForkReport, ForkSymptom, ProducerHistory,
    DEFAULT_PRODUCTION_QUOTA,
};

// Re-export gossip types
pub use gossip::{MessageSink, TopologyMessage, TopologyPayload};

// Re-export config types
pub use config::{ConfigError, TopologyConfig, DEFAULT_MAX_HOPS, DEFAULT_SAMPLE_INTERVAL_SECS};

// Re-export service types
pub use service::{ChainView, TopologyService};
