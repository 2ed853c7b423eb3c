//! Producer Deviation Detector
//!
//! Watches the stream of produced blocks and compares each block's
//! producer against the chain's notion of head and pending producer.
//! Three symptoms are flagged, each recorded as an append-only episode
//! against the producer that exhibited it:
//!
//! - **overage**: the head producer produced beyond its quota before
//!   handing off;
//! - **deficit**: hand-off to the pending producer arrived before the
//!   quota was exhausted;
//! - **fork**: a block arrived from a producer already superseded,
//!   evidence of an unresolved micro-fork.
//!
//! Episode histories are the durable evidence consumed by reporting
//! collaborators; nothing here is ever overwritten or escalated to a
//! hard error, since participants must stay available despite
//! inconsistent peers.

use crate::identity::{BlockId, LinkId, ProducerName};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, warn};

#[cfg(test)]
mod tests;

/// Default per-round production quota (blocks per producer turn).
pub const DEFAULT_PRODUCTION_QUOTA: u16 = 12;

/// Which symptom a deviation episode records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForkSymptom {
    /// Blocks observed from a superseded producer.
    Fork(u16),
    /// Hand-off arrived this many blocks before quota.
    Deficit(u16),
    /// This many blocks produced beyond quota.
    Overage(u16),
    /// Malformed episode with no symptom recorded.
    None,
}

/// A point-in-time record of one producer-timing deviation.
///
/// Exactly one of `depth`, `deficit`, `overage` is meaningful per
/// instance; `depth` additionally carries the block count at hand-off
/// for deficit episodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkDescriptor {
    /// Link the divergent block arrived on.
    pub from_link: LinkId,
    /// The block at which the deviation was observed.
    pub fork_base: BlockId,
    /// Blocks lost to the fork, or blocks produced before a deficit
    /// hand-off.
    pub depth: u16,
    /// Blocks short of quota at hand-off.
    pub deficit: u16,
    /// Blocks produced beyond quota.
    pub overage: u16,
}

impl ForkDescriptor {
    /// The symptom this episode records.
    pub fn symptom(&self) -> ForkSymptom {
        if self.overage > 0 {
            ForkSymptom::Overage(self.overage)
        } else if self.deficit > 0 {
            ForkSymptom::Deficit(self.deficit)
        } else if self.depth > 0 {
            ForkSymptom::Fork(self.depth)
        } else {
            ForkSymptom::None
        }
    }
}

/// A gossiped deviation report: one episode attributed to one producer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkReport {
    /// The producer exhibiting the deviation.
    pub producer: ProducerName,
    /// The recorded episode.
    pub descriptor: ForkDescriptor,
}

/// Append-only deviation history for one producer.
#[derive(Clone, Debug, Default)]
pub struct ProducerHistory {
    /// An episode still being accumulated, not yet flushed to history.
    pub current: Option<ForkDescriptor>,
    /// Closed episodes, oldest first.
    pub episodes: Vec<ForkDescriptor>,
}

/// The chain subsystem's view at a block arrival, pulled synchronously
/// from the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainStatus {
    /// Current head block.
    pub head_block: BlockId,
    /// Producer of the current head block.
    pub head_producer: ProducerName,
    /// Producer scheduled to take over next.
    pub pending_producer: ProducerName,
}

/// Per-reporting-node production watcher.
#[derive(Debug)]
pub struct DeviationDetector {
    /// Blocks a producer may produce per turn before hand-off.
    quota: u16,
    /// Blocks attributed to the current head producer so far.
    block_count: u16,
    /// The producer superseded at the last hand-off.
    prev_producer: Option<ProducerName>,
    /// Episode histories keyed by producer.
    producers: HashMap<ProducerName, ProducerHistory>,
}

impl DeviationDetector {
    /// Create a detector with the given production quota.
    pub fn new(quota: u16) -> Self {
        Self {
            quota,
            block_count: 0,
            prev_producer: None,
            producers: HashMap::new(),
        }
    }

    /// The configured quota.
    pub fn quota(&self) -> u16 {
        self.quota
    }

    /// Blocks counted for the current head producer.
    pub fn block_count(&self) -> u16 {
        self.block_count
    }

    /// Examine one observed block against the chain's current status.
    ///
    /// `src` is the link the block arrived on; the returned report, if
    /// any, has already been recorded locally and is suitable for
    /// gossiping to peers.
    pub fn observe_block(
        &mut self,
        src: LinkId,
        block_id: BlockId,
        producer: &ProducerName,
        chain: &ChainStatus,
    ) -> Option<ForkReport> {
        if *producer == chain.head_producer {
            // A single-producer chain never resets this count.
            self.block_count = self.block_count.saturating_add(1);
            if self.block_count > self.quota {
                let overage = self.block_count - self.quota;
                error!(
                    producer = %chain.head_producer,
                    overage = overage,
                    "producer overproduced beyond quota"
                );
                let descriptor = ForkDescriptor {
                    from_link: src,
                    fork_base: block_id,
                    overage,
                    ..ForkDescriptor::default()
                };
                return Some(self.record(chain.head_producer.clone(), descriptor));
            }
            None
        } else if *producer == chain.pending_producer {
            let report = if self.block_count < self.quota {
                let deficit = self.quota - self.block_count;
                error!(
                    from = %chain.head_producer,
                    to = %chain.pending_producer,
                    deficit = deficit,
                    "producer hand-off before quota exhausted"
                );
                let descriptor = ForkDescriptor {
                    from_link: src,
                    fork_base: block_id,
                    depth: self.block_count,
                    deficit,
                    ..ForkDescriptor::default()
                };
                Some(self.record(chain.head_producer.clone(), descriptor))
            } else {
                None
            };
            // Hand-off bookkeeping: flush any episode still open for the
            // producer superseded one round earlier.
            if let Some(prev) = self.prev_producer.take() {
                self.flush_current(&prev);
            }
            self.prev_producer = Some(chain.head_producer.clone());
            self.block_count = 1;
            report
        } else if self.prev_producer.as_ref() == Some(producer) {
            // A block from the producer superseded at the last hand-off:
            // evidence of an unresolved micro-fork. Consecutive stale
            // blocks deepen one open episode, flushed to history at the
            // next hand-off.
            warn!(
                producer = %producer,
                block = %block_id,
                "block from previous producer after hand-off"
            );
            let history = self.producers.entry(producer.clone()).or_default();
            match history.current.as_mut() {
                Some(open) => {
                    open.depth += 1;
                    None
                }
                None => {
                    let descriptor = ForkDescriptor {
                        from_link: src,
                        fork_base: block_id,
                        depth: 1,
                        ..ForkDescriptor::default()
                    };
                    history.current = Some(descriptor);
                    Some(ForkReport {
                        producer: producer.clone(),
                        descriptor,
                    })
                }
            }
        } else {
            warn!(
                producer = %producer,
                head = %chain.head_producer,
                pending = %chain.pending_producer,
                "block from producer outside the current rotation"
            );
            None
        }
    }

    /// Merge a gossiped deviation episode into the named producer's
    /// history.
    pub fn apply_fork_report(&mut self, report: &ForkReport) {
        self.producers
            .entry(report.producer.clone())
            .or_default()
            .episodes
            .push(report.descriptor);
    }

    /// Episode history for one producer.
    pub fn history(&self, producer: &ProducerName) -> Option<&ProducerHistory> {
        self.producers.get(producer)
    }

    /// Producers with at least one recorded episode, for reporting.
    pub fn flagged_producers(&self) -> Vec<(&ProducerName, usize)> {
        self.producers
            .iter()
            .filter(|(_, h)| !h.episodes.is_empty())
            .map(|(name, h)| (name, h.episodes.len()))
            .collect()
    }

    fn record(&mut self, producer: ProducerName, descriptor: ForkDescriptor) -> ForkReport {
        self.producers
            .entry(producer.clone())
            .or_default()
            .episodes
            .push(descriptor);
        ForkReport {
            producer,
            descriptor,
        }
    }

    fn flush_current(&mut self, producer: &ProducerName) {
        if let Some(history) = self.producers.get_mut(producer) {
            if let Some(open) = history.current.take() {
                history.episodes.push(open);
            }
        }
    }
}
