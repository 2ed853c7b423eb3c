//! Per-Link Performance Metrics
//!
//! Rolling statistics for the two directions of each link. Samples are
//! taken at a fixed cadence by the host's scheduler and folded into
//! `MetricAggregate`s keyed by `MetricKind`; the aggregates retain the
//! minimum, running mean, maximum, most recent reading, and sample
//! count for each metric since the link was first observed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::identity::LinkId;

#[cfg(test)]
mod tests;

/// The kinds of measurement a link sample can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Messages waiting in the send queue at sample time.
    QueueDepth,
    /// High-water mark of the send queue over the interval.
    QueueMaxDepth,
    /// Time messages spent queued, microseconds.
    QueueLatencyUs,
    /// Wire round-trip latency, microseconds.
    NetLatencyUs,
    /// Bytes sent over the interval.
    BytesSent,
    /// Messages sent over the interval.
    MessagesSent,
    /// Send rate, bytes per second.
    BytesPerSecond,
    /// Send rate, messages per second.
    MessagesPerSecond,
    /// Fork episodes attributed to traffic on this link.
    ForkInstances,
    /// Blocks lost to the most recent fork.
    ForkDepth,
    /// Deepest fork observed.
    ForkMaxDepth,
}

impl MetricKind {
    /// Unit-bearing label for reports.
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::QueueDepth => "queue_depth",
            MetricKind::QueueMaxDepth => "queue_max_depth",
            MetricKind::QueueLatencyUs => "queue_latency (us)",
            MetricKind::NetLatencyUs => "net_latency (us)",
            MetricKind::BytesSent => "bytes_sent",
            MetricKind::MessagesSent => "messages_sent",
            MetricKind::BytesPerSecond => "bytes_per_second",
            MetricKind::MessagesPerSecond => "messages_per_second",
            MetricKind::ForkInstances => "fork_instances",
            MetricKind::ForkDepth => "fork_depth",
            MetricKind::ForkMaxDepth => "fork_max_depth",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Rolling aggregate for one metric: min / running mean / max / last
/// reading / sample count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricAggregate {
    /// Number of samples folded in.
    pub count: u64,
    /// Most recent reading.
    pub last: i64,
    /// Smallest reading seen.
    pub min: i64,
    /// Largest reading seen.
    pub max: i64,
    /// Running mean of all readings.
    pub avg: i64,
}

impl MetricAggregate {
    /// Fold one reading into the aggregate.
    pub fn fold(&mut self, value: i64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.avg = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
            // incremental mean: avg += (value - avg) / n
            let n = (self.count + 1) as i64;
            self.avg += (value - self.avg) / n;
        }
        self.last = value;
        self.count += 1;
    }
}

/// One direction of one link sample, as delivered by the peer-connection
/// subsystem. `sampled_at_ms` is Unix milliseconds at capture.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleBundle {
    /// Bytes moved in this direction over the interval.
    pub bytes: u64,
    /// Messages moved in this direction over the interval.
    pub messages: u64,
    /// Capture timestamp, Unix milliseconds.
    pub sampled_at_ms: u64,
    /// Individual metric readings.
    pub readings: BTreeMap<MetricKind, i64>,
}

/// A directional traffic sample for one link: the "up" half describes
/// active-to-passive flow, the "down" half passive-to-active.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSample {
    /// The sampled link.
    pub link: LinkId,
    /// Active-to-passive measurements.
    pub up: SampleBundle,
    /// Passive-to-active measurements.
    pub down: SampleBundle,
}

/// Accumulated metrics for one direction of a link.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMetrics {
    /// Total bytes across all samples.
    pub total_bytes: u64,
    /// Total messages across all samples.
    pub total_messages: u64,
    /// Timestamp of the first sample, Unix milliseconds; 0 = never sampled.
    pub first_sample_ms: u64,
    /// Timestamp of the most recent sample, Unix milliseconds.
    pub last_sample_ms: u64,
    /// Per-kind rolling aggregates.
    pub measurements: BTreeMap<MetricKind, MetricAggregate>,
}

impl LinkMetrics {
    /// Create empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one directional bundle into the accumulator.
    pub fn sample(&mut self, bundle: &SampleBundle) {
        self.total_bytes += bundle.bytes;
        self.total_messages += bundle.messages;
        if self.first_sample_ms == 0 {
            self.first_sample_ms = bundle.sampled_at_ms;
        }
        self.last_sample_ms = bundle.sampled_at_ms;
        for (kind, value) in &bundle.readings {
            self.measurements.entry(*kind).or_default().fold(*value);
        }
    }

    /// Whether any sample has been folded in.
    pub fn has_samples(&self) -> bool {
        self.first_sample_ms != 0
    }
}
