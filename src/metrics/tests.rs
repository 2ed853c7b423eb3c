use super::*;

fn bundle(bytes: u64, messages: u64, at_ms: u64, readings: &[(MetricKind, i64)]) -> SampleBundle {
    SampleBundle {
        bytes,
        messages,
        sampled_at_ms: at_ms,
        readings: readings.iter().copied().collect(),
    }
}

#[test]
fn test_aggregate_first_fold_sets_all_fields() {
    let mut agg = MetricAggregate::default();
    agg.fold(42);
    assert_eq!(agg.count, 1);
    assert_eq!(agg.last, 42);
    assert_eq!(agg.min, 42);
    assert_eq!(agg.max, 42);
    assert_eq!(agg.avg, 42);
}

#[test]
fn test_aggregate_tracks_extremes() {
    let mut agg = MetricAggregate::default();
    for v in [10, 50, 30] {
        agg.fold(v);
    }
    assert_eq!(agg.count, 3);
    assert_eq!(agg.min, 10);
    assert_eq!(agg.max, 50);
    assert_eq!(agg.last, 30);
    assert_eq!(agg.avg, 30);
}

#[test]
fn test_aggregate_negative_readings() {
    // Latency deltas can go negative under clock correction; the fold
    // must not assume non-negative values.
    let mut agg = MetricAggregate::default();
    agg.fold(-5);
    agg.fold(5);
    assert_eq!(agg.min, -5);
    assert_eq!(agg.max, 5);
    assert_eq!(agg.avg, 0);
}

#[test]
fn test_link_metrics_totals_and_timestamps() {
    let mut lm = LinkMetrics::new();
    assert!(!lm.has_samples());

    lm.sample(&bundle(1000, 4, 5_000, &[(MetricKind::QueueDepth, 3)]));
    lm.sample(&bundle(2000, 6, 10_000, &[(MetricKind::QueueDepth, 7)]));

    assert!(lm.has_samples());
    assert_eq!(lm.total_bytes, 3000);
    assert_eq!(lm.total_messages, 10);
    assert_eq!(lm.first_sample_ms, 5_000);
    assert_eq!(lm.last_sample_ms, 10_000);

    let agg = lm.measurements.get(&MetricKind::QueueDepth).unwrap();
    assert_eq!(agg.count, 2);
    assert_eq!(agg.min, 3);
    assert_eq!(agg.max, 7);
    assert_eq!(agg.last, 7);
}

#[test]
fn test_link_metrics_separate_kinds() {
    let mut lm = LinkMetrics::new();
    lm.sample(&bundle(
        0,
        0,
        1_000,
        &[
            (MetricKind::NetLatencyUs, 400),
            (MetricKind::QueueLatencyUs, 90),
        ],
    ));
    assert_eq!(lm.measurements.len(), 2);
    assert_eq!(
        lm.measurements.get(&MetricKind::NetLatencyUs).unwrap().last,
        400
    );
    assert_eq!(
        lm.measurements
            .get(&MetricKind::QueueLatencyUs)
            .unwrap()
            .last,
        90
    );
}

#[test]
fn test_metric_labels_carry_units() {
    assert_eq!(MetricKind::NetLatencyUs.label(), "net_latency (us)");
    assert_eq!(MetricKind::BytesSent.label(), "bytes_sent");
}
