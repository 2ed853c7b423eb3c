use super::*;
use crate::identity::LinkId;

fn block(n: u8) -> BlockId {
    let mut bytes = [0u8; 32];
    bytes[0] = n;
    BlockId::from_bytes(bytes)
}

fn chain(head: &str, pending: &str) -> ChainStatus {
    ChainStatus {
        head_block: block(0),
        head_producer: ProducerName::from(head),
        pending_producer: ProducerName::from(pending),
    }
}

fn feed_head_blocks(det: &mut DeviationDetector, chain: &ChainStatus, count: u16) {
    for i in 0..count {
        let report = det.observe_block(LinkId::new(1), block(i as u8), &chain.head_producer, chain);
        assert!(report.is_none(), "unexpected report at block {i}");
    }
}

#[test]
fn test_overage_recorded_past_quota() {
    let mut det = DeviationDetector::new(12);
    let status = chain("alpha", "bravo");
    feed_head_blocks(&mut det, &status, 12);

    // 13th block from the same producer: one block over quota.
    let report = det
        .observe_block(LinkId::new(1), block(13), &ProducerName::from("alpha"), &status)
        .expect("overage report");
    assert_eq!(report.producer, ProducerName::from("alpha"));
    assert_eq!(report.descriptor.symptom(), ForkSymptom::Overage(1));

    let history = det.history(&ProducerName::from("alpha")).unwrap();
    assert_eq!(history.episodes.len(), 1);
}

#[test]
fn test_overage_grows_per_extra_block() {
    let mut det = DeviationDetector::new(12);
    let status = chain("alpha", "bravo");
    feed_head_blocks(&mut det, &status, 12);

    for extra in 1..=3u16 {
        let report = det
            .observe_block(LinkId::new(1), block(20), &ProducerName::from("alpha"), &status)
            .expect("overage report");
        assert_eq!(report.descriptor.symptom(), ForkSymptom::Overage(extra));
    }
}

#[test]
fn test_block_count_saturates_without_handoff() {
    // A chain with a single producer never hands off; the counter pins
    // at the top instead of wrapping back under quota.
    let mut det = DeviationDetector::new(12);
    let status = chain("alpha", "alpha");
    let alpha = ProducerName::from("alpha");
    for _ in 0..(u16::MAX as u32 + 100) {
        det.observe_block(LinkId::new(1), block(1), &alpha, &status);
    }
    assert_eq!(det.block_count(), u16::MAX);

    let report = det
        .observe_block(LinkId::new(1), block(2), &alpha, &status)
        .expect("overage report");
    assert_eq!(report.descriptor.symptom(), ForkSymptom::Overage(u16::MAX - 12));
}

#[test]
fn test_deficit_on_early_handoff() {
    let mut det = DeviationDetector::new(12);
    let status = chain("alpha", "bravo");
    feed_head_blocks(&mut det, &status, 8);

    // Hand-off after only 8 of 12 blocks: deficit 4 against alpha.
    let report = det
        .observe_block(LinkId::new(2), block(9), &ProducerName::from("bravo"), &status)
        .expect("deficit report");
    assert_eq!(report.producer, ProducerName::from("alpha"));
    assert_eq!(report.descriptor.symptom(), ForkSymptom::Deficit(4));
    assert_eq!(report.descriptor.depth, 8);
    assert_eq!(report.descriptor.from_link, LinkId::new(2));

    // The new producer's count restarts at 1.
    assert_eq!(det.block_count(), 1);
}

#[test]
fn test_clean_handoff_no_report() {
    let mut det = DeviationDetector::new(12);
    let status = chain("alpha", "bravo");
    feed_head_blocks(&mut det, &status, 12);

    let report =
        det.observe_block(LinkId::new(1), block(13), &ProducerName::from("bravo"), &status);
    assert!(report.is_none());
    assert_eq!(det.block_count(), 1);
}

#[test]
fn test_first_handoff_records_full_deficit() {
    // A hand-off before any head block is counted charges the head
    // producer with the whole quota.
    let mut det = DeviationDetector::new(12);
    let status = chain("alpha", "bravo");
    let report = det
        .observe_block(LinkId::new(1), block(1), &ProducerName::from("bravo"), &status)
        .expect("deficit report");
    assert_eq!(report.producer, ProducerName::from("alpha"));
    assert_eq!(report.descriptor.symptom(), ForkSymptom::Deficit(12));
    assert_eq!(report.descriptor.depth, 0);
}

#[test]
fn test_stale_producer_block_recorded_as_fork() {
    let mut det = DeviationDetector::new(12);
    let status = chain("alpha", "bravo");
    feed_head_blocks(&mut det, &status, 12);
    det.observe_block(LinkId::new(1), block(13), &ProducerName::from("bravo"), &status);

    // Chain advances: bravo is now head. A late block from alpha is a
    // micro-fork symptom.
    let advanced = chain("bravo", "charlie");
    let report = det
        .observe_block(LinkId::new(3), block(14), &ProducerName::from("alpha"), &advanced)
        .expect("fork report");
    assert_eq!(report.producer, ProducerName::from("alpha"));
    assert_eq!(report.descriptor.symptom(), ForkSymptom::Fork(1));
    assert_eq!(report.descriptor.from_link, LinkId::new(3));
}

#[test]
fn test_fork_episode_deepens_and_flushes_at_handoff() {
    let mut det = DeviationDetector::new(12);
    let status = chain("alpha", "bravo");
    feed_head_blocks(&mut det, &status, 12);
    det.observe_block(LinkId::new(1), block(13), &ProducerName::from("bravo"), &status);

    // Three consecutive stale blocks from alpha: one open episode,
    // reported when it opens, deepened silently after.
    let advanced = chain("bravo", "charlie");
    let alpha = ProducerName::from("alpha");
    assert!(det
        .observe_block(LinkId::new(3), block(14), &alpha, &advanced)
        .is_some());
    assert!(det
        .observe_block(LinkId::new(3), block(15), &alpha, &advanced)
        .is_none());
    assert!(det
        .observe_block(LinkId::new(3), block(16), &alpha, &advanced)
        .is_none());

    // Not yet in the closed history.
    let history = det.history(&alpha).unwrap();
    assert!(history.episodes.is_empty());
    assert_eq!(history.current.unwrap().depth, 3);

    // The next hand-off flushes the open episode for the producer
    // superseded one round earlier.
    // Bravo completes its turn (the hand-off block already counted 1).
    for i in 0..11u16 {
        det.observe_block(LinkId::new(1), block(17 + i as u8), &ProducerName::from("bravo"), &advanced);
    }
    det.observe_block(LinkId::new(1), block(30), &ProducerName::from("charlie"), &advanced);

    let history = det.history(&alpha).unwrap();
    assert!(history.current.is_none());
    assert_eq!(history.episodes.len(), 1);
    assert_eq!(history.episodes[0].symptom(), ForkSymptom::Fork(3));
}

#[test]
fn test_unknown_producer_logged_not_recorded() {
    let mut det = DeviationDetector::new(12);
    let status = chain("alpha", "bravo");
    let report =
        det.observe_block(LinkId::new(1), block(1), &ProducerName::from("mallory"), &status);
    assert!(report.is_none());
    assert!(det.flagged_producers().is_empty());
}

#[test]
fn test_histories_append_only() {
    let mut det = DeviationDetector::new(2);
    let status = chain("alpha", "bravo");
    feed_head_blocks(&mut det, &status, 1);
    det.observe_block(LinkId::new(1), block(2), &ProducerName::from("bravo"), &status);

    let first_len = det.history(&ProducerName::from("alpha")).unwrap().episodes.len();
    assert_eq!(first_len, 1);

    // Next round: alpha hands off early again.
    let next = chain("bravo", "alpha");
    det.observe_block(LinkId::new(1), block(3), &ProducerName::from("alpha"), &next);
    let back = chain("alpha", "bravo");
    det.observe_block(LinkId::new(1), block(4), &ProducerName::from("bravo"), &back);

    let later_len = det.history(&ProducerName::from("alpha")).unwrap().episodes.len();
    assert!(later_len > first_len);
}

#[test]
fn test_apply_fork_report_merges_history() {
    let mut det = DeviationDetector::new(12);
    let report = ForkReport {
        producer: ProducerName::from("alpha"),
        descriptor: ForkDescriptor {
            from_link: LinkId::new(5),
            fork_base: block(7),
            deficit: 3,
            depth: 9,
            ..ForkDescriptor::default()
        },
    };
    det.apply_fork_report(&report);
    det.apply_fork_report(&report);

    let history = det.history(&ProducerName::from("alpha")).unwrap();
    assert_eq!(history.episodes.len(), 2);
    assert_eq!(history.episodes[0].symptom(), ForkSymptom::Deficit(3));

    let flagged = det.flagged_producers();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].1, 2);
}

#[test]
fn test_symptom_precedence() {
    let mut fd = ForkDescriptor::default();
    assert_eq!(fd.symptom(), ForkSymptom::None);
    fd.depth = 4;
    assert_eq!(fd.symptom(), ForkSymptom::Fork(4));
    fd.deficit = 2;
    assert_eq!(fd.symptom(), ForkSymptom::Deficit(2));
    fd.overage = 1;
    assert_eq!(fd.symptom(), ForkSymptom::Overage(1));
}
