//! Publish/consume behavior on a single process
//!
//! End-to-end delivery, boundary payloads, lag recovery and the cursor
//! invariants, exercised through separate mappings of the same region.

use membus::{
    BusError, BusRegion, Consumed, MwmrPublisher, Publisher, RegionBuilder, RingCode,
    SharedRegion, Subscriber, TopicConfig,
};

fn unique_name(tag: &str) -> String {
    format!("/membus_ringtest_{}_{}", tag, std::process::id())
}

fn build_single(name: &str, topic: &str, slots: u32, payload_max: u32) -> BusRegion {
    RegionBuilder::new(name, 1 << 20)
        .topic(TopicConfig::single_writer(topic, slots, payload_max))
        .build()
        .unwrap()
}

#[test]
fn test_in_order_delivery() {
    let name = unique_name("in_order");
    let region = build_single(&name, "ticks", 64, 64);

    let attached = BusRegion::attach(&name).unwrap();
    let mut publisher = Publisher::attach(&region, "ticks", 7).unwrap();
    let mut subscriber = Subscriber::attach(&attached, "ticks").unwrap();

    let mut buf = [0u8; 64];
    for i in 1u64..=100 {
        publisher.publish(&i.to_be_bytes()).unwrap();
        match subscriber.next(&mut buf) {
            Consumed::Message { len, publisher_id } => {
                assert_eq!(len, 8);
                assert_eq!(publisher_id, 7);
                assert_eq!(u64::from_be_bytes(buf[..8].try_into().unwrap()), i);
            }
            other => panic!("expected message {}, got {:?}", i, other),
        }
    }
    assert_eq!(subscriber.skipped_count(), 0);
    assert_eq!(subscriber.last_seq(), 100);
    assert_eq!(subscriber.next(&mut buf), Consumed::NoData);

    SharedRegion::unlink(&name).unwrap();
}

#[test]
fn test_lagging_subscriber_jumps_forward() {
    let name = unique_name("lagging");
    let region = build_single(&name, "fast", 16, 16);

    let mut publisher = Publisher::attach(&region, "fast", 1).unwrap();
    for i in 1u64..=160 {
        publisher.publish(&i.to_be_bytes()).unwrap();
    }

    let mut subscriber = Subscriber::attach(&region, "fast").unwrap();
    let mut buf = [0u8; 16];
    match subscriber.next(&mut buf) {
        Consumed::Message { len, .. } => {
            let seq = u64::from_be_bytes(buf[..len].try_into().unwrap());
            assert!((145..=160).contains(&seq), "got sequence {}", seq);
            assert_eq!(subscriber.last_seq(), seq);
        }
        other => panic!("expected a message after the jump, got {:?}", other),
    }
    assert!(subscriber.skipped_count() >= 144);

    SharedRegion::unlink(&name).unwrap();
}

#[test]
fn test_oversize_payload_rejected() {
    let name = unique_name("oversize");
    let region = build_single(&name, "small", 16, 64);

    let mut publisher = Publisher::attach(&region, "small", 1).unwrap();
    let result = publisher.publish(&[0u8; 65]);
    assert!(matches!(result, Err(BusError::PayloadTooLarge { .. })));

    // A rejected publish must not reserve a slot.
    assert_eq!(region.write_head("small").unwrap(), 0);

    SharedRegion::unlink(&name).unwrap();
}

#[test]
fn test_exact_capacity_boundary() {
    let name = unique_name("boundary");
    let region = build_single(&name, "edge", 16, 64);

    let mut publisher = Publisher::attach(&region, "edge", 1).unwrap();
    let seq = publisher.publish(&[0xAB; 64]).unwrap();
    assert_eq!(seq, 1);
    assert!(matches!(
        publisher.publish(&[0xAB; 65]),
        Err(BusError::PayloadTooLarge { .. })
    ));

    let mut subscriber = Subscriber::attach(&region, "edge").unwrap();
    let mut buf = [0u8; 64];
    assert_eq!(
        subscriber.next(&mut buf),
        Consumed::Message {
            len: 64,
            publisher_id: 1
        }
    );
    assert!(buf.iter().all(|&b| b == 0xAB));

    SharedRegion::unlink(&name).unwrap();
}

#[test]
fn test_zero_length_payload() {
    let name = unique_name("empty");
    let region = build_single(&name, "pulse", 8, 32);

    let mut publisher = Publisher::attach(&region, "pulse", 3).unwrap();
    publisher.publish(&[]).unwrap();

    let mut subscriber = Subscriber::attach(&region, "pulse").unwrap();
    let mut buf = [0u8; 32];
    assert_eq!(
        subscriber.next(&mut buf),
        Consumed::Message {
            len: 0,
            publisher_id: 3
        }
    );

    SharedRegion::unlink(&name).unwrap();
}

#[test]
fn test_truncated_consume_advances_cursor() {
    let name = unique_name("truncated");
    let region = build_single(&name, "wide", 8, 128);

    let mut publisher = Publisher::attach(&region, "wide", 1).unwrap();
    publisher.publish(&[0x55; 100]).unwrap();

    let mut subscriber = Subscriber::attach(&region, "wide").unwrap();
    let mut small = [0u8; 32];
    let outcome = subscriber.next(&mut small);
    assert_eq!(outcome, Consumed::Truncated);
    assert_eq!(outcome.code(), RingCode::Truncated);
    assert_eq!(subscriber.last_seq(), 1);
    let outcome = subscriber.next(&mut small);
    assert_eq!(outcome, Consumed::NoData);
    assert_eq!(outcome.code(), RingCode::NoData);

    publisher.publish(&[0x66; 16]).unwrap();
    assert_eq!(
        subscriber.next(&mut small),
        Consumed::Message {
            len: 16,
            publisher_id: 1
        }
    );

    SharedRegion::unlink(&name).unwrap();
}

#[test]
fn test_late_subscriber_never_sees_overwritten_slots() {
    let name = unique_name("late");
    let slots = 8u64;
    let region = build_single(&name, "stream", slots as u32, 16);

    let mut publisher = Publisher::attach(&region, "stream", 1).unwrap();
    for i in 1u64..=(10 * slots) {
        publisher.publish(&i.to_be_bytes()).unwrap();
    }

    let mut subscriber = Subscriber::attach(&region, "stream").unwrap();
    let mut buf = [0u8; 16];
    match subscriber.next(&mut buf) {
        Consumed::Message { len, .. } => {
            let seq = u64::from_be_bytes(buf[..len].try_into().unwrap());
            assert!(seq >= 10 * slots - slots + 1, "got sequence {}", seq);
        }
        other => panic!("expected a message, got {:?}", other),
    }

    SharedRegion::unlink(&name).unwrap();
}

#[test]
fn test_slot_sequence_congruence() {
    let name = unique_name("congruence");
    let slots = 16u32;
    let region = build_single(&name, "spin", slots, 16);

    let mut publisher = Publisher::attach(&region, "spin", 1).unwrap();
    for i in 1u64..=41 {
        publisher.publish(&i.to_be_bytes()).unwrap();
    }

    // Each physical slot holds either nothing or a sequence congruent to
    // its own index.
    for idx in 0..slots {
        let seq = region.slot_seq("spin", idx).unwrap();
        assert!(seq == 0 || (seq - 1) % slots as u64 == idx as u64);
    }

    SharedRegion::unlink(&name).unwrap();
}

#[test]
fn test_write_head_monotonic() {
    let name = unique_name("monotonic");
    let region = build_single(&name, "heads", 8, 16);

    let mut publisher = Publisher::attach(&region, "heads", 1).unwrap();
    let mut previous = region.write_head("heads").unwrap();
    for i in 1u64..=50 {
        publisher.publish(&i.to_be_bytes()).unwrap();
        let head = region.write_head("heads").unwrap();
        assert!(head >= previous);
        previous = head;
    }
    assert_eq!(previous, 50);

    SharedRegion::unlink(&name).unwrap();
}

#[test]
fn test_cursor_never_regresses() {
    let name = unique_name("cursor");
    let region = build_single(&name, "steps", 8, 16);

    let mut publisher = Publisher::attach(&region, "steps", 1).unwrap();
    let mut subscriber = Subscriber::attach(&region, "steps").unwrap();
    let mut buf = [0u8; 16];

    let mut floor = 0;
    for i in 1u64..=30 {
        publisher.publish(&i.to_be_bytes()).unwrap();
        if i % 3 == 0 {
            let _ = subscriber.next(&mut buf);
        }
        // Every call, productive or not, leaves the cursor at or above
        // where it was.
        let _ = subscriber.next(&mut buf);
        assert!(subscriber.last_seq() >= floor);
        floor = subscriber.last_seq();
    }

    SharedRegion::unlink(&name).unwrap();
}

#[test]
fn test_publisher_kind_checks() {
    let name = unique_name("kinds");
    let region = RegionBuilder::new(&name, 1 << 18)
        .topic(TopicConfig::single_writer("solo", 8, 32))
        .topic(TopicConfig::multi_writer("crowd", 8, 32))
        .build()
        .unwrap();

    assert!(matches!(
        Publisher::attach(&region, "crowd", 1),
        Err(BusError::KindMismatch { .. })
    ));
    assert!(matches!(
        MwmrPublisher::attach(&region, "solo", 1),
        Err(BusError::KindMismatch { .. })
    ));
    assert!(matches!(
        Publisher::attach(&region, "nope", 1),
        Err(BusError::TopicNotFound { .. })
    ));

    // Subscribers attach to either kind.
    assert!(Subscriber::attach(&region, "solo").is_ok());
    assert!(Subscriber::attach(&region, "crowd").is_ok());

    SharedRegion::unlink(&name).unwrap();
}

#[test]
fn test_mwmr_single_thread_roundtrip() {
    let name = unique_name("mwmr_smoke");
    let region = RegionBuilder::new(&name, 1 << 18)
        .topic(TopicConfig::multi_writer("bus", 16, 32))
        .build()
        .unwrap();

    let mut a = MwmrPublisher::attach(&region, "bus", 10).unwrap();
    let mut b = MwmrPublisher::attach(&region, "bus", 20).unwrap();
    a.publish(b"from-a").unwrap();
    b.publish(b"from-b").unwrap();

    let mut subscriber = Subscriber::attach(&region, "bus").unwrap();
    let mut buf = [0u8; 32];
    assert_eq!(
        subscriber.next(&mut buf),
        Consumed::Message {
            len: 6,
            publisher_id: 10
        }
    );
    assert_eq!(&buf[..6], b"from-a");
    assert_eq!(
        subscriber.next(&mut buf),
        Consumed::Message {
            len: 6,
            publisher_id: 20
        }
    );
    assert_eq!(&buf[..6], b"from-b");

    SharedRegion::unlink(&name).unwrap();
}

#[test]
fn test_subscriber_lag_reporting() {
    let name = unique_name("lag");
    let region = build_single(&name, "drip", 16, 16);

    let mut publisher = Publisher::attach(&region, "drip", 1).unwrap();
    let mut subscriber = Subscriber::attach(&region, "drip").unwrap();
    assert_eq!(subscriber.lag(), 0);
    assert!(!subscriber.is_lagging());

    for i in 1u64..=10 {
        publisher.publish(&i.to_be_bytes()).unwrap();
    }
    assert_eq!(subscriber.lag(), 10);

    for i in 11u64..=20 {
        publisher.publish(&i.to_be_bytes()).unwrap();
    }
    assert!(subscriber.is_lagging());

    let mut buf = [0u8; 16];
    let _ = subscriber.next(&mut buf);
    assert!(subscriber.lag() < 16);

    SharedRegion::unlink(&name).unwrap();
}
