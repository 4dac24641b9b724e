//! Health check round trips between routers

use crate::test_utils::{init_test_logging, settle, TestNode};
use aircom_core::{current_timestamp_ms, ErrorCategory};
use aircom_mesh::{ContactRecord, ServiceType};
use aircom_radio::{LinkQuality, LoopbackHub, SentTo};
use std::collections::BTreeSet;

#[tokio::test]
async fn test_health_round_trip_updates_link_stats() {
    init_test_logging();
    let hub = LoopbackHub::new();
    let a = TestNode::new(&hub, "A", "node-1", "ONE");
    let seven = TestNode::new(&hub, "B", "node-7", "SEVEN");
    settle(&[&a, &seven], 2).await;

    let before = current_timestamp_ms();
    let round = a.health.run_once();
    assert_eq!(round.requests_sent, 1);
    assert_eq!(round.requests_failed, 0);

    seven.router.tick().await;
    a.router.tick().await;

    let stats = a.router.link_stats().get("node-7").unwrap().unwrap();
    assert!(stats.last_update >= before);
    assert!(stats.last_latency_ms <= current_timestamp_ms() - before);
    assert_eq!(stats.remote_rssi, -60);
    assert_eq!(stats.local_rssi, -60);

    let contact = seven.router.contacts().get("node-1").unwrap().unwrap();
    assert!(contact.services.contains(&ServiceType::Health));
}

#[tokio::test]
async fn test_network_health_broadcast_reaches_peers() {
    init_test_logging();
    let hub = LoopbackHub::new();
    let a = TestNode::new(&hub, "A", "node-1", "ONE");
    let b = TestNode::new(&hub, "B", "node-2", "TWO");
    let c = TestNode::new(&hub, "C", "node-3", "THREE");
    settle(&[&a, &b, &c], 2).await;

    a.transport.set_link_quality(LinkQuality {
        rssi: -72,
        snr: 4.5,
    });
    a.health.run_once();
    b.router.tick().await;
    c.router.tick().await;

    for node in [&b, &c] {
        let stats = node.router.link_stats().get("node-1").unwrap().unwrap();
        assert_eq!(stats.remote_rssi, -72);
        assert_eq!(stats.remote_snr, 4.5);
        assert_eq!(stats.last_latency_ms, 0);
    }
}

#[tokio::test]
async fn test_health_round_prunes_silent_contacts() {
    init_test_logging();
    let hub = LoopbackHub::new();
    let a = TestNode::new(&hub, "A", "node-1", "ONE");
    let b = TestNode::new(&hub, "B", "node-2", "TWO");
    settle(&[&a, &b], 2).await;

    a.router
        .contacts()
        .insert(ContactRecord {
            node_id: "node-9".into(),
            callsign: "NINE".into(),
            address: "Z".into(),
            services: BTreeSet::new(),
            last_seen: current_timestamp_ms() - 600_000,
        })
        .unwrap();

    let round = a.health.run_once();
    assert_eq!(round.requests_sent, 1);
    assert_eq!(round.requests_failed, 0);
    assert_eq!(round.pruned_contacts, 1);
    assert_eq!(a.router.contacts().len().unwrap(), 1);
    assert!(a.router.contacts().get("node-9").unwrap().is_none());
    assert_eq!(a.recovery.stats().errors_in(ErrorCategory::Network), 0);
    assert!(!a
        .transport
        .sent_frames()
        .iter()
        .any(|f| matches!(&f.destination, SentTo::Unicast { address, .. } if address == "Z")));
}

#[tokio::test]
async fn test_health_round_skipped_while_disconnected() {
    init_test_logging();
    let hub = LoopbackHub::new();
    let a = TestNode::new(&hub, "A", "node-1", "ONE");
    let b = TestNode::new(&hub, "B", "node-2", "TWO");
    settle(&[&a, &b], 2).await;

    a.transport.set_connected(false);
    a.transport.clear_sent();
    let round = a.health.run_once();
    assert!(round.skipped);
    assert!(a.transport.sent_frames().is_empty());
    assert_eq!(a.recovery.stats().total_errors, 0);
}
