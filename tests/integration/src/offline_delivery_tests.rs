//! Offline delivery through the connectivity cache
//!
//! Traffic produced while the link is down must reach the peer exactly
//! once, in order, after the link comes back.

use crate::test_utils::{init_test_logging, settle, test_config, TestNode};
use aircom_bus::MessageBody;
use aircom_radio::{LoopbackHub, RadioTransport, SentTo, TEXT_PORT, VOICE_PORT};

#[tokio::test]
async fn test_cache_replay_end_to_end() {
    init_test_logging();
    let hub = LoopbackHub::new();
    let a = TestNode::new(&hub, "A", "node-a", "ALPHA");
    let b = TestNode::new(&hub, "B", "node-b", "BRAVO");

    a.transport.set_connected(false);
    let report = a.router.tick().await;
    assert!(!report.link_up);
    assert!(!a.router.cache().is_connected());

    assert!(a.router.cache().send_unicast("B", VOICE_PORT, b"voice-frame"));
    assert_eq!(a.router.cache().len(), 1);
    assert!(a.transport.sent_frames().is_empty());

    a.transport.set_connected(true);
    let report = a.router.tick().await;
    let flush = report.flush.unwrap();
    assert_eq!(flush.replayed, 1);
    assert!(a.router.cache().is_empty());

    let voice_sends: Vec<_> = a
        .transport
        .sent_frames()
        .into_iter()
        .filter(|f| {
            f.destination
                == SentTo::Unicast {
                    address: "B".into(),
                    port: VOICE_PORT,
                }
        })
        .collect();
    assert_eq!(voice_sends.len(), 1);
    assert_eq!(voice_sends[0].payload, b"voice-frame".to_vec());

    let mut voice_received = 0;
    while let Some(frame) = b.transport.poll_inbound() {
        if frame.port == VOICE_PORT {
            voice_received += 1;
        }
    }
    assert_eq!(voice_received, 1);
}

#[tokio::test]
async fn test_outgoing_text_survives_outage() {
    init_test_logging();
    let hub = LoopbackHub::new();
    let a = TestNode::new(&hub, "A", "node-a", "ALPHA");
    let b = TestNode::new(&hub, "B", "node-b", "BRAVO");
    settle(&[&a, &b], 2).await;

    a.transport.set_connected(false);
    a.router.tick().await;

    a.send_text("node-b", "rally at checkpoint 4").await;
    let report = a.router.tick().await;
    assert!(report.outgoing_delivered);
    assert!(!report.presence_sent);
    assert_eq!(a.router.cache().len(), 1);

    a.transport.set_connected(true);
    let report = a.router.tick().await;
    assert_eq!(report.flush.map(|f| f.replayed), Some(1));

    b.router.tick().await;
    let incoming = b.bus.incoming_message.try_receive().unwrap();
    assert_eq!(incoming.callsign, "ALPHA");
    assert_eq!(
        incoming.body,
        MessageBody::Text("rally at checkpoint 4".into())
    );
    assert!(b.bus.incoming_message.try_receive().is_none());
}

#[tokio::test]
async fn test_replay_preserves_order() {
    init_test_logging();
    let hub = LoopbackHub::new();
    let a = TestNode::new(&hub, "A", "node-a", "ALPHA");
    let b = TestNode::new(&hub, "B", "node-b", "BRAVO");
    settle(&[&a, &b], 2).await;

    a.transport.set_connected(false);
    a.router.tick().await;
    for text in ["first", "second", "third"] {
        a.send_text("node-b", text).await;
        a.router.tick().await;
    }
    assert_eq!(a.router.cache().len(), 3);

    a.transport.set_connected(true);
    a.router.tick().await;
    b.router.tick().await;

    let mut received = Vec::new();
    while let Some(message) = b.bus.incoming_message.try_receive() {
        received.push(message.body);
    }
    assert_eq!(
        received,
        vec![
            MessageBody::Text("first".into()),
            MessageBody::Text("second".into()),
            MessageBody::Text("third".into()),
        ]
    );
}

#[tokio::test]
async fn test_long_outage_keeps_newest_frames() {
    init_test_logging();
    let hub = LoopbackHub::new();
    let mut config = test_config("node-a", "ALPHA");
    config.cache.high_water_mark = 2;
    let a = TestNode::with_config(&hub, "A", &config);
    let _b = TestNode::new(&hub, "B", "node-b", "BRAVO");

    a.transport.set_connected(false);
    a.router.tick().await;
    for payload in [b"one", b"two", b"six"] {
        a.router.cache().send_unicast("B", TEXT_PORT, payload);
    }
    assert_eq!(a.router.cache().evicted(), 1);

    a.transport.set_connected(true);
    a.router.tick().await;

    let replayed: Vec<Vec<u8>> = a
        .transport
        .sent_frames()
        .into_iter()
        .filter(|f| matches!(f.destination, SentTo::Unicast { port, .. } if port == TEXT_PORT))
        .map(|f| f.payload)
        .collect();
    assert_eq!(replayed, vec![b"two".to_vec(), b"six".to_vec()]);
}
