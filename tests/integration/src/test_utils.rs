//! Test fixtures for multi-node scenarios

use aircom_bus::{MessageBody, MessageBus, OutgoingMessage};
use aircom_core::{Config, ErrorRecovery, RetryPolicy};
use aircom_crypto::GroupKeyGateway;
use aircom_mesh::{HealthMonitor, MessageRouter};
use aircom_radio::{LoopbackHub, LoopbackTransport};
use std::sync::Arc;
use std::time::Duration;

/// Group key every fixture node starts with
pub const SHARED_GROUP_KEY: [u8; 32] = [0x5a; 32];

/// Route test logs through the test harness writer. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Retry policy short enough for tests
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        multiplier: 2.0,
        jitter: false,
    }
}

/// Default configuration with the given identity
pub fn test_config(node_id: &str, callsign: &str) -> Config {
    let mut config = Config::default_config();
    config.node.node_id = node_id.to_string();
    config.node.callsign = callsign.to_string();
    config
}

/// A complete node attached to a loopback hub
pub struct TestNode {
    pub router: Arc<MessageRouter>,
    pub health: HealthMonitor,
    pub transport: Arc<LoopbackTransport>,
    pub gateway: Arc<GroupKeyGateway>,
    pub bus: MessageBus,
    pub recovery: Arc<ErrorRecovery>,
}

impl TestNode {
    /// Build a node from `config`, reachable at `address`
    pub fn with_config(hub: &Arc<LoopbackHub>, address: &str, config: &Config) -> Self {
        let transport = hub.attach(address);
        let gateway = Arc::new(GroupKeyGateway::new(SHARED_GROUP_KEY));
        let bus = MessageBus::new(&config.channels).unwrap();
        let recovery = Arc::new(ErrorRecovery::new());

        let router = Arc::new(
            MessageRouter::new(
                config,
                transport.clone(),
                gateway.clone(),
                bus.clone(),
                recovery.clone(),
            )
            .with_send_policy(fast_retry()),
        );
        let health = HealthMonitor::new(
            config,
            transport.clone(),
            router.contacts().clone(),
            router.link_stats().clone(),
            recovery.clone(),
        );

        Self {
            router,
            health,
            transport,
            gateway,
            bus,
            recovery,
        }
    }

    /// Build a node with default configuration
    pub fn new(hub: &Arc<LoopbackHub>, address: &str, node_id: &str, callsign: &str) -> Self {
        Self::with_config(hub, address, &test_config(node_id, callsign))
    }

    /// Queue a text message for `to_node`
    pub async fn send_text(&self, to_node: &str, text: &str) {
        self.send(to_node, MessageBody::Text(text.to_string())).await;
    }

    /// Queue a CoT event for `to_node`
    pub async fn send_cot(&self, to_node: &str, xml: &str) {
        self.send(to_node, MessageBody::Cot(xml.to_string())).await;
    }

    async fn send(&self, to_node: &str, body: MessageBody) {
        self.bus
            .outgoing_message
            .send(
                OutgoingMessage {
                    to_node: to_node.to_string(),
                    body,
                },
                Duration::from_millis(10),
            )
            .await;
    }
}

/// Tick every router `rounds` times, in order.
pub async fn settle(nodes: &[&TestNode], rounds: usize) {
    for round in 0..rounds {
        for node in nodes {
            node.router.tick().await;
        }
        tracing::debug!(round, "Mesh settled one round");
    }
}
