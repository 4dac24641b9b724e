//! Health monitor - the companion periodic task to the router.
//!
//! Every round it first prunes contacts and link statistics that went
//! stale, then broadcasts this node's link quality and sends a
//! `HealthCheckRequest` to each remaining contact. Responses are handled by the router, which
//! owns the inbound path.

use crate::contacts::ContactDirectory;
use crate::link_stats::LinkStatsTable;
use crate::router::build_datagram;
use aircom_core::{
    current_timestamp_ms, Config, ErrorCategory, ErrorCode, ErrorRecovery, HealthConfig, NodeId,
};
use aircom_proto::Payload;
use aircom_radio::RadioTransport;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

/// What one health round did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthRound {
    /// Round skipped because the link was down
    pub skipped: bool,
    /// Health check requests the transport accepted
    pub requests_sent: usize,
    /// Health check requests the transport rejected
    pub requests_failed: usize,
    /// Contacts removed as stale
    pub pruned_contacts: usize,
    /// Link statistics entries removed as stale
    pub pruned_stats: usize,
}

/// Periodic health exchange with every known contact.
pub struct HealthMonitor {
    node_id: NodeId,
    discovery_port: u16,
    health: HealthConfig,
    transport: Arc<dyn RadioTransport>,
    contacts: Arc<ContactDirectory>,
    link_stats: Arc<LinkStatsTable>,
    recovery: Arc<ErrorRecovery>,
}

impl HealthMonitor {
    /// Create a monitor over the router's tables.
    pub fn new(
        config: &Config,
        transport: Arc<dyn RadioTransport>,
        contacts: Arc<ContactDirectory>,
        link_stats: Arc<LinkStatsTable>,
        recovery: Arc<ErrorRecovery>,
    ) -> Self {
        Self {
            node_id: config.node.node_id.clone(),
            discovery_port: config.network.discovery_port,
            health: config.health.clone(),
            transport,
            contacts,
            link_stats,
            recovery,
        }
    }

    /// Wait out the startup delay, then run a round every interval.
    pub async fn run(self: Arc<Self>) {
        tokio::time::sleep(self.health.startup_delay()).await;
        info!(
            interval_secs = self.health.interval_secs,
            staleness_secs = self.health.staleness_secs,
            "Health monitor started"
        );

        let mut ticker = tokio::time::interval(self.health.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let round = self.run_once();
            trace!(?round, "Health round");
        }
    }

    /// One health round.
    pub fn run_once(&self) -> HealthRound {
        let mut round = HealthRound::default();
        if !self.transport.connection_status() {
            debug!("Link down, health round skipped");
            round.skipped = true;
            return round;
        }

        let staleness = self.health.staleness();
        match self.contacts.prune_stale(staleness) {
            Ok(pruned) => round.pruned_contacts = pruned,
            Err(err) => debug!(error = %err, "Contact prune skipped"),
        }
        match self.link_stats.prune_stale(staleness) {
            Ok(pruned) => round.pruned_stats = pruned,
            Err(err) => debug!(error = %err, "Link stats prune skipped"),
        }

        self.broadcast_link_quality();

        match self.contacts.endpoints() {
            Ok(endpoints) => {
                for (node_id, address) in endpoints {
                    if self.request(&node_id, &address) {
                        round.requests_sent += 1;
                    } else {
                        round.requests_failed += 1;
                    }
                }
            }
            Err(err) => warn!(error = %err, "Contact list unavailable, no health requests sent"),
        }

        round
    }

    fn broadcast_link_quality(&self) {
        let quality = self.transport.link_quality();
        let payload = Payload::NetworkHealth {
            rssi: quality.rssi,
            snr: quality.snr,
        };

        let sent = build_datagram(&self.node_id, None, payload)
            .map(|bytes| self.transport.send_multicast(self.discovery_port, &bytes))
            .unwrap_or(false);
        if !sent {
            self.recovery.report(
                ErrorCategory::Network,
                ErrorCode::SocketSend,
                "NetworkHealth broadcast rejected",
                "health::broadcast_link_quality",
            );
        }
    }

    fn request(&self, node_id: &str, address: &str) -> bool {
        let payload = Payload::HealthCheckRequest {
            sent_at: current_timestamp_ms(),
        };
        let sent = build_datagram(&self.node_id, Some(node_id), payload)
            .map(|bytes| self.transport.send_unicast(address, self.discovery_port, &bytes))
            .unwrap_or(false);

        if sent {
            debug!(node_id = %node_id, address = %address, "Health check sent");
        } else {
            self.recovery.report(
                ErrorCategory::Network,
                ErrorCode::SocketSend,
                format!("Health check to {} rejected", node_id),
                "health::request",
            );
        }
        sent
    }
}
