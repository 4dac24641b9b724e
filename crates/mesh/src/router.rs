//! Message Router - the network task
//!
//! Each iteration of the router loop:
//!
//! 1. Syncs the link state into the [`ConnectivityCache`], replaying cached
//!    frames when the link comes back
//! 2. Broadcasts a NodeInfo presence announcement (skipped while the link
//!    is down)
//! 3. Dispatches a bounded batch of inbound frames: presence updates the
//!    contact directory, health traffic updates link statistics, encrypted
//!    envelopes are opened and their inner packet dispatched once more
//! 4. Delivers one queued outgoing message, encrypted, to the contact's
//!    text or CoT port
//! 5. Publishes a status summary on the ui-update channel
//!
//! Inbound failures of any kind discard the frame and are reported to the
//! error recovery framework; nothing received from the air can stop the
//! loop.

use crate::cache::{ConnectivityCache, FlushReport};
use crate::contacts::{ContactDirectory, ServiceType};
use crate::error::{MeshError, MeshResult};
use crate::link_stats::LinkStatsTable;
use aircom_bus::{
    IncomingMessage, LockUpdate, MessageBody, MessageBus, OutgoingMessage, SendOutcome, UiUpdate,
};
use aircom_core::{
    Config, ErrorCategory, ErrorCode, ErrorRecovery, NetworkConfig, NodeId, RetryPolicy,
};
use aircom_crypto::{initiate_key_share, random_key, KeyShareRegistry, SecurityGateway, TemporaryKey};
use aircom_proto::{codec, EncryptedEnvelope, Packet, PacketError, Payload};
use aircom_radio::{InboundFrame, RadioTransport};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};
use zeroize::Zeroize;

/// Longest the router waits on the ui-update channel.
pub const UI_SEND_TIMEOUT: Duration = Duration::from_millis(10);

/// Longest the router waits on the incoming-message channel.
pub const INCOMING_SEND_TIMEOUT: Duration = Duration::from_millis(50);

/// What one router iteration did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Link state observed at the start of the iteration
    pub link_up: bool,
    /// Cache replay, if the link came up during this iteration
    pub flush: Option<FlushReport>,
    /// Presence announcement went out
    pub presence_sent: bool,
    /// Inbound frames taken from the transport
    pub inbound_handled: usize,
    /// An outgoing message was handed to the transport or cache
    pub outgoing_delivered: bool,
}

struct FrameMeta<'a> {
    source: &'a str,
    rssi: i32,
    snr: f32,
}

/// Build a packet and encode it for a UDP path.
pub(crate) fn build_datagram(
    from_node: &str,
    to_node: Option<&str>,
    payload: Payload,
) -> Result<Vec<u8>, PacketError> {
    let packet = match to_node {
        Some(to) => Packet::unicast(from_node, to, payload)?,
        None => Packet::broadcast(from_node, payload)?,
    };
    codec::encode_datagram(&packet)
}

/// Network task: discovery, inbound dispatch and outbound delivery.
pub struct MessageRouter {
    node_id: NodeId,
    callsign: String,
    network: NetworkConfig,
    transport: Arc<dyn RadioTransport>,
    cache: Arc<ConnectivityCache>,
    contacts: Arc<ContactDirectory>,
    link_stats: Arc<LinkStatsTable>,
    gateway: Arc<dyn SecurityGateway>,
    key_shares: Arc<KeyShareRegistry>,
    bus: MessageBus,
    recovery: Arc<ErrorRecovery>,
    send_policy: RetryPolicy,
    gps_lock: Mutex<LockUpdate>,
}

impl MessageRouter {
    /// Create a router and the tables it owns.
    pub fn new(
        config: &Config,
        transport: Arc<dyn RadioTransport>,
        gateway: Arc<dyn SecurityGateway>,
        bus: MessageBus,
        recovery: Arc<ErrorRecovery>,
    ) -> Self {
        let cache = Arc::new(ConnectivityCache::new(
            Arc::clone(&transport),
            config.cache.high_water_mark,
        ));

        Self {
            node_id: config.node.node_id.clone(),
            callsign: config.node.callsign.clone(),
            network: config.network.clone(),
            transport,
            cache,
            contacts: Arc::new(ContactDirectory::new()),
            link_stats: Arc::new(LinkStatsTable::new()),
            gateway,
            key_shares: Arc::new(KeyShareRegistry::new()),
            bus,
            recovery,
            send_policy: RetryPolicy::NETWORK,
            gps_lock: Mutex::new(LockUpdate::Unchanged),
        }
    }

    /// Override the retry policy for outbound sends.
    pub fn with_send_policy(mut self, policy: RetryPolicy) -> Self {
        self.send_policy = policy;
        self
    }

    /// This node's id.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Contact directory fed by presence announcements.
    pub fn contacts(&self) -> &Arc<ContactDirectory> {
        &self.contacts
    }

    /// Per-peer link statistics.
    pub fn link_stats(&self) -> &Arc<LinkStatsTable> {
        &self.link_stats
    }

    /// Outbound store-and-forward cache.
    pub fn cache(&self) -> &Arc<ConnectivityCache> {
        &self.cache
    }

    /// Temporary keys armed for incoming key shares.
    pub fn key_shares(&self) -> &Arc<KeyShareRegistry> {
        &self.key_shares
    }

    /// Record a GPS lock change for the next UI summary.
    pub fn report_gps_lock(&self, locked: bool) {
        *self.gps_lock.lock() = if locked {
            LockUpdate::Locked
        } else {
            LockUpdate::Unlocked
        };
    }

    /// Run the router loop forever at the configured interval.
    pub async fn run(self: Arc<Self>) {
        info!(
            node_id = %self.node_id,
            interval_ms = self.network.router_interval_ms,
            "Message router started"
        );

        let mut ticker = tokio::time::interval(self.network.router_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = self.tick().await;
            trace!(?report, "Router tick");
        }
    }

    /// One loop iteration.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        let link_up = self.transport.connection_status();
        report.link_up = link_up;
        if link_up != self.cache.is_connected() {
            report.flush = Some(self.cache.set_connection_status(link_up));
        }

        report.presence_sent = link_up && self.broadcast_presence();
        report.inbound_handled = self.process_inbound().await;
        report.outgoing_delivered = self.drain_outgoing().await;
        self.publish_summary().await;

        report
    }

    fn broadcast_presence(&self) -> bool {
        let payload = Payload::NodeInfo {
            callsign: self.callsign.clone(),
            node_id: self.node_id.clone(),
        };
        let bytes = match build_datagram(&self.node_id, None, payload) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.recovery.report(
                    ErrorCategory::System,
                    ErrorCode::InvalidParameter,
                    err.to_string(),
                    "router::broadcast_presence",
                );
                return false;
            }
        };

        if self
            .transport
            .send_multicast(self.network.discovery_port, &bytes)
        {
            true
        } else {
            self.recovery.report(
                ErrorCategory::Network,
                ErrorCode::SocketSend,
                "Presence broadcast rejected",
                "router::broadcast_presence",
            );
            false
        }
    }

    async fn process_inbound(&self) -> usize {
        let mut handled = 0;
        while handled < self.network.max_inbound_per_tick {
            let Some(frame) = self.transport.poll_inbound() else {
                break;
            };
            handled += 1;

            if let Some(message) = self.handle_frame(&frame) {
                self.publish_incoming(message).await;
            }
        }
        handled
    }

    fn handle_frame(&self, frame: &InboundFrame) -> Option<IncomingMessage> {
        let datagram =
            frame.port == self.network.discovery_port || frame.port == self.network.cot_port;
        let decoded = if datagram {
            codec::decode(&frame.payload)
        } else {
            codec::decode_frame(&frame.payload).map(|(packet, _)| packet)
        };

        let packet = match decoded {
            Ok(packet) => packet,
            Err(err) => {
                self.recovery.report(
                    ErrorCategory::Network,
                    ErrorCode::SocketReceive,
                    format!("Discarding frame from {}: {}", frame.source, err),
                    "router::handle_frame",
                );
                return None;
            }
        };

        if packet.from_node() == self.node_id {
            return None;
        }
        if let Some(to) = packet.to_node() {
            if to != self.node_id {
                debug!(to = %to, "Packet for another node ignored");
                return None;
            }
        }

        debug!(
            from = %packet.from_node(),
            kind = packet.payload().kind(),
            port = frame.port,
            "Packet received"
        );
        let meta = FrameMeta {
            source: &frame.source,
            rssi: frame.rssi,
            snr: frame.snr,
        };
        self.dispatch(packet, &meta, false)
    }

    fn dispatch(&self, packet: Packet, meta: &FrameMeta<'_>, sealed: bool) -> Option<IncomingMessage> {
        let from = packet.from_node().to_string();

        match packet.into_payload() {
            Payload::NodeInfo { callsign, node_id } => {
                if node_id != from {
                    warn!(from = %from, announced = %node_id, "NodeInfo for another node discarded");
                    return None;
                }
                match self.contacts.observe_presence(&node_id, &callsign, meta.source) {
                    Ok(true) => info!(node_id = %node_id, callsign = %callsign, "Contact discovered"),
                    Ok(false) => {}
                    Err(err) => debug!(error = %err, "Presence update skipped"),
                }
                None
            }
            Payload::NetworkHealth { rssi, snr } => {
                if let Err(err) =
                    self.link_stats
                        .record_remote_health(&from, rssi, snr, meta.rssi, meta.snr)
                {
                    debug!(error = %err, "Link stats update skipped");
                }
                self.note_service(&from, ServiceType::Health);
                None
            }
            Payload::HealthCheckRequest { sent_at } => {
                self.answer_health_check(&from, sent_at, meta);
                self.note_service(&from, ServiceType::Health);
                None
            }
            Payload::HealthCheckResponse { echoed_at, rssi } => {
                match self
                    .link_stats
                    .record_response(&from, echoed_at, rssi, meta.rssi, meta.snr)
                {
                    Ok(stats) => debug!(
                        node_id = %from,
                        latency_ms = stats.last_latency_ms,
                        "Health check answered"
                    ),
                    Err(err) => debug!(error = %err, "Link stats update skipped"),
                }
                None
            }
            Payload::TextMessage { text } => {
                self.accept_message(from, MessageBody::Text(text), sealed, ServiceType::Text)
            }
            Payload::CotMessage { xml } => {
                self.accept_message(from, MessageBody::Cot(xml), sealed, ServiceType::Cot)
            }
            Payload::EncryptedEnvelope(envelope) => {
                if sealed {
                    warn!(from = %from, "Nested envelope discarded");
                    return None;
                }
                self.open_envelope(&from, &envelope, meta)
            }
        }
    }

    fn open_envelope(
        &self,
        from: &str,
        envelope: &EncryptedEnvelope,
        meta: &FrameMeta<'_>,
    ) -> Option<IncomingMessage> {
        match self.gateway.decrypt(envelope) {
            Ok(plaintext) => {
                let inner = match codec::decode_frame(&plaintext) {
                    Ok((inner, _)) => inner,
                    Err(err) => {
                        self.recovery.report(
                            ErrorCategory::Crypto,
                            ErrorCode::CryptoDecrypt,
                            format!("Undecodable envelope contents from {}: {}", from, err),
                            "router::open_envelope",
                        );
                        return None;
                    }
                };
                if inner.from_node() != from {
                    self.recovery.report(
                        ErrorCategory::Crypto,
                        ErrorCode::CryptoAuth,
                        format!("Envelope from {} claims sender {}", from, inner.from_node()),
                        "router::open_envelope",
                    );
                    return None;
                }
                self.dispatch(inner, meta, true)
            }
            Err(auth) => {
                if let Some(result) = self.key_shares.accept(from, envelope, self.gateway.as_ref()) {
                    if let Err(err) = result {
                        self.recovery.report(
                            ErrorCategory::Crypto,
                            ErrorCode::CryptoKey,
                            format!("Key share from {} failed: {}", from, err),
                            "router::key_share",
                        );
                    }
                    return None;
                }

                self.recovery.report(
                    ErrorCategory::Crypto,
                    ErrorCode::CryptoDecrypt,
                    format!("Discarding envelope from {}: {}", from, auth),
                    "router::open_envelope",
                );
                None
            }
        }
    }

    fn accept_message(
        &self,
        from: NodeId,
        body: MessageBody,
        sealed: bool,
        service: ServiceType,
    ) -> Option<IncomingMessage> {
        if !sealed {
            self.recovery.report(
                ErrorCategory::Crypto,
                ErrorCode::CryptoAuth,
                format!("Unencrypted message from {} discarded", from),
                "router::dispatch",
            );
            return None;
        }

        self.note_service(&from, service);
        let callsign = self
            .contacts
            .callsign_of(&from)
            .ok()
            .flatten()
            .unwrap_or_else(|| from.clone());

        Some(IncomingMessage {
            from_node: from,
            callsign,
            body,
        })
    }

    fn answer_health_check(&self, from: &str, sent_at: u64, meta: &FrameMeta<'_>) {
        let payload = Payload::HealthCheckResponse {
            echoed_at: sent_at,
            rssi: meta.rssi,
        };
        let bytes = match build_datagram(&self.node_id, Some(from), payload) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(error = %err, "Health response not built");
                return;
            }
        };

        if !self
            .transport
            .send_unicast(meta.source, self.network.discovery_port, &bytes)
        {
            self.recovery.report(
                ErrorCategory::Network,
                ErrorCode::SocketSend,
                format!("Health response to {} rejected", from),
                "router::answer_health_check",
            );
        }
    }

    fn note_service(&self, node_id: &str, service: ServiceType) {
        if let Err(err) = self.contacts.mark_service(node_id, service) {
            debug!(error = %err, "Service update skipped");
        }
    }

    async fn publish_incoming(&self, message: IncomingMessage) {
        let outcome = self
            .bus
            .incoming_message
            .send(message, INCOMING_SEND_TIMEOUT)
            .await;
        if outcome != SendOutcome::Enqueued {
            self.recovery.report(
                ErrorCategory::Ui,
                ErrorCode::UiUpdate,
                format!("Incoming message not delivered: {:?}", outcome),
                "router::publish_incoming",
            );
        }
    }

    async fn drain_outgoing(&self) -> bool {
        let Some(message) = self.bus.outgoing_message.try_receive() else {
            return false;
        };

        match self.deliver(&message).await {
            Ok(()) => true,
            Err(err) => {
                warn!(to = %message.to_node, error = %err, "Outgoing message dropped");
                false
            }
        }
    }

    async fn deliver(&self, message: &OutgoingMessage) -> MeshResult<()> {
        let address = self.resolve(&message.to_node)?;
        let (payload, port, datagram) = match &message.body {
            MessageBody::Text(text) => (
                Payload::TextMessage { text: text.clone() },
                self.network.text_port,
                false,
            ),
            MessageBody::Cot(xml) => (
                Payload::CotMessage { xml: xml.clone() },
                self.network.cot_port,
                true,
            ),
        };

        let inner = Packet::unicast(self.node_id.clone(), message.to_node.clone(), payload)?;
        let envelope = self.gateway.encrypt(&codec::encode(&inner))?;
        let outer = Packet::unicast(
            self.node_id.clone(),
            message.to_node.clone(),
            Payload::EncryptedEnvelope(envelope),
        )?;

        let bytes = if datagram {
            codec::encode_datagram(&outer).map_err(|err| {
                self.recovery.report(
                    ErrorCategory::Network,
                    ErrorCode::PacketTooLarge,
                    format!("CoT for {} dropped: {}", message.to_node, err),
                    "router::deliver",
                );
                MeshError::from(err)
            })?
        } else {
            codec::encode(&outer)
        };

        self.send_with_retry(&address, port, &bytes).await
    }

    fn resolve(&self, node_id: &str) -> MeshResult<String> {
        match self.contacts.address_of(node_id)? {
            Some(address) => Ok(address),
            None => {
                self.recovery.report(
                    ErrorCategory::Network,
                    ErrorCode::InvalidAddress,
                    format!("No address for {}", node_id),
                    "router::deliver",
                );
                Err(MeshError::UnknownContact {
                    node_id: node_id.to_string(),
                })
            }
        }
    }

    /// Send through the cache, retrying rejected sends per the send policy.
    ///
    /// The first send counts as attempt one. The first rejection is reported
    /// as Network/SocketSend.
    async fn send_with_retry(&self, address: &str, port: u16, bytes: &[u8]) -> MeshResult<()> {
        let cache = &self.cache;
        let recovery = &self.recovery;
        let mut first_rejection = true;

        let outcome = recovery
            .retry_with_backoff(&self.send_policy, || {
                if cache.send_unicast(address, port, bytes) {
                    return true;
                }
                if std::mem::take(&mut first_rejection) {
                    let context = recovery.report(
                        ErrorCategory::Network,
                        ErrorCode::SocketSend,
                        format!("Send to {}:{} rejected", address, port),
                        "router::deliver",
                    );
                    recovery.recover(&context);
                }
                false
            })
            .await;

        match outcome {
            Ok(1) => Ok(()),
            Ok(attempts) => {
                debug!(address = %address, port, attempts, "Send succeeded after retry");
                Ok(())
            }
            Err(_) => Err(MeshError::SendRejected {
                destination: format!("{}:{}", address, port),
            }),
        }
    }

    async fn publish_summary(&self) {
        let contact_count = match self.contacts.len() {
            Ok(count) => count,
            Err(err) => {
                debug!(error = %err, "UI summary skipped");
                return;
            }
        };

        let gps_lock = std::mem::take(&mut *self.gps_lock.lock());
        let update = UiUpdate {
            gps_lock,
            contact_count,
            degraded: self.recovery.is_in_error_state(),
        };

        let outcome = self.bus.ui_update.send(update, UI_SEND_TIMEOUT).await;
        if outcome != SendOutcome::Enqueued && gps_lock != LockUpdate::Unchanged {
            // keep the lock change for the next summary unless a newer one arrived
            let mut pending = self.gps_lock.lock();
            if *pending == LockUpdate::Unchanged {
                *pending = gps_lock;
            }
        }
    }

    /// Expect a key share from `peer`, protected by `temporary`.
    pub fn arm_key_share(&self, peer: &str, temporary: TemporaryKey) {
        self.key_shares.arm(peer, temporary);
    }

    /// Send a fresh group key to `peer` under `temporary`, then switch to it.
    pub fn share_group_key(&self, peer: &str, temporary: TemporaryKey) -> MeshResult<()> {
        let address = self.resolve(peer)?;
        let mut group_key = random_key();

        let result = initiate_key_share(temporary, &self.node_id, peer, &group_key)
            .map_err(MeshError::from)
            .and_then(|packet| {
                let bytes = codec::encode(&packet);
                if self.cache.send_unicast(&address, self.network.text_port, &bytes) {
                    Ok(())
                } else {
                    Err(MeshError::SendRejected {
                        destination: format!("{}:{}", address, self.network.text_port),
                    })
                }
            });

        if result.is_ok() {
            self.gateway.set_group_key(group_key);
        }
        group_key.zeroize();
        result
    }
}
