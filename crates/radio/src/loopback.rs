//! In-memory radio hub.
//!
//! Connects any number of [`LoopbackTransport`]s by address. Every send
//! call is recorded on the sending transport, and frames are delivered to
//! the inbound queue of each reachable receiver. A node whose link is down
//! neither sends nor receives.
//!
//! Both the send log and the inbound queue are bounded. The send log keeps
//! the most recent calls; a full inbound queue drops its oldest frame.

use crate::transport::{InboundFrame, LinkQuality, PeerInfo, RadioTransport};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Send calls remembered per transport by default.
pub const SENT_LOG_CAPACITY: usize = 1024;

/// Unpolled frames held per transport by default.
pub const INBOUND_CAPACITY: usize = 1024;

/// Destination of a recorded send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentTo {
    /// Single address
    Unicast {
        /// Destination address
        address: String,
        /// Destination port
        port: u16,
    },
    /// Every listening node
    Multicast {
        /// Destination port
        port: u16,
    },
}

/// One recorded send call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    /// Where the frame was addressed
    pub destination: SentTo,
    /// Frame contents
    pub payload: Vec<u8>,
    /// What the transport returned
    pub accepted: bool,
}

struct Endpoint {
    address: String,
    connected: AtomicBool,
    reject_sends: AtomicBool,
    link: Mutex<LinkQuality>,
    inbound: Mutex<VecDeque<InboundFrame>>,
    inbound_capacity: usize,
    sent: Mutex<VecDeque<SentFrame>>,
    sent_capacity: usize,
}

impl Endpoint {
    fn is_up(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn deliver(&self, frame: InboundFrame) {
        let mut inbound = self.inbound.lock();
        if inbound.len() >= self.inbound_capacity {
            inbound.pop_front();
            warn!(address = %self.address, "Inbound queue full, dropped oldest frame");
        }
        inbound.push_back(frame);
    }

    fn record(&self, frame: SentFrame) {
        let mut sent = self.sent.lock();
        if sent.len() >= self.sent_capacity {
            sent.pop_front();
        }
        sent.push_back(frame);
    }
}

/// Shared medium for loopback transports.
pub struct LoopbackHub {
    endpoints: Mutex<HashMap<String, Arc<Endpoint>>>,
    sent_capacity: usize,
    inbound_capacity: usize,
}

impl LoopbackHub {
    /// Create an empty hub with the default per-transport bounds.
    pub fn new() -> Arc<Self> {
        Self::with_capacity(SENT_LOG_CAPACITY, INBOUND_CAPACITY)
    }

    /// Create an empty hub whose transports keep at most `sent_log` send
    /// records and `inbound` unpolled frames each. Zero is treated as one.
    pub fn with_capacity(sent_log: usize, inbound: usize) -> Arc<Self> {
        Arc::new(Self {
            endpoints: Mutex::new(HashMap::new()),
            sent_capacity: sent_log.max(1),
            inbound_capacity: inbound.max(1),
        })
    }

    /// Attach a node at `address`. The link starts up.
    ///
    /// Attaching an address twice replaces the earlier endpoint.
    pub fn attach(self: &Arc<Self>, address: impl Into<String>) -> Arc<LoopbackTransport> {
        let address = address.into();
        let endpoint = Arc::new(Endpoint {
            address: address.clone(),
            connected: AtomicBool::new(true),
            reject_sends: AtomicBool::new(false),
            link: Mutex::new(LinkQuality { rssi: -60, snr: 10.0 }),
            inbound: Mutex::new(VecDeque::new()),
            inbound_capacity: self.inbound_capacity,
            sent: Mutex::new(VecDeque::new()),
            sent_capacity: self.sent_capacity,
        });

        self.endpoints
            .lock()
            .insert(address.clone(), Arc::clone(&endpoint));
        debug!(address = %address, "Loopback endpoint attached");

        Arc::new(LoopbackTransport {
            hub: Arc::clone(self),
            endpoint,
        })
    }

    fn endpoint(&self, address: &str) -> Option<Arc<Endpoint>> {
        self.endpoints.lock().get(address).cloned()
    }

    fn others(&self, address: &str) -> Vec<Arc<Endpoint>> {
        self.endpoints
            .lock()
            .values()
            .filter(|e| e.address != address)
            .cloned()
            .collect()
    }
}

/// One node's view of a [`LoopbackHub`].
pub struct LoopbackTransport {
    hub: Arc<LoopbackHub>,
    endpoint: Arc<Endpoint>,
}

impl LoopbackTransport {
    /// This node's address.
    pub fn address(&self) -> &str {
        &self.endpoint.address
    }

    /// Bring the link up or down.
    pub fn set_connected(&self, connected: bool) {
        self.endpoint.connected.store(connected, Ordering::SeqCst);
    }

    /// Make every send fail while the link stays up.
    pub fn set_reject_sends(&self, reject: bool) {
        self.endpoint.reject_sends.store(reject, Ordering::SeqCst);
    }

    /// Link quality reported locally and stamped on frames this node sends.
    pub fn set_link_quality(&self, quality: LinkQuality) {
        *self.endpoint.link.lock() = quality;
    }

    /// Recent send calls, oldest first.
    pub fn sent_frames(&self) -> Vec<SentFrame> {
        self.endpoint.sent.lock().iter().cloned().collect()
    }

    /// Forget recorded sends.
    pub fn clear_sent(&self) {
        self.endpoint.sent.lock().clear();
    }

    /// Frames waiting to be polled.
    pub fn pending_inbound(&self) -> usize {
        self.endpoint.inbound.lock().len()
    }

    /// Queue a frame as if it had been received.
    pub fn inject(&self, frame: InboundFrame) {
        self.endpoint.deliver(frame);
    }

    fn can_send(&self) -> bool {
        self.endpoint.is_up() && !self.endpoint.reject_sends.load(Ordering::SeqCst)
    }

    fn frame_for(&self, port: u16, payload: &[u8]) -> InboundFrame {
        let link = *self.endpoint.link.lock();
        InboundFrame {
            source: self.endpoint.address.clone(),
            port,
            payload: payload.to_vec(),
            rssi: link.rssi,
            snr: link.snr,
        }
    }

    fn record(&self, destination: SentTo, payload: &[u8], accepted: bool) {
        self.endpoint.record(SentFrame {
            destination,
            payload: payload.to_vec(),
            accepted,
        });
    }
}

impl RadioTransport for LoopbackTransport {
    fn begin(&self) -> bool {
        true
    }

    fn send_unicast(&self, address: &str, port: u16, payload: &[u8]) -> bool {
        let target = self
            .hub
            .endpoint(address)
            .filter(|target| target.is_up());

        let accepted = match target {
            Some(target) if self.can_send() => {
                target.deliver(self.frame_for(port, payload));
                true
            }
            _ => false,
        };

        trace!(to = %address, port, bytes = payload.len(), accepted, "Loopback unicast");
        self.record(
            SentTo::Unicast {
                address: address.to_string(),
                port,
            },
            payload,
            accepted,
        );
        accepted
    }

    fn send_multicast(&self, port: u16, payload: &[u8]) -> bool {
        let accepted = self.can_send();
        if accepted {
            for target in self.hub.others(self.address()) {
                if target.is_up() {
                    target.deliver(self.frame_for(port, payload));
                }
            }
        }

        trace!(port, bytes = payload.len(), accepted, "Loopback multicast");
        self.record(SentTo::Multicast { port }, payload, accepted);
        accepted
    }

    fn list_peers(&self) -> Vec<PeerInfo> {
        if !self.endpoint.is_up() {
            return Vec::new();
        }

        let mut peers: Vec<PeerInfo> = self
            .hub
            .others(self.address())
            .into_iter()
            .filter(|e| e.is_up())
            .map(|e| PeerInfo {
                peer_id: e.address.clone(),
                address: e.address.clone(),
                rssi: e.link.lock().rssi,
                is_connected: true,
            })
            .collect();
        peers.sort_by(|a, b| a.address.cmp(&b.address));
        peers
    }

    fn connection_status(&self) -> bool {
        self.endpoint.is_up()
    }

    fn poll_inbound(&self) -> Option<InboundFrame> {
        self.endpoint.inbound.lock().pop_front()
    }

    fn link_quality(&self) -> LinkQuality {
        *self.endpoint.link.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicast_delivers_to_target_only() {
        let hub = LoopbackHub::new();
        let a = hub.attach("A");
        let b = hub.attach("B");
        let c = hub.attach("C");

        assert!(a.send_unicast("B", 5001, b"hello"));

        let frame = b.poll_inbound().unwrap();
        assert_eq!(frame.source, "A");
        assert_eq!(frame.port, 5001);
        assert_eq!(frame.payload, b"hello");
        assert!(c.poll_inbound().is_none());
    }

    #[test]
    fn test_multicast_reaches_connected_nodes() {
        let hub = LoopbackHub::new();
        let a = hub.attach("A");
        let b = hub.attach("B");
        let c = hub.attach("C");
        c.set_connected(false);

        assert!(a.send_multicast(4299, b"presence"));
        assert_eq!(b.pending_inbound(), 1);
        assert_eq!(c.pending_inbound(), 0);
        assert_eq!(a.pending_inbound(), 0);
    }

    #[test]
    fn test_disconnected_sender_fails_and_records() {
        let hub = LoopbackHub::new();
        let a = hub.attach("A");
        let b = hub.attach("B");
        a.set_connected(false);

        assert!(!a.send_unicast("B", 5000, b"x"));
        assert_eq!(b.pending_inbound(), 0);

        let sent = a.sent_frames();
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].accepted);
    }

    #[test]
    fn test_unknown_address_rejected() {
        let hub = LoopbackHub::new();
        let a = hub.attach("A");
        assert!(!a.send_unicast("Z", 5000, b"x"));
    }

    #[test]
    fn test_rejecting_sends_keeps_link_up() {
        let hub = LoopbackHub::new();
        let a = hub.attach("A");
        hub.attach("B");
        a.set_reject_sends(true);

        assert!(a.connection_status());
        assert!(!a.send_unicast("B", 5000, b"x"));
        assert!(!a.send_multicast(4299, b"x"));
    }

    #[test]
    fn test_frames_carry_sender_link_quality() {
        let hub = LoopbackHub::new();
        let a = hub.attach("A");
        let b = hub.attach("B");
        a.set_link_quality(LinkQuality { rssi: -42, snr: 12.5 });

        a.send_unicast("B", 4299, b"x");
        let frame = b.poll_inbound().unwrap();
        assert_eq!(frame.rssi, -42);
        assert_eq!(frame.snr, 12.5);

        let peers = b.list_peers();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].rssi, -42);
    }

    #[test]
    fn test_send_log_keeps_most_recent() {
        let hub = LoopbackHub::with_capacity(3, 8);
        let a = hub.attach("A");
        hub.attach("B");

        for n in 0..10u8 {
            a.send_unicast("B", 5001, &[n]);
        }

        let payloads: Vec<Vec<u8>> = a.sent_frames().into_iter().map(|f| f.payload).collect();
        assert_eq!(payloads, vec![vec![7], vec![8], vec![9]]);
    }

    #[test]
    fn test_full_inbound_queue_drops_oldest() {
        let hub = LoopbackHub::with_capacity(8, 2);
        let a = hub.attach("A");
        let b = hub.attach("B");

        for n in 0..5u8 {
            assert!(a.send_multicast(4299, &[n]));
        }

        assert_eq!(b.pending_inbound(), 2);
        assert_eq!(b.poll_inbound().unwrap().payload, vec![3]);
        assert_eq!(b.poll_inbound().unwrap().payload, vec![4]);
    }

    #[test]
    fn test_default_hub_is_bounded() {
        let hub = LoopbackHub::new();
        let a = hub.attach("A");
        let b = hub.attach("B");

        for _ in 0..SENT_LOG_CAPACITY + 10 {
            a.send_unicast("B", 4299, b"presence");
        }

        assert_eq!(a.sent_frames().len(), SENT_LOG_CAPACITY);
        assert_eq!(b.pending_inbound(), INBOUND_CAPACITY);
    }
}
