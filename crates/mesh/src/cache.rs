//! Connectivity cache: store-and-forward for outbound frames.
//!
//! While the link is down, sends are appended to an in-memory queue and
//! reported as successful. When the link comes back the queue is replayed
//! in enqueue order through the real transport. Each cached frame gets one
//! attempt after reconnect; a frame the transport rejects is dropped.
//!
//! The queue is bounded by a high-water mark. Once full, the oldest frame
//! is evicted to make room, so a long outage keeps the most recent traffic.

use aircom_core::current_timestamp_ms;
use aircom_radio::RadioTransport;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a cached frame is going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
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

/// A frame waiting for the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedMessage {
    /// Encoded frame
    pub payload: Vec<u8>,
    /// Destination
    pub destination: Destination,
    /// Unix epoch milliseconds at which the frame was cached
    pub enqueued_at: u64,
}

/// Outcome of replaying the cache after reconnect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Frames the transport accepted
    pub replayed: usize,
    /// Frames the transport rejected, now dropped
    pub rejected: usize,
    /// Frames put back because the link dropped mid-flush
    pub requeued: usize,
}

#[derive(Debug)]
struct CacheState {
    connected: bool,
    flushing: bool,
    queue: VecDeque<CachedMessage>,
    evicted: u64,
}

/// Outbound path that survives link outages.
pub struct ConnectivityCache {
    transport: Arc<dyn RadioTransport>,
    high_water_mark: usize,
    state: Mutex<CacheState>,
}

impl ConnectivityCache {
    /// Wrap `transport`, starting in its current connection state.
    pub fn new(transport: Arc<dyn RadioTransport>, high_water_mark: usize) -> Self {
        let connected = transport.connection_status();
        Self {
            transport,
            high_water_mark: high_water_mark.max(1),
            state: Mutex::new(CacheState {
                connected,
                flushing: false,
                queue: VecDeque::new(),
                evicted: 0,
            }),
        }
    }

    /// Send to one address, or cache the frame if the link is down.
    pub fn send_unicast(&self, address: &str, port: u16, payload: &[u8]) -> bool {
        let destination = Destination::Unicast {
            address: address.to_string(),
            port,
        };
        if self.try_cache(&destination, payload) {
            return true;
        }
        self.transport.send_unicast(address, port, payload)
    }

    /// Multicast, or cache the frame if the link is down.
    pub fn send_multicast(&self, port: u16, payload: &[u8]) -> bool {
        let destination = Destination::Multicast { port };
        if self.try_cache(&destination, payload) {
            return true;
        }
        self.transport.send_multicast(port, payload)
    }

    /// Record a link state change from the transport layer.
    ///
    /// A transition to connected replays the cache before returning.
    pub fn set_connection_status(&self, connected: bool) -> FlushReport {
        {
            let mut state = self.state.lock();
            let was_connected = state.connected;
            state.connected = connected;

            if was_connected == connected {
                return FlushReport::default();
            }
            if !connected {
                warn!("Link down, caching outbound traffic");
                return FlushReport::default();
            }
            if state.flushing {
                return FlushReport::default();
            }
            state.flushing = true;
            info!(cached = state.queue.len(), "Link up, replaying cache");
        }

        let report = self.flush();
        info!(
            replayed = report.replayed,
            rejected = report.rejected,
            requeued = report.requeued,
            "Cache flush finished"
        );
        report
    }

    /// Whether the cache currently considers the link up.
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Frames waiting for the link.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// No frames waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames evicted at the high-water mark since creation.
    pub fn evicted(&self) -> u64 {
        self.state.lock().evicted
    }

    /// Snapshot of waiting frames, oldest first.
    pub fn pending(&self) -> Vec<CachedMessage> {
        self.state.lock().queue.iter().cloned().collect()
    }

    /// Drop every waiting frame.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let cleared = state.queue.len();
        state.queue.clear();
        cleared
    }

    // Frames also queue during a flush so they stay behind older traffic.
    fn try_cache(&self, destination: &Destination, payload: &[u8]) -> bool {
        let mut state = self.state.lock();
        if state.connected && !state.flushing {
            return false;
        }

        if state.queue.len() >= self.high_water_mark {
            state.queue.pop_front();
            state.evicted += 1;
            warn!(
                high_water_mark = self.high_water_mark,
                "Cache full, evicted oldest frame"
            );
        }

        state.queue.push_back(CachedMessage {
            payload: payload.to_vec(),
            destination: destination.clone(),
            enqueued_at: current_timestamp_ms(),
        });
        debug!(cached = state.queue.len(), bytes = payload.len(), "Frame cached");
        true
    }

    fn flush(&self) -> FlushReport {
        let mut report = FlushReport::default();

        loop {
            let batch: Vec<CachedMessage> = {
                let mut state = self.state.lock();
                if state.queue.is_empty() || !state.connected {
                    state.flushing = false;
                    return report;
                }
                state.queue.drain(..).collect()
            };

            let mut remaining = batch.into_iter();
            while let Some(message) = remaining.next() {
                {
                    // connected check and requeue share one guard
                    let mut state = self.state.lock();
                    if !state.connected {
                        report.requeued += 1 + remaining.len();
                        for later in remaining.by_ref().rev() {
                            state.queue.push_front(later);
                        }
                        state.queue.push_front(message);
                        state.flushing = false;
                        return report;
                    }
                }

                if self.replay(&message) {
                    report.replayed += 1;
                } else {
                    report.rejected += 1;
                    debug!(destination = ?message.destination, "Replay rejected, dropping frame");
                }
            }
        }
    }

    fn replay(&self, message: &CachedMessage) -> bool {
        match &message.destination {
            Destination::Unicast { address, port } => {
                self.transport.send_unicast(address, *port, &message.payload)
            }
            Destination::Multicast { port } => self.transport.send_multicast(*port, &message.payload),
        }
    }
}
