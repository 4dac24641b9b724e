//! Per-peer link statistics from the health exchange.

use crate::contacts::LOCK_TIMEOUT;
use crate::error::{MeshError, MeshResult};
use aircom_core::{current_timestamp_ms, NodeId};
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::time::Duration;

/// Link quality in both directions between this node and a peer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerLinkStats {
    /// RSSI of the peer's frames as received here, dBm
    pub local_rssi: i32,
    /// SNR of the peer's frames as received here, dB
    pub local_snr: f32,
    /// RSSI of our frames as reported by the peer, dBm
    pub remote_rssi: i32,
    /// SNR reported by the peer, dB
    pub remote_snr: f32,
    /// Round trip of the last answered health check
    pub last_latency_ms: u64,
    /// Unix epoch milliseconds of the last refresh
    pub last_update: u64,
}

/// Link statistics keyed by node id, behind a single lock.
#[derive(Debug, Default)]
pub struct LinkStatsTable {
    stats: Mutex<HashMap<NodeId, PeerLinkStats>>,
}

impl LinkStatsTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MeshResult<MutexGuard<'_, HashMap<NodeId, PeerLinkStats>>> {
        self.stats
            .try_lock_for(LOCK_TIMEOUT)
            .ok_or(MeshError::LockTimeout {
                resource: "link_stats",
            })
    }

    /// Record an answered health check.
    ///
    /// `echoed_at` is the request's send time; the latency is measured
    /// against the local clock now.
    pub fn record_response(
        &self,
        node_id: &str,
        echoed_at: u64,
        remote_rssi: i32,
        local_rssi: i32,
        local_snr: f32,
    ) -> MeshResult<PeerLinkStats> {
        let now = current_timestamp_ms();
        let mut stats = self.lock()?;

        let entry = stats.entry(node_id.to_string()).or_insert(PeerLinkStats {
            local_rssi,
            local_snr,
            remote_rssi,
            remote_snr: 0.0,
            last_latency_ms: 0,
            last_update: now,
        });
        entry.local_rssi = local_rssi;
        entry.local_snr = local_snr;
        entry.remote_rssi = remote_rssi;
        entry.last_latency_ms = now.saturating_sub(echoed_at);
        entry.last_update = now;
        Ok(*entry)
    }

    /// Record a peer's own link report. Latency is left as is.
    pub fn record_remote_health(
        &self,
        node_id: &str,
        remote_rssi: i32,
        remote_snr: f32,
        local_rssi: i32,
        local_snr: f32,
    ) -> MeshResult<()> {
        let now = current_timestamp_ms();
        let mut stats = self.lock()?;

        let entry = stats.entry(node_id.to_string()).or_insert(PeerLinkStats {
            local_rssi,
            local_snr,
            remote_rssi,
            remote_snr,
            last_latency_ms: 0,
            last_update: now,
        });
        entry.local_rssi = local_rssi;
        entry.local_snr = local_snr;
        entry.remote_rssi = remote_rssi;
        entry.remote_snr = remote_snr;
        entry.last_update = now;
        Ok(())
    }

    /// Copy of one peer's statistics
    pub fn get(&self, node_id: &str) -> MeshResult<Option<PeerLinkStats>> {
        Ok(self.lock()?.get(node_id).copied())
    }

    /// Add or replace an entry as-is
    pub fn insert(&self, node_id: impl Into<NodeId>, stats: PeerLinkStats) -> MeshResult<()> {
        self.lock()?.insert(node_id.into(), stats);
        Ok(())
    }

    /// Number of tracked peers
    pub fn len(&self) -> MeshResult<usize> {
        Ok(self.lock()?.len())
    }

    /// Drop entries not refreshed within `max_age`.
    pub fn prune_stale(&self, max_age: Duration) -> MeshResult<usize> {
        let now = current_timestamp_ms();
        let max_age_ms = max_age.as_millis() as u64;
        let mut stats = self.lock()?;

        let before = stats.len();
        stats.retain(|_, s| now.saturating_sub(s.last_update) <= max_age_ms);
        Ok(before - stats.len())
    }
}
