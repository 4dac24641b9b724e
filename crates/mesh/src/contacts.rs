//! Contact directory.
//!
//! One record per node heard from, created and refreshed by NodeInfo
//! presence announcements. The map is guarded by a single lock that is
//! never held across a send or any other blocking call; callers that
//! cannot get the lock within [`LOCK_TIMEOUT`] receive
//! [`MeshError::LockTimeout`] and skip the operation for this iteration.

use crate::error::{MeshError, MeshResult};
use aircom_core::{current_timestamp_ms, NodeId};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::debug;

/// Longest wait for a shared table lock.
pub const LOCK_TIMEOUT: Duration = Duration::from_millis(10);

/// Service a contact has been seen using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceType {
    /// Push-to-talk audio
    Voice,
    /// Text messages
    Text,
    /// Cursor-on-Target events
    Cot,
    /// Health telemetry
    Health,
}

/// A known node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    /// Unique node identifier
    pub node_id: NodeId,
    /// Operator callsign
    pub callsign: String,
    /// Transport address the node was last heard from
    pub address: String,
    /// Services observed from this node
    pub services: BTreeSet<ServiceType>,
    /// Last seen timestamp (Unix epoch milliseconds)
    pub last_seen: u64,
}

/// All known contacts, keyed by node id.
#[derive(Debug, Default)]
pub struct ContactDirectory {
    contacts: Mutex<HashMap<NodeId, ContactRecord>>,
}

impl ContactDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MeshResult<MutexGuard<'_, HashMap<NodeId, ContactRecord>>> {
        self.contacts
            .try_lock_for(LOCK_TIMEOUT)
            .ok_or(MeshError::LockTimeout {
                resource: "contacts",
            })
    }

    /// Create or refresh a contact from a presence announcement.
    ///
    /// Returns `true` if the node was not known before.
    pub fn observe_presence(&self, node_id: &str, callsign: &str, address: &str) -> MeshResult<bool> {
        let now = current_timestamp_ms();
        let mut contacts = self.lock()?;

        match contacts.get_mut(node_id) {
            Some(record) => {
                record.callsign = callsign.to_string();
                record.address = address.to_string();
                record.last_seen = now;
                Ok(false)
            }
            None => {
                contacts.insert(
                    node_id.to_string(),
                    ContactRecord {
                        node_id: node_id.to_string(),
                        callsign: callsign.to_string(),
                        address: address.to_string(),
                        services: BTreeSet::new(),
                        last_seen: now,
                    },
                );
                debug!(node_id = %node_id, callsign = %callsign, "New contact");
                Ok(true)
            }
        }
    }

    /// Add or replace a record as-is.
    pub fn insert(&self, record: ContactRecord) -> MeshResult<()> {
        self.lock()?.insert(record.node_id.clone(), record);
        Ok(())
    }

    /// Note that `node_id` uses `service`. Returns `false` for unknown nodes.
    pub fn mark_service(&self, node_id: &str, service: ServiceType) -> MeshResult<bool> {
        Ok(self
            .lock()?
            .get_mut(node_id)
            .map(|record| record.services.insert(service))
            .is_some())
    }

    /// Copy of one record
    pub fn get(&self, node_id: &str) -> MeshResult<Option<ContactRecord>> {
        Ok(self.lock()?.get(node_id).cloned())
    }

    /// Transport address of a contact
    pub fn address_of(&self, node_id: &str) -> MeshResult<Option<String>> {
        Ok(self.lock()?.get(node_id).map(|r| r.address.clone()))
    }

    /// Callsign of a contact
    pub fn callsign_of(&self, node_id: &str) -> MeshResult<Option<String>> {
        Ok(self.lock()?.get(node_id).map(|r| r.callsign.clone()))
    }

    /// Node ids and addresses of every contact.
    pub fn endpoints(&self) -> MeshResult<Vec<(NodeId, String)>> {
        let contacts = self.lock()?;
        let mut endpoints: Vec<(NodeId, String)> = contacts
            .values()
            .map(|r| (r.node_id.clone(), r.address.clone()))
            .collect();
        endpoints.sort();
        Ok(endpoints)
    }

    /// Number of contacts
    pub fn len(&self) -> MeshResult<usize> {
        Ok(self.lock()?.len())
    }

    /// Remove contacts not seen within `max_age`. Returns how many were removed.
    pub fn prune_stale(&self, max_age: Duration) -> MeshResult<usize> {
        let now = current_timestamp_ms();
        let max_age_ms = max_age.as_millis() as u64;
        let mut contacts = self.lock()?;

        let before = contacts.len();
        contacts.retain(|_, r| now.saturating_sub(r.last_seen) <= max_age_ms);
        let pruned = before - contacts.len();
        if pruned > 0 {
            debug!(pruned, "Pruned stale contacts");
        }
        Ok(pruned)
    }
}
