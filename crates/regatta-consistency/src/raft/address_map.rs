//! Replica id to network address mapping
//!
//! Two write paths with different precedence:
//! - authoritative updates, learned from gossip, always overwrite
//! - soft updates, learned from the source address of inbound Raft
//!   messages, only fill in ids that have no entry yet
//!
//! A message can come from a stale or out-of-configuration peer, so its
//! observed address must never replace one learned from membership.

use std::collections::HashMap;
use std::net::IpAddr;

use parking_lot::RwLock;
use tracing::debug;

use regatta_common::ReplicaId;

#[derive(Debug, Default)]
pub struct AddressDirectory {
    entries: RwLock<HashMap<ReplicaId, IpAddr>>,
}

impl AddressDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, id: &ReplicaId) -> Option<IpAddr> {
        self.entries.read().get(id).copied()
    }

    /// Authoritative update: always overwrites
    pub fn add_or_update_entry(&self, id: ReplicaId, addr: IpAddr) {
        let previous = self.entries.write().insert(id, addr);
        if previous != Some(addr) {
            debug!(replica_id = %id, address = %addr, previous = ?previous, "Updated replica address");
        }
    }

    /// Soft update: inserts only when `id` has no entry, returns whether it inserted
    pub fn opt_add_entry(&self, id: ReplicaId, addr: IpAddr) -> bool {
        if self.entries.read().contains_key(&id) {
            return false;
        }
        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(id, addr);
        debug!(replica_id = %id, address = %addr, "Learned replica address from rpc");
        true
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
