// Gossip subscriber feeding the address directory
// Only join/alive/restart carry information we act on; a replica's address
// stays bound once learned and is dropped only by the consensus layer

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use regatta_common::ReplicaId;
use regatta_core::{ApplicationState, EndpointState, EndpointStateChangeSubscriber, VersionedValue};

use super::address_map::AddressDirectory;

pub struct MembershipBridge {
    directory: Arc<AddressDirectory>,
}

impl MembershipBridge {
    pub fn new(directory: Arc<AddressDirectory>) -> Self {
        Self { directory }
    }

    fn update_address(&self, endpoint: IpAddr, state: &EndpointState) {
        let Some(value) = state.get_application_state(ApplicationState::RaftServerId) else {
            return;
        };
        match value.value.parse::<ReplicaId>() {
            Ok(id) => self.directory.add_or_update_entry(id, endpoint),
            Err(e) => warn!(
                endpoint = %endpoint,
                value = %value.value,
                error = %e,
                "Ignoring malformed raft server id in gossip state"
            ),
        }
    }
}

#[async_trait]
impl EndpointStateChangeSubscriber for MembershipBridge {
    async fn on_join(&self, endpoint: IpAddr, state: &EndpointState) {
        self.update_address(endpoint, state);
    }

    async fn before_change(
        &self,
        _endpoint: IpAddr,
        _current: &EndpointState,
        _key: ApplicationState,
        _new_value: &VersionedValue,
    ) {
        // Raft server id never changes
    }

    async fn on_change(&self, _endpoint: IpAddr, _key: ApplicationState, _value: &VersionedValue) {
        // Raft server id never changes
    }

    async fn on_alive(&self, endpoint: IpAddr, state: &EndpointState) {
        self.update_address(endpoint, state);
    }

    async fn on_dead(&self, _endpoint: IpAddr, _state: &EndpointState) {}

    async fn on_remove(&self, _endpoint: IpAddr) {
        // Removed when the replica leaves the group configuration
    }

    async fn on_restart(&self, endpoint: IpAddr, state: &EndpointState) {
        self.update_address(endpoint, state);
    }
}
