// Gossip endpoint-state change notifications
// Subscribers are told when peers join, change, go up or down, leave or restart

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

/// Named slots of per-endpoint state propagated by gossip
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationState {
    Status,
    HostId,
    /// Raft replica identifier of the endpoint
    RaftServerId,
    RpcAddress,
}

impl std::fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplicationState::Status => write!(f, "STATUS"),
            ApplicationState::HostId => write!(f, "HOST_ID"),
            ApplicationState::RaftServerId => write!(f, "RAFT_SERVER_ID"),
            ApplicationState::RpcAddress => write!(f, "RPC_ADDRESS"),
        }
    }
}

/// A gossiped value with the version it was published at
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedValue {
    pub value: String,
    pub version: u64,
}

impl VersionedValue {
    pub fn new(value: impl Into<String>, version: u64) -> Self {
        Self {
            value: value.into(),
            version,
        }
    }
}

/// Everything gossip currently knows about one endpoint
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointState {
    application_states: HashMap<ApplicationState, VersionedValue>,
}

impl EndpointState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_application_state(mut self, key: ApplicationState, value: VersionedValue) -> Self {
        self.application_states.insert(key, value);
        self
    }

    pub fn add_application_state(&mut self, key: ApplicationState, value: VersionedValue) {
        self.application_states.insert(key, value);
    }

    pub fn get_application_state(&self, key: ApplicationState) -> Option<&VersionedValue> {
        self.application_states.get(&key)
    }
}

/// Trait for reacting to endpoint-state changes
#[async_trait]
pub trait EndpointStateChangeSubscriber: Send + Sync {
    /// A previously unknown endpoint appeared
    async fn on_join(&self, endpoint: IpAddr, state: &EndpointState);

    /// An application state is about to change
    async fn before_change(
        &self,
        endpoint: IpAddr,
        current: &EndpointState,
        key: ApplicationState,
        new_value: &VersionedValue,
    );

    /// An application state changed
    async fn on_change(&self, endpoint: IpAddr, key: ApplicationState, value: &VersionedValue);

    /// The endpoint was marked up
    async fn on_alive(&self, endpoint: IpAddr, state: &EndpointState);

    /// The endpoint was marked down
    async fn on_dead(&self, endpoint: IpAddr, state: &EndpointState);

    /// The endpoint was removed from the cluster
    async fn on_remove(&self, endpoint: IpAddr);

    /// The endpoint restarted with a new generation
    async fn on_restart(&self, endpoint: IpAddr, state: &EndpointState);
}

/// Gossip notification hub
///
/// Endpoint discovery and state exchange happen elsewhere; whatever drives
/// them publishes the resulting events through the `notify_*` methods.
pub struct Gossiper {
    subscribers: RwLock<Vec<Arc<dyn EndpointStateChangeSubscriber>>>,
}

impl Default for Gossiper {
    fn default() -> Self {
        Self::new()
    }
}

impl Gossiper {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub async fn register(&self, subscriber: Arc<dyn EndpointStateChangeSubscriber>) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.push(subscriber);
        debug!(
            "Registered endpoint state subscriber, total: {}",
            subscribers.len()
        );
    }

    /// Remove a previously registered subscriber, returns whether it was found
    pub async fn unregister(&self, subscriber: &Arc<dyn EndpointStateChangeSubscriber>) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|s| !Arc::ptr_eq(s, subscriber));
        let removed = subscribers.len() != before;
        if removed {
            debug!(
                "Unregistered endpoint state subscriber, total: {}",
                subscribers.len()
            );
        }
        removed
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    // Snapshot so a subscriber may (un)register without deadlocking
    async fn snapshot(&self) -> Vec<Arc<dyn EndpointStateChangeSubscriber>> {
        self.subscribers.read().await.clone()
    }

    pub async fn notify_join(&self, endpoint: IpAddr, state: &EndpointState) {
        for subscriber in self.snapshot().await {
            subscriber.on_join(endpoint, state).await;
        }
    }

    /// Publish a state change: `before_change` to everyone, then `on_change`
    pub async fn notify_change(
        &self,
        endpoint: IpAddr,
        current: &EndpointState,
        key: ApplicationState,
        value: &VersionedValue,
    ) {
        let subscribers = self.snapshot().await;
        for subscriber in &subscribers {
            subscriber.before_change(endpoint, current, key, value).await;
        }
        for subscriber in &subscribers {
            subscriber.on_change(endpoint, key, value).await;
        }
    }

    pub async fn notify_alive(&self, endpoint: IpAddr, state: &EndpointState) {
        for subscriber in self.snapshot().await {
            subscriber.on_alive(endpoint, state).await;
        }
    }

    pub async fn notify_dead(&self, endpoint: IpAddr, state: &EndpointState) {
        for subscriber in self.snapshot().await {
            subscriber.on_dead(endpoint, state).await;
        }
    }

    pub async fn notify_remove(&self, endpoint: IpAddr) {
        for subscriber in self.snapshot().await {
            subscriber.on_remove(endpoint).await;
        }
    }

    pub async fn notify_restart(&self, endpoint: IpAddr, state: &EndpointState) {
        for subscriber in self.snapshot().await {
            subscriber.on_restart(endpoint, state).await;
        }
    }
}
