//! Node assembly: identity, cluster collaborators and the sharded registry

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use regatta_common::{COORDINATOR_SHARD, ReplicaId, on_internal_error};
use regatta_consistency::{
    AddressDirectory, DirectFdClock, DirectFdPinger, GroupRegistry, RegistryConfig, RegistryDeps,
    Sharded,
};
use regatta_core::{DirectFailureDetector, Gossiper, LocalMessagingService, TcpEchoPinger};
use regatta_persistence::{RocksIdentityStore, load_or_create_replica_id};

use crate::config::ServerConfig;

use super::shutdown::warn_if_slow;

/// A running Regatta node
pub struct RegattaNode {
    my_id: ReplicaId,
    raft: RegistryConfig,
    echo_address: SocketAddr,
    messaging: Arc<LocalMessagingService>,
    gossiper: Arc<Gossiper>,
    failure_detector: Arc<DirectFailureDetector>,
    registries: Sharded<GroupRegistry>,
    echo_cancel: CancellationToken,
    echo_task: JoinHandle<()>,
}

impl RegattaNode {
    /// Bring the node up
    ///
    /// On failure everything started so far is torn down again.
    pub async fn start(configuration: &ServerConfig) -> anyhow::Result<Self> {
        let raft = configuration.raft.clone();
        raft.validate()?;

        let my_id = bootstrap_identity(configuration).await?;
        info!(replica_id = %my_id, "Local replica identity loaded");

        let messaging = Arc::new(LocalMessagingService::new());
        let gossiper = Arc::new(Gossiper::new());

        // Each shard owns its directory; probes resolve through the coordinator's
        let directories: Vec<Arc<AddressDirectory>> = (0..raft.shard_count)
            .map(|_| Arc::new(AddressDirectory::new()))
            .collect();

        let listener = TcpListener::bind(configuration.listen_socket_addr()?).await?;
        let echo_address = listener.local_addr()?;
        let echo = TcpEchoPinger::new(echo_address.port(), configuration.probe_timeout());
        let pinger = DirectFdPinger::new(directories[COORDINATOR_SHARD].clone(), Arc::new(echo));
        let failure_detector =
            DirectFailureDetector::new(Arc::new(pinger), Arc::new(DirectFdClock::new()));

        let echo_cancel = CancellationToken::new();
        let echo_task = {
            let cancel = echo_cancel.clone();
            tokio::spawn(async move {
                if let Err(e) = regatta_core::serve_echo(listener, cancel).await {
                    error!("Echo responder failed: {}", e);
                }
            })
        };

        let deps = RegistryDeps {
            messaging: messaging.clone(),
            gossiper: gossiper.clone(),
            failure_detector: failure_detector.clone(),
        };
        let registries = Sharded::start(raft.shard_count, |shard, router| {
            GroupRegistry::new(
                shard,
                raft.clone(),
                deps.clone(),
                directories[shard].clone(),
                router,
            )
        });

        let node = Self {
            my_id,
            raft,
            echo_address,
            messaging,
            gossiper,
            failure_detector,
            registries,
            echo_cancel,
            echo_task,
        };

        if !node.raft.enabled {
            info!("Raft is disabled, registry stays inert");
            return Ok(node);
        }

        if let Err(e) = node.start_registries().await {
            error!("Failed to start raft group registry: {}", e);
            node.shutdown(Duration::from_secs(5)).await;
            return Err(e.into());
        }

        info!(
            replica_id = %node.my_id,
            shards = node.registries.shard_count(),
            echo_address = %node.echo_address,
            "Raft group registry started"
        );
        Ok(node)
    }

    async fn start_registries(&self) -> regatta_common::Result<()> {
        let my_id = self.my_id;
        let results = self
            .registries
            .invoke_on_all(move |registry| async move { registry.start(my_id).await })
            .await?;
        results.into_iter().collect()
    }

    pub fn my_id(&self) -> ReplicaId {
        self.my_id
    }

    pub fn echo_address(&self) -> SocketAddr {
        self.echo_address
    }

    pub fn messaging(&self) -> Arc<LocalMessagingService> {
        self.messaging.clone()
    }

    pub fn gossiper(&self) -> Arc<Gossiper> {
        self.gossiper.clone()
    }

    pub fn failure_detector(&self) -> Arc<DirectFailureDetector> {
        self.failure_detector.clone()
    }

    pub fn registries(&self) -> &Sharded<GroupRegistry> {
        &self.registries
    }

    /// Registry of the coordinating shard
    pub fn coordinator(&self) -> anyhow::Result<Arc<GroupRegistry>> {
        self.registries
            .instance(COORDINATOR_SHARD)
            .ok_or_else(|| on_internal_error("coordinator shard is missing").into())
    }

    /// Stop the node
    ///
    /// Groups are drained first and every abort is awaited, with a warning
    /// once the drain outlasts `drain_warning`. The registries, shards,
    /// failure detector and echo responder are stopped afterwards.
    pub async fn shutdown(self, drain_warning: Duration) {
        info!(replica_id = %self.my_id, "Shutting down raft group registry");

        warn_if_slow("drain raft groups", drain_warning, async {
            if let Err(e) = self
                .registries
                .invoke_on_all(|registry| async move { registry.drain_on_shutdown().await })
                .await
            {
                warn!("Failed to drain raft groups: {}", e);
            }
        })
        .await;

        if let Err(e) = self
            .registries
            .invoke_on_all(|registry| async move { registry.stop().await })
            .await
        {
            warn!("Failed to stop raft group registry: {}", e);
        }
        self.registries.stop().await;
        self.failure_detector.stop().await;

        self.echo_cancel.cancel();
        if let Err(e) = self.echo_task.await {
            warn!("Echo responder task failed: {}", e);
        }

        info!("Raft group registry stopped");
    }
}

/// Read the persisted replica id, creating it on first boot
///
/// The store is closed again before returning so the node does not hold the
/// RocksDB lock for its whole lifetime.
async fn bootstrap_identity(configuration: &ServerConfig) -> anyhow::Result<ReplicaId> {
    let path = configuration.identity_path();
    std::fs::create_dir_all(&path)?;
    let store = RocksIdentityStore::open(&path)?;
    load_or_create_replica_id(&store).await
}
