//! Raft group registry
//!
//! One registry runs per shard. It owns every Raft group started on that
//! shard, dispatches inbound Raft messages to them, and keeps the two feeds
//! the engines depend on: replica addresses (from gossip and from inbound
//! traffic) and replica liveness (from the direct failure detector).
//!
//! Process-wide `start` wires the registry to its collaborators in this order:
//! gossip subscription, RPC verbs (coordinator shard only), failure detector
//! listener. `stop` unwinds in reverse after draining every group, and is
//! safe to call after a partially failed `start`.
//!
//! Every task the registry spawns (tickers, aborts, forwarded configuration
//! changes) runs on one `TaskTracker`; a drain returns only once that tracker
//! is empty, whichever caller started the drain.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use regatta_api::{RaftMessage, RaftRpcEnvelope, RaftRpcReply};
use regatta_common::{
    COORDINATOR_SHARD, GroupId, RegattaError, ReplicaId, Result, ShardId, on_internal_error,
};
use regatta_core::{
    DirectFailureDetector, EndpointStateChangeSubscriber, Gossiper, ListenerSubscription,
    MessagingService,
};

use super::address_map::AddressDirectory;
use super::direct_fd::LivenessGateway;
use super::gossip_proxy::MembershipBridge;
use super::group::GroupEntry;
use super::server::{FailureDetector, RaftRpc, RaftServer};
use super::verbs::{init_rpc_verbs, uninit_rpc_verbs};
use crate::config::RegistryConfig;
use crate::metrics;
use crate::shard::ShardRouter;

/// Shard owning a group's server and message handling
pub fn shard_for_group(_gid: &GroupId) -> ShardId {
    COORDINATOR_SHARD
}

/// Process-wide collaborators shared by every shard's registry
#[derive(Clone)]
pub struct RegistryDeps {
    pub messaging: Arc<dyn MessagingService>,
    pub gossiper: Arc<Gossiper>,
    pub failure_detector: Arc<DirectFailureDetector>,
}

#[derive(Default)]
struct GroupTable {
    servers: HashMap<GroupId, GroupEntry>,
    group0: Option<GroupId>,
}

pub struct GroupRegistry {
    shard: ShardId,
    config: RegistryConfig,
    deps: RegistryDeps,
    router: ShardRouter<GroupRegistry>,
    address_directory: Arc<AddressDirectory>,
    liveness: Arc<LivenessGateway>,
    membership: Arc<MembershipBridge>,
    my_id: Mutex<Option<ReplicaId>>,
    table: Mutex<GroupTable>,
    gossip_subscription: Mutex<Option<Arc<dyn EndpointStateChangeSubscriber>>>,
    fd_subscription: Mutex<Option<ListenerSubscription>>,
    draining: AtomicBool,
    tasks: TaskTracker,
    /// Serializes drains so a later caller waits on the same barrier
    drain_lock: tokio::sync::Mutex<()>,
}

impl GroupRegistry {
    pub fn new(
        shard: ShardId,
        config: RegistryConfig,
        deps: RegistryDeps,
        address_directory: Arc<AddressDirectory>,
        router: ShardRouter<GroupRegistry>,
    ) -> Self {
        let membership = Arc::new(MembershipBridge::new(Arc::clone(&address_directory)));
        Self {
            shard,
            config,
            deps,
            router,
            address_directory,
            liveness: Arc::new(LivenessGateway::new(shard)),
            membership,
            my_id: Mutex::new(None),
            table: Mutex::new(GroupTable::default()),
            gossip_subscription: Mutex::new(None),
            fd_subscription: Mutex::new(None),
            draining: AtomicBool::new(false),
            tasks: TaskTracker::new(),
            drain_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn shard(&self) -> ShardId {
        self.shard
    }

    /// Wire the registry to gossip, messaging and the failure detector
    pub async fn start(&self, my_id: ReplicaId) -> Result<()> {
        if !self.config.enabled {
            return Err(on_internal_error(
                "start(): raft group registry is disabled",
            ));
        }
        {
            let mut slot = self.my_id.lock();
            if let Some(existing) = *slot {
                return Err(on_internal_error(format!(
                    "start(): raft server id is already set to {existing}"
                )));
            }
            *slot = Some(my_id);
        }
        self.draining.store(false, Ordering::SeqCst);
        self.tasks.reopen();

        let subscriber: Arc<dyn EndpointStateChangeSubscriber> = self.membership.clone();
        self.deps.gossiper.register(Arc::clone(&subscriber)).await;
        *self.gossip_subscription.lock() = Some(subscriber);

        // Handlers must be in place before any group can start an election
        if self.shard == COORDINATOR_SHARD {
            init_rpc_verbs(self.deps.messaging.as_ref(), self.router.clone())?;
        }

        let subscription = self.deps.failure_detector.register_listener(
            self.liveness.clone(),
            self.config.failure_detector_interval(),
        )?;
        *self.fd_subscription.lock() = Some(subscription);

        info!(shard = self.shard, replica_id = %my_id, "Raft group registry started");
        Ok(())
    }

    /// Drain all groups and undo every registration made by `start`
    pub async fn stop(&self) {
        if !self.config.enabled {
            return;
        }

        self.drain_on_shutdown().await;

        if self.shard == COORDINATOR_SHARD {
            uninit_rpc_verbs(self.deps.messaging.as_ref()).await;
        }

        // Dropping the subscription unregisters the listener
        let fd_subscription = self.fd_subscription.lock().take();
        drop(fd_subscription);

        let gossip_subscription = self.gossip_subscription.lock().take();
        if let Some(subscriber) = gossip_subscription {
            self.deps.gossiper.unregister(&subscriber).await;
        }

        *self.my_id.lock() = None;
        self.table.lock().group0 = None;
        info!(shard = self.shard, "Raft group registry stopped");
    }

    /// Abort every group and wait until all aborts have completed
    ///
    /// Concurrent callers all return only after the last abort finished.
    pub async fn drain_on_shutdown(&self) {
        self.draining.store(true, Ordering::SeqCst);
        self.stop_servers().await;
    }

    async fn stop_servers(&self) {
        let _drain = self.drain_lock.lock().await;

        let aborting = {
            let mut table = self.table.lock();
            for entry in table.servers.values_mut() {
                ensure_aborted(entry, "raft group registry is stopping", &self.tasks);
            }
            table.servers.len()
        };

        // Entries stay in the table until their abort has finished
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();

        let remaining = {
            let mut table = self.table.lock();
            table.servers.retain(|_, entry| !entry.is_aborting());
            table.servers.len()
        };
        metrics::set_group_count(self.shard, remaining);

        if aborting > 0 {
            info!(shard = self.shard, groups = aborting, "Stopped raft groups");
        }
    }

    /// Start a group's engine and register it
    ///
    /// Either the group ends up fully registered with its ticker armed, or
    /// nothing about it remains and the started engine has been aborted.
    pub async fn start_server_for_group(&self, mut entry: GroupEntry) -> Result<()> {
        let gid = entry.gid;
        if self.draining.load(Ordering::SeqCst) {
            return Err(on_internal_error(format!(
                "start_server_for_group({gid}): registry is shutting down"
            )));
        }
        if self.table.lock().servers.contains_key(&gid) {
            return Err(on_internal_error(format!(
                "start_server_for_group(): raft group {gid} is already started"
            )));
        }

        let server = Arc::clone(&entry.server);
        if let Err(e) = server.start().await {
            return Err(on_internal_error(format!(
                "start_server_for_group({gid}): failed to start raft server: {e:#}"
            )));
        }
        if let Err(e) = server.register_metrics() {
            let err = on_internal_error(format!(
                "start_server_for_group({gid}): failed to register raft metrics: {e:#}"
            ));
            abort_on_rollback(gid, server.as_ref()).await;
            return Err(err);
        }

        let registered: Result<usize> = {
            let mut table = self.table.lock();
            if self.draining.load(Ordering::SeqCst) {
                Err(on_internal_error(format!(
                    "start_server_for_group({gid}): registry started shutting down"
                )))
            } else if table.servers.contains_key(&gid) {
                Err(on_internal_error(format!(
                    "start_server_for_group(): raft group {gid} was started concurrently"
                )))
            } else {
                let designated = table.group0.is_none() && self.shard == COORDINATOR_SHARD;
                match entry
                    .ticker
                    .arm_periodic(self.config.tick_interval(), &self.tasks)
                {
                    Ok(()) => {
                        table.servers.insert(gid, entry);
                        if designated {
                            table.group0 = Some(gid);
                            info!(group_id = %gid, "Designated raft group zero");
                        }
                        Ok(table.servers.len())
                    }
                    Err(e) => Err(e),
                }
            }
        };

        match registered {
            Ok(count) => {
                metrics::set_group_count(self.shard, count);
                info!(group_id = %gid, shard = self.shard, "Started raft group");
                Ok(())
            }
            Err(e) => {
                abort_on_rollback(gid, server.as_ref()).await;
                Err(e)
            }
        }
    }

    /// Initiate shutdown of one group; no-op for unknown groups and repeated calls
    pub fn abort_server(&self, gid: &GroupId, reason: &str) {
        let mut table = self.table.lock();
        if let Some(entry) = table.servers.get_mut(gid) {
            ensure_aborted(entry, reason, &self.tasks);
        }
    }

    /// Route one inbound message to the group it targets
    pub async fn handle_raft_rpc(
        &self,
        source: IpAddr,
        envelope: RaftRpcEnvelope,
    ) -> Result<RaftRpcReply> {
        let RaftRpcEnvelope {
            group_id,
            from,
            message,
            ..
        } = envelope;

        let rpc = self.get_rpc(&group_id)?;
        self.address_directory.opt_add_entry(from, source);

        let verb = message.verb();
        metrics::record_raft_rpc(verb);
        debug!(group_id = %group_id, from = %from, verb = %verb, "Dispatching raft message");

        match message {
            RaftMessage::SendSnapshot(snapshot) => rpc
                .apply_snapshot(from, snapshot)
                .await
                .map(RaftRpcReply::Snapshot)
                .map_err(raft_error),
            RaftMessage::AppendEntries(request) => {
                rpc.append_entries(from, request);
                Ok(RaftRpcReply::NoWait)
            }
            RaftMessage::AppendEntriesReply(reply) => {
                rpc.append_entries_reply(from, reply);
                Ok(RaftRpcReply::NoWait)
            }
            RaftMessage::VoteRequest(request) => {
                rpc.request_vote(from, request);
                Ok(RaftRpcReply::NoWait)
            }
            RaftMessage::VoteReply(reply) => {
                rpc.request_vote_reply(from, reply);
                Ok(RaftRpcReply::NoWait)
            }
            RaftMessage::TimeoutNow(request) => {
                rpc.timeout_now_request(from, request);
                Ok(RaftRpcReply::NoWait)
            }
            RaftMessage::ReadQuorum(request) => {
                rpc.read_quorum_request(from, request);
                Ok(RaftRpcReply::NoWait)
            }
            RaftMessage::ReadQuorumReply(reply) => {
                rpc.read_quorum_reply(from, reply);
                Ok(RaftRpcReply::NoWait)
            }
            RaftMessage::ExecuteReadBarrierOnLeader => rpc
                .execute_read_barrier(from)
                .await
                .map(RaftRpcReply::ReadBarrier)
                .map_err(raft_error),
            RaftMessage::AddEntry(command) => rpc
                .execute_add_entry(from, command)
                .await
                .map(RaftRpcReply::AddEntry)
                .map_err(raft_error),
            RaftMessage::ModifyConfig { add, del } => {
                self.tasks.spawn(async move {
                    match rpc.execute_modify_config(from, add, del).await {
                        Ok(reply) => debug!(
                            group_id = %group_id,
                            from = %from,
                            reply = ?reply,
                            "Forwarded configuration change"
                        ),
                        Err(e) => warn!(
                            group_id = %group_id,
                            from = %from,
                            error = %e,
                            "Forwarded configuration change failed"
                        ),
                    }
                });
                Ok(RaftRpcReply::NoWait)
            }
        }
    }

    fn get_rpc(&self, gid: &GroupId) -> Result<Arc<dyn RaftRpc>> {
        let table = self.table.lock();
        match table.servers.get(gid) {
            Some(entry) => Ok(Arc::clone(&entry.rpc)),
            None => {
                metrics::record_group_not_found();
                debug!(group_id = %gid, shard = self.shard, "Raft group not found");
                Err(RegattaError::GroupNotFound(*gid))
            }
        }
    }

    /// Engine of a running group
    pub fn get_server(&self, gid: &GroupId) -> Result<Arc<dyn RaftServer>> {
        self.find_server(gid).ok_or_else(|| {
            on_internal_error(format!("get_server(): raft group {gid} is not running"))
        })
    }

    pub fn find_server(&self, gid: &GroupId) -> Option<Arc<dyn RaftServer>> {
        self.table
            .lock()
            .servers
            .get(gid)
            .map(|entry| Arc::clone(&entry.server))
    }

    /// Engine of group zero
    pub fn group0(&self) -> Result<Arc<dyn RaftServer>> {
        let gid = self
            .group0_id()
            .ok_or_else(|| on_internal_error("group0(): group0 id not present"))?;
        self.get_server(&gid)
    }

    pub fn group0_id(&self) -> Option<GroupId> {
        self.table.lock().group0
    }

    pub fn get_my_raft_id(&self) -> Result<ReplicaId> {
        (*self.my_id.lock())
            .ok_or_else(|| on_internal_error("get_my_raft_id(): raft server id is not set"))
    }

    /// Liveness query handed to engines
    pub fn failure_detector(&self) -> Arc<dyn FailureDetector> {
        self.liveness.clone()
    }

    pub fn address_directory(&self) -> Arc<AddressDirectory> {
        Arc::clone(&self.address_directory)
    }

    pub fn group_count(&self) -> usize {
        self.table.lock().servers.len()
    }

    pub fn contains_group(&self, gid: &GroupId) -> bool {
        self.table.lock().servers.contains_key(gid)
    }
}

fn ensure_aborted(entry: &mut GroupEntry, reason: &str, tasks: &TaskTracker) {
    if entry.aborted.is_some() {
        return;
    }
    entry.ticker.cancel();

    let gid = entry.gid;
    let server = Arc::clone(&entry.server);
    let reason = reason.to_string();
    info!(group_id = %gid, reason = %reason, "Aborting raft group");
    entry.aborted = Some(tasks.spawn(async move {
        if let Err(e) = server.abort(reason).await {
            warn!(group_id = %gid, error = %e, "Failed to abort raft group");
        }
    }));
}

async fn abort_on_rollback(gid: GroupId, server: &dyn RaftServer) {
    if let Err(e) = server
        .abort("raft group registration rolled back".to_string())
        .await
    {
        warn!(group_id = %gid, error = %e, "Failed to abort raft server during rollback");
    }
}

fn raft_error(err: anyhow::Error) -> RegattaError {
    RegattaError::RaftError(format!("{err:#}"))
}
