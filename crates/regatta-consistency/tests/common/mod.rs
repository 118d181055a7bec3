//! Common test utilities for registry integration tests
//!
//! This module provides:
//! - MockServer / MockRpc: recording stand-ins for a consensus engine
//! - TestNode: a sharded registry wired to in-process collaborators

#![allow(dead_code)]

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use regatta_api::*;
use regatta_common::{GroupId, RegattaError, ReplicaId};
use regatta_consistency::{
    AddressDirectory, DirectFdClock, DirectFdPinger, GroupEntry, GroupRegistry, RaftRpc,
    RaftServer, RegistryConfig, RegistryDeps, Sharded,
};
use regatta_core::{DirectFailureDetector, EchoPinger, Gossiper, LocalMessagingService};

/// Engine double counting lifecycle calls
#[derive(Default)]
pub struct MockServer {
    pub starts: AtomicUsize,
    pub aborts: AtomicUsize,
    pub ticks: AtomicUsize,
    pub fail_start: AtomicBool,
    pub fail_metrics: AtomicBool,
    pub fail_abort: AtomicBool,
    /// When set, `start` waits for a notification before returning
    pub start_gate: Mutex<Option<Arc<Notify>>>,
    /// When set, `abort` waits for a notification before returning
    pub abort_gate: Mutex<Option<Arc<Notify>>>,
    pub aborts_finished: AtomicUsize,
    pub abort_reasons: Mutex<Vec<String>>,
}

impl MockServer {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn aborts_finished(&self) -> usize {
        self.aborts_finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RaftServer for MockServer {
    async fn start(&self) -> anyhow::Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let gate = self.start_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_start.load(Ordering::SeqCst) {
            anyhow::bail!("injected start failure");
        }
        Ok(())
    }

    async fn abort(&self, reason: String) -> anyhow::Result<()> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.abort_reasons.lock().push(reason);
        let gate = self.abort_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.aborts_finished.fetch_add(1, Ordering::SeqCst);
        if self.fail_abort.load(Ordering::SeqCst) {
            anyhow::bail!("injected abort failure");
        }
        Ok(())
    }

    fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }

    fn register_metrics(&self) -> anyhow::Result<()> {
        if self.fail_metrics.load(Ordering::SeqCst) {
            anyhow::bail!("injected metrics failure");
        }
        Ok(())
    }
}

/// RPC shim double recording every message it receives
#[derive(Default)]
pub struct MockRpc {
    pub received: Mutex<Vec<(ReplicaId, RaftVerb)>>,
    pub modify_config_done: Notify,
    /// When set, `execute_modify_config` waits for a notification first
    pub modify_config_gate: Mutex<Option<Arc<Notify>>>,
    pub modify_configs_finished: AtomicUsize,
}

impl MockRpc {
    fn record(&self, from: ReplicaId, verb: RaftVerb) {
        self.received.lock().push((from, verb));
    }

    pub fn verbs(&self) -> Vec<RaftVerb> {
        self.received.lock().iter().map(|(_, verb)| *verb).collect()
    }

    pub fn modify_configs_finished(&self) -> usize {
        self.modify_configs_finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RaftRpc for MockRpc {
    async fn apply_snapshot(
        &self,
        from: ReplicaId,
        snapshot: InstallSnapshot,
    ) -> anyhow::Result<SnapshotReply> {
        self.record(from, RaftVerb::SendSnapshot);
        Ok(SnapshotReply {
            current_term: snapshot.current_term,
            success: true,
        })
    }

    async fn execute_read_barrier(&self, from: ReplicaId) -> anyhow::Result<ReadBarrierReply> {
        self.record(from, RaftVerb::ExecuteReadBarrierOnLeader);
        Ok(ReadBarrierReply::Index(42))
    }

    async fn execute_add_entry(
        &self,
        from: ReplicaId,
        command: Command,
    ) -> anyhow::Result<AddEntryReply> {
        self.record(from, RaftVerb::AddEntry);
        if command.0.is_empty() {
            anyhow::bail!("empty command");
        }
        Ok(AddEntryReply::Added(EntryId { term: 1, idx: 7 }))
    }

    async fn execute_modify_config(
        &self,
        from: ReplicaId,
        _add: Vec<ConfigMember>,
        _del: Vec<ReplicaId>,
    ) -> anyhow::Result<AddEntryReply> {
        self.record(from, RaftVerb::ModifyConfig);
        let gate = self.modify_config_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.modify_configs_finished.fetch_add(1, Ordering::SeqCst);
        self.modify_config_done.notify_one();
        Ok(AddEntryReply::NotALeader { leader: None })
    }

    fn append_entries(&self, from: ReplicaId, _request: AppendRequest) {
        self.record(from, RaftVerb::AppendEntries);
    }

    fn append_entries_reply(&self, from: ReplicaId, _reply: AppendReply) {
        self.record(from, RaftVerb::AppendEntriesReply);
    }

    fn request_vote(&self, from: ReplicaId, _request: VoteRequest) {
        self.record(from, RaftVerb::VoteRequest);
    }

    fn request_vote_reply(&self, from: ReplicaId, _reply: VoteReply) {
        self.record(from, RaftVerb::VoteReply);
    }

    fn timeout_now_request(&self, from: ReplicaId, _request: TimeoutNow) {
        self.record(from, RaftVerb::TimeoutNow);
    }

    fn read_quorum_request(&self, from: ReplicaId, _request: ReadQuorum) {
        self.record(from, RaftVerb::ReadQuorum);
    }

    fn read_quorum_reply(&self, from: ReplicaId, _reply: ReadQuorumReply) {
        self.record(from, RaftVerb::ReadQuorumReply);
    }
}

/// Echo pinger that reports every peer as down
pub struct UnreachableEcho;

#[async_trait]
impl EchoPinger for UnreachableEcho {
    async fn ping(&self, _addr: IpAddr, _cancel: &CancellationToken) -> regatta_common::Result<()> {
        Err(RegattaError::ConnectionClosed("unreachable".to_string()))
    }
}

/// Build a group entry backed by fresh mocks
pub fn mock_group(gid: GroupId) -> (GroupEntry, Arc<MockServer>, Arc<MockRpc>) {
    let server = Arc::new(MockServer::default());
    let rpc = Arc::new(MockRpc::default());
    let entry = GroupEntry::new(gid, server.clone(), rpc.clone());
    (entry, server, rpc)
}

/// A node: sharded registries plus in-process collaborators
pub struct TestNode {
    pub my_id: ReplicaId,
    pub messaging: Arc<LocalMessagingService>,
    pub gossiper: Arc<Gossiper>,
    pub failure_detector: Arc<DirectFailureDetector>,
    pub registries: Sharded<GroupRegistry>,
}

impl TestNode {
    pub fn new(config: RegistryConfig) -> Self {
        let messaging = Arc::new(LocalMessagingService::new());
        let gossiper = Arc::new(Gossiper::new());

        let directories: Vec<Arc<AddressDirectory>> = (0..config.shard_count)
            .map(|_| Arc::new(AddressDirectory::new()))
            .collect();
        let pinger = DirectFdPinger::new(directories[0].clone(), Arc::new(UnreachableEcho));
        let failure_detector =
            DirectFailureDetector::new(Arc::new(pinger), Arc::new(DirectFdClock::new()));

        let deps = RegistryDeps {
            messaging: messaging.clone(),
            gossiper: gossiper.clone(),
            failure_detector: failure_detector.clone(),
        };
        let registries = Sharded::start(config.shard_count, |shard, router| {
            GroupRegistry::new(
                shard,
                config.clone(),
                deps.clone(),
                directories[shard].clone(),
                router,
            )
        });

        Self {
            my_id: ReplicaId::create_random_id(),
            messaging,
            gossiper,
            failure_detector,
            registries,
        }
    }

    /// Registry of the coordinating shard
    pub fn registry(&self) -> Arc<GroupRegistry> {
        self.registries
            .instance(regatta_common::COORDINATOR_SHARD)
            .expect("coordinator shard exists")
    }

    pub async fn start(&self) -> regatta_common::Result<()> {
        let my_id = self.my_id;
        for result in self
            .registries
            .invoke_on_all(move |registry| async move { registry.start(my_id).await })
            .await?
        {
            result?;
        }
        Ok(())
    }

    pub async fn stop(&self) {
        self.registries
            .invoke_on_all(|registry| async move { registry.stop().await })
            .await
            .expect("all shards reachable");
    }

    /// Deliver a message as if it arrived from `source`
    pub async fn deliver(
        &self,
        source: SocketAddr,
        envelope: RaftRpcEnvelope,
    ) -> regatta_common::Result<RaftRpcReply> {
        self.messaging
            .deliver(ClientInfo::new(source), envelope)
            .await
    }

    pub async fn shutdown(self) {
        self.stop().await;
        self.registries.stop().await;
        self.failure_detector.stop().await;
    }
}

pub fn envelope(gid: GroupId, from: ReplicaId, message: RaftMessage) -> RaftRpcEnvelope {
    RaftRpcEnvelope::new(gid, from, ReplicaId::create_random_id(), message)
}

pub fn append_entries(gid: GroupId, from: ReplicaId) -> RaftRpcEnvelope {
    envelope(gid, from, RaftMessage::AppendEntries(AppendRequest::default()))
}
