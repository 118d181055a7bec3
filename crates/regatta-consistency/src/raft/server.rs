// Capabilities the registry expects from the consensus engine
// The engine itself lives outside this crate; these traits are its seams

use async_trait::async_trait;

use regatta_api::{
    AddEntryReply, AppendReply, AppendRequest, Command, ConfigMember, InstallSnapshot,
    ReadBarrierReply, ReadQuorum, ReadQuorumReply, SnapshotReply, TimeoutNow, VoteReply,
    VoteRequest,
};
use regatta_common::ReplicaId;

/// One consensus engine instance, driving a single group
#[async_trait]
pub trait RaftServer: Send + Sync {
    async fn start(&self) -> anyhow::Result<()>;

    /// Shut the instance down; idempotence is provided by the registry
    async fn abort(&self, reason: String) -> anyhow::Result<()>;

    /// Advance the engine's logical clock by one tick
    fn tick(&self);

    fn register_metrics(&self) -> anyhow::Result<()>;
}

/// Receiving side of an engine's RPC layer
///
/// One-way messages are handed over synchronously and processed by the
/// engine in the background. Request/response messages return the engine's
/// answer for the transport to send back.
#[async_trait]
pub trait RaftRpc: Send + Sync {
    async fn apply_snapshot(
        &self,
        from: ReplicaId,
        snapshot: InstallSnapshot,
    ) -> anyhow::Result<SnapshotReply>;

    async fn execute_read_barrier(&self, from: ReplicaId) -> anyhow::Result<ReadBarrierReply>;

    async fn execute_add_entry(
        &self,
        from: ReplicaId,
        command: Command,
    ) -> anyhow::Result<AddEntryReply>;

    async fn execute_modify_config(
        &self,
        from: ReplicaId,
        add: Vec<ConfigMember>,
        del: Vec<ReplicaId>,
    ) -> anyhow::Result<AddEntryReply>;

    fn append_entries(&self, from: ReplicaId, request: AppendRequest);

    fn append_entries_reply(&self, from: ReplicaId, reply: AppendReply);

    fn request_vote(&self, from: ReplicaId, request: VoteRequest);

    fn request_vote_reply(&self, from: ReplicaId, reply: VoteReply);

    fn timeout_now_request(&self, from: ReplicaId, request: TimeoutNow);

    fn read_quorum_request(&self, from: ReplicaId, request: ReadQuorum);

    fn read_quorum_reply(&self, from: ReplicaId, reply: ReadQuorumReply);
}

/// Liveness query consulted by the engine's election and heartbeat logic
pub trait FailureDetector: Send + Sync {
    /// Must not block; called on every election and heartbeat decision
    fn is_alive(&self, id: ReplicaId) -> bool;
}
