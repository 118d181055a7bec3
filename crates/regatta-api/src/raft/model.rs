//! Raft RPC payloads
//!
//! These are the kind-specific bodies carried by a `RaftRpcEnvelope`. Their
//! interpretation belongs to the consensus engine; the registry only routes them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use regatta_common::ReplicaId;

pub type Term = u64;
pub type Index = u64;

/// Identifies a read request in flight on the leader
pub type ReadId = u64;

/// A single replicated log entry
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub term: Term,
    pub idx: Index,
    pub data: Vec<u8>,
}

/// Position of an entry in the log
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryId {
    pub term: Term,
    pub idx: Index,
}

/// A member of a group configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMember {
    pub id: ReplicaId,
    pub can_vote: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendRequest {
    pub current_term: Term,
    pub prev_log_idx: Index,
    pub prev_log_term: Term,
    pub leader_commit_idx: Index,
    pub entries: Vec<LogEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AppendResult {
    Accepted { last_new_idx: Index },
    Rejected { non_matching_idx: Index, last_idx: Index },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendReply {
    pub current_term: Term,
    pub commit_idx: Index,
    pub result: AppendResult,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub current_term: Term,
    pub last_log_idx: Index,
    pub last_log_term: Term,
    /// Pre-vote round: does not bump the receiver's term
    pub is_prevote: bool,
    /// Set when leadership is being transferred
    pub force: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReply {
    pub current_term: Term,
    pub vote_granted: bool,
    pub is_prevote: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutNow {
    pub current_term: Term,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadQuorum {
    pub current_term: Term,
    pub leader_commit_idx: Index,
    pub id: ReadId,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadQuorumReply {
    pub current_term: Term,
    pub commit_idx: Index,
    pub id: ReadId,
}

/// Describes a snapshot; the snapshot data itself is transferred by the engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDescriptor {
    pub idx: Index,
    pub term: Term,
    pub config: Vec<ConfigMember>,
    pub id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallSnapshot {
    pub current_term: Term,
    pub snp: SnapshotDescriptor,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotReply {
    pub current_term: Term,
    pub success: bool,
}

/// Opaque client command submitted to the replicated state machine
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Command(pub Vec<u8>);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadBarrierReply {
    /// The read may proceed once the local state machine applied this index
    Index(Index),
    NotALeader { leader: Option<ReplicaId> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AddEntryReply {
    Added(EntryId),
    NotALeader { leader: Option<ReplicaId> },
    TransientError(String),
}
