//! Raft RPC envelope
//!
//! Every message carries the target group, the sender and the intended
//! destination replica in addition to its kind-specific payload.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use regatta_common::{GroupId, ReplicaId};

use super::model::*;
use super::verb::RaftVerb;

/// Kind-specific message body
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RaftMessage {
    SendSnapshot(InstallSnapshot),
    AppendEntries(AppendRequest),
    AppendEntriesReply(AppendReply),
    VoteRequest(VoteRequest),
    VoteReply(VoteReply),
    TimeoutNow(TimeoutNow),
    ReadQuorum(ReadQuorum),
    ReadQuorumReply(ReadQuorumReply),
    ExecuteReadBarrierOnLeader,
    AddEntry(Command),
    ModifyConfig {
        add: Vec<ConfigMember>,
        del: Vec<ReplicaId>,
    },
}

impl RaftMessage {
    pub fn verb(&self) -> RaftVerb {
        match self {
            RaftMessage::SendSnapshot(_) => RaftVerb::SendSnapshot,
            RaftMessage::AppendEntries(_) => RaftVerb::AppendEntries,
            RaftMessage::AppendEntriesReply(_) => RaftVerb::AppendEntriesReply,
            RaftMessage::VoteRequest(_) => RaftVerb::VoteRequest,
            RaftMessage::VoteReply(_) => RaftVerb::VoteReply,
            RaftMessage::TimeoutNow(_) => RaftVerb::TimeoutNow,
            RaftMessage::ReadQuorum(_) => RaftVerb::ReadQuorum,
            RaftMessage::ReadQuorumReply(_) => RaftVerb::ReadQuorumReply,
            RaftMessage::ExecuteReadBarrierOnLeader => RaftVerb::ExecuteReadBarrierOnLeader,
            RaftMessage::AddEntry(_) => RaftVerb::AddEntry,
            RaftMessage::ModifyConfig { .. } => RaftVerb::ModifyConfig,
        }
    }
}

/// A Raft message addressed to one group on one replica
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaftRpcEnvelope {
    pub group_id: GroupId,
    pub from: ReplicaId,
    pub dst: ReplicaId,
    pub message: RaftMessage,
}

impl RaftRpcEnvelope {
    pub fn new(group_id: GroupId, from: ReplicaId, dst: ReplicaId, message: RaftMessage) -> Self {
        Self {
            group_id,
            from,
            dst,
            message,
        }
    }

    pub fn verb(&self) -> RaftVerb {
        self.message.verb()
    }
}

/// What the receiving side hands back to the transport
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RaftRpcReply {
    /// One-way verbs: nothing to send back
    NoWait,
    Snapshot(SnapshotReply),
    ReadBarrier(ReadBarrierReply),
    AddEntry(AddEntryReply),
}

/// Per-call metadata supplied by the transport
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientInfo {
    /// Observed network address of the peer that sent the message
    pub source: SocketAddr,
}

impl ClientInfo {
    pub fn new(source: SocketAddr) -> Self {
        Self { source }
    }
}
