//! Raft RPC verbs
//!
//! A verb identifies one message kind. Handlers are registered and
//! unregistered as a complete set, one handler per verb.

use serde::{Deserialize, Serialize};

/// Raft message kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RaftVerb {
    /// Install a snapshot on a follower
    SendSnapshot,
    /// Replicate log entries (also used as heartbeat)
    AppendEntries,
    /// Follower response to `AppendEntries`
    AppendEntriesReply,
    /// Candidate asks for a vote
    VoteRequest,
    /// Response to `VoteRequest`
    VoteReply,
    /// Leader asks a follower to start an election immediately
    TimeoutNow,
    /// Leader confirms its leadership for a linearizable read
    ReadQuorum,
    /// Response to `ReadQuorum`
    ReadQuorumReply,
    /// Follower asks the leader to execute a read barrier
    ExecuteReadBarrierOnLeader,
    /// Follower forwards a client command to the leader
    AddEntry,
    /// Follower forwards a configuration change to the leader
    ModifyConfig,
}

impl RaftVerb {
    /// Every verb, in registration order.
    pub const ALL: [RaftVerb; 11] = [
        RaftVerb::SendSnapshot,
        RaftVerb::AppendEntries,
        RaftVerb::AppendEntriesReply,
        RaftVerb::VoteRequest,
        RaftVerb::VoteReply,
        RaftVerb::TimeoutNow,
        RaftVerb::ReadQuorum,
        RaftVerb::ReadQuorumReply,
        RaftVerb::ExecuteReadBarrierOnLeader,
        RaftVerb::AddEntry,
        RaftVerb::ModifyConfig,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RaftVerb::SendSnapshot => "raft_send_snapshot",
            RaftVerb::AppendEntries => "raft_append_entries",
            RaftVerb::AppendEntriesReply => "raft_append_entries_reply",
            RaftVerb::VoteRequest => "raft_vote_request",
            RaftVerb::VoteReply => "raft_vote_reply",
            RaftVerb::TimeoutNow => "raft_timeout_now",
            RaftVerb::ReadQuorum => "raft_read_quorum",
            RaftVerb::ReadQuorumReply => "raft_read_quorum_reply",
            RaftVerb::ExecuteReadBarrierOnLeader => "raft_execute_read_barrier_on_leader",
            RaftVerb::AddEntry => "raft_add_entry",
            RaftVerb::ModifyConfig => "raft_modify_config",
        }
    }

    /// One-way verbs are fire-and-forget: the sender gets no reply payload.
    pub fn is_one_way(self) -> bool {
        !matches!(
            self,
            RaftVerb::SendSnapshot | RaftVerb::ExecuteReadBarrierOnLeader | RaftVerb::AddEntry
        )
    }
}

impl std::fmt::Display for RaftVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_all_verbs_are_distinct() {
        let names: HashSet<&str> = RaftVerb::ALL.iter().map(|v| v.as_str()).collect();
        assert_eq!(names.len(), RaftVerb::ALL.len());
    }

    #[test]
    fn test_request_response_verbs() {
        let two_way: Vec<RaftVerb> = RaftVerb::ALL
            .into_iter()
            .filter(|v| !v.is_one_way())
            .collect();
        assert_eq!(
            two_way,
            vec![
                RaftVerb::SendSnapshot,
                RaftVerb::ExecuteReadBarrierOnLeader,
                RaftVerb::AddEntry
            ]
        );
        assert!(RaftVerb::ModifyConfig.is_one_way());
    }
}
