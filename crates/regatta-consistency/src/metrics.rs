// Registry metrics
// Counters for inbound Raft traffic and a per-shard gauge of running groups

use metrics::{counter, describe_counter, describe_gauge, gauge};

use regatta_api::RaftVerb;
use regatta_common::ShardId;

pub const RAFT_RPC_TOTAL: &str = "regatta_raft_rpc_total";
pub const RAFT_GROUP_NOT_FOUND_TOTAL: &str = "regatta_raft_group_not_found_total";
pub const RAFT_GROUPS: &str = "regatta_raft_groups";

/// Initialize metric descriptions
/// Should be called once at application startup
pub fn describe_metrics() {
    describe_counter!(
        RAFT_RPC_TOTAL,
        "Total number of Raft messages dispatched to a local group"
    );
    describe_counter!(
        RAFT_GROUP_NOT_FOUND_TOTAL,
        "Total number of Raft messages addressed to a group not running here"
    );
    describe_gauge!(RAFT_GROUPS, "Number of Raft groups running on a shard");
}

/// Record a dispatched Raft message
pub fn record_raft_rpc(verb: RaftVerb) {
    counter!(RAFT_RPC_TOTAL, "verb" => verb.as_str()).increment(1);
}

pub fn record_group_not_found() {
    counter!(RAFT_GROUP_NOT_FOUND_TOTAL).increment(1);
}

/// Update the running group count of a shard
pub fn set_group_count(shard: ShardId, count: usize) {
    gauge!(RAFT_GROUPS, "shard" => shard.to_string()).set(count as f64);
}
