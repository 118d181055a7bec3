//! Identifiers shared by every Regatta component
//!
//! - `ReplicaId`: one consensus participant, stable for the lifetime of the
//!   process and persisted across restarts
//! - `GroupId`: one consensus group
//! - `ShardId`: index of an execution shard inside the process

use crate::define_uuid_id;

define_uuid_id!(
    /// Identity of a single Raft server (replica).
    ReplicaId
);

define_uuid_id!(
    /// Identity of a Raft group.
    GroupId
);

/// Index of an execution shard.
pub type ShardId = usize;

/// The shard that coordinates process-wide work: identity bootstrap and
/// group-zero ownership both live here.
pub const COORDINATOR_SHARD: ShardId = 0;
