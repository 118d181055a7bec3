//! Regatta Consistency - Multi-group Raft registry
//!
//! This crate provides:
//! - Group registry (per-shard ownership, start/stop with rollback, message dispatch)
//! - Replica address directory fed by gossip and inbound traffic
//! - Liveness gateway between the direct failure detector and the engines
//! - Sharded execution container with explicit cross-shard hops
//! - Registry configuration and metrics

pub mod config;
pub mod metrics;
pub mod raft;
pub mod shard;

// Re-export commonly used types
pub use config::RegistryConfig;
pub use raft::{
    AddressDirectory, DirectFdClock, DirectFdPinger, FailureDetector, GroupEntry, GroupRegistry,
    LivenessGateway, MembershipBridge, RaftRpc, RaftServer, RegistryDeps, shard_for_group,
};
pub use shard::{ShardRouter, Sharded};
