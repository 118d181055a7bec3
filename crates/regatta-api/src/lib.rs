//! Regatta API - Raft RPC message definitions
//!
//! This crate provides the logical (transport independent) model of the
//! messages exchanged between Raft servers:
//! - `RaftVerb`: the message kinds a node registers handlers for
//! - per-kind payloads (append entries, votes, snapshots, read quorum, ...)
//! - the `RaftRpcEnvelope` carrying target group, sender and destination

pub mod raft;

// Re-export commonly used types
pub use raft::*;
