//! Regatta Common - Shared identifiers, error types, and utilities
//!
//! This crate provides the foundational types used across all Regatta components:
//! - Replica, group and shard identifiers
//! - Error taxonomy and internal-error reporting

mod macros;

pub mod error;
pub mod id;

// Re-exports for convenience
pub use error::{RegattaError, Result, on_internal_error};
pub use id::{COORDINATOR_SHARD, GroupId, ReplicaId, ShardId};
