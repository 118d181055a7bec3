//! Regatta Persistence - Local node storage
//!
//! This crate provides:
//! - Identity storage for the node's Raft replica id (RocksDB and in-memory)
//! - On-disk data file format versions and component naming

pub mod identity;
pub mod version;

pub use identity::{
    IdentityStore, MemoryIdentityStore, RocksIdentityStore, load_or_create_replica_id,
};
pub use version::{ComponentType, FormatVersion, component_filename};
