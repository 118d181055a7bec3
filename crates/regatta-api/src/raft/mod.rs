//! Raft RPC API models

pub mod message;
pub mod model;
pub mod verb;

pub use message::*;
pub use model::*;
pub use verb::RaftVerb;
