//! Regatta Core - Cluster services consumed by the Raft group registry
//!
//! This crate provides:
//! - Messaging service (per-verb RPC handler registry)
//! - Gossip endpoint-state change notifications
//! - Direct failure detector (ping based liveness probing)
//! - Network echo probe

pub mod echo;
pub mod failure_detector;
pub mod gossip;
pub mod messaging;

// Re-export commonly used types
pub use echo::{DEFAULT_ECHO_PORT, EchoPinger, TcpEchoPinger, serve_echo};
pub use failure_detector::{
    Clock, DirectFailureDetector, Listener, ListenerSubscription, Pinger, Timepoint,
};
pub use gossip::{
    ApplicationState, EndpointState, EndpointStateChangeSubscriber, Gossiper, VersionedValue,
};
pub use messaging::{LocalMessagingService, MessagingService, RpcHandler};
