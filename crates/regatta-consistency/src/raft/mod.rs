//! Multi-group Raft registry

pub mod address_map;
pub mod direct_fd;
pub mod gossip_proxy;
pub mod group;
pub mod registry;
pub mod server;
pub mod verbs;

pub use address_map::AddressDirectory;
pub use direct_fd::{DirectFdClock, DirectFdPinger, LivenessGateway};
pub use gossip_proxy::MembershipBridge;
pub use group::{GroupEntry, Ticker};
pub use registry::{GroupRegistry, RegistryDeps, shard_for_group};
pub use server::{FailureDetector, RaftRpc, RaftServer};
pub use verbs::{RaftRpcDispatcher, init_rpc_verbs, uninit_rpc_verbs};
