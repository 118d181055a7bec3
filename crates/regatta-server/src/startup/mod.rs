//! Server startup: logging, node assembly and shutdown handling

pub mod logging;
pub mod node;
pub mod shutdown;

pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use node::RegattaNode;
pub use shutdown::{ShutdownSignal, warn_if_slow, wait_for_shutdown_signal};
