//! Regatta server library
//!
//! Configuration loading, process startup and the assembled node.

pub mod config;
pub mod metrics;
pub mod startup;

pub use config::{Cli, ServerConfig};
pub use startup::RegattaNode;
