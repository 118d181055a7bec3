//! Error types for Regatta
//!
//! Failures fall into two classes:
//! - expected conditions (`GroupNotFound` during dispatch races, closed
//!   connections while probing) that callers treat as ordinary negative results
//! - invariant violations (`InternalError`) that indicate a programming or
//!   environment defect and are fatal to the operation that hit them

use std::backtrace::Backtrace;

use crate::id::{GroupId, ShardId};

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum RegattaError {
    #[error("raft group {0} not found")]
    GroupNotFound(GroupId),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("raft error: {0}")]
    RaftError(String),

    #[error("no handler registered for verb '{0}'")]
    NoHandler(String),

    #[error("handler for verb '{0}' is already registered")]
    HandlerExists(String),

    #[error("shard {0} is unavailable")]
    ShardUnavailable(ShardId),

    #[error("sleep aborted")]
    SleepAborted,

    #[error("identity error: {0}")]
    IdentityError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegattaError {
    /// Whether the caller may retry or simply ignore the failure.
    ///
    /// A group can legitimately disappear (or not exist yet) while messages
    /// for it are in flight, so `GroupNotFound` is never a crash.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegattaError::GroupNotFound(_) | RegattaError::ShardUnavailable(_)
        )
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, RegattaError::InternalError(_))
    }
}

pub type Result<T> = std::result::Result<T, RegattaError>;

/// Report an invariant violation.
///
/// Logs the message together with a captured backtrace and returns the
/// internal-error variant for the caller to propagate.
pub fn on_internal_error(msg: impl Into<String>) -> RegattaError {
    let msg = msg.into();
    let backtrace = Backtrace::capture();
    tracing::error!(backtrace = %backtrace, "{}", msg);
    RegattaError::InternalError(msg)
}
