// Record of one running Raft group
// Owns the engine, its RPC shim, its tick driver and its shutdown handle

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};
use tokio_util::task::TaskTracker;

use regatta_common::{GroupId, Result, on_internal_error};

use super::server::{RaftRpc, RaftServer};

/// Periodic driver calling `tick()` on an engine
///
/// Stops when cancelled or dropped.
pub struct Ticker {
    server: Arc<dyn RaftServer>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn new(server: Arc<dyn RaftServer>) -> Self {
        Self {
            server,
            handle: None,
        }
    }

    /// Start ticking every `period` on `tasks`, first tick one period from now
    pub fn arm_periodic(&mut self, period: Duration, tasks: &TaskTracker) -> Result<()> {
        if period.is_zero() {
            return Err(on_internal_error("ticker period must be positive"));
        }
        if self.handle.is_some() {
            return Err(on_internal_error("ticker is already armed"));
        }

        let server = Arc::clone(&self.server);
        self.handle = Some(tasks.spawn(async move {
            let mut ticks = interval_at(tokio::time::Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                server.tick();
            }
        }));
        Ok(())
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub struct GroupEntry {
    pub gid: GroupId,
    pub server: Arc<dyn RaftServer>,
    pub rpc: Arc<dyn RaftRpc>,
    pub(crate) ticker: Ticker,
    /// Present once shutdown has been initiated
    pub(crate) aborted: Option<JoinHandle<()>>,
}

impl GroupEntry {
    pub fn new(gid: GroupId, server: Arc<dyn RaftServer>, rpc: Arc<dyn RaftRpc>) -> Self {
        let ticker = Ticker::new(Arc::clone(&server));
        Self {
            gid,
            server,
            rpc,
            ticker,
            aborted: None,
        }
    }

    pub fn is_aborting(&self) -> bool {
        self.aborted.is_some()
    }
}

impl std::fmt::Debug for GroupEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupEntry")
            .field("gid", &self.gid)
            .field("ticking", &self.ticker.is_armed())
            .field("aborting", &self.is_aborting())
            .finish()
    }
}
