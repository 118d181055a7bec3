// Liveness plumbing between the direct failure detector and the engine
// LivenessGateway receives pushed transitions and answers point-in-time queries;
// DirectFdPinger and DirectFdClock adapt address lookup and time for the prober

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use regatta_common::{COORDINATOR_SHARD, RegattaError, ReplicaId, Result, ShardId};
use regatta_core::{Clock, EchoPinger, Listener, Pinger, Timepoint};

use super::address_map::AddressDirectory;
use super::server::FailureDetector;

/// Set of replicas currently believed alive
pub struct LivenessGateway {
    shard: ShardId,
    alive: RwLock<HashSet<ReplicaId>>,
}

impl LivenessGateway {
    pub fn new(shard: ShardId) -> Self {
        Self {
            shard,
            alive: RwLock::new(HashSet::new()),
        }
    }

    pub fn on_alive(&self, id: ReplicaId) {
        if self.alive.write().insert(id) {
            if self.shard == COORDINATOR_SHARD {
                info!(replica_id = %id, "Marking raft server as alive");
            } else {
                debug!(replica_id = %id, shard = self.shard, "Marking raft server as alive");
            }
        }
    }

    pub fn on_dead(&self, id: ReplicaId) {
        if self.alive.write().remove(&id) {
            if self.shard == COORDINATOR_SHARD {
                info!(replica_id = %id, "Marking raft server as dead");
            } else {
                debug!(replica_id = %id, shard = self.shard, "Marking raft server as dead");
            }
        }
    }

    pub fn alive_count(&self) -> usize {
        self.alive.read().len()
    }
}

impl FailureDetector for LivenessGateway {
    fn is_alive(&self, id: ReplicaId) -> bool {
        self.alive.read().contains(&id)
    }
}

#[async_trait]
impl Listener for LivenessGateway {
    async fn mark_alive(&self, id: ReplicaId) {
        self.on_alive(id);
    }

    async fn mark_dead(&self, id: ReplicaId) {
        self.on_dead(id);
    }
}

/// Resolves replica ids to addresses before sending an echo probe
pub struct DirectFdPinger {
    directory: Arc<AddressDirectory>,
    echo: Arc<dyn EchoPinger>,
}

impl DirectFdPinger {
    pub fn new(directory: Arc<AddressDirectory>, echo: Arc<dyn EchoPinger>) -> Self {
        Self { directory, echo }
    }
}

#[async_trait]
impl Pinger for DirectFdPinger {
    async fn ping(&self, id: ReplicaId, cancel: &CancellationToken) -> Result<bool> {
        let Some(addr) = self.directory.find(&id) else {
            // Can't probe what we can't address
            return Ok(false);
        };
        match self.echo.ping(addr, cancel).await {
            Ok(()) => Ok(true),
            Err(RegattaError::ConnectionClosed(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Monotonic clock measured from process-local start
pub struct DirectFdClock {
    base: Instant,
}

impl Default for DirectFdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectFdClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
        }
    }
}

#[async_trait]
impl Clock for DirectFdClock {
    fn now(&self) -> Timepoint {
        i64::try_from(self.base.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }

    async fn sleep_until(&self, deadline: Timepoint, cancel: &CancellationToken) -> Result<()> {
        let now = self.now();
        if deadline <= now {
            return Ok(());
        }
        let remaining = std::time::Duration::from_nanos((deadline - now) as u64);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RegattaError::SleepAborted),
            _ = tokio::time::sleep(remaining) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_liveness_transitions() {
        let gateway = LivenessGateway::new(COORDINATOR_SHARD);
        let id = ReplicaId::create_random_id();

        assert!(!gateway.is_alive(id));
        gateway.on_alive(id);
        assert!(gateway.is_alive(id));
        gateway.on_alive(id);
        assert_eq!(gateway.alive_count(), 1);

        gateway.on_dead(id);
        assert!(!gateway.is_alive(id));
        gateway.on_dead(id);
        assert!(!gateway.is_alive(id));
    }

    #[tokio::test]
    async fn test_listener_role_feeds_query_role() {
        let gateway = Arc::new(LivenessGateway::new(1));
        let id = ReplicaId::create_random_id();

        let listener: Arc<dyn Listener> = gateway.clone();
        let detector: Arc<dyn FailureDetector> = gateway.clone();

        listener.mark_alive(id).await;
        assert!(detector.is_alive(id));
        listener.mark_dead(id).await;
        assert!(!detector.is_alive(id));
    }

    struct FixedEcho {
        outcome: fn() -> Result<()>,
    }

    #[async_trait]
    impl EchoPinger for FixedEcho {
        async fn ping(&self, _addr: IpAddr, _cancel: &CancellationToken) -> Result<()> {
            (self.outcome)()
        }
    }

    fn pinger(outcome: fn() -> Result<()>) -> (DirectFdPinger, Arc<AddressDirectory>) {
        let directory = Arc::new(AddressDirectory::new());
        let pinger = DirectFdPinger::new(directory.clone(), Arc::new(FixedEcho { outcome }));
        (pinger, directory)
    }

    #[tokio::test]
    async fn test_ping_unresolved_is_not_alive() {
        let (pinger, _) = pinger(|| Ok(()));
        let alive = pinger
            .ping(ReplicaId::create_random_id(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(!alive);
    }

    #[tokio::test]
    async fn test_ping_outcomes() {
        let id = ReplicaId::create_random_id();
        let cancel = CancellationToken::new();

        let (ok, dir) = pinger(|| Ok(()));
        dir.add_or_update_entry(id, "10.0.0.1".parse().unwrap());
        assert!(ok.ping(id, &cancel).await.unwrap());

        let (closed, dir) = pinger(|| Err(RegattaError::ConnectionClosed("reset".into())));
        dir.add_or_update_entry(id, "10.0.0.1".parse().unwrap());
        assert!(!closed.ping(id, &cancel).await.unwrap());

        let (broken, dir) = pinger(|| Err(RegattaError::TransportError("no route".into())));
        dir.add_or_update_entry(id, "10.0.0.1".parse().unwrap());
        assert!(matches!(
            broken.ping(id, &cancel).await,
            Err(RegattaError::TransportError(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_past_deadline_returns_immediately() {
        let clock = DirectFdClock::new();
        tokio::time::advance(Duration::from_millis(10)).await;

        // Already cancelled, but the deadline has passed
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(clock.sleep_until(0, &cancel).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_cancelled() {
        let clock = DirectFdClock::new();
        let cancel = CancellationToken::new();
        let deadline = clock.now() + Duration::from_secs(60).as_nanos() as i64;

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.cancel();
        });

        let result = clock.sleep_until(deadline, &cancel).await;
        assert!(matches!(result, Err(RegattaError::SleepAborted)));
        assert!(clock.now() < deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_deadline() {
        let clock = DirectFdClock::new();
        let deadline = clock.now() + Duration::from_millis(50).as_nanos() as i64;

        clock
            .sleep_until(deadline, &CancellationToken::new())
            .await
            .unwrap();
        assert!(clock.now() >= deadline);
    }
}
