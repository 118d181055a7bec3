//! Direct failure detector
//!
//! Periodically pings a set of replicas and pushes liveness transitions to
//! registered listeners. The detector itself knows nothing about addresses or
//! wall time; both come in through the [`Pinger`] and [`Clock`] capabilities.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use regatta_common::{RegattaError, ReplicaId, Result, on_internal_error};

/// Monotonic time in nanoseconds
pub type Timepoint = i64;

/// Probes a single replica
#[async_trait]
pub trait Pinger: Send + Sync {
    /// Returns `Ok(false)` when the replica is known to be unreachable
    async fn ping(&self, id: ReplicaId, cancel: &CancellationToken) -> Result<bool>;
}

/// Time source for the probe loop
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Timepoint;

    /// Sleep until `deadline`; fails with `SleepAborted` when cancelled first
    async fn sleep_until(&self, deadline: Timepoint, cancel: &CancellationToken) -> Result<()>;
}

/// Receives liveness transitions
#[async_trait]
pub trait Listener: Send + Sync {
    async fn mark_alive(&self, id: ReplicaId);
    async fn mark_dead(&self, id: ReplicaId);
}

pub struct DirectFailureDetector {
    pinger: Arc<dyn Pinger>,
    clock: Arc<dyn Clock>,
    endpoints: RwLock<HashSet<ReplicaId>>,
    listeners: Mutex<HashMap<u64, CancellationToken>>,
    next_listener_id: AtomicU64,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl DirectFailureDetector {
    pub fn new(pinger: Arc<dyn Pinger>, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            pinger,
            clock,
            endpoints: RwLock::new(HashSet::new()),
            listeners: Mutex::new(HashMap::new()),
            next_listener_id: AtomicU64::new(1),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Start probing a replica
    pub fn add_endpoint(&self, id: ReplicaId) {
        if self.endpoints.write().insert(id) {
            debug!(replica = %id, "Added failure detector endpoint");
        }
    }

    /// Stop probing a replica; listeners that saw it alive get `mark_dead`
    pub fn remove_endpoint(&self, id: ReplicaId) {
        if self.endpoints.write().remove(&id) {
            debug!(replica = %id, "Removed failure detector endpoint");
        }
    }

    pub fn endpoints(&self) -> Vec<ReplicaId> {
        self.endpoints.read().iter().copied().collect()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Register a listener probed every `interval`
    ///
    /// The listener stays registered until the returned subscription is dropped.
    pub fn register_listener(
        self: &Arc<Self>,
        listener: Arc<dyn Listener>,
        interval: Duration,
    ) -> Result<ListenerSubscription> {
        if interval.is_zero() {
            return Err(RegattaError::ConfigError(
                "failure detector interval must be positive".to_string(),
            ));
        }
        if self.shutdown.is_cancelled() {
            return Err(on_internal_error(
                "register_listener(): failure detector is stopped",
            ));
        }

        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let token = self.shutdown.child_token();
        self.listeners.lock().insert(id, token.clone());

        let detector = Arc::clone(self);
        let loop_token = token.clone();
        self.tracker.spawn(async move {
            detector.probe_loop(listener, interval, loop_token).await;
        });

        info!(
            listener = id,
            interval_ms = interval.as_millis() as u64,
            "Registered failure detector listener"
        );

        Ok(ListenerSubscription {
            id,
            token,
            detector: Arc::downgrade(self),
        })
    }

    async fn probe_loop(
        &self,
        listener: Arc<dyn Listener>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        let interval_ns = i64::try_from(interval.as_nanos()).unwrap_or(i64::MAX);
        // Replicas this listener was last told are alive
        let mut alive: HashSet<ReplicaId> = HashSet::new();

        loop {
            let round_start = self.clock.now();
            let targets = self.endpoints();

            let probes = join_all(targets.iter().map(|id| {
                let cancel = &cancel;
                async move { (*id, self.pinger.ping(*id, cancel).await) }
            }));
            let results = tokio::select! {
                _ = cancel.cancelled() => break,
                results = probes => results,
            };

            for (id, result) in results {
                let is_alive = match result {
                    Ok(is_alive) => is_alive,
                    Err(e) => {
                        warn!(replica = %id, error = %e, "Ping failed");
                        false
                    }
                };
                if is_alive && alive.insert(id) {
                    listener.mark_alive(id).await;
                } else if !is_alive && alive.remove(&id) {
                    listener.mark_dead(id).await;
                }
            }

            let removed: Vec<ReplicaId> = alive
                .iter()
                .filter(|id| !targets.contains(id))
                .copied()
                .collect();
            for id in removed {
                alive.remove(&id);
                listener.mark_dead(id).await;
            }

            let deadline = round_start.saturating_add(interval_ns);
            if self.clock.sleep_until(deadline, &cancel).await.is_err() {
                break;
            }
        }
    }

    fn remove_listener(&self, id: u64) {
        if let Some(token) = self.listeners.lock().remove(&id) {
            token.cancel();
            debug!(listener = id, "Unregistered failure detector listener");
        }
    }

    /// Cancel every probe loop and wait for them to exit
    pub async fn stop(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        self.listeners.lock().clear();
        info!("Failure detector stopped");
    }
}

/// Keeps a listener registered; dropping it unsubscribes
pub struct ListenerSubscription {
    id: u64,
    token: CancellationToken,
    detector: Weak<DirectFailureDetector>,
}

impl ListenerSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for ListenerSubscription {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(detector) = self.detector.upgrade() {
            detector.remove_listener(self.id);
        }
    }
}

impl std::fmt::Debug for ListenerSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSubscription")
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    struct ScriptedPinger {
        alive: RwLock<HashSet<ReplicaId>>,
    }

    #[async_trait]
    impl Pinger for ScriptedPinger {
        async fn ping(&self, id: ReplicaId, _cancel: &CancellationToken) -> Result<bool> {
            Ok(self.alive.read().contains(&id))
        }
    }

    struct TokioClock {
        base: Instant,
    }

    #[async_trait]
    impl Clock for TokioClock {
        fn now(&self) -> Timepoint {
            self.base.elapsed().as_nanos() as i64
        }

        async fn sleep_until(&self, deadline: Timepoint, cancel: &CancellationToken) -> Result<()> {
            let at = self.base + Duration::from_nanos(deadline.max(0) as u64);
            tokio::select! {
                _ = cancel.cancelled() => Err(RegattaError::SleepAborted),
                _ = tokio::time::sleep_until(at) => Ok(()),
            }
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<(ReplicaId, bool)>>,
    }

    #[async_trait]
    impl Listener for RecordingListener {
        async fn mark_alive(&self, id: ReplicaId) {
            self.events.lock().push((id, true));
        }

        async fn mark_dead(&self, id: ReplicaId) {
            self.events.lock().push((id, false));
        }
    }

    fn detector(pinger: Arc<ScriptedPinger>) -> Arc<DirectFailureDetector> {
        DirectFailureDetector::new(
            pinger,
            Arc::new(TokioClock {
                base: Instant::now(),
            }),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_transitions_are_reported_once() {
        let a = ReplicaId::create_random_id();
        let pinger = Arc::new(ScriptedPinger {
            alive: RwLock::new(HashSet::from([a])),
        });
        let fd = detector(pinger.clone());
        fd.add_endpoint(a);

        let listener = Arc::new(RecordingListener::default());
        let _sub = fd
            .register_listener(listener.clone(), Duration::from_millis(100))
            .unwrap();

        // Several rounds with the replica up: a single alive notification
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(listener.events.lock().clone(), vec![(a, true)]);

        pinger.alive.write().clear();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(listener.events.lock().clone(), vec![(a, true), (a, false)]);

        fd.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_endpoint_is_reported_dead() {
        let a = ReplicaId::create_random_id();
        let pinger = Arc::new(ScriptedPinger {
            alive: RwLock::new(HashSet::from([a])),
        });
        let fd = detector(pinger);
        fd.add_endpoint(a);

        let listener = Arc::new(RecordingListener::default());
        let _sub = fd
            .register_listener(listener.clone(), Duration::from_millis(100))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        fd.remove_endpoint(a);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(listener.events.lock().clone(), vec![(a, true), (a, false)]);

        fd.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_subscription_unregisters() {
        let pinger = Arc::new(ScriptedPinger {
            alive: RwLock::new(HashSet::new()),
        });
        let fd = detector(pinger);
        let sub = fd
            .register_listener(
                Arc::new(RecordingListener::default()),
                Duration::from_secs(1),
            )
            .unwrap();
        assert_eq!(fd.listener_count(), 1);

        drop(sub);
        assert_eq!(fd.listener_count(), 0);
        fd.stop().await;
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let pinger = Arc::new(ScriptedPinger {
            alive: RwLock::new(HashSet::new()),
        });
        let fd = detector(pinger);
        let result = fd.register_listener(Arc::new(RecordingListener::default()), Duration::ZERO);
        assert!(matches!(result, Err(RegattaError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_register_after_stop_fails() {
        let pinger = Arc::new(ScriptedPinger {
            alive: RwLock::new(HashSet::new()),
        });
        let fd = detector(pinger);
        fd.stop().await;

        let result = fd.register_listener(
            Arc::new(RecordingListener::default()),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(RegattaError::InternalError(_))));
    }
}
