//! Sharded execution container
//!
//! One service instance per shard. Each shard drains its own task queue on a
//! single tokio task, so work submitted to a shard never runs in parallel
//! with other work on that shard. Tasks on one shard still interleave at
//! await points. Reaching another shard's instance always goes through an
//! explicit asynchronous hop ([`ShardRouter::invoke_on`]).

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, try_join_all};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use regatta_common::{RegattaError, Result, ShardId};

type ShardTask<S> = Box<dyn FnOnce(Arc<S>) -> BoxFuture<'static, ()> + Send>;

/// Handle used to submit work to any shard
pub struct ShardRouter<S> {
    senders: Arc<Vec<mpsc::UnboundedSender<ShardTask<S>>>>,
}

impl<S> Clone for ShardRouter<S> {
    fn clone(&self) -> Self {
        Self {
            senders: Arc::clone(&self.senders),
        }
    }
}

impl<S: Send + Sync + 'static> ShardRouter<S> {
    pub fn shard_count(&self) -> usize {
        self.senders.len()
    }

    /// Run `f` against the instance owned by `shard` and return its output
    pub async fn invoke_on<F, Fut, T>(&self, shard: ShardId, f: F) -> Result<T>
    where
        F: FnOnce(Arc<S>) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self
            .senders
            .get(shard)
            .ok_or(RegattaError::ShardUnavailable(shard))?;

        let (tx, rx) = oneshot::channel();
        let task: ShardTask<S> = Box::new(move |instance| {
            Box::pin(async move {
                let _ = tx.send(f(instance).await);
            })
        });

        sender
            .send(task)
            .map_err(|_| RegattaError::ShardUnavailable(shard))?;
        rx.await.map_err(|_| RegattaError::ShardUnavailable(shard))
    }

    /// Run `f` on every shard concurrently, outputs in shard order
    pub async fn invoke_on_all<F, Fut, T>(&self, f: F) -> Result<Vec<T>>
    where
        F: Fn(Arc<S>) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        try_join_all((0..self.shard_count()).map(|shard| self.invoke_on(shard, f.clone()))).await
    }
}

/// Owns one instance of `S` per shard together with the shard workers
pub struct Sharded<S> {
    router: ShardRouter<S>,
    instances: Vec<Arc<S>>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl<S: Send + Sync + 'static> Sharded<S> {
    /// Build `count` instances and start their workers
    ///
    /// `make` receives the shard id and a router, so instances can hop to
    /// their peers.
    pub fn start(count: usize, mut make: impl FnMut(ShardId, ShardRouter<S>) -> S) -> Self {
        let mut senders = Vec::with_capacity(count);
        let mut receivers = Vec::with_capacity(count);
        for _ in 0..count {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push(tx);
            receivers.push(rx);
        }
        let router = ShardRouter {
            senders: Arc::new(senders),
        };

        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let mut instances = Vec::with_capacity(count);
        for (shard, rx) in receivers.into_iter().enumerate() {
            let instance = Arc::new(make(shard, router.clone()));
            instances.push(Arc::clone(&instance));
            tracker.spawn(run_shard(shard, instance, rx, cancel.child_token()));
        }
        tracker.close();

        info!(shards = count, "Started shard workers");
        Self {
            router,
            instances,
            cancel,
            tracker,
        }
    }

    pub fn router(&self) -> ShardRouter<S> {
        self.router.clone()
    }

    /// Direct handle to one shard's instance, bypassing its queue
    pub fn instance(&self, shard: ShardId) -> Option<Arc<S>> {
        self.instances.get(shard).cloned()
    }

    pub fn shard_count(&self) -> usize {
        self.instances.len()
    }

    pub async fn invoke_on<F, Fut, T>(&self, shard: ShardId, f: F) -> Result<T>
    where
        F: FnOnce(Arc<S>) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.router.invoke_on(shard, f).await
    }

    pub async fn invoke_on_all<F, Fut, T>(&self, f: F) -> Result<Vec<T>>
    where
        F: Fn(Arc<S>) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.router.invoke_on_all(f).await
    }

    /// Stop every shard worker; queued and in-flight tasks are dropped
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.tracker.wait().await;
        info!("Stopped shard workers");
    }
}

async fn run_shard<S: Send + Sync + 'static>(
    shard: ShardId,
    instance: Arc<S>,
    mut rx: mpsc::UnboundedReceiver<ShardTask<S>>,
    cancel: CancellationToken,
) {
    let mut in_flight = FuturesUnordered::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            task = rx.recv() => match task {
                Some(task) => in_flight.push(task(Arc::clone(&instance))),
                None => break,
            },
            Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
        }
    }
    debug!(shard, pending = in_flight.len(), "Shard worker exiting");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Counter {
        shard: ShardId,
        hits: AtomicUsize,
        router: ShardRouter<Counter>,
    }

    fn counters(count: usize) -> Sharded<Counter> {
        Sharded::start(count, |shard, router| Counter {
            shard,
            hits: AtomicUsize::new(0),
            router,
        })
    }

    #[tokio::test]
    async fn test_invoke_on_runs_on_target_shard() {
        let sharded = counters(3);

        let shard = sharded
            .invoke_on(2, |c| async move {
                c.hits.fetch_add(1, Ordering::SeqCst);
                c.shard
            })
            .await
            .unwrap();

        assert_eq!(shard, 2);
        assert_eq!(sharded.instance(2).unwrap().hits.load(Ordering::SeqCst), 1);
        assert_eq!(sharded.instance(0).unwrap().hits.load(Ordering::SeqCst), 0);
        sharded.stop().await;
    }

    #[tokio::test]
    async fn test_invoke_on_all_in_shard_order() {
        let sharded = counters(4);
        let shards = sharded
            .invoke_on_all(|c| async move { c.shard })
            .await
            .unwrap();
        assert_eq!(shards, vec![0, 1, 2, 3]);
        sharded.stop().await;
    }

    #[tokio::test]
    async fn test_hop_between_shards() {
        let sharded = counters(2);

        // Shard 1 forwards to shard 0 through its own router
        let seen = sharded
            .invoke_on(1, |c| async move {
                c.router
                    .invoke_on(0, |peer| async move { peer.shard })
                    .await
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen, 0);
        sharded.stop().await;
    }

    #[tokio::test]
    async fn test_unknown_shard() {
        let sharded = counters(1);
        let err = sharded
            .invoke_on(5, |c| async move { c.shard })
            .await
            .unwrap_err();
        assert!(matches!(err, RegattaError::ShardUnavailable(5)));
        sharded.stop().await;
    }

    #[tokio::test]
    async fn test_invoke_after_stop_fails() {
        let sharded = counters(1);
        sharded.stop().await;

        let result = sharded.invoke_on(0, |c| async move { c.shard }).await;
        assert!(matches!(result, Err(RegattaError::ShardUnavailable(0))));
    }
}
