// Broadcaster - Fans snapshots out to connected observers
use crate::domain::snapshot::Snapshot;
use futures::stream::{Stream, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::BroadcastStream;

pub const DEFAULT_OBSERVER_QUEUE: usize = 16;

pub type ObserverId = u64;

struct Registry {
    next_id: ObserverId,
    current: Arc<Snapshot>,
    observers: HashMap<ObserverId, broadcast::Sender<Arc<Snapshot>>>,
}

impl Registry {
    /// Forgets observers whose subscription has been dropped.
    fn prune_closed(&mut self) {
        self.observers.retain(|id, tx| {
            let alive = tx.receiver_count() > 0;
            if !alive {
                tracing::debug!(observer = *id, "Observer dropped its subscription, removing");
            }
            alive
        });
    }
}

/// Keeps the set of connected observers and the last published snapshot.
///
/// Every observer owns a bounded queue; when it falls behind the oldest
/// queued snapshot is overwritten, so publishing never waits on a slow
/// observer. Registration and publishing are serialized by one lock, which
/// means a new observer sees the current snapshot exactly once and then
/// every later publish.
pub struct Broadcaster {
    registry: Mutex<Registry>,
    queue_capacity: usize,
}

impl Broadcaster {
    pub fn new(initial: Snapshot, queue_capacity: usize) -> Self {
        Self {
            registry: Mutex::new(Registry {
                next_id: 1,
                current: Arc::new(initial),
                observers: HashMap::new(),
            }),
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn register(&self) -> Subscription {
        let mut registry = self.lock();
        registry.prune_closed();
        let id = registry.next_id;
        registry.next_id += 1;

        let (tx, rx) = broadcast::channel(self.queue_capacity);
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(registry.current.clone());
        registry.observers.insert(id, tx);

        tracing::info!(observer = id, total = registry.observers.len(), "Observer registered");
        Subscription { id, rx }
    }

    /// Returns whether the observer was still registered.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut registry = self.lock();
        let removed = registry.observers.remove(&id).is_some();
        if removed {
            tracing::info!(observer = id, total = registry.observers.len(), "Observer unregistered");
        }
        removed
    }

    /// Delivers the snapshot to every registered observer and returns how
    /// many received it. Observers whose receiving side is gone are dropped.
    pub fn publish(&self, snapshot: Snapshot) -> usize {
        let snapshot = Arc::new(snapshot);
        let mut registry = self.lock();
        registry.current = snapshot.clone();

        registry.observers.retain(|id, tx| match tx.send(snapshot.clone()) {
            Ok(_) => true,
            Err(_) => {
                tracing::debug!(observer = *id, "Observer disconnected, removing");
                false
            }
        });
        registry.observers.len()
    }

    pub fn observer_count(&self) -> usize {
        let mut registry = self.lock();
        registry.prune_closed();
        registry.observers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receiving end of one observer.
pub struct Subscription {
    id: ObserverId,
    rx: broadcast::Receiver<Arc<Snapshot>>,
}

impl Subscription {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Waits for the next snapshot. Returns `None` once the observer has
    /// been unregistered and its queue is drained.
    pub async fn recv(&mut self) -> Option<Arc<Snapshot>> {
        loop {
            match self.rx.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(observer = self.id, skipped, "Observer lagging, dropped old snapshots");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    #[cfg(test)]
    pub fn try_recv(&mut self) -> Option<Arc<Snapshot>> {
        use tokio::sync::broadcast::error::TryRecvError;
        loop {
            match self.rx.try_recv() {
                Ok(snapshot) => return Some(snapshot),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(observer = self.id, skipped, "Observer lagging, dropped old snapshots");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Arc<Snapshot>> + Send + 'static {
        let id = self.id;
        BroadcastStream::new(self.rx).filter_map(move |item| async move {
            match item {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    tracing::debug!(observer = id, "Observer stream skipped snapshots: {}", err);
                    None
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::{Channel, Reading};
    use crate::domain::thresholds::ThresholdConfig;
    use chrono::Utc;

    fn snapshot(tds: f64) -> Snapshot {
        let mut snapshot = Snapshot::empty(ThresholdConfig::default());
        let reading = Reading::new(tds, Utc::now());
        snapshot.latest.insert(Channel::Tds, reading);
        snapshot.historical.insert(Channel::Tds, vec![reading]);
        snapshot
    }

    fn drain(subscription: &mut Subscription) -> Vec<Arc<Snapshot>> {
        std::iter::from_fn(|| subscription.try_recv()).collect()
    }

    #[test]
    fn test_register_receives_current_snapshot() {
        let broadcaster = Broadcaster::new(snapshot(1.0), DEFAULT_OBSERVER_QUEUE);
        let mut sub = broadcaster.register();

        let received = drain(&mut sub);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].latest_value(Channel::Tds), Some(1.0));
    }

    #[test]
    fn test_publish_delivers_once_to_each_observer() {
        let broadcaster = Broadcaster::new(Snapshot::empty(ThresholdConfig::default()), DEFAULT_OBSERVER_QUEUE);
        let mut subs: Vec<Subscription> = (0..3).map(|_| broadcaster.register()).collect();
        for sub in subs.iter_mut() {
            drain(sub);
        }

        assert_eq!(broadcaster.publish(snapshot(2.0)), 3);

        for sub in subs.iter_mut() {
            let received = drain(sub);
            assert_eq!(received.len(), 1);
            assert_eq!(received[0].latest_value(Channel::Tds), Some(2.0));
        }
    }

    #[test]
    fn test_unregister_is_idempotent_and_isolated() {
        let broadcaster = Broadcaster::new(Snapshot::empty(ThresholdConfig::default()), DEFAULT_OBSERVER_QUEUE);
        let mut first = broadcaster.register();
        let second = broadcaster.register();
        let mut third = broadcaster.register();
        drain(&mut first);
        drain(&mut third);

        assert!(broadcaster.unregister(second.id()));
        assert!(!broadcaster.unregister(second.id()));
        assert_eq!(broadcaster.publish(snapshot(3.0)), 2);

        assert_eq!(drain(&mut first).len(), 1);
        assert_eq!(drain(&mut third).len(), 1);
    }

    #[test]
    fn test_slow_observer_keeps_newest_snapshots() {
        let broadcaster = Broadcaster::new(Snapshot::empty(ThresholdConfig::default()), 2);
        let mut slow = broadcaster.register();
        let mut fast = broadcaster.register();

        for i in 1..=5 {
            broadcaster.publish(snapshot(i as f64));
            drain(&mut fast);
        }

        let values: Vec<Option<f64>> = drain(&mut slow)
            .iter()
            .map(|s| s.latest_value(Channel::Tds))
            .collect();
        assert_eq!(values, vec![Some(4.0), Some(5.0)]);
    }

    #[test]
    fn test_dropped_subscription_is_pruned_on_publish() {
        let broadcaster = Broadcaster::new(Snapshot::empty(ThresholdConfig::default()), DEFAULT_OBSERVER_QUEUE);
        let gone = broadcaster.register();
        let _kept = broadcaster.register();
        drop(gone);

        assert_eq!(broadcaster.publish(snapshot(1.0)), 1);
        assert_eq!(broadcaster.observer_count(), 1);
    }

    #[test]
    fn test_dropped_subscriptions_are_released_without_publish() {
        let broadcaster = Broadcaster::new(Snapshot::empty(ThresholdConfig::default()), DEFAULT_OBSERVER_QUEUE);
        for _ in 0..1000 {
            drop(broadcaster.register());
        }
        assert_eq!(broadcaster.observer_count(), 0);

        let _kept = broadcaster.register();
        assert_eq!(broadcaster.lock().observers.len(), 1);
        assert_eq!(broadcaster.observer_count(), 1);
    }

    #[test]
    fn test_unregister_during_publish_keeps_survivors_in_order() {
        const PUBLISHES: usize = 300;
        let broadcaster = Arc::new(Broadcaster::new(Snapshot::empty(ThresholdConfig::default()), 512));
        let mut first = broadcaster.register();
        let second = broadcaster.register();
        let mut third = broadcaster.register();
        let second_id = second.id();

        let publisher = {
            let broadcaster = broadcaster.clone();
            std::thread::spawn(move || {
                for i in 1..=PUBLISHES {
                    broadcaster.publish(snapshot(i as f64));
                }
            })
        };
        let unregisterer = {
            let broadcaster = broadcaster.clone();
            std::thread::spawn(move || {
                std::thread::yield_now();
                assert!(broadcaster.unregister(second_id));
            })
        };
        unregisterer.join().unwrap();
        publisher.join().unwrap();
        drop(second);

        let expected: Vec<f64> = (1..=PUBLISHES).map(|i| i as f64).collect();
        for sub in [&mut first, &mut third] {
            let received = drain(sub);
            // The snapshot current at registration comes first.
            assert!(received[0].latest.is_empty());
            let values: Vec<f64> = received[1..]
                .iter()
                .filter_map(|s| s.latest_value(Channel::Tds))
                .collect();
            assert_eq!(values, expected);
        }
        assert_eq!(broadcaster.observer_count(), 2);
    }

    #[test]
    fn test_concurrent_register_never_duplicates() {
        let broadcaster = Arc::new(Broadcaster::new(snapshot(0.0), 256));
        let publisher = {
            let broadcaster = broadcaster.clone();
            std::thread::spawn(move || {
                for i in 1..=100 {
                    broadcaster.publish(snapshot(i as f64));
                }
            })
        };
        let subscribers: Vec<Subscription> = (0..20).map(|_| broadcaster.register()).collect();
        publisher.join().unwrap();

        for mut sub in subscribers {
            let values: Vec<f64> = drain(&mut sub)
                .iter()
                .filter_map(|s| s.latest_value(Channel::Tds))
                .collect();
            assert!(!values.is_empty());
            assert!(values.windows(2).all(|w| w[0] < w[1]), "{values:?}");
            assert_eq!(values.last(), Some(&100.0));
        }
    }

    #[tokio::test]
    async fn test_recv_ends_after_unregister() {
        let broadcaster = Broadcaster::new(Snapshot::empty(ThresholdConfig::default()), DEFAULT_OBSERVER_QUEUE);
        let mut sub = broadcaster.register();

        assert!(sub.recv().await.is_some());
        broadcaster.unregister(sub.id());
        assert!(sub.recv().await.is_none());
    }
}
