//! Subscription registry implementation
//!
//! Per-camera sets of subscriber wake channels. The camera table is fixed at
//! construction; each camera's set sits behind its own mutex. Viewers insert
//! and remove themselves, the camera's Broadcaster sweeps the set with
//! non-blocking sends. The lock is never held across an await point.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::config::RegistryConfig;
use super::entry::{SubscriberState, Subscription};
use super::error::RegistryError;
use super::frame::CameraId;

/// Process-unique subscriber id
pub type SubscriberId = u64;

type SubscriberSet = Mutex<HashMap<SubscriberId, mpsc::Sender<()>>>;

/// Result of one wake sweep over a camera's subscribers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WakeOutcome {
    /// Tokens enqueued
    pub delivered: usize,
    /// Tokens dropped because the subscriber already had a full channel
    pub dropped: usize,
    /// Subscribers whose receiver is gone but which have not removed themselves yet
    pub closed: usize,
}

/// Registry of active subscribers for every configured camera
pub struct SubscriptionRegistry {
    cameras: HashMap<CameraId, SubscriberSet>,
    next_id: AtomicU64,
    config: RegistryConfig,
}

impl SubscriptionRegistry {
    /// Create a registry with default configuration
    pub fn new<I>(cameras: I) -> Self
    where
        I: IntoIterator<Item = CameraId>,
    {
        Self::with_config(cameras, RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config<I>(cameras: I, config: RegistryConfig) -> Self
    where
        I: IntoIterator<Item = CameraId>,
    {
        Self {
            cameras: cameras
                .into_iter()
                .map(|id| (id, Mutex::new(HashMap::new())))
                .collect(),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Check if the camera is known
    pub fn contains_camera(&self, camera: &str) -> bool {
        self.cameras.contains_key(camera)
    }

    /// Subscribe to a camera
    ///
    /// The new subscriber starts with one wake token already queued so it
    /// serves the cached frame without waiting for the next broadcast.
    pub fn subscribe(self: &Arc<Self>, camera: &str) -> Result<Subscription, RegistryError> {
        let (camera_id, set) = self
            .cameras
            .get_key_value(camera)
            .ok_or_else(|| RegistryError::UnknownCamera(CameraId::new(camera)))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.config.subscriber_capacity);
        // Fresh channel with capacity >= 1, cannot fail
        let _ = tx.try_send(());

        let mut subscription = Subscription::new(id, camera_id.clone(), rx, Arc::clone(self));

        let subscribers = {
            let mut set = lock(set);
            set.insert(id, tx);
            set.len()
        };
        subscription.transition(SubscriberState::Active);

        tracing::info!(
            camera = %camera_id,
            subscriber = id,
            subscribers = subscribers,
            "Subscriber added"
        );

        Ok(subscription)
    }

    /// Remove a subscriber
    ///
    /// Returns `false` if it was not present.
    pub(super) fn remove(&self, camera: &CameraId, id: SubscriberId) -> bool {
        let Some(set) = self.cameras.get(camera) else {
            return false;
        };

        let (removed, remaining) = {
            let mut set = lock(set);
            (set.remove(&id).is_some(), set.len())
        };

        if removed {
            tracing::info!(
                camera = %camera,
                subscriber = id,
                subscribers = remaining,
                "Subscriber removed"
            );
        }
        removed
    }

    /// Push one wake token to every subscriber of a camera
    ///
    /// Never blocks: a subscriber with a full channel already has a wake
    /// pending and will read the newest cached frame when it handles it, so
    /// the extra token is dropped.
    pub fn wake(&self, camera: &CameraId) -> WakeOutcome {
        let mut outcome = WakeOutcome::default();
        let Some(set) = self.cameras.get(camera) else {
            return outcome;
        };

        let set = lock(set);
        for tx in set.values() {
            match tx.try_send(()) {
                Ok(()) => outcome.delivered += 1,
                Err(TrySendError::Full(())) => outcome.dropped += 1,
                Err(TrySendError::Closed(())) => outcome.closed += 1,
            }
        }
        outcome
    }

    /// Number of subscribers for a camera (0 for unknown cameras)
    pub fn subscriber_count(&self, camera: &str) -> usize {
        self.cameras
            .get(camera)
            .map(|set| lock(set).len())
            .unwrap_or(0)
    }

    /// Check if a subscriber is registered
    pub fn is_registered(&self, camera: &str, id: SubscriberId) -> bool {
        self.cameras
            .get(camera)
            .map(|set| lock(set).contains_key(&id))
            .unwrap_or(false)
    }
}

fn lock(set: &SubscriberSet) -> MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<()>>> {
    // The map holds only senders; a panic elsewhere cannot leave it half-updated
    set.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    fn registry() -> Arc<SubscriptionRegistry> {
        Arc::new(SubscriptionRegistry::new([
            CameraId::from("cam1"),
            CameraId::from("cam2"),
        ]))
    }

    #[tokio::test]
    async fn test_subscribe_starts_with_pending_wake() {
        let registry = registry();
        let mut sub = registry.subscribe("cam1").unwrap();

        assert_eq!(sub.state(), SubscriberState::Active);
        assert!(sub.try_wait());
        assert!(!sub.try_wait());
        assert_eq!(registry.subscriber_count("cam1"), 1);
    }

    #[tokio::test]
    async fn test_unknown_camera_has_no_side_effects() {
        let registry = registry();

        let result = registry.subscribe("unknown");
        assert!(matches!(result, Err(RegistryError::UnknownCamera(_))));
        assert_eq!(registry.subscriber_count("cam1"), 0);
        assert_eq!(registry.subscriber_count("cam2"), 0);
    }

    #[tokio::test]
    async fn test_wake_reaches_subscriber() {
        let registry = registry();
        let mut sub = registry.subscribe("cam1").unwrap();
        assert!(sub.try_wait());

        let mut wait = task::spawn(sub.wait());
        assert_pending!(wait.poll());

        let outcome = registry.wake(&CameraId::from("cam1"));
        assert_eq!(outcome.delivered, 1);
        assert!(wait.is_woken());
        assert!(assert_ready!(wait.poll()));
    }

    #[tokio::test]
    async fn test_unsubscribe_and_drop() {
        let registry = registry();
        let mut a = registry.subscribe("cam1").unwrap();
        let b = registry.subscribe("cam1").unwrap();
        assert_eq!(registry.subscriber_count("cam1"), 2);

        a.unsubscribe();
        assert_eq!(a.state(), SubscriberState::Removed);
        assert!(!registry.is_registered("cam1", a.id()));

        // Second stop is a no-op
        a.unsubscribe();
        assert_eq!(a.state(), SubscriberState::Removed);

        let b_id = b.id();
        drop(b);
        assert!(!registry.is_registered("cam1", b_id));
        assert_eq!(registry.subscriber_count("cam1"), 0);
    }

    #[tokio::test]
    async fn test_removed_subscriber_stops_waiting() {
        let registry = registry();
        let mut sub = registry.subscribe("cam1").unwrap();
        sub.unsubscribe();

        assert!(!sub.wait().await);
        assert!(!sub.try_wait());
    }

    #[tokio::test]
    async fn test_full_channel_drops_wake_without_blocking() {
        let config = RegistryConfig::default().subscriber_capacity(2);
        let registry = Arc::new(SubscriptionRegistry::with_config(
            [CameraId::from("cam1")],
            config,
        ));
        let mut slow = registry.subscribe("cam1").unwrap();
        let cam = CameraId::from("cam1");

        // Initial token + one wake fill the channel; the rest must be dropped
        let sweep = async {
            let mut dropped = 0;
            for _ in 0..10_000 {
                dropped += registry.wake(&cam).dropped;
            }
            dropped
        };
        let dropped = tokio::time::timeout(Duration::from_secs(1), sweep)
            .await
            .expect("wake blocked on a slow subscriber");
        assert_eq!(dropped, 9_999);

        assert!(slow.try_wait());
        assert!(slow.try_wait());
        assert!(!slow.try_wait());
    }

    #[tokio::test]
    async fn test_wake_is_per_camera() {
        let registry = registry();
        let mut one = registry.subscribe("cam1").unwrap();
        let mut two = registry.subscribe("cam2").unwrap();
        assert!(one.try_wait());
        assert!(two.try_wait());

        registry.wake(&CameraId::from("cam1"));

        assert!(one.try_wait());
        assert!(!two.try_wait());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_subscribe_unsubscribe_during_wake() {
        let registry = registry();
        let cam1 = CameraId::from("cam1");

        // Long-lived subscribers that must never be lost
        let mut stable: Vec<_> = (0..8).map(|_| registry.subscribe("cam1").unwrap()).collect();
        let mut bystander = registry.subscribe("cam2").unwrap();
        assert!(bystander.try_wait());

        let waker = {
            let registry = Arc::clone(&registry);
            let cam1 = cam1.clone();
            tokio::spawn(async move {
                for _ in 0..2_000 {
                    registry.wake(&cam1);
                    tokio::task::yield_now().await;
                }
            })
        };

        let churners: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let mut removed = Vec::new();
                    for i in 0..200 {
                        let mut sub = registry.subscribe("cam1").unwrap();
                        if i % 2 == 0 {
                            sub.unsubscribe();
                            removed.push(sub.id());
                        } else {
                            let id = sub.id();
                            drop(sub);
                            removed.push(id);
                        }
                        tokio::task::yield_now().await;
                    }
                    removed
                })
            })
            .collect();

        waker.await.unwrap();
        for churner in churners {
            for id in churner.await.unwrap() {
                assert!(!registry.is_registered("cam1", id));
            }
        }

        // Only the stable subscribers remain, and each is still reachable
        assert_eq!(registry.subscriber_count("cam1"), stable.len());
        for sub in &mut stable {
            while sub.try_wait() {}
        }
        let outcome = registry.wake(&cam1);
        assert_eq!(outcome.delivered, stable.len());
        for sub in &mut stable {
            assert!(registry.is_registered("cam1", sub.id()));
            assert!(sub.try_wait());
        }

        // cam1 wakes never leaked into cam2
        assert!(!bystander.try_wait());
    }
}
