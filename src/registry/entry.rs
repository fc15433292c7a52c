//! Subscriber lifecycle
//!
//! A [`Subscription`] is the viewer-side half of a registry entry: the
//! receiving end of its wake channel plus its lifecycle state. Dropping it
//! removes the entry, so no subscriber outlives the connection that owns it.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::frame::CameraId;
use super::store::{SubscriberId, SubscriptionRegistry};

/// Lifecycle state of a subscriber
///
/// `Idle → Active → Draining → Removed`. `Removed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Allocated, not yet in the camera's set
    Idle,
    /// In the set, receiving wakes
    Active,
    /// Stop requested or send failed, removal in progress
    Draining,
    /// Gone from the set
    Removed,
}

impl SubscriberState {
    /// Check if moving to `next` is a legal transition
    pub fn can_transition_to(self, next: SubscriberState) -> bool {
        matches!(
            (self, next),
            (SubscriberState::Idle, SubscriberState::Active)
                | (SubscriberState::Active, SubscriberState::Draining)
                | (SubscriberState::Draining, SubscriberState::Removed)
        )
    }
}

/// A viewer's registration with one camera
pub struct Subscription {
    id: SubscriberId,
    camera: CameraId,
    wake_rx: mpsc::Receiver<()>,
    state: SubscriberState,
    registry: Arc<SubscriptionRegistry>,
}

impl Subscription {
    pub(super) fn new(
        id: SubscriberId,
        camera: CameraId,
        wake_rx: mpsc::Receiver<()>,
        registry: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            id,
            camera,
            wake_rx,
            state: SubscriberState::Idle,
            registry,
        }
    }

    /// Registry-assigned id
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Camera this subscription belongs to
    pub fn camera(&self) -> &CameraId {
        &self.camera
    }

    /// Current lifecycle state
    pub fn state(&self) -> SubscriberState {
        self.state
    }

    pub(super) fn transition(&mut self, next: SubscriberState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            tracing::debug!(
                camera = %self.camera,
                subscriber = self.id,
                from = ?self.state,
                to = ?next,
                "Ignoring illegal subscriber transition"
            );
            false
        }
    }

    /// Wait for the next wake token
    ///
    /// Returns `false` once the subscription is no longer active.
    pub async fn wait(&mut self) -> bool {
        if self.state != SubscriberState::Active {
            return false;
        }
        self.wake_rx.recv().await.is_some()
    }

    /// Take a pending wake token without waiting
    pub fn try_wait(&mut self) -> bool {
        self.state == SubscriberState::Active && self.wake_rx.try_recv().is_ok()
    }

    /// Leave the camera's set
    ///
    /// Safe to call more than once; a subscriber that is already gone is
    /// left alone.
    pub fn unsubscribe(&mut self) {
        if !self.transition(SubscriberState::Draining) {
            return;
        }
        self.wake_rx.close();
        if !self.registry.remove(&self.camera, self.id) {
            tracing::debug!(
                camera = %self.camera,
                subscriber = self.id,
                "Subscriber already removed"
            );
        }
        self.transition(SubscriberState::Removed);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("camera", &self.camera)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        use SubscriberState::*;

        assert!(Idle.can_transition_to(Active));
        assert!(Active.can_transition_to(Draining));
        assert!(Draining.can_transition_to(Removed));
    }

    #[test]
    fn test_illegal_transitions() {
        use SubscriberState::*;

        assert!(!Idle.can_transition_to(Draining));
        assert!(!Active.can_transition_to(Removed));
        assert!(!Removed.can_transition_to(Active));
        assert!(!Removed.can_transition_to(Draining));
        assert!(!Active.can_transition_to(Active));
    }
}
