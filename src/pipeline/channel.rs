//! Freshness channel
//!
//! Bounded conduit from a camera's FrameSource to its Broadcaster. A push
//! waits while the channel is full; nothing is dropped here. Freshness is
//! restored downstream, where subscribers skip to the newest cached frame.

use tokio::sync::mpsc;

use crate::registry::RawFrame;

/// Default number of raw frames in flight per camera
pub const DEFAULT_FRESHNESS_CAPACITY: usize = 1;

/// Create a channel holding at most `capacity` frames (minimum 1)
pub fn freshness_channel(capacity: usize) -> (FramePublisher, FrameDrain) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (FramePublisher { tx }, FrameDrain { rx })
}

/// Producer half, owned by the FrameSource
#[derive(Debug)]
pub struct FramePublisher {
    tx: mpsc::Sender<RawFrame>,
}

impl FramePublisher {
    /// Push a frame, waiting for room
    ///
    /// Returns the frame back if the drain side is gone.
    pub async fn push(&self, frame: RawFrame) -> Result<(), RawFrame> {
        self.tx.send(frame).await.map_err(|e| e.0)
    }

    /// Check if the drain side is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half, owned by the Broadcaster
#[derive(Debug)]
pub struct FrameDrain {
    rx: mpsc::Receiver<RawFrame>,
}

impl FrameDrain {
    /// Wait for the next frame; `None` once the publisher is gone and the channel is empty
    pub async fn next(&mut self) -> Option<RawFrame> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;
    use crate::registry::CameraId;

    fn raw(sequence: u64) -> RawFrame {
        RawFrame::new(CameraId::from("cam"), sequence, 1, 1, Bytes::from_static(&[0, 0, 0]))
    }

    #[tokio::test]
    async fn test_push_waits_when_full() {
        let (publisher, mut drain) = freshness_channel(1);

        publisher.push(raw(1)).await.unwrap();

        let mut second = task::spawn(publisher.push(raw(2)));
        assert_pending!(second.poll());

        assert_eq!(drain.next().await.unwrap().sequence, 1);
        assert!(second.is_woken());
        assert!(assert_ready!(second.poll()).is_ok());
        drop(second);

        assert_eq!(drain.next().await.unwrap().sequence, 2);
    }

    #[tokio::test]
    async fn test_zero_capacity_is_clamped() {
        let (publisher, mut drain) = freshness_channel(0);

        publisher.push(raw(7)).await.unwrap();
        assert_eq!(drain.next().await.unwrap().sequence, 7);
    }

    #[tokio::test]
    async fn test_order_preserved() {
        let (publisher, mut drain) = freshness_channel(4);

        for seq in 0..4 {
            publisher.push(raw(seq)).await.unwrap();
        }
        for seq in 0..4 {
            assert_eq!(drain.next().await.unwrap().sequence, seq);
        }
    }

    #[tokio::test]
    async fn test_closed_drain_returns_frame() {
        let (publisher, drain) = freshness_channel(1);
        drop(drain);

        assert!(publisher.is_closed());
        let rejected = publisher.push(raw(3)).await.unwrap_err();
        assert_eq!(rejected.sequence, 3);
    }

    #[tokio::test]
    async fn test_drain_ends_when_publisher_dropped() {
        let (publisher, mut drain) = freshness_channel(1);
        publisher.push(raw(1)).await.unwrap();
        drop(publisher);

        assert!(drain.next().await.is_some());
        assert!(drain.next().await.is_none());
    }
}
