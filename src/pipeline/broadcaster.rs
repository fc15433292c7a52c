//! Per-camera broadcaster
//!
//! Drains the camera's freshness channel one frame at a time, encodes it,
//! swaps it into the frame cache and wakes every subscriber. A cache update
//! for a camera only ever happens here, so updates are totally ordered.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::media::FrameEncoder;
use crate::registry::{
    CameraId, EncodedFrame, FrameCache, RawFrame, SubscriptionRegistry, WakeOutcome,
};
use crate::stats::CameraStats;

use super::channel::FrameDrain;

/// Encode-and-fan-out loop for one camera
pub struct Broadcaster {
    camera: CameraId,
    drain: FrameDrain,
    encoder: Arc<dyn FrameEncoder>,
    cache: Arc<FrameCache>,
    registry: Arc<SubscriptionRegistry>,
    stats: Arc<CameraStats>,
}

impl Broadcaster {
    /// Create a broadcaster
    pub fn new(
        camera: CameraId,
        drain: FrameDrain,
        encoder: Arc<dyn FrameEncoder>,
        cache: Arc<FrameCache>,
        registry: Arc<SubscriptionRegistry>,
        stats: Arc<CameraStats>,
    ) -> Self {
        Self {
            camera,
            drain,
            encoder,
            cache,
            registry,
            stats,
        }
    }

    /// Run until shutdown or until the FrameSource side of the channel closes
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::debug!(camera = %self.camera, "Broadcaster started");

        loop {
            let frame = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                frame = self.drain.next() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };
            self.process(frame).await;
        }

        tracing::debug!(camera = %self.camera, "Broadcaster stopped");
    }

    /// Run one cycle for a frame: encode, cache, wake
    ///
    /// Returns `None` if the frame was dropped; the previously cached frame
    /// stays in place and no one is woken.
    pub async fn process(&self, frame: RawFrame) -> Option<WakeOutcome> {
        let sequence = frame.sequence;
        let encoder = Arc::clone(&self.encoder);

        let data = match tokio::task::spawn_blocking(move || encoder.encode(&frame)).await {
            Ok(Ok(data)) => data,
            Ok(Err(e)) => {
                self.stats.record_encode_failure();
                tracing::warn!(
                    camera = %self.camera,
                    sequence = sequence,
                    error = %e,
                    "Dropping frame that failed to encode"
                );
                return None;
            }
            Err(e) => {
                self.stats.record_encode_failure();
                tracing::error!(
                    camera = %self.camera,
                    sequence = sequence,
                    error = %e,
                    "Encoder task failed"
                );
                return None;
            }
        };

        let encoded = EncodedFrame::new(self.camera.clone(), sequence, data);
        if let Err(e) = self.cache.replace(encoded) {
            tracing::warn!(camera = %self.camera, error = %e, "Cache rejected frame");
            return None;
        }
        self.stats.record_encode();

        let outcome = self.registry.wake(&self.camera);
        if outcome.dropped > 0 {
            self.stats.record_wakes_dropped(outcome.dropped);
        }
        tracing::trace!(
            camera = %self.camera,
            sequence = sequence,
            delivered = outcome.delivered,
            dropped = outcome.dropped,
            "Frame broadcast"
        );

        Some(outcome)
    }
}
