//! Per-viewer stream handler
//!
//! One handler per connected client. Its only suspension point is the wait
//! for a wake token; on each wake it reads the camera's cached frame and
//! emits one multipart part. It never queues frames: a viewer that falls
//! behind simply sees the newest frame on its next wake.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::Stream;
use tokio_util::sync::CancellationToken;

use crate::media::multipart;
use crate::registry::{
    CameraId, FrameCache, RegistryError, Subscription, SubscriptionRegistry,
};

/// Emits one camera's frames to one client
pub struct StreamHandler {
    subscription: Subscription,
    cache: Arc<FrameCache>,
    shutdown: CancellationToken,
    last_sequence: Option<u64>,
}

impl StreamHandler {
    /// Create a handler around an active subscription
    pub fn new(
        subscription: Subscription,
        cache: Arc<FrameCache>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            subscription,
            cache,
            shutdown,
            last_sequence: None,
        }
    }

    /// Camera being streamed
    pub fn camera(&self) -> &CameraId {
        self.subscription.camera()
    }

    /// Access the underlying subscription
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Wait for the next part to send
    ///
    /// Returns `None` once the handler is stopped; it is already out of the
    /// registry by then.
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        loop {
            let woke = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => false,
                woke = self.subscription.wait() => woke,
            };
            if !woke {
                self.stop();
                return None;
            }

            let latest = match self.cache.latest(self.subscription.camera().as_str()) {
                Ok(latest) => latest,
                Err(e) => {
                    tracing::warn!(camera = %self.camera(), error = %e, "Stream lost its camera");
                    self.stop();
                    return None;
                }
            };

            match latest {
                None => return Some(multipart::placeholder_part()),
                // Extra wake for a frame this viewer already has
                Some(frame) if Some(frame.sequence) == self.last_sequence => continue,
                Some(frame) => {
                    self.last_sequence = Some(frame.sequence);
                    return Some(multipart::jpeg_part(&frame.data));
                }
            }
        }
    }

    /// Leave the camera's subscriber set; further waits return immediately
    pub fn stop(&mut self) {
        self.subscription.unsubscribe();
    }

    /// Turn the handler into a response body stream
    ///
    /// When the HTTP layer drops the stream (client gone or server shutting
    /// down) the handler is dropped with it and unsubscribes.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        futures_util::stream::unfold(self, |mut handler| async move {
            let chunk = handler.next_chunk().await?;
            Some((Ok(chunk), handler))
        })
    }
}

/// Builds stream handlers for one camera
#[derive(Clone)]
pub struct StreamHandlerFactory {
    camera: CameraId,
    cache: Arc<FrameCache>,
    registry: Arc<SubscriptionRegistry>,
    shutdown: CancellationToken,
}

impl StreamHandlerFactory {
    /// Create a factory
    pub fn new(
        camera: CameraId,
        cache: Arc<FrameCache>,
        registry: Arc<SubscriptionRegistry>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            camera,
            cache,
            registry,
            shutdown,
        }
    }

    /// Camera this factory serves
    pub fn camera(&self) -> &CameraId {
        &self.camera
    }

    /// Subscribe a new viewer and wrap it in a handler
    pub fn create(&self) -> Result<StreamHandler, RegistryError> {
        let subscription = self.registry.subscribe(self.camera.as_str())?;
        Ok(StreamHandler::new(
            subscription,
            Arc::clone(&self.cache),
            self.shutdown.clone(),
        ))
    }
}
