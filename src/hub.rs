//! Camera hub
//!
//! Owns the shared state for every configured camera and the tasks that feed
//! it. For each camera it runs a [`FrameSource`] and a [`Broadcaster`]
//! connected by a freshness channel, and it hands out the camera's
//! [`StreamHandlerFactory`] to the HTTP layer.
//!
//! The camera set is fixed when the hub is built.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::capture::{CaptureBackend, FrameSource, FrameSourceConfig};
use crate::config::AppConfig;
use crate::media::FrameEncoder;
use crate::pipeline::{freshness_channel, Broadcaster};
use crate::registry::{CameraId, FrameCache, SubscriptionRegistry};
use crate::session::StreamHandlerFactory;
use crate::stats::{CameraStats, CameraStatsSnapshot};

/// One configured camera and its per-camera handles
pub struct Camera {
    id: CameraId,
    url: String,
    stats: Arc<CameraStats>,
    factory: StreamHandlerFactory,
}

impl Camera {
    pub fn id(&self) -> &CameraId {
        &self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn stats(&self) -> &Arc<CameraStats> {
        &self.stats
    }

    pub fn factory(&self) -> &StreamHandlerFactory {
        &self.factory
    }
}

/// Point-in-time view of one camera, as served by the camera listing
///
/// `url` is the camera's stream path; the source URL is not exposed.
#[derive(Debug, Clone, Serialize)]
pub struct CameraStatus {
    pub id: String,
    pub url: String,
    pub subscribers: usize,
    pub has_frame: bool,
    #[serde(flatten)]
    pub stats: CameraStatsSnapshot,
}

/// Shared pipeline state for all cameras
pub struct Hub {
    cameras: Vec<Camera>,
    index: HashMap<CameraId, usize>,
    cache: Arc<FrameCache>,
    registry: Arc<SubscriptionRegistry>,
    encoder: Arc<dyn FrameEncoder>,
    source_config: FrameSourceConfig,
    freshness_capacity: usize,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    started: AtomicBool,
}

impl Hub {
    /// Build a hub from a validated configuration
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config, Arc::new(config.encoder()))
    }

    /// Build a hub with an explicit encoder
    pub fn new(config: &AppConfig, encoder: Arc<dyn FrameEncoder>) -> Self {
        let ids = config.camera_ids();
        let cache = Arc::new(FrameCache::new(ids.iter().cloned()));
        let registry = Arc::new(SubscriptionRegistry::with_config(
            ids.iter().cloned(),
            config.registry_config(),
        ));
        let shutdown = CancellationToken::new();

        let cameras: Vec<Camera> = config
            .cameras
            .iter()
            .map(|camera| {
                let id = camera.id();
                Camera {
                    factory: StreamHandlerFactory::new(
                        id.clone(),
                        Arc::clone(&cache),
                        Arc::clone(&registry),
                        shutdown.clone(),
                    ),
                    id,
                    url: camera.url.clone(),
                    stats: Arc::new(CameraStats::new()),
                }
            })
            .collect();
        let index = cameras
            .iter()
            .enumerate()
            .map(|(i, camera)| (camera.id.clone(), i))
            .collect();

        Self {
            cameras,
            index,
            cache,
            registry,
            encoder,
            source_config: config.source_config(),
            freshness_capacity: config.pipeline.freshness_capacity,
            shutdown,
            tracker: TaskTracker::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Spawn a frame source and a broadcaster for every camera
    ///
    /// Only the first call has any effect.
    pub fn start<B: CaptureBackend>(&self, backend: Arc<B>) {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("Hub already started");
            return;
        }

        for camera in &self.cameras {
            let (publisher, drain) = freshness_channel(self.freshness_capacity);

            let source = FrameSource::new(
                camera.id.clone(),
                camera.url.clone(),
                Arc::clone(&backend),
                publisher,
                self.source_config.clone(),
                Arc::clone(&camera.stats),
            );
            let broadcaster = Broadcaster::new(
                camera.id.clone(),
                drain,
                Arc::clone(&self.encoder),
                Arc::clone(&self.cache),
                Arc::clone(&self.registry),
                Arc::clone(&camera.stats),
            );

            self.tracker.spawn(source.run(self.shutdown.clone()));
            self.tracker.spawn(broadcaster.run(self.shutdown.clone()));
        }
        self.tracker.close();

        tracing::info!(cameras = self.cameras.len(), "Camera pipelines started");
    }

    /// Cameras in configuration order
    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    pub fn camera(&self, id: &str) -> Option<&Camera> {
        self.index.get(id).map(|&i| &self.cameras[i])
    }

    /// Handler factory for a camera, `None` for an unknown id
    pub fn factory(&self, id: &str) -> Option<&StreamHandlerFactory> {
        self.camera(id).map(Camera::factory)
    }

    pub fn cache(&self) -> &Arc<FrameCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Token cancelled when the hub shuts down
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Status of every camera in configuration order
    pub fn statuses(&self) -> Vec<CameraStatus> {
        self.cameras
            .iter()
            .map(|camera| CameraStatus {
                id: camera.id.to_string(),
                url: format!("/video_feed/{}", camera.id),
                subscribers: self.registry.subscriber_count(camera.id.as_str()),
                has_frame: matches!(self.cache.latest(camera.id.as_str()), Ok(Some(_))),
                stats: camera.stats.snapshot(),
            })
            .collect()
    }

    /// Stop every pipeline and viewer, then wait for the pipeline tasks
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("Camera pipelines stopped");
    }
}
