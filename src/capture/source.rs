//! Per-camera frame source
//!
//! Owns one camera connection at a time. Reads frames in a throttled loop and
//! pushes them into the camera's freshness channel; on any open or read
//! failure the connection is released and retried after a fixed delay, with
//! no limit on attempts.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CaptureError;
use crate::pipeline::FramePublisher;
use crate::registry::{CameraId, RawFrame};
use crate::stats::{CameraStats, FpsMeter};

use super::{CaptureBackend, CaptureDevice};

/// Default target frame rate
pub const DEFAULT_TARGET_FPS: u32 = 30;
/// Default wait between a failure and the next connection attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);
/// Default frame-rate report interval
pub const DEFAULT_FPS_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Frame source timing
#[derive(Debug, Clone)]
pub struct FrameSourceConfig {
    /// Upper bound on frames emitted per second
    pub target_fps: u32,
    /// Cool-down after a failed open or read
    pub reconnect_delay: Duration,
    /// How often the observed frame rate is logged
    pub fps_report_interval: Duration,
}

impl Default for FrameSourceConfig {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            fps_report_interval: DEFAULT_FPS_REPORT_INTERVAL,
        }
    }
}

impl FrameSourceConfig {
    /// Set the target frame rate (minimum 1)
    pub fn target_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps.max(1);
        self
    }

    /// Set the reconnect delay
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the frame-rate report interval
    pub fn fps_report_interval(mut self, interval: Duration) -> Self {
        self.fps_report_interval = interval;
        self
    }

    /// Time budget for one frame
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }
}

/// Why a connected session ended
enum SessionEnd {
    Shutdown,
    ChannelClosed,
    Failed(CaptureError),
}

/// Capture loop for one camera
pub struct FrameSource<B: CaptureBackend> {
    camera: CameraId,
    url: String,
    backend: Arc<B>,
    publisher: FramePublisher,
    config: FrameSourceConfig,
    stats: Arc<CameraStats>,
    meter: FpsMeter,
    sequence: u64,
}

impl<B: CaptureBackend> FrameSource<B> {
    /// Create a frame source
    pub fn new(
        camera: CameraId,
        url: impl Into<String>,
        backend: Arc<B>,
        publisher: FramePublisher,
        config: FrameSourceConfig,
        stats: Arc<CameraStats>,
    ) -> Self {
        Self {
            camera,
            url: url.into(),
            backend,
            publisher,
            meter: FpsMeter::new(config.fps_report_interval),
            config,
            stats,
            sequence: 0,
        }
    }

    /// Run until shutdown
    ///
    /// Also returns if the Broadcaster is gone, since nothing could consume
    /// further frames.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(camera = %self.camera, "Frame source started");

        loop {
            let opened = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                opened = self.backend.open(&self.url) => opened,
            };

            match opened {
                Ok(device) => {
                    tracing::info!(camera = %self.camera, "Camera connected");
                    match self.stream(device, &shutdown).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::ChannelClosed => {
                            tracing::debug!(camera = %self.camera, "Frame channel closed");
                            break;
                        }
                        SessionEnd::Failed(e) => {
                            tracing::warn!(
                                camera = %self.camera,
                                error = %e,
                                retry_in_secs = self.config.reconnect_delay.as_secs_f64(),
                                "Camera read failed, reconnecting"
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        camera = %self.camera,
                        error = %e,
                        retry_in_secs = self.config.reconnect_delay.as_secs_f64(),
                        "Camera unavailable, retrying"
                    );
                }
            }

            self.stats.record_reconnect();
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }

        tracing::info!(camera = %self.camera, "Frame source stopped");
    }

    /// Read from an open device until it fails; the device is released on return
    async fn stream(
        &mut self,
        mut device: B::Device,
        shutdown: &CancellationToken,
    ) -> SessionEnd {
        let frame_interval = self.config.frame_interval();
        // Time spent disconnected does not count towards the rate
        self.meter.reset(Instant::now().into_std());

        loop {
            let started = Instant::now();

            let image = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return SessionEnd::Shutdown,
                read = device.read() => match read {
                    Ok(image) => image,
                    Err(e) => return SessionEnd::Failed(e),
                },
            };

            self.sequence += 1;
            self.stats.record_capture();
            if let Some(fps) = self.meter.tick(Instant::now().into_std()) {
                let fps = (fps * 10.0).round() / 10.0;
                tracing::info!(camera = %self.camera, fps = fps, "Capture rate");
            }

            let frame = RawFrame::new(
                self.camera.clone(),
                self.sequence,
                image.width,
                image.height,
                image.pixels,
            );
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return SessionEnd::Shutdown,
                pushed = self.publisher.push(frame) => {
                    if pushed.is_err() {
                        return SessionEnd::ChannelClosed;
                    }
                }
            }

            let remaining = frame_interval.saturating_sub(started.elapsed());
            if !remaining.is_zero() {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return SessionEnd::Shutdown,
                    _ = tokio::time::sleep(remaining) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::sync::Mutex;

    use bytes::Bytes;

    use super::*;
    use crate::capture::CapturedImage;
    use crate::pipeline::freshness_channel;

    /// Backend whose devices yield `frames_per_session` frames then fail;
    /// `None` makes every open fail
    struct ScriptedBackend {
        frames_per_session: Option<usize>,
        opens: Mutex<Vec<Instant>>,
    }

    impl ScriptedBackend {
        fn new(frames_per_session: Option<usize>) -> Arc<Self> {
            Arc::new(Self {
                frames_per_session,
                opens: Mutex::new(Vec::new()),
            })
        }

        fn opens(&self) -> Vec<Instant> {
            self.opens.lock().unwrap().clone()
        }
    }

    struct ScriptedDevice {
        remaining: usize,
    }

    impl CaptureBackend for ScriptedBackend {
        type Device = ScriptedDevice;

        fn open(
            &self,
            _url: &str,
        ) -> impl Future<Output = Result<ScriptedDevice, CaptureError>> + Send {
            self.opens.lock().unwrap().push(Instant::now());
            let result = match self.frames_per_session {
                Some(remaining) => Ok(ScriptedDevice { remaining }),
                None => Err(CaptureError::Connect {
                    url: "scripted://".into(),
                    reason: "refused".into(),
                }),
            };
            async move { result }
        }
    }

    impl CaptureDevice for ScriptedDevice {
        fn read(
            &mut self,
        ) -> impl Future<Output = Result<CapturedImage, CaptureError>> + Send {
            let result = if self.remaining == 0 {
                Err(CaptureError::EndOfStream)
            } else {
                self.remaining -= 1;
                Ok(CapturedImage {
                    width: 1,
                    height: 1,
                    pixels: Bytes::from_static(&[1, 2, 3]),
                })
            };
            async move { result }
        }
    }

    fn source(
        backend: Arc<ScriptedBackend>,
        publisher: FramePublisher,
    ) -> FrameSource<ScriptedBackend> {
        FrameSource::new(
            CameraId::from("cam1"),
            "scripted://cam1",
            backend,
            publisher,
            FrameSourceConfig::default(),
            Arc::new(CameraStats::new()),
        )
    }

    #[test]
    fn test_frame_interval() {
        let config = FrameSourceConfig::default();
        assert_eq!(config.frame_interval(), Duration::from_nanos(33_333_333));

        let config = FrameSourceConfig::default().target_fps(0);
        assert_eq!(config.frame_interval(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_open_failures() {
        const ATTEMPTS: usize = 6;

        let backend = ScriptedBackend::new(None);
        let (publisher, _drain) = freshness_channel(1);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(source(Arc::clone(&backend), publisher).run(shutdown.clone()));

        while backend.opens().len() < ATTEMPTS {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        let opens = backend.opens();
        for pair in opens.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= DEFAULT_RECONNECT_DELAY, "retried after {gap:?}");
            assert!(gap < DEFAULT_RECONNECT_DELAY + Duration::from_millis(100));
        }
        assert!(!handle.is_finished(), "source gave up");

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_read_failures() {
        let backend = ScriptedBackend::new(Some(2));
        let (publisher, mut drain) = freshness_channel(1);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(source(Arc::clone(&backend), publisher).run(shutdown.clone()));

        let mut sequences = Vec::new();
        for _ in 0..6 {
            sequences.push(drain.next().await.unwrap().sequence);
        }

        // Two frames per session, sequence keeps counting across reconnects
        assert_eq!(sequences, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(backend.opens().len(), 3);
        assert!(!handle.is_finished());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failures_reconnect_after_delay() {
        const ATTEMPTS: usize = 5;

        // Every open succeeds and the first read fails
        let backend = ScriptedBackend::new(Some(0));
        let (publisher, _drain) = freshness_channel(1);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(source(Arc::clone(&backend), publisher).run(shutdown.clone()));

        while backend.opens().len() < ATTEMPTS {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        let opens = backend.opens();
        for pair in opens.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= DEFAULT_RECONNECT_DELAY, "reconnected after {gap:?}");
            assert!(gap < DEFAULT_RECONNECT_DELAY + Duration::from_millis(100));
        }
        assert!(!handle.is_finished(), "source gave up");

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttles_to_target_rate() {
        let backend = ScriptedBackend::new(Some(usize::MAX));
        let (publisher, mut drain) = freshness_channel(1);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(source(backend, publisher).run(shutdown.clone()));

        let start = Instant::now();
        let mut frames = 0;
        while start.elapsed() < Duration::from_secs(1) {
            drain.next().await.unwrap();
            frames += 1;
        }

        assert!((29..=32).contains(&frames), "got {frames} frames in one second");

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_broadcaster_gone() {
        let backend = ScriptedBackend::new(Some(usize::MAX));
        let (publisher, drain) = freshness_channel(1);
        drop(drain);

        let handle = tokio::spawn(source(backend, publisher).run(CancellationToken::new()));
        handle.await.unwrap();
    }
}
