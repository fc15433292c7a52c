//! Statistics for camera pipelines

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counts frames and reports a rate once per interval
///
/// Purely diagnostic; nothing in the pipeline reacts to the measured rate.
#[derive(Debug)]
pub struct FpsMeter {
    interval: Duration,
    window_start: Instant,
    frames: u64,
}

impl FpsMeter {
    /// Create a meter reporting every `interval`
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    /// Create a meter whose first window opens at `now`
    pub fn starting_at(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            window_start: now,
            frames: 0,
        }
    }

    /// Count one frame observed at `now`
    ///
    /// Returns the frames-per-second of the window once the window has lasted
    /// at least `interval`, and starts a new window.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }

        let fps = self.frames as f64 / elapsed.as_secs_f64();
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }

    /// Restart the window, e.g. after a reconnect
    pub fn reset(&mut self, now: Instant) {
        self.frames = 0;
        self.window_start = now;
    }
}

/// Per-camera pipeline counters
///
/// Shared between a camera's FrameSource, its Broadcaster and the HTTP API;
/// all fields are relaxed atomics.
#[derive(Debug, Default)]
pub struct CameraStats {
    frames_captured: AtomicU64,
    frames_encoded: AtomicU64,
    encode_failures: AtomicU64,
    reconnects: AtomicU64,
    wakes_dropped: AtomicU64,
}

impl CameraStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_capture(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_encode(&self) {
        self.frames_encoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wakes_dropped(&self, dropped: usize) {
        self.wakes_dropped
            .fetch_add(dropped as u64, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of the counters
    pub fn snapshot(&self) -> CameraStatsSnapshot {
        CameraStatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_encoded: self.frames_encoded.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            wakes_dropped: self.wakes_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`CameraStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CameraStatsSnapshot {
    /// Frames read from the source
    pub frames_captured: u64,
    /// Frames encoded and stored in the cache
    pub frames_encoded: u64,
    /// Frames dropped because they could not be encoded
    pub encode_failures: u64,
    /// Reconnect attempts after a failed open or read
    pub reconnects: u64,
    /// Wake tokens dropped on full subscriber channels
    pub wakes_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_meter_reports_after_interval() {
        let start = Instant::now();
        let mut meter = FpsMeter::starting_at(Duration::from_secs(1), start);

        for i in 1..30 {
            assert!(meter.tick(start + Duration::from_millis(i * 33)).is_none());
        }
        let fps = meter.tick(start + Duration::from_secs(1)).unwrap();
        assert!((fps - 30.0).abs() < f64::EPSILON);

        // New window starts empty
        assert!(meter.tick(start + Duration::from_millis(1_100)).is_none());
    }

    #[test]
    fn test_fps_meter_reset() {
        let start = Instant::now();
        let mut meter = FpsMeter::starting_at(Duration::from_secs(1), start);
        meter.tick(start + Duration::from_millis(500));

        meter.reset(start + Duration::from_secs(5));
        assert!(meter.tick(start + Duration::from_millis(5_500)).is_none());
        let fps = meter.tick(start + Duration::from_secs(6)).unwrap();
        assert!((fps - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_camera_stats_snapshot() {
        let stats = CameraStats::new();
        stats.record_capture();
        stats.record_capture();
        stats.record_encode();
        stats.record_encode_failure();
        stats.record_reconnect();
        stats.record_wakes_dropped(3);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_captured, 2);
        assert_eq!(snapshot.frames_encoded, 1);
        assert_eq!(snapshot.encode_failures, 1);
        assert_eq!(snapshot.reconnects, 1);
        assert_eq!(snapshot.wakes_dropped, 3);
    }
}
