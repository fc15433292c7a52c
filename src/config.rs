//! Application configuration
//!
//! Loaded from a TOML file:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:3030"
//! max_viewers = 0
//!
//! [pipeline]
//! target_width = 1920
//! target_height = 1080
//! jpeg_quality = 70
//! target_fps = 30
//! reconnect_delay_secs = 10
//!
//! [[cameras]]
//! camera_id = "front"
//! url = "http://10.0.0.5/mjpeg"
//! ```
//!
//! Only `cameras` is required. Camera order is preserved and used for the
//! index page and the camera listing.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::capture::{FrameSourceConfig, MjpegHttpBackend};
use crate::error::{Error, Result};
use crate::media::JpegFrameEncoder;
use crate::registry::{CameraId, RegistryConfig};
use crate::server::ServerConfig;

/// Top-level configuration file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    pub cameras: Vec<CameraConfig>,
}

/// One configured camera
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraConfig {
    pub camera_id: String,
    pub url: String,
}

impl CameraConfig {
    pub fn new(camera_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            camera_id: camera_id.into(),
            url: url.into(),
        }
    }

    pub fn id(&self) -> CameraId {
        CameraId::new(&self.camera_id)
    }
}

/// `[server]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub bind: SocketAddr,
    /// 0 = unlimited
    pub max_viewers: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        let defaults = ServerConfig::default();
        Self {
            bind: defaults.bind_addr,
            max_viewers: defaults.max_viewers,
        }
    }
}

/// `[pipeline]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSection {
    pub target_width: u32,
    pub target_height: u32,
    pub jpeg_quality: u8,
    pub target_fps: u32,
    pub reconnect_delay_secs: u64,
    pub freshness_capacity: usize,
    pub subscriber_capacity: usize,
    pub fps_report_interval_secs: u64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            target_width: crate::media::jpeg::DEFAULT_TARGET_WIDTH,
            target_height: crate::media::jpeg::DEFAULT_TARGET_HEIGHT,
            jpeg_quality: crate::media::jpeg::DEFAULT_JPEG_QUALITY,
            target_fps: crate::capture::source::DEFAULT_TARGET_FPS,
            reconnect_delay_secs: crate::capture::source::DEFAULT_RECONNECT_DELAY.as_secs(),
            freshness_capacity: crate::pipeline::DEFAULT_FRESHNESS_CAPACITY,
            subscriber_capacity: crate::registry::config::DEFAULT_SUBSCRIBER_CAPACITY,
            fps_report_interval_secs: 1,
            connect_timeout_secs: 10,
            read_timeout_secs: 10,
        }
    }
}

impl AppConfig {
    /// Build a configuration for a camera list with all defaults
    pub fn with_cameras(cameras: Vec<CameraConfig>) -> Self {
        Self {
            server: ServerSection::default(),
            pipeline: PipelineSection::default(),
            cameras,
        }
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Check invariants the rest of the crate relies on
    pub fn validate(&self) -> Result<()> {
        if self.cameras.is_empty() {
            return Err(Error::Config("at least one camera is required".into()));
        }

        let mut seen = HashSet::new();
        for camera in &self.cameras {
            let id = camera.camera_id.as_str();
            if !is_valid_camera_id(id) {
                return Err(Error::Config(format!(
                    "invalid camera id '{id}': use letters, digits, '-', '_', '.' or '~'"
                )));
            }
            if !seen.insert(id) {
                return Err(Error::Config(format!("duplicate camera id '{id}'")));
            }
            if camera.url.trim().is_empty() {
                return Err(Error::Config(format!("camera '{id}' has no url")));
            }
        }

        let p = &self.pipeline;
        if p.target_width == 0 || p.target_height == 0 {
            return Err(Error::Config("target size must be non-zero".into()));
        }
        if !(1..=100).contains(&p.jpeg_quality) {
            return Err(Error::Config("jpeg_quality must be within 1..=100".into()));
        }
        if p.target_fps == 0 {
            return Err(Error::Config("target_fps must be positive".into()));
        }
        Ok(())
    }

    /// Camera ids in configuration order
    pub fn camera_ids(&self) -> Vec<CameraId> {
        self.cameras.iter().map(CameraConfig::id).collect()
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::default()
            .bind(self.server.bind)
            .max_viewers(self.server.max_viewers)
    }

    pub fn source_config(&self) -> FrameSourceConfig {
        FrameSourceConfig::default()
            .target_fps(self.pipeline.target_fps)
            .reconnect_delay(Duration::from_secs(self.pipeline.reconnect_delay_secs))
            .fps_report_interval(Duration::from_secs(self.pipeline.fps_report_interval_secs.max(1)))
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::default().subscriber_capacity(self.pipeline.subscriber_capacity)
    }

    pub fn encoder(&self) -> JpegFrameEncoder {
        JpegFrameEncoder::new(
            self.pipeline.target_width,
            self.pipeline.target_height,
            self.pipeline.jpeg_quality,
        )
    }

    pub fn http_backend(&self) -> MjpegHttpBackend {
        MjpegHttpBackend::new(
            Duration::from_secs(self.pipeline.connect_timeout_secs),
            Duration::from_secs(self.pipeline.read_timeout_secs),
        )
    }
}

/// Camera ids appear verbatim as a URL path segment, so only unreserved URL
/// characters are allowed and the dot segments are rejected
fn is_valid_camera_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~'))
}
