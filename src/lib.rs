//! Multi-camera MJPEG relay
//!
//! Captures frames from a fixed set of cameras, keeps the latest encoded JPEG
//! per camera and streams it to any number of HTTP viewers as
//! `multipart/x-mixed-replace`.
//!
//! ```text
//!  camera ──► FrameSource ──► freshness channel ──► Broadcaster ──► FrameCache
//!                (reconnects)     (capacity 1)        (encode)          │
//!                                                        │ wake         │ read
//!                                                        ▼              ▼
//!                                              SubscriptionRegistry ─► StreamHandler ─► viewer
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use camfeed::capture::UrlBackend;
//! use camfeed::{AppConfig, Hub, MjpegServer};
//!
//! # async fn run() -> camfeed::Result<()> {
//! let config = AppConfig::load("camfeed.toml")?;
//! let hub = Arc::new(Hub::from_config(&config));
//! hub.start(Arc::new(UrlBackend::new(config.http_backend())));
//!
//! let server = MjpegServer::new(config.server_config(), Arc::clone(&hub));
//! server.run_until(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! hub.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod hub;
pub mod media;
pub mod pipeline;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use config::{AppConfig, CameraConfig};
pub use error::{CaptureError, EncodeError, Error, Result};
pub use hub::{CameraStatus, Hub};
pub use registry::{CameraId, RegistryError};
pub use server::{MjpegServer, ServerConfig};
