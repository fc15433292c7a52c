//! Camera capture
//!
//! A camera is reached through a [`CaptureBackend`], which opens a
//! [`CaptureDevice`] for a URL. The contract is open/read/release:
//!
//! - `open` connects or fails
//! - `read` yields the next frame or fails; end of stream is just a failure
//! - release is dropping the device
//!
//! [`FrameSource`] drives a device in a throttled loop and reconnects forever.
//!
//! Built-in backends, chosen by URL scheme through [`UrlBackend`]:
//! - `http://`, `https://` - MJPEG over HTTP (multipart or single JPEG)
//! - `test://WxH` - synthetic moving test pattern

pub mod mjpeg;
pub mod pattern;
pub mod source;

use std::future::Future;

use bytes::Bytes;

use crate::error::CaptureError;

pub use mjpeg::{MjpegHttpBackend, MjpegHttpDevice};
pub use pattern::{PatternBackend, PatternDevice};
pub use source::{FrameSource, FrameSourceConfig};

/// A decoded image as read from a camera
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Packed RGB8 pixels
    pub pixels: Bytes,
}

/// Opens camera connections
pub trait CaptureBackend: Send + Sync + 'static {
    /// Open connection type
    type Device: CaptureDevice;

    /// Connect to the camera at `url`
    fn open(&self, url: &str) -> impl Future<Output = Result<Self::Device, CaptureError>> + Send;
}

/// An open camera connection
///
/// Dropping the device releases the connection.
pub trait CaptureDevice: Send + 'static {
    /// Read the next frame
    fn read(&mut self) -> impl Future<Output = Result<CapturedImage, CaptureError>> + Send;
}

/// Dispatches to a built-in backend by URL scheme
#[derive(Debug, Clone, Default)]
pub struct UrlBackend {
    mjpeg: MjpegHttpBackend,
    pattern: PatternBackend,
}

impl UrlBackend {
    /// Create a dispatcher around an HTTP backend
    pub fn new(mjpeg: MjpegHttpBackend) -> Self {
        Self {
            mjpeg,
            pattern: PatternBackend,
        }
    }
}

/// Device opened by [`UrlBackend`]
pub enum UrlDevice {
    Mjpeg(MjpegHttpDevice),
    Pattern(PatternDevice),
}

impl CaptureBackend for UrlBackend {
    type Device = UrlDevice;

    fn open(&self, url: &str) -> impl Future<Output = Result<Self::Device, CaptureError>> + Send {
        async move {
            match scheme_of(url)?.as_str() {
                "http" | "https" => self.mjpeg.open(url).await.map(UrlDevice::Mjpeg),
                pattern::SCHEME => self.pattern.open(url).await.map(UrlDevice::Pattern),
                other => Err(CaptureError::UnsupportedScheme(other.to_string())),
            }
        }
    }
}

impl CaptureDevice for UrlDevice {
    fn read(&mut self) -> impl Future<Output = Result<CapturedImage, CaptureError>> + Send {
        async move {
            match self {
                UrlDevice::Mjpeg(device) => device.read().await,
                UrlDevice::Pattern(device) => device.read().await,
            }
        }
    }
}

fn scheme_of(url: &str) -> Result<String, CaptureError> {
    url::Url::parse(url)
        .map(|u| u.scheme().to_ascii_lowercase())
        .map_err(|e| CaptureError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_of() {
        assert_eq!(scheme_of("http://10.0.0.5/mjpeg").unwrap(), "http");
        assert_eq!(scheme_of("HTTPS://cam.local/stream").unwrap(), "https");
        assert_eq!(scheme_of("test://64x48").unwrap(), "test");
        assert!(scheme_of("not a url").is_err());
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let backend = UrlBackend::default();
        let result = backend.open("rtsp://10.0.0.5/stream").await;

        assert!(matches!(result, Err(CaptureError::UnsupportedScheme(s)) if s == "rtsp"));
    }

    #[tokio::test]
    async fn test_pattern_dispatch() {
        let backend = UrlBackend::default();
        let mut device = backend.open("test://8x6").await.unwrap();

        let image = device.read().await.unwrap();
        assert_eq!((image.width, image.height), (8, 6));
        assert_eq!(image.pixels.len(), 8 * 6 * 3);
    }
}
