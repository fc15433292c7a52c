//! Camera identifiers and frame types
//!
//! This module defines the key type for identifying cameras and the frames
//! that travel from capture to the cache.

use std::borrow::Borrow;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;

/// Unique identifier for a camera
///
/// Opaque string taken verbatim from configuration. Cloning is a refcount bump.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraId(Arc<str>);

impl CameraId {
    /// Create a new camera id
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CameraId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CameraId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CameraId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl Borrow<str> for CameraId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// An undecoded RGB8 frame as captured from a camera
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Camera that produced the frame
    pub camera: CameraId,
    /// Per-camera capture sequence number
    pub sequence: u64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Packed RGB8 pixels, `width * height * 3` bytes
    pub pixels: Bytes,
    /// When the frame was read from the source
    pub captured_at: Instant,
}

impl RawFrame {
    /// Create a new raw frame stamped with the current time
    pub fn new(camera: CameraId, sequence: u64, width: u32, height: u32, pixels: Bytes) -> Self {
        Self {
            camera,
            sequence,
            width,
            height,
            pixels,
            captured_at: Instant::now(),
        }
    }

    /// Number of bytes a well-formed buffer of these dimensions holds
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// A JPEG-encoded frame ready to be served
///
/// Cheap to clone due to `Bytes` reference counting; every viewer of a camera
/// shares the same allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Camera that produced the frame
    pub camera: CameraId,
    /// Sequence number of the raw frame this was encoded from
    pub sequence: u64,
    /// JPEG bytes
    pub data: Bytes,
}

impl EncodedFrame {
    /// Create an encoded frame
    pub fn new(camera: CameraId, sequence: u64, data: Bytes) -> Self {
        Self {
            camera,
            sequence,
            data,
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
