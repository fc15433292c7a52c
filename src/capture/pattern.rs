//! Synthetic test-pattern source
//!
//! `test://640x480` produces a diagonal gradient that drifts one step per
//! frame. Useful for demos and for exercising the pipeline without hardware.

use std::future::Future;

use bytes::Bytes;

use crate::error::CaptureError;

use super::{CaptureBackend, CaptureDevice, CapturedImage};

/// URL scheme handled by this backend
pub const SCHEME: &str = "test";

const DEFAULT_SIZE: (u32, u32) = (640, 480);
const MAX_DIMENSION: u32 = 8192;

/// Opens test-pattern devices
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternBackend;

/// A running test pattern
#[derive(Debug)]
pub struct PatternDevice {
    width: u32,
    height: u32,
    phase: u8,
}

impl PatternDevice {
    /// Create a pattern of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            phase: 0,
        }
    }

    fn render(&self) -> Bytes {
        let mut pixels = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                let v = (x + y) as u8;
                pixels.push(v.wrapping_add(self.phase));
                pixels.push((y as u8).wrapping_mul(2));
                pixels.push(self.phase);
            }
        }
        Bytes::from(pixels)
    }
}

impl CaptureBackend for PatternBackend {
    type Device = PatternDevice;

    fn open(&self, url: &str) -> impl Future<Output = Result<Self::Device, CaptureError>> + Send {
        let parsed = parse_size(url);
        async move {
            let (width, height) = parsed?;
            Ok(PatternDevice::new(width, height))
        }
    }
}

impl CaptureDevice for PatternDevice {
    fn read(&mut self) -> impl Future<Output = Result<CapturedImage, CaptureError>> + Send {
        let image = CapturedImage {
            width: self.width,
            height: self.height,
            pixels: self.render(),
        };
        self.phase = self.phase.wrapping_add(1);
        async move { Ok(image) }
    }
}

/// Parse `test://WxH`; an empty size means the default
fn parse_size(url: &str) -> Result<(u32, u32), CaptureError> {
    let invalid = |reason: &str| CaptureError::Connect {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    let rest = url
        .split_once("://")
        .map(|(_, rest)| rest.trim_end_matches('/'))
        .ok_or_else(|| invalid("missing scheme"))?;

    if rest.is_empty() {
        return Ok(DEFAULT_SIZE);
    }

    let (w, h) = rest
        .split_once('x')
        .ok_or_else(|| invalid("expected WIDTHxHEIGHT"))?;
    let width: u32 = w.parse().map_err(|_| invalid("bad width"))?;
    let height: u32 = h.parse().map_err(|_| invalid("bad height"))?;

    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(invalid("size out of range"));
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("test://320x240").unwrap(), (320, 240));
        assert_eq!(parse_size("test://320x240/").unwrap(), (320, 240));
        assert_eq!(parse_size("test://").unwrap(), DEFAULT_SIZE);
        assert!(parse_size("test://320").is_err());
        assert!(parse_size("test://0x10").is_err());
        assert!(parse_size("test://axb").is_err());
        assert!(parse_size("test://99999x10").is_err());
    }

    #[tokio::test]
    async fn test_frames_change() {
        let mut device = PatternBackend.open("test://4x4").await.unwrap();

        let first = device.read().await.unwrap();
        let second = device.read().await.unwrap();

        assert_eq!(first.pixels.len(), 4 * 4 * 3);
        assert_ne!(first.pixels, second.pixels);
    }
}
