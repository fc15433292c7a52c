//! Resize + JPEG encode step
//!
//! Every raw frame is scaled to one fixed output resolution and encoded at one
//! fixed quality before it reaches the cache.

use bytes::Bytes;
use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::error::EncodeError;
use crate::registry::RawFrame;

/// Default output width
pub const DEFAULT_TARGET_WIDTH: u32 = 1920;
/// Default output height
pub const DEFAULT_TARGET_HEIGHT: u32 = 1080;
/// Default JPEG quality
pub const DEFAULT_JPEG_QUALITY: u8 = 70;

/// Turns a raw frame into servable bytes
///
/// Called from a blocking thread, one frame at a time per camera.
pub trait FrameEncoder: Send + Sync + 'static {
    /// Encode a frame
    fn encode(&self, frame: &RawFrame) -> Result<Bytes, EncodeError>;
}

/// Resizes to a fixed resolution and encodes as JPEG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegFrameEncoder {
    width: u32,
    height: u32,
    quality: u8,
}

impl JpegFrameEncoder {
    /// Create an encoder; size is floored at 1x1 and quality clamped to 1..=100
    pub fn new(width: u32, height: u32, quality: u8) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    /// Output resolution
    pub fn target_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// JPEG quality
    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegFrameEncoder {
    fn default() -> Self {
        Self::new(
            DEFAULT_TARGET_WIDTH,
            DEFAULT_TARGET_HEIGHT,
            DEFAULT_JPEG_QUALITY,
        )
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn encode(&self, frame: &RawFrame) -> Result<Bytes, EncodeError> {
        let invalid = || EncodeError::InvalidBuffer {
            len: frame.pixels.len(),
            width: frame.width,
            height: frame.height,
        };

        if frame.width == 0 || frame.height == 0 || frame.pixels.len() != frame.expected_len() {
            return Err(invalid());
        }

        let image = RgbImage::from_raw(frame.width, frame.height, frame.pixels.to_vec())
            .ok_or_else(invalid)?;

        let image = if image.dimensions() == (self.width, self.height) {
            image
        } else {
            imageops::resize(&image, self.width, self.height, FilterType::Triangle)
        };

        // JPEG typically lands well under 1/8 of the raw size
        let mut out = Vec::with_capacity((self.width * self.height) as usize / 8);
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode_image(&image)
            .map_err(|e| EncodeError::Jpeg(e.to_string()))?;

        Ok(Bytes::from(out))
    }
}

#[cfg(test)]
mod tests {
    use image::GenericImageView;

    use super::*;
    use crate::registry::CameraId;

    fn raw(width: u32, height: u32) -> RawFrame {
        let pixels: Vec<u8> = (0..width * height * 3).map(|i| (i % 251) as u8).collect();
        RawFrame::new(CameraId::from("cam"), 1, width, height, Bytes::from(pixels))
    }

    #[test]
    fn test_encode_resizes_to_target() {
        let encoder = JpegFrameEncoder::new(32, 24, 70);
        let jpeg = encoder.encode(&raw(64, 48)).unwrap();

        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (32, 24));
    }

    #[test]
    fn test_encode_same_size() {
        let encoder = JpegFrameEncoder::new(16, 16, 90);
        let jpeg = encoder.encode(&raw(16, 16)).unwrap();

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (16, 16));
    }

    #[test]
    fn test_encode_rejects_short_buffer() {
        let encoder = JpegFrameEncoder::new(16, 16, 70);
        let mut frame = raw(8, 8);
        frame.pixels = frame.pixels.slice(..10);

        assert!(matches!(
            encoder.encode(&frame),
            Err(EncodeError::InvalidBuffer { len: 10, width: 8, height: 8 })
        ));
    }

    #[test]
    fn test_encode_rejects_zero_size() {
        let encoder = JpegFrameEncoder::default();
        let frame = RawFrame::new(CameraId::from("cam"), 0, 0, 0, Bytes::new());

        assert!(encoder.encode(&frame).is_err());
    }

    #[test]
    fn test_quality_clamped() {
        assert_eq!(JpegFrameEncoder::new(1, 1, 0).quality(), 1);
        assert_eq!(JpegFrameEncoder::new(1, 1, 255).quality(), 100);
        assert_eq!(JpegFrameEncoder::default().target_size(), (1920, 1080));
    }
}
