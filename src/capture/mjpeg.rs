//! MJPEG-over-HTTP camera source
//!
//! Most IP cameras expose either a `multipart/x-mixed-replace` stream of JPEGs
//! or a snapshot endpoint returning one JPEG per request. Both are handled:
//!
//! - multipart: the body is read as a byte stream and each JPEG is cut out from
//!   its SOI (`FF D8`) to its EOI (`FF D9`), ignoring part headers. Header
//!   segments are skipped by their length fields, so an EXIF thumbnail with
//!   its own SOI/EOI does not end the frame early.
//! - anything else: each read re-requests the URL and decodes the whole body

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};

use crate::error::CaptureError;

use super::{CaptureBackend, CaptureDevice, CapturedImage};

/// Largest JPEG accepted from a camera
pub const MAX_JPEG_BYTES: usize = 8 * 1024 * 1024;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Opens HTTP MJPEG / snapshot connections
#[derive(Debug, Clone)]
pub struct MjpegHttpBackend {
    client: reqwest::Client,
    read_timeout: Duration,
}

impl MjpegHttpBackend {
    /// Create a backend with the given connect and per-read timeouts
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let client = match reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Failed to build HTTP client, using defaults without connect timeout"
                );
                reqwest::Client::new()
            }
        };
        Self {
            client,
            read_timeout,
        }
    }
}

impl Default for MjpegHttpBackend {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)
    }
}

/// An open HTTP camera connection
pub struct MjpegHttpDevice {
    mode: DeviceMode,
    read_timeout: Duration,
}

enum DeviceMode {
    Multipart { body: ByteStream, buffer: BytesMut },
    Snapshot { client: reqwest::Client, url: String, first: Option<Bytes> },
}

impl CaptureBackend for MjpegHttpBackend {
    type Device = MjpegHttpDevice;

    fn open(&self, url: &str) -> impl Future<Output = Result<Self::Device, CaptureError>> + Send {
        async move {
            let connect_err = |reason: String| CaptureError::Connect {
                url: url.to_string(),
                reason,
            };

            let response = tokio::time::timeout(self.read_timeout, self.client.get(url).send())
                .await
                .map_err(|_| connect_err("timed out".into()))?
                .and_then(|r| r.error_for_status())
                .map_err(|e| connect_err(e.to_string()))?;

            let is_multipart = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_ascii_lowercase().contains("multipart"))
                .unwrap_or(false);

            let mode = if is_multipart {
                DeviceMode::Multipart {
                    body: Box::pin(response.bytes_stream()),
                    buffer: BytesMut::with_capacity(256 * 1024),
                }
            } else {
                let first = response
                    .bytes()
                    .await
                    .map_err(|e| connect_err(e.to_string()))?;
                DeviceMode::Snapshot {
                    client: self.client.clone(),
                    url: url.to_string(),
                    first: Some(first),
                }
            };

            tracing::debug!(url = %url, multipart = is_multipart, "HTTP camera connected");

            Ok(MjpegHttpDevice {
                mode,
                read_timeout: self.read_timeout,
            })
        }
    }
}

impl CaptureDevice for MjpegHttpDevice {
    fn read(&mut self) -> impl Future<Output = Result<CapturedImage, CaptureError>> + Send {
        async move {
            let read_timeout = self.read_timeout;
            let jpeg = match &mut self.mode {
                DeviceMode::Multipart { body, buffer } => {
                    next_jpeg(body, buffer, read_timeout).await?
                }
                DeviceMode::Snapshot { client, url, first } => match first.take() {
                    Some(bytes) => bytes,
                    None => fetch_snapshot(client, url, read_timeout).await?,
                },
            };

            tokio::task::spawn_blocking(move || decode_jpeg(&jpeg))
                .await
                .map_err(|e| CaptureError::Decode(e.to_string()))?
        }
    }
}

async fn next_jpeg(
    body: &mut ByteStream,
    buffer: &mut BytesMut,
    read_timeout: Duration,
) -> Result<Bytes, CaptureError> {
    loop {
        if let Some((start, end)) = find_jpeg_bounds(buffer) {
            let mut frame = buffer.split_to(end);
            return Ok(frame.split_off(start).freeze());
        }

        let chunk = tokio::time::timeout(read_timeout, body.next())
            .await
            .map_err(|_| CaptureError::Read("timed out".into()))?
            .ok_or(CaptureError::EndOfStream)?
            .map_err(|e| CaptureError::Read(e.to_string()))?;
        buffer.extend_from_slice(&chunk);

        if buffer.len() > MAX_JPEG_BYTES * 2 {
            return Err(CaptureError::Read(format!(
                "no complete JPEG in {} buffered bytes",
                buffer.len()
            )));
        }
    }
}

async fn fetch_snapshot(
    client: &reqwest::Client,
    url: &str,
    read_timeout: Duration,
) -> Result<Bytes, CaptureError> {
    let request = async {
        client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await
    };

    tokio::time::timeout(read_timeout, request)
        .await
        .map_err(|_| CaptureError::Read("timed out".into()))?
        .map_err(|e| CaptureError::Read(e.to_string()))
}

/// Locate the first complete JPEG in `buffer`
///
/// Returns the byte range from its SOI marker through its EOI marker, or
/// `None` if the buffer does not yet hold a complete image. Marker segments
/// before and between scans are skipped by length; entropy-coded data is
/// scanned for the next marker, honoring `FF 00` stuffing and restart markers.
pub fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8])?;
    let mut pos = start + 2;

    loop {
        if *buffer.get(pos)? != 0xFF {
            // Damaged segment chain, settle for the first EOI
            return find_eoi(buffer, pos).map(|end| (start, end));
        }
        // Fill bytes
        while *buffer.get(pos)? == 0xFF {
            pos += 1;
        }
        let marker = buffer[pos];
        pos += 1;

        match marker {
            EOI => return Some((start, pos)),
            // Standalone markers carry no length
            0x01 | 0xD0..=0xD8 => {}
            _ => {
                let length = buffer.get(pos..pos + 2)?;
                let length = u16::from_be_bytes([length[0], length[1]]) as usize;
                if length < 2 {
                    return find_eoi(buffer, pos).map(|end| (start, end));
                }
                pos += length;
                if pos > buffer.len() {
                    return None;
                }
                if marker == SOS {
                    pos = skip_entropy_data(buffer, pos)?;
                }
            }
        }
    }
}

const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;

/// Offset of the first marker after entropy-coded data starting at `pos`
fn skip_entropy_data(buffer: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        pos += buffer[pos..].iter().position(|&b| b == 0xFF)?;
        match *buffer.get(pos + 1)? {
            0x00 | 0xD0..=0xD7 => pos += 2,
            _ => return Some(pos),
        }
    }
}

/// End offset of the first EOI at or after `from`
fn find_eoi(buffer: &[u8], from: usize) -> Option<usize> {
    buffer
        .get(from..)?
        .windows(2)
        .position(|w| w == [0xFF, EOI])
        .map(|i| from + i + 2)
}

/// Decode a JPEG into packed RGB8
pub fn decode_jpeg(jpeg: &[u8]) -> Result<CapturedImage, CaptureError> {
    if jpeg.len() > MAX_JPEG_BYTES {
        return Err(CaptureError::Decode(format!(
            "{} byte JPEG exceeds limit",
            jpeg.len()
        )));
    }

    let image = image::load_from_memory_with_format(jpeg, image::ImageFormat::Jpeg)
        .map_err(|e| CaptureError::Decode(e.to_string()))?
        .into_rgb8();

    let (width, height) = image.dimensions();
    Ok(CapturedImage {
        width,
        height,
        pixels: Bytes::from(image.into_raw()),
    })
}
