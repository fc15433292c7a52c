//! Error types
//!
//! Every failure in the pipeline maps onto one of four recoveries: reconnect
//! (capture), drop the frame (encode), drop the subscriber (client gone) or
//! answer 404 (unknown camera). Nothing here is fatal to a running task.

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (bind, config file read)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed or failed validation
    #[error("configuration error: {0}")]
    Config(String),
}

/// Camera source failure
///
/// All variants take the same reconnect path; end of stream is not treated
/// differently from a transient read error.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Connection to the camera could not be opened
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// A read from an open connection failed
    #[error("read failed: {0}")]
    Read(String),

    /// The camera closed the stream
    #[error("stream ended")]
    EndOfStream,

    /// A payload was received but could not be decoded into pixels
    #[error("failed to decode frame: {0}")]
    Decode(String),

    /// No backend understands the URL scheme
    #[error("unsupported source scheme '{0}'")]
    UnsupportedScheme(String),
}

/// Frame encode failure
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// Pixel buffer length does not match its declared dimensions
    #[error("pixel buffer of {len} bytes does not fit {width}x{height} RGB")]
    InvalidBuffer { len: usize, width: u32, height: u32 },

    /// The JPEG encoder rejected the image
    #[error("jpeg encode failed: {0}")]
    Jpeg(String),
}
