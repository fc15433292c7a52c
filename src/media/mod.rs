//! Media handling
//!
//! This module provides:
//! - Resize + JPEG encoding of raw frames
//! - `multipart/x-mixed-replace` part framing

pub mod jpeg;
pub mod multipart;

pub use jpeg::{FrameEncoder, JpegFrameEncoder};
