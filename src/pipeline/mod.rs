//! Per-camera frame pipeline
//!
//! ```text
//! FrameSource ──push──► freshness channel ──next──► Broadcaster ──► FrameCache + wake
//! ```
//!
//! The channel applies backpressure to the source; the Broadcaster applies
//! none to itself, dropping wake tokens rather than waiting on viewers.

pub mod broadcaster;
pub mod channel;

pub use broadcaster::Broadcaster;
pub use channel::{freshness_channel, FrameDrain, FramePublisher, DEFAULT_FRESHNESS_CAPACITY};
