//! Pipeline statistics

pub mod metrics;

pub use metrics::{CameraStats, CameraStatsSnapshot, FpsMeter};
