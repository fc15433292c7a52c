//! Registry error types
//!
//! Error types for cache and subscription lookups.

use super::frame::CameraId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Camera id is not in the configuration
    #[error("unknown camera: {0}")]
    UnknownCamera(CameraId),
}
