//! Latest-frame cache
//!
//! One slot per configured camera, created up front and never added to or
//! removed afterwards. Each slot holds the most recent [`EncodedFrame`] behind
//! an [`ArcSwapOption`]: the Broadcaster swaps in a new `Arc` and readers load
//! whichever `Arc` is current, so a reader always holds a complete frame, old
//! or new, and never a partially written buffer.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use super::error::RegistryError;
use super::frame::{CameraId, EncodedFrame};

/// Table mapping camera id to its latest encoded frame
pub struct FrameCache {
    slots: HashMap<CameraId, ArcSwapOption<EncodedFrame>>,
}

impl FrameCache {
    /// Create a cache with an empty slot for each camera
    pub fn new<I>(cameras: I) -> Self
    where
        I: IntoIterator<Item = CameraId>,
    {
        Self {
            slots: cameras
                .into_iter()
                .map(|id| (id, ArcSwapOption::empty()))
                .collect(),
        }
    }

    /// Check if the camera has a slot
    pub fn contains(&self, camera: &str) -> bool {
        self.slots.contains_key(camera)
    }

    /// Get the latest frame for a camera
    ///
    /// Returns `Ok(None)` before the camera's first frame has been encoded.
    pub fn latest(&self, camera: &str) -> Result<Option<Arc<EncodedFrame>>, RegistryError> {
        self.slots
            .get(camera)
            .map(|slot| slot.load_full())
            .ok_or_else(|| RegistryError::UnknownCamera(CameraId::new(camera)))
    }

    /// Replace the camera's entry with a newly encoded frame
    ///
    /// The previous frame is released once its last reader drops it.
    pub fn replace(&self, frame: EncodedFrame) -> Result<(), RegistryError> {
        let slot = self
            .slots
            .get(&frame.camera)
            .ok_or_else(|| RegistryError::UnknownCamera(frame.camera.clone()))?;
        slot.store(Some(Arc::new(frame)));
        Ok(())
    }

    /// Number of camera slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the cache has no camera slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
