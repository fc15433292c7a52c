//! Frame cache and subscription registry
//!
//! The registry holds everything shared between a camera's Broadcaster and the
//! viewers of that camera: the latest encoded frame and the set of wake
//! channels.
//!
//! # Architecture
//!
//! ```text
//!      [Broadcaster cam1]
//!             │
//!             ├──► FrameCache.replace()        ArcSwapOption per camera
//!             │
//!             └──► SubscriptionRegistry.wake() try_send(()) per subscriber
//!                          │
//!          ┌───────────────┼───────────────┐
//!          ▼               ▼               ▼
//!     [Subscriber]    [Subscriber]    [Subscriber]
//!     wait().await    wait().await    wait().await
//!          │               │               │
//!          └──► FrameCache.latest() ──► multipart chunk ──► HTTP
//! ```
//!
//! Wake tokens carry no data. A subscriber that falls behind loses tokens,
//! never frames: whenever it does wake up it reads the newest cached frame.

pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod frame;
pub mod store;

pub use cache::FrameCache;
pub use config::RegistryConfig;
pub use entry::{SubscriberState, Subscription};
pub use error::RegistryError;
pub use frame::{CameraId, EncodedFrame, RawFrame};
pub use store::{SubscriberId, SubscriptionRegistry, WakeOutcome};
