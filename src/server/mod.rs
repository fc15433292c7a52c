//! HTTP gateway
//!
//! Maps `/video_feed/<camera_id>` requests to the camera's stream handler
//! factory. Unknown cameras get a 404 and never touch a subscriber set.

pub mod config;
pub mod listener;
mod routes;

pub use config::ServerConfig;
pub use listener::MjpegServer;
