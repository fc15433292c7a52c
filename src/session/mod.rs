//! Viewer sessions
//!
//! Each HTTP viewer of a camera is served by one [`StreamHandler`], created
//! per request by that camera's [`StreamHandlerFactory`].

pub mod stream;

pub use stream::{StreamHandler, StreamHandlerFactory};
