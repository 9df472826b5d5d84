//! Application services layer.

pub mod content;
pub mod error;
pub mod lifecycle;
pub mod live_preview;
pub mod resolve;
pub mod sanitize;
pub mod stream;
