//! Infrastructure adapters and runtime bootstrap.

pub mod contentstack;
pub mod error;
pub mod http;
pub mod telemetry;
