//! Domain layer types and invariants.

pub mod editor;
pub mod error;
pub mod page;
