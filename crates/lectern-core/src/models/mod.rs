//! Data models for the application
//!
//! Each sub-module represents a specific feature area.

mod document;
mod migration;
mod preview;

pub use document::*;
pub use migration::*;
pub use preview::*;
