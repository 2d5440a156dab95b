//! Lectern API Library
//!
//! HTTP handlers, middleware and application setup for the preview service.

mod api_doc;
mod handlers;
mod middleware;
mod telemetry;

pub mod auth;
pub mod constants;
pub mod error;
pub mod setup;
pub mod state;

pub use api_doc::ApiDoc;
pub use error::{ErrorResponse, HttpAppError};
