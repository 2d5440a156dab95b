//! Lectern Core Library
//!
//! This crate provides the domain models, identifier validation, error types and
//! configuration shared by every Lectern component.

pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::{BaseConfig, Config, DocumentStoreKind, LogFormat, PreviewServiceConfig};
pub use context::{Namespace, RequestContext};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
