//! Lectern Storage Library
//!
//! This crate provides the blob store abstraction used for preview artifacts and
//! uploaded source documents, with implementations for S3-compatible object stores
//! and the local filesystem.
//!
//! # Key format
//!
//! Preview keys are derived from `(namespace, id, version)` only:
//!
//! - **No namespace**: `previews/_/{id}/{version}`
//! - **Namespaced**: `previews/{namespace}/{id}/{version}`
//!
//! An optional global prefix is prepended to every key. Keys must not be empty,
//! contain `..` segments or backslashes, or start with `/`. Key generation is
//! centralized in the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_blob_store;
pub use keys::KeyLayout;
pub use lectern_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{clamp_presign_ttl, BlobStore, StorageError, StorageResult};
