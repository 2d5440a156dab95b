//! Blob store abstraction trait
//!
//! This module defines the BlobStore trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use lectern_core::config::{MAX_PRESIGN_TTL_SECS, MIN_PRESIGN_TTL_SECS};
use lectern_core::AppError;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Clamp a presigned URL lifetime to the range every backend accepts.
pub fn clamp_presign_ttl(ttl: Duration) -> Duration {
    ttl.clamp(
        Duration::from_secs(MIN_PRESIGN_TTL_SECS),
        Duration::from_secs(MAX_PRESIGN_TTL_SECS),
    )
}

/// Blob store abstraction trait
///
/// All storage backends (S3, local filesystem) implement this trait, so the preview
/// pipeline works with any backend without coupling to implementation details.
/// Keys are plain `/`-separated strings; see the crate root for the layout.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing object.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()>;

    /// Read the object stored under `key`.
    ///
    /// Returns [`StorageError::NotFound`] when there is no such object.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Lightweight existence probe (HEAD / stat).
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Delete the object under `key`. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Delete every object whose key starts with `prefix` and return how many
    /// were removed.
    async fn delete_by_prefix(&self, prefix: &str) -> StorageResult<usize>;

    /// Issue a short-lived direct GET URL for `key`.
    ///
    /// `Ok(None)` means the backend cannot hand out direct URLs and the caller
    /// should stream the bytes instead. The TTL is clamped with
    /// [`clamp_presign_ttl`].
    async fn presign_get(&self, key: &str, ttl: Duration) -> StorageResult<Option<String>>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
