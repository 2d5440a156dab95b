//! Blob store wrapper whose preview reads can be made to miss.

use async_trait::async_trait;
use bytes::Bytes;
use lectern_core::StorageBackend;
use lectern_storage::{BlobStore, StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// While `hidden` is set, `get` on a preview key reports `NotFound` even though
/// `exists` still sees the object, like a lagging replica.
pub struct LaggingStore {
    pub inner: Arc<dyn BlobStore>,
    pub hidden: Arc<AtomicBool>,
}

#[async_trait]
impl BlobStore for LaggingStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        self.inner.put(key, data, content_type).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        if self.hidden.load(Ordering::SeqCst) && key.starts_with("previews/") {
            return Err(StorageError::NotFound(key.to_string()));
        }
        self.inner.get(key).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn delete_by_prefix(&self, prefix: &str) -> StorageResult<usize> {
        self.inner.delete_by_prefix(prefix).await
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> StorageResult<Option<String>> {
        self.inner.presign_get(key, ttl).await
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }
}
