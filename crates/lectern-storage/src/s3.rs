use crate::keys::validate_key;
use crate::traits::{clamp_presign_ttl, BlobStore, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
    Result as ObjectResult,
};
use std::time::Duration;

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        // Credentials come from the environment; bucket and region are explicit.
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage { store, bucket })
    }

    fn location(key: &str) -> StorageResult<Path> {
        validate_key(key)?;
        Ok(Path::from(key.trim_end_matches('/').to_string()))
    }
}

#[async_trait]
impl BlobStore for S3Storage {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        let location = Self::location(key)?;
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        let result: ObjectResult<_> = self
            .store
            .put_opts(&location, PutPayload::from(data), options)
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 put failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 put successful"
        );

        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let start = std::time::Instant::now();
        let location = Self::location(key)?;

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 get failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 get successful"
        );

        Ok(bytes)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let location = Self::location(key)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let location = Self::location(key)?;
        match self.store.delete(&location).await {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, bucket = %self.bucket, key = %key, "S3 delete failed");
                Err(StorageError::DeleteFailed(e.to_string()))
            }
        }
    }

    async fn delete_by_prefix(&self, prefix: &str) -> StorageResult<usize> {
        let start = std::time::Instant::now();
        let location = Self::location(prefix)?;

        // Listing is segment-aware: `previews/ns/doc1` does not match `doc10`.
        let mut listing = self.store.list(Some(&location));
        let mut deleted = 0;
        while let Some(meta) = listing.next().await {
            let meta = meta.map_err(|e| StorageError::BackendError(e.to_string()))?;
            match self.store.delete(&meta.location).await {
                Ok(()) | Err(ObjectStoreError::NotFound { .. }) => deleted += 1,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        bucket = %self.bucket,
                        key = %meta.location,
                        "S3 delete failed"
                    );
                    return Err(StorageError::DeleteFailed(e.to_string()));
                }
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            prefix = %prefix,
            deleted,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 prefix delete successful"
        );

        Ok(deleted)
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> StorageResult<Option<String>> {
        let location = Self::location(key)?;
        let url_result: ObjectResult<_> = self
            .store
            .signed_url(Method::GET, &location, clamp_presign_ttl(ttl))
            .await;

        let url = url_result
            .map_err(|e| StorageError::BackendError(e.to_string()))?
            .to_string();

        Ok(Some(url))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
