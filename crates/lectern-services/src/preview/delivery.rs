use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use lectern_core::models::DocumentIdentity;
use lectern_core::AppError;
use lectern_storage::clamp_presign_ttl;

use super::coordinator::{EnsureOutcome, FetchOutcome, PendingPreview, PreviewCoordinator};

/// Result of an ensure, with a direct URL when one could be issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewReport {
    pub outcome: EnsureOutcome,
    pub direct_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Short-lived direct URL from the blob store.
    Redirect { url: String },
    /// Ready, but no direct URL is available; serve through the streaming path.
    Fallback,
    Pending(PendingPreview),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamDelivery {
    Bytes { bytes: Bytes, content_type: String },
    Pending(PendingPreview),
}

/// Hands out presigned direct URLs for ready previews, falling back to streaming.
pub struct PresignedDelivery {
    coordinator: Arc<PreviewCoordinator>,
    ttl: Duration,
}

impl PresignedDelivery {
    pub fn new(coordinator: Arc<PreviewCoordinator>, ttl: Duration) -> Self {
        Self {
            coordinator,
            ttl: clamp_presign_ttl(ttl),
        }
    }

    pub fn coordinator(&self) -> &Arc<PreviewCoordinator> {
        &self.coordinator
    }

    pub async fn status(&self, identity: &DocumentIdentity) -> Result<PreviewReport, AppError> {
        let outcome = self.coordinator.ensure(identity).await?;
        let direct_url = match outcome {
            EnsureOutcome::Ready { .. } => self.presign(identity).await,
            EnsureOutcome::Pending(_) => None,
        };
        Ok(PreviewReport {
            outcome,
            direct_url,
        })
    }

    pub async fn deliver(&self, identity: &DocumentIdentity) -> Result<Delivery, AppError> {
        match self.coordinator.ensure(identity).await? {
            EnsureOutcome::Pending(pending) => Ok(Delivery::Pending(pending)),
            EnsureOutcome::Ready { .. } => Ok(match self.presign(identity).await {
                Some(url) => Delivery::Redirect { url },
                None => Delivery::Fallback,
            }),
        }
    }

    pub async fn stream(&self, identity: &DocumentIdentity) -> Result<StreamDelivery, AppError> {
        Ok(match self.coordinator.fetch(identity).await? {
            FetchOutcome::Ready {
                bytes,
                content_type,
            } => StreamDelivery::Bytes {
                bytes,
                content_type,
            },
            FetchOutcome::Pending(pending) => StreamDelivery::Pending(pending),
        })
    }

    /// Presign failures are not errors; the caller falls back to streaming.
    async fn presign(&self, identity: &DocumentIdentity) -> Option<String> {
        let key = self.coordinator.blob_key(identity);
        match self.coordinator.store().presign_get(&key, self.ttl).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(blob_key = %key, error = %e, "Presigning failed, using fallback");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::{ClaimTable, GenerationQueue, GenerationWorker, UnconfiguredConverter};
    use lectern_core::models::{DocumentType, PreviewStatus};
    use lectern_storage::{BlobStore, KeyLayout, LocalStorage};

    async fn delivery(dir: &std::path::Path, base_url: Option<&str>) -> PresignedDelivery {
        let store: Arc<dyn BlobStore> = Arc::new(
            LocalStorage::new(dir, base_url.map(String::from))
                .await
                .unwrap(),
        );
        let claims = ClaimTable::new();
        let worker = Arc::new(GenerationWorker::new(
            store.clone(),
            Arc::new(UnconfiguredConverter::new("image/png")),
            claims.clone(),
            Duration::from_secs(1),
        ));
        let coordinator = PreviewCoordinator::new(
            store,
            GenerationQueue::start(worker, 8, 1),
            claims,
            KeyLayout::default(),
            "image/png",
            Duration::from_millis(1500),
        );
        PresignedDelivery::new(Arc::new(coordinator), Duration::from_secs(300))
    }

    fn identity() -> DocumentIdentity {
        DocumentIdentity {
            id: "doc1".to_string(),
            owner_user_id: None,
            namespace: None,
            document_type: DocumentType::Pdf,
            version: 1000,
            source_key: "uploads/doc1.pdf".to_string(),
        }
    }

    async fn store_preview(delivery: &PresignedDelivery) {
        delivery
            .coordinator()
            .store()
            .put("previews/_/doc1/1000", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_pending_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let delivery = delivery(dir.path(), Some("http://cdn.test")).await;

        match delivery.deliver(&identity()).await.unwrap() {
            Delivery::Pending(pending) => {
                assert_eq!(pending.status, PreviewStatus::Queued);
                assert_eq!(pending.retry_after, Duration::from_millis(1500));
            }
            other => panic!("expected pending, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_redirect_when_presign_available() {
        let dir = tempfile::tempdir().unwrap();
        let delivery = delivery(dir.path(), Some("http://cdn.test")).await;
        store_preview(&delivery).await;

        assert_eq!(
            delivery.deliver(&identity()).await.unwrap(),
            Delivery::Redirect {
                url: "http://cdn.test/previews/_/doc1/1000".to_string()
            }
        );
        let report = delivery.status(&identity()).await.unwrap();
        assert_eq!(
            report.direct_url.as_deref(),
            Some("http://cdn.test/previews/_/doc1/1000")
        );
    }

    #[tokio::test]
    async fn test_fallback_and_stream_without_presign() {
        let dir = tempfile::tempdir().unwrap();
        let delivery = delivery(dir.path(), None).await;
        store_preview(&delivery).await;

        assert_eq!(delivery.deliver(&identity()).await.unwrap(), Delivery::Fallback);
        assert_eq!(
            delivery.stream(&identity()).await.unwrap(),
            StreamDelivery::Bytes {
                bytes: Bytes::from_static(b"png"),
                content_type: "image/png".to_string(),
            }
        );
        assert_eq!(delivery.status(&identity()).await.unwrap().direct_url, None);
    }
}
