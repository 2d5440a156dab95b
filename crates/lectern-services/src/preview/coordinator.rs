//! Preview state machine.
//!
//! A preview's state is derived, never stored: the artifact blob existing means
//! `ready`; otherwise the claim table says whether a job is in flight. A document
//! version change yields a new blob key, so older versions simply stop being read.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use lectern_core::models::{DocumentIdentity, PreviewStatus};
use lectern_core::{AppError, Namespace};
use lectern_storage::{BlobStore, KeyLayout};

use super::claims::ClaimTable;
use super::queue::{GenerationJob, GenerationQueue};

/// Retry hint returned when a "ready" artifact turned out to be missing.
pub const MISSING_BLOB_RETRY_AFTER: Duration = Duration::from_millis(1500);

/// A preview that cannot be served yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPreview {
    pub status: PreviewStatus,
    pub retry_after: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    Ready { content_type: String },
    Pending(PendingPreview),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Ready { bytes: Bytes, content_type: String },
    Pending(PendingPreview),
}

pub struct PreviewCoordinator {
    store: Arc<dyn BlobStore>,
    queue: GenerationQueue,
    claims: ClaimTable,
    layout: KeyLayout,
    content_type: String,
    retry_after: Duration,
}

impl PreviewCoordinator {
    /// `claims` must be the table the queue's worker settles.
    pub fn new(
        store: Arc<dyn BlobStore>,
        queue: GenerationQueue,
        claims: ClaimTable,
        layout: KeyLayout,
        content_type: impl Into<String>,
        retry_after: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            claims,
            layout,
            content_type: content_type.into(),
            retry_after,
        }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub fn blob_key(&self, identity: &DocumentIdentity) -> String {
        self.layout
            .preview_key(identity.namespace_str(), &identity.id, identity.version)
    }

    /// Report whether the preview exists, enqueueing generation when it doesn't.
    ///
    /// At most one job per blob key is in flight; concurrent callers for a claimed
    /// key get `queued` without a second enqueue.
    #[tracing::instrument(skip(self, identity), fields(document.id = %identity.id, version = identity.version))]
    pub async fn ensure(&self, identity: &DocumentIdentity) -> Result<EnsureOutcome, AppError> {
        let key = self.blob_key(identity);

        // A visible blob may still have a claim: the worker settles it after the
        // put, and a healing job can be in flight. Only the worker removes it.
        if self.store.exists(&key).await? {
            return Ok(EnsureOutcome::Ready {
                content_type: self.content_type.clone(),
            });
        }

        Ok(EnsureOutcome::Pending(
            self.enqueue(identity, key, self.retry_after).await,
        ))
    }

    /// Read the artifact bytes, healing a missing blob into a fresh generation.
    ///
    /// A blob reported ready that then reads as missing (eventual consistency or an
    /// external delete) is re-enqueued and answered as `queued`, never as an error.
    #[tracing::instrument(skip(self, identity), fields(document.id = %identity.id, version = identity.version))]
    pub async fn fetch(&self, identity: &DocumentIdentity) -> Result<FetchOutcome, AppError> {
        let content_type = match self.ensure(identity).await? {
            EnsureOutcome::Ready { content_type } => content_type,
            EnsureOutcome::Pending(pending) => return Ok(FetchOutcome::Pending(pending)),
        };

        let key = self.blob_key(identity);
        match self.store.get(&key).await {
            Ok(bytes) => Ok(FetchOutcome::Ready {
                bytes,
                content_type,
            }),
            Err(e) if e.is_not_found() => {
                tracing::warn!(blob_key = %key, "Preview reported ready but blob is missing, regenerating");
                self.enqueue(identity, key, MISSING_BLOB_RETRY_AFTER).await;
                Ok(FetchOutcome::Pending(PendingPreview {
                    status: PreviewStatus::Queued,
                    retry_after: MISSING_BLOB_RETRY_AFTER,
                }))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every preview version of one document.
    #[tracing::instrument(skip(self, identity), fields(document.id = %identity.id))]
    pub async fn purge_document(&self, identity: &DocumentIdentity) -> Result<usize, AppError> {
        let prefix = self
            .layout
            .document_prefix(identity.namespace_str(), &identity.id);
        self.purge_prefix(&prefix).await
    }

    /// Delete every preview in a namespace.
    #[tracing::instrument(skip(self))]
    pub async fn purge_namespace(&self, namespace: &Namespace) -> Result<usize, AppError> {
        let prefix = self.layout.namespace_prefix(namespace.as_str());
        self.purge_prefix(&prefix).await
    }

    async fn purge_prefix(&self, prefix: &str) -> Result<usize, AppError> {
        // In-flight jobs keep their claim so no second job starts for the key;
        // their output is dropped when they finish.
        let cancelled = self.claims.cancel_prefix(prefix).await;
        let deleted = self.store.delete_by_prefix(prefix).await?;
        tracing::info!(prefix = %prefix, deleted, cancelled_jobs = cancelled, "Purged previews");
        Ok(deleted)
    }

    async fn enqueue(
        &self,
        identity: &DocumentIdentity,
        key: String,
        retry_after: Duration,
    ) -> PendingPreview {
        if !self.claims.try_claim(&key).await {
            return PendingPreview {
                status: PreviewStatus::Queued,
                retry_after,
            };
        }

        let job = GenerationJob {
            document_id: identity.id.clone(),
            document_type: identity.document_type,
            source_key: self.layout.source_key(&identity.source_key),
            blob_key: key.clone(),
        };

        match self.queue.submit(job) {
            Ok(()) => PendingPreview {
                status: PreviewStatus::Queued,
                retry_after,
            },
            Err(e) => {
                tracing::warn!(blob_key = %key, error = %e, "Could not enqueue preview generation");
                self.claims.release(&key).await;
                PendingPreview {
                    status: PreviewStatus::Error,
                    retry_after,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::{ClaimState, ConversionError, GenerationWorker, PreviewConverter};
    use async_trait::async_trait;
    use lectern_core::models::DocumentType;
    use lectern_storage::{LocalStorage, StorageBackend, StorageError, StorageResult};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// Reads report missing while `hidden` is set; existence checks still succeed.
    struct HidingStore {
        inner: Arc<dyn BlobStore>,
        hidden: Arc<AtomicBool>,
    }

    #[async_trait]
    impl BlobStore for HidingStore {
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

    /// Counts conversions and blocks each one until a permit is released.
    struct GatedConverter {
        calls: AtomicUsize,
        gate: Semaphore,
        fail: bool,
    }

    impl GatedConverter {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Semaphore::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl PreviewConverter for GatedConverter {
        fn content_type(&self) -> &str {
            "image/png"
        }

        async fn convert(
            &self,
            _document_type: DocumentType,
            input: Bytes,
        ) -> Result<Bytes, ConversionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let permit = self.gate.acquire().await.map_err(|e| ConversionError::Failed(e.to_string()))?;
            permit.forget();
            if self.fail {
                return Err(ConversionError::Failed("boom".to_string()));
            }
            let mut out = b"png:".to_vec();
            out.extend_from_slice(&input);
            Ok(Bytes::from(out))
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<dyn BlobStore>,
        claims: ClaimTable,
        converter: Arc<GatedConverter>,
        coordinator: PreviewCoordinator,
    }

    async fn fixture(fail: bool, queue_size: usize) -> Fixture {
        fixture_with(fail, queue_size, |store| store).await
    }

    async fn fixture_with<F>(fail: bool, queue_size: usize, wrap: F) -> Fixture
    where
        F: FnOnce(Arc<dyn BlobStore>) -> Arc<dyn BlobStore>,
    {
        let dir = tempfile::tempdir().unwrap();
        let local: Arc<dyn BlobStore> =
            Arc::new(LocalStorage::new(dir.path(), None).await.unwrap());
        let store = wrap(local);
        store
            .put("uploads/doc1.pdf", Bytes::from_static(b"%PDF"), "application/pdf")
            .await
            .unwrap();

        let claims = ClaimTable::new();
        let converter = GatedConverter::new(fail);
        let worker = Arc::new(GenerationWorker::new(
            store.clone(),
            converter.clone(),
            claims.clone(),
            Duration::from_secs(5),
        ));
        let queue = GenerationQueue::start(worker, queue_size, 2);
        let coordinator = PreviewCoordinator::new(
            store.clone(),
            queue,
            claims.clone(),
            KeyLayout::default(),
            "image/png",
            Duration::from_millis(1500),
        );
        Fixture {
            _dir: dir,
            store,
            claims,
            converter,
            coordinator,
        }
    }

    fn identity(version: i64) -> DocumentIdentity {
        DocumentIdentity {
            id: "doc1".to_string(),
            owner_user_id: None,
            namespace: None,
            document_type: DocumentType::Pdf,
            version,
            source_key: "uploads/doc1.pdf".to_string(),
        }
    }

    async fn wait_until_settled(claims: &ClaimTable, key: &str, expect_failed: bool) {
        for _ in 0..200 {
            let state = claims.state(key).await;
            let settled = if expect_failed {
                state == Some(ClaimState::Failed)
            } else {
                state.is_none()
            };
            if settled {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job for {} never settled", key);
    }

    fn queued() -> EnsureOutcome {
        EnsureOutcome::Pending(PendingPreview {
            status: PreviewStatus::Queued,
            retry_after: Duration::from_millis(1500),
        })
    }

    #[tokio::test]
    async fn test_first_ensure_queues_then_ready() {
        let f = fixture(false, 16).await;
        let doc = identity(1000);

        assert_eq!(f.coordinator.ensure(&doc).await.unwrap(), queued());

        f.converter.gate.add_permits(1);
        wait_until_settled(&f.claims, "previews/_/doc1/1000", false).await;

        assert_eq!(
            f.coordinator.ensure(&doc).await.unwrap(),
            EnsureOutcome::Ready {
                content_type: "image/png".to_string()
            }
        );
        match f.coordinator.fetch(&doc).await.unwrap() {
            FetchOutcome::Ready { bytes, content_type } => {
                assert_eq!(bytes, Bytes::from_static(b"png:%PDF"));
                assert_eq!(content_type, "image/png");
            }
            other => panic!("expected ready, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_ensure_enqueues_once() {
        let f = Arc::new(fixture(false, 16).await);
        let doc = identity(1000);

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let f = f.clone();
                let doc = doc.clone();
                tokio::spawn(async move { f.coordinator.ensure(&doc).await.unwrap() })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), queued());
        }

        // Give the worker time to pick the job up, then confirm nothing else arrived.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(f.converter.calls.load(Ordering::SeqCst), 1);

        f.converter.gate.add_permits(1);
        wait_until_settled(&f.claims, "previews/_/doc1/1000", false).await;
        assert_eq!(f.converter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_version_change_is_a_fresh_record() {
        let f = fixture(false, 16).await;
        f.converter.gate.add_permits(1);
        f.coordinator.ensure(&identity(1000)).await.unwrap();
        wait_until_settled(&f.claims, "previews/_/doc1/1000", false).await;

        assert_eq!(f.coordinator.ensure(&identity(2000)).await.unwrap(), queued());
        assert!(f.store.exists("previews/_/doc1/1000").await.unwrap());
    }

    #[tokio::test]
    async fn test_failure_collapses_to_retry() {
        let f = fixture(true, 16).await;
        let doc = identity(1000);

        assert_eq!(f.coordinator.ensure(&doc).await.unwrap(), queued());
        f.converter.gate.add_permits(1);
        wait_until_settled(&f.claims, "previews/_/doc1/1000", true).await;

        // The failed claim is taken again and a second job is enqueued.
        assert_eq!(f.coordinator.ensure(&doc).await.unwrap(), queued());
        f.converter.gate.add_permits(1);
        wait_until_settled(&f.claims, "previews/_/doc1/1000", true).await;
        assert_eq!(f.converter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_full_queue_reports_error_and_releases_claim() {
        let f = fixture(false, 1).await;

        // Occupy the pool and the single queue slot with other documents.
        for version in [1, 2, 3] {
            f.coordinator.ensure(&identity(version)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let mut saw_error = false;
        for version in 4..10 {
            if let EnsureOutcome::Pending(pending) =
                f.coordinator.ensure(&identity(version)).await.unwrap()
            {
                if pending.status == PreviewStatus::Error {
                    saw_error = true;
                    let key = format!("previews/_/doc1/{}", version);
                    assert_eq!(f.claims.state(&key).await, None);
                    break;
                }
            }
        }
        assert!(saw_error);
        f.converter.gate.add_permits(100);
    }

    #[tokio::test]
    async fn test_fetch_heals_missing_blob() {
        let hidden = Arc::new(AtomicBool::new(false));
        let f = fixture_with(false, 16, {
            let hidden = hidden.clone();
            move |inner| Arc::new(HidingStore { inner, hidden }) as Arc<dyn BlobStore>
        })
        .await;
        let doc = identity(1000);
        let key = "previews/_/doc1/1000";

        f.store
            .put(key, Bytes::from_static(b"stale"), "image/png")
            .await
            .unwrap();

        // The existence check still sees the blob but the read reports it missing.
        hidden.store(true, Ordering::SeqCst);
        let outcome = f.coordinator.fetch(&doc).await.unwrap();
        assert_eq!(
            outcome,
            FetchOutcome::Pending(PendingPreview {
                status: PreviewStatus::Queued,
                retry_after: MISSING_BLOB_RETRY_AFTER,
            })
        );
        assert_eq!(f.claims.state(key).await, Some(ClaimState::Queued));

        hidden.store(false, Ordering::SeqCst);
        f.converter.gate.add_permits(1);
        wait_until_settled(&f.claims, key, false).await;
        match f.coordinator.fetch(&doc).await.unwrap() {
            FetchOutcome::Ready { bytes, .. } => assert_eq!(bytes, Bytes::from_static(b"png:%PDF")),
            other => panic!("expected ready, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_repeated_fetch_of_missing_blob_converts_once() {
        let hidden = Arc::new(AtomicBool::new(true));
        let f = fixture_with(false, 16, {
            let hidden = hidden.clone();
            move |inner| Arc::new(HidingStore { inner, hidden }) as Arc<dyn BlobStore>
        })
        .await;
        let doc = identity(1000);
        let key = "previews/_/doc1/1000";
        f.store
            .put(key, Bytes::from_static(b"stale"), "image/png")
            .await
            .unwrap();

        for _ in 0..3 {
            assert!(matches!(
                f.coordinator.fetch(&doc).await.unwrap(),
                FetchOutcome::Pending(PendingPreview {
                    status: PreviewStatus::Queued,
                    ..
                })
            ));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(f.converter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.claims.state(key).await, Some(ClaimState::Queued));

        hidden.store(false, Ordering::SeqCst);
        f.converter.gate.add_permits(1);
        wait_until_settled(&f.claims, key, false).await;
        assert_eq!(f.converter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_purge_during_generation_discards_output() {
        let f = fixture(false, 16).await;
        let doc = identity(1000);
        let key = "previews/_/doc1/1000";

        assert_eq!(f.coordinator.ensure(&doc).await.unwrap(), queued());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(f.converter.calls.load(Ordering::SeqCst), 1);

        f.coordinator.purge_document(&doc).await.unwrap();
        assert_eq!(f.claims.state(key).await, Some(ClaimState::Cancelled));

        // The running job still holds the key.
        assert_eq!(f.coordinator.ensure(&doc).await.unwrap(), queued());

        f.converter.gate.add_permits(1);
        wait_until_settled(&f.claims, key, false).await;
        assert_eq!(f.converter.calls.load(Ordering::SeqCst), 1);
        assert!(!f.store.exists(key).await.unwrap());

        // Once settled, the next ensure regenerates.
        assert_eq!(f.coordinator.ensure(&doc).await.unwrap(), queued());
        f.converter.gate.add_permits(1);
        wait_until_settled(&f.claims, key, false).await;
        assert_eq!(f.converter.calls.load(Ordering::SeqCst), 2);
        assert!(f.store.exists(key).await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_document_removes_all_versions() {
        let f = fixture(false, 16).await;
        for version in [1, 2] {
            f.store
                .put(
                    &format!("previews/_/doc1/{}", version),
                    Bytes::from_static(b"x"),
                    "image/png",
                )
                .await
                .unwrap();
        }
        assert_eq!(f.coordinator.purge_document(&identity(2)).await.unwrap(), 2);
        assert!(!f.store.exists("previews/_/doc1/1").await.unwrap());
        assert!(f.store.exists("uploads/doc1.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_namespace() {
        let f = fixture(false, 16).await;
        f.store
            .put("previews/run-a/doc1/1", Bytes::from_static(b"x"), "image/png")
            .await
            .unwrap();
        f.store
            .put("previews/_/doc1/1", Bytes::from_static(b"x"), "image/png")
            .await
            .unwrap();

        let ns = Namespace::parse("run-a").unwrap();
        assert_eq!(f.coordinator.purge_namespace(&ns).await.unwrap(), 1);
        assert!(f.store.exists("previews/_/doc1/1").await.unwrap());
    }
}
