use std::sync::Arc;
use std::time::Duration;

use lectern_core::models::DocumentType;
use lectern_storage::BlobStore;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};

use super::claims::ClaimTable;
use super::converter::PreviewConverter;

/// One preview to render.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub document_id: String,
    pub document_type: DocumentType,
    /// Where the uploaded document lives.
    pub source_key: String,
    /// Where the artifact goes; also the claim key.
    pub blob_key: String,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Preview generation queue is full")]
    Full,

    #[error("Preview generation queue is closed")]
    Closed,
}

/// Renders and stores previews, then settles their claims.
pub struct GenerationWorker {
    store: Arc<dyn BlobStore>,
    converter: Arc<dyn PreviewConverter>,
    claims: ClaimTable,
    timeout: Duration,
}

impl GenerationWorker {
    pub fn new(
        store: Arc<dyn BlobStore>,
        converter: Arc<dyn PreviewConverter>,
        claims: ClaimTable,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            converter,
            claims,
            timeout,
        }
    }

    /// Run one job to completion. The claim is settled on success and marked
    /// failed otherwise. An artifact whose key was purged mid-job is deleted again.
    #[tracing::instrument(skip(self, job), fields(document.id = %job.document_id, blob.key = %job.blob_key, job.status = tracing::field::Empty))]
    pub async fn process(&self, job: GenerationJob) {
        let start = std::time::Instant::now();

        match self.render(&job).await {
            Ok(size) => {
                if !self.claims.settle(&job.blob_key).await {
                    tracing::Span::current().record("job.status", "cancelled");
                    self.discard(&job).await;
                    self.claims.release(&job.blob_key).await;
                    return;
                }
                tracing::Span::current().record("job.status", "success");
                tracing::info!(
                    document_id = %job.document_id,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_millis(),
                    "Preview generated"
                );
            }
            Err(e) => {
                tracing::Span::current().record("job.status", "failed");
                self.claims.mark_failed(&job.blob_key).await;
                tracing::error!(
                    document_id = %job.document_id,
                    converter = self.converter.name(),
                    error = %e,
                    duration_ms = start.elapsed().as_millis(),
                    "Preview generation failed"
                );
            }
        }
    }

    async fn discard(&self, job: &GenerationJob) {
        match self.store.delete(&job.blob_key).await {
            Ok(()) => tracing::info!(
                document_id = %job.document_id,
                "Preview purged while generating, artifact discarded"
            ),
            Err(e) => tracing::error!(
                document_id = %job.document_id,
                error = %e,
                "Failed to discard artifact of purged preview"
            ),
        }
    }

    async fn render(&self, job: &GenerationJob) -> anyhow::Result<usize> {
        let source = self.store.get(&job.source_key).await?;

        let artifact = tokio::time::timeout(
            self.timeout,
            self.converter.convert(job.document_type, source),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Converter timed out after {:?}", self.timeout))??;

        let size = artifact.len();
        self.store
            .put(&job.blob_key, artifact, self.converter.content_type())
            .await?;
        Ok(size)
    }
}

/// Bounded background queue feeding a fixed-size worker pool.
///
/// Jobs run on spawned tasks, detached from whichever request enqueued them.
#[derive(Clone)]
pub struct GenerationQueue {
    tx: mpsc::Sender<GenerationJob>,
}

impl GenerationQueue {
    /// Create the queue and spawn its worker pool.
    ///
    /// # Arguments
    /// * `worker` - Renders each job
    /// * `queue_size` - Channel bound; `submit` fails when it is reached
    /// * `max_concurrent` - Maximum number of conversions running at once
    pub fn start(worker: Arc<GenerationWorker>, queue_size: usize, max_concurrent: usize) -> Self {
        let queue_size = queue_size.max(1);
        let max_concurrent = max_concurrent.max(1);
        let (tx, rx) = mpsc::channel(queue_size);

        tokio::spawn(async move {
            Self::worker_pool(rx, worker, max_concurrent).await;
        });

        tracing::info!(
            queue_size = queue_size,
            max_concurrent = max_concurrent,
            "Preview generation queue initialized with bounded channel"
        );

        Self { tx }
    }

    /// Enqueue without waiting.
    #[tracing::instrument(skip(self, job), fields(document.id = %job.document_id))]
    pub fn submit(&self, job: GenerationJob) -> Result<(), QueueError> {
        tracing::debug!(blob_key = %job.blob_key, "Enqueuing preview generation job");
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                tracing::warn!("Preview generation queue is full, rejecting job");
                QueueError::Full
            }
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    async fn worker_pool(
        mut rx: mpsc::Receiver<GenerationJob>,
        worker: Arc<GenerationWorker>,
        max_concurrent: usize,
    ) {
        let semaphore = Arc::new(Semaphore::new(max_concurrent));

        while let Some(job) = rx.recv().await {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let worker = worker.clone();

            tokio::spawn(async move {
                let _permit = permit;
                worker.process(job).await;
            });
        }

        tracing::info!("Preview generation queue closed");
    }
}
