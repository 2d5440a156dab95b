//! Fake preview converter that records how often it ran.

use async_trait::async_trait;
use bytes::Bytes;
use lectern_core::models::DocumentType;
use lectern_services::{ConversionError, PreviewConverter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const ARTIFACT_PREFIX: &[u8] = b"PNG:";

#[derive(Clone, Default)]
pub struct CountingConverter {
    calls: Arc<AtomicUsize>,
    /// When set, each conversion waits for one permit.
    gate: Option<Arc<Semaphore>>,
}

impl CountingConverter {
    pub fn gated() -> Self {
        Self {
            calls: Arc::default(),
            gate: Some(Arc::new(Semaphore::new(0))),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Let `n` more conversions finish.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }
}

#[async_trait]
impl PreviewConverter for CountingConverter {
    fn content_type(&self) -> &str {
        "image/png"
    }

    async fn convert(
        &self,
        _document_type: DocumentType,
        input: Bytes,
    ) -> Result<Bytes, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| ConversionError::Failed(e.to_string()))?
                .forget();
        }
        let mut artifact = ARTIFACT_PREFIX.to_vec();
        artifact.extend_from_slice(&input);
        Ok(Bytes::from(artifact))
    }

    fn name(&self) -> &str {
        "counting"
    }
}
