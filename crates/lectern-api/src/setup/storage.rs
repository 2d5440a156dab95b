//! Storage setup

use anyhow::{Context, Result};
use lectern_core::Config;
use lectern_storage::{create_blob_store, BlobStore};
use std::sync::Arc;

/// `None` when no backend is configured; preview routes then answer 503.
pub async fn setup_storage(config: &Config) -> Result<Option<Arc<dyn BlobStore>>> {
    let store = create_blob_store(config)
        .await
        .context("Failed to initialize storage")?;

    match &store {
        Some(store) => tracing::info!(
            backend = %store.backend_type(),
            key_prefix = config.storage_key_prefix(),
            "Storage initialized successfully"
        ),
        None => tracing::warn!("STORAGE_BACKEND not set, preview endpoints will return 503"),
    }

    Ok(store)
}
