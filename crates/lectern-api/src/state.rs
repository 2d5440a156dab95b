//! Application state shared by every handler.

use lectern_core::{AppError, Config, StorageBackend};
use lectern_services::{DocumentResolver, LegacyMigrationMerger, PresignedDelivery};
use std::sync::Arc;

use crate::auth::SessionVerifier;

/// Preview pipeline; only present when a blob store is configured.
#[derive(Clone)]
pub struct PreviewState {
    pub delivery: Arc<PresignedDelivery>,
    pub backend: StorageBackend,
}

/// How the request context is derived from headers.
#[derive(Clone)]
pub struct ContextState {
    /// Set when authentication is enabled.
    pub sessions: Option<SessionVerifier>,
    pub namespace_header_enabled: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub resolver: DocumentResolver,
    pub previews: Option<PreviewState>,
    pub legacy: Option<Arc<LegacyMigrationMerger>>,
    pub context: ContextState,
}

impl AppState {
    /// The preview pipeline, or 503 when storage is not configured.
    pub fn previews(&self) -> Result<&PreviewState, AppError> {
        self.previews.as_ref().ok_or_else(|| {
            AppError::StorageUnavailable("No storage backend is configured".to_string())
        })
    }

    pub fn legacy(&self) -> Result<&LegacyMigrationMerger, AppError> {
        self.legacy.as_deref().ok_or_else(|| {
            AppError::LegacyStoreUnavailable("LEGACY_STORE_PATH is not set".to_string())
        })
    }
}
