//! Service wiring

use anyhow::{Context, Result};
use lectern_core::Config;
use lectern_db::DocumentRepository;
use lectern_services::{
    ClaimTable, CommandConverter, DocumentResolver, GenerationQueue, GenerationWorker,
    LegacyMigrationMerger, PresignedDelivery, PreviewConverter, PreviewCoordinator,
    UnconfiguredConverter,
};
use lectern_storage::{BlobStore, KeyLayout};
use std::sync::Arc;

use crate::auth::SessionVerifier;
use crate::state::{AppState, ContextState, PreviewState};

/// Converter from `PREVIEW_COMMAND`, or one that fails every job when it is unset.
pub fn build_converter(config: &Config) -> Result<Arc<dyn PreviewConverter>> {
    match config.preview_command() {
        Some(command) => {
            let converter = CommandConverter::parse(command, config.preview_content_type())
                .context("Invalid PREVIEW_COMMAND")?;
            tracing::info!(command = command, "Preview converter configured");
            Ok(Arc::new(converter))
        }
        None => {
            tracing::warn!("PREVIEW_COMMAND not set, preview generation will fail until configured");
            Ok(Arc::new(UnconfiguredConverter::new(
                config.preview_content_type(),
            )))
        }
    }
}

/// Assemble the application state. Spawns the generation worker pool, so it must run
/// inside the tokio runtime.
pub fn initialize_services(
    config: &Config,
    repository: Arc<dyn DocumentRepository>,
    store: Option<Arc<dyn BlobStore>>,
    converter: Arc<dyn PreviewConverter>,
) -> Result<Arc<AppState>> {
    let resolver = DocumentResolver::new(
        repository,
        config.auth_enabled(),
        config.previewable_types().to_vec(),
    );

    let previews = store.map(|store| {
        let backend = store.backend_type();
        let claims = ClaimTable::new();
        let content_type = converter.content_type().to_string();
        let worker = Arc::new(GenerationWorker::new(
            store.clone(),
            converter,
            claims.clone(),
            config.preview_timeout(),
        ));
        let queue = GenerationQueue::start(
            worker,
            config.preview_queue_size(),
            config.preview_max_concurrent(),
        );
        let coordinator = PreviewCoordinator::new(
            store,
            queue,
            claims,
            KeyLayout::new(config.storage_key_prefix()),
            content_type,
            config.preview_retry_after(),
        );
        PreviewState {
            delivery: Arc::new(PresignedDelivery::new(
                Arc::new(coordinator),
                config.presign_ttl(),
            )),
            backend,
        }
    });

    let legacy = config.legacy_store_path().map(|root| {
        tracing::info!(root = root, "Legacy store migration enabled");
        Arc::new(LegacyMigrationMerger::new(root))
    });

    let sessions = if config.auth_enabled() {
        let secret = config
            .jwt_secret()
            .context("JWT_SECRET must be set when AUTH_ENABLED=true")?;
        Some(SessionVerifier::new(secret))
    } else {
        None
    };

    Ok(Arc::new(AppState {
        config: config.clone(),
        resolver,
        previews,
        legacy,
        context: ContextState {
            sessions,
            namespace_header_enabled: config.namespace_header_enabled(),
        },
    }))
}
