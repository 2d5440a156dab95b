//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::handlers;
use lectern_core::models::{LegacyMapping, PreviewStatus, RekeyTally};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lectern Preview API",
        version = "0.1.0",
        description = "Document preview generation and delivery, plus legacy store maintenance. All endpoints are versioned under /api/v0/."
    ),
    paths(
        handlers::preview::ensure_preview,
        handlers::preview::presign_preview,
        handlers::preview::fallback_preview,
        handlers::preview::delete_previews,
        handlers::namespace::purge_namespace_previews,
        handlers::maintenance::migrate_legacy,
        handlers::health::health_check,
    ),
    components(schemas(
        ErrorResponse,
        PreviewStatus,
        LegacyMapping,
        RekeyTally,
        handlers::preview::PendingPreviewResponse,
        handlers::preview::ReadyPreviewResponse,
        handlers::preview::DeletedResponse,
        handlers::maintenance::MigrateRequest,
        handlers::maintenance::MigrateResponse,
        handlers::health::HealthResponse,
    )),
    tags(
        (name = "previews", description = "Preview generation and delivery"),
        (name = "maintenance", description = "Legacy store migration"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
