//! Legacy store maintenance.

use axum::{extract::State, Json};
use lectern_core::models::{LegacyMapping, RekeyTally};
use lectern_core::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::middleware::RequestCtx;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct MigrateRequest {
    pub mappings: Vec<LegacyMapping>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MigrateResponse {
    pub success: bool,
    pub documents_ready: bool,
    pub audiobooks_ready: bool,
    pub documents_migrated: u64,
    pub audiobooks_migrated: u64,
    pub rekey: RekeyTally,
}

/// Move legacy-keyed directories onto their current ids, merging collisions.
///
/// Safe to re-run; a finished migration reports zero counts.
#[utoipa::path(
    post,
    path = "/api/v0/maintenance/migrate",
    tag = "maintenance",
    request_body = MigrateRequest,
    responses(
        (status = 200, description = "Migration finished", body = MigrateResponse),
        (status = 400, description = "Invalid mapping", body = ErrorResponse),
        (status = 401, description = "Session required", body = ErrorResponse),
        (status = 503, description = "Legacy store not configured", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, ctx, request), fields(mappings = request.mappings.len(), request.id = ?ctx.request_id, operation = "migrate_legacy"))]
pub async fn migrate_legacy(
    State(state): State<Arc<AppState>>,
    RequestCtx(ctx): RequestCtx,
    ValidatedJson(request): ValidatedJson<MigrateRequest>,
) -> Result<Json<MigrateResponse>, HttpAppError> {
    if state.config.auth_enabled() && ctx.user_id.is_none() {
        return Err(AppError::Unauthorized("A session is required".to_string()).into());
    }
    let merger = state.legacy()?;

    let report = merger.migrate(&request.mappings).await?;
    Ok(Json(MigrateResponse {
        success: true,
        documents_ready: report.documents.ready,
        audiobooks_ready: report.audiobooks.ready,
        documents_migrated: report.documents.tally.migrated(),
        audiobooks_migrated: report.audiobooks.tally.migrated(),
        rekey: report.rekey(),
    }))
}
