use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// `s3`, `local`, or `not_configured`
    pub storage: String,
    pub storage_configured: bool,
    pub legacy_store_configured: bool,
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/api/v0/health",
    tag = "health",
    responses((status = 200, description = "Service is running", body = HealthResponse))
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let storage = state
        .previews
        .as_ref()
        .map(|p| p.backend.to_string())
        .unwrap_or_else(|| "not_configured".to_string());

    Json(HealthResponse {
        status: "ok".to_string(),
        storage,
        storage_configured: state.previews.is_some(),
        legacy_store_configured: state.legacy.is_some(),
    })
}
