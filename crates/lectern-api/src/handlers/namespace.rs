use axum::{extract::State, Json};
use lectern_core::AppError;
use std::sync::Arc;

use super::preview::DeletedResponse;
use crate::error::{ErrorResponse, HttpAppError};
use crate::middleware::RequestCtx;
use crate::state::AppState;

/// Drop every preview blob stored under the caller's namespace.
#[utoipa::path(
    delete,
    path = "/api/v0/namespace/previews",
    tag = "previews",
    params(
        ("X-Lectern-Namespace" = String, Header, description = "Namespace to purge")
    ),
    responses(
        (status = 200, description = "Namespace previews removed", body = DeletedResponse),
        (status = 400, description = "Namespace header missing or invalid", body = ErrorResponse),
        (status = 401, description = "Session required", body = ErrorResponse),
        (status = 503, description = "Storage not configured", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, ctx), fields(namespace = ?ctx.namespace_str(), request.id = ?ctx.request_id, operation = "purge_namespace"))]
pub async fn purge_namespace_previews(
    State(state): State<Arc<AppState>>,
    RequestCtx(ctx): RequestCtx,
) -> Result<Json<DeletedResponse>, HttpAppError> {
    if state.config.auth_enabled() && ctx.user_id.is_none() {
        return Err(AppError::Unauthorized("A session is required".to_string()).into());
    }
    let namespace = ctx.namespace.as_ref().ok_or_else(|| {
        AppError::InvalidNamespace("The X-Lectern-Namespace header is required".to_string())
    })?;
    let previews = state.previews()?;

    let deleted = previews
        .delivery
        .coordinator()
        .purge_namespace(namespace)
        .await?;
    tracing::info!(namespace = %namespace, deleted, "Namespace previews purged");

    Ok(Json(DeletedResponse { deleted }))
}
