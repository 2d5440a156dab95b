//! Preview ensure / presign / fallback / delete handlers.
//!
//! Storage availability is checked before the document is resolved, so a service
//! without a blob store answers 503 without touching the repository.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use lectern_core::models::{DocumentIdentity, PreviewStatus};
use lectern_services::{Delivery, EnsureOutcome, PendingPreview, StreamDelivery};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::constants::API_PREFIX;
use crate::error::{ErrorResponse, HttpAppError};
use crate::middleware::RequestCtx;
use crate::state::AppState;

const NO_STORE: [(header::HeaderName, &str); 1] = [(header::CACHE_CONTROL, "no-store")];

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PreviewQuery {
    /// Document id
    #[serde(default)]
    pub id: String,
}

/// Body of every not-yet-ready preview response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendingPreviewResponse {
    pub status: PreviewStatus,
    pub retry_after_ms: u64,
    pub presign_url: String,
    pub fallback_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadyPreviewResponse {
    pub status: PreviewStatus,
    pub content_type: String,
    pub presign_url: String,
    pub fallback_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedResponse {
    pub deleted: usize,
}

fn presign_url(id: &str) -> String {
    format!("{}/preview/presign?id={}", API_PREFIX, id)
}

fn fallback_url(id: &str) -> String {
    format!("{}/preview/fallback?id={}", API_PREFIX, id)
}

fn pending_response(identity: &DocumentIdentity, pending: PendingPreview) -> Response {
    let body = PendingPreviewResponse {
        status: pending.status,
        retry_after_ms: u64::try_from(pending.retry_after.as_millis()).unwrap_or(u64::MAX),
        presign_url: presign_url(&identity.id),
        fallback_url: fallback_url(&identity.id),
    };
    (StatusCode::ACCEPTED, NO_STORE, Json(body)).into_response()
}

#[utoipa::path(
    get,
    path = "/api/v0/preview/ensure",
    tag = "previews",
    params(PreviewQuery),
    responses(
        (status = 200, description = "Preview is ready", body = ReadyPreviewResponse),
        (status = 202, description = "Preview is being generated", body = PendingPreviewResponse),
        (status = 400, description = "Invalid document id", body = ErrorResponse),
        (status = 401, description = "Session required", body = ErrorResponse),
        (status = 404, description = "Document not found", body = ErrorResponse),
        (status = 415, description = "Document type has no preview", body = ErrorResponse),
        (status = 503, description = "Storage not configured", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, ctx), fields(document.id = %query.id, request.id = ?ctx.request_id, operation = "ensure_preview"))]
pub async fn ensure_preview(
    State(state): State<Arc<AppState>>,
    RequestCtx(ctx): RequestCtx,
    Query(query): Query<PreviewQuery>,
) -> Result<Response, HttpAppError> {
    let previews = state.previews()?;
    let identity = state.resolver.resolve(&query.id, &ctx).await?;

    let report = previews.delivery.status(&identity).await?;
    Ok(match report.outcome {
        EnsureOutcome::Pending(pending) => pending_response(&identity, pending),
        EnsureOutcome::Ready { content_type } => {
            let body = ReadyPreviewResponse {
                status: PreviewStatus::Ready,
                content_type,
                presign_url: presign_url(&identity.id),
                fallback_url: fallback_url(&identity.id),
                direct_url: report.direct_url,
            };
            (StatusCode::OK, NO_STORE, Json(body)).into_response()
        }
    })
}

#[utoipa::path(
    get,
    path = "/api/v0/preview/presign",
    tag = "previews",
    params(PreviewQuery),
    responses(
        (status = 202, description = "Preview is being generated", body = PendingPreviewResponse),
        (status = 307, description = "Redirect to a short-lived direct URL, or to the fallback endpoint"),
        (status = 404, description = "Document not found", body = ErrorResponse),
        (status = 503, description = "Storage not configured", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, ctx), fields(document.id = %query.id, request.id = ?ctx.request_id, operation = "presign_preview"))]
pub async fn presign_preview(
    State(state): State<Arc<AppState>>,
    RequestCtx(ctx): RequestCtx,
    Query(query): Query<PreviewQuery>,
) -> Result<Response, HttpAppError> {
    let previews = state.previews()?;
    let identity = state.resolver.resolve(&query.id, &ctx).await?;

    Ok(match previews.delivery.deliver(&identity).await? {
        Delivery::Pending(pending) => pending_response(&identity, pending),
        Delivery::Redirect { url } => (NO_STORE, Redirect::temporary(&url)).into_response(),
        Delivery::Fallback => {
            tracing::debug!(document_id = %identity.id, "No direct URL, redirecting to fallback");
            (NO_STORE, Redirect::temporary(&fallback_url(&identity.id))).into_response()
        }
    })
}

#[utoipa::path(
    get,
    path = "/api/v0/preview/fallback",
    tag = "previews",
    params(PreviewQuery),
    responses(
        (status = 200, description = "Preview bytes", body = Vec<u8>, content_type = "image/png"),
        (status = 202, description = "Preview is being generated", body = PendingPreviewResponse),
        (status = 404, description = "Document not found", body = ErrorResponse),
        (status = 503, description = "Storage not configured", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, ctx), fields(document.id = %query.id, request.id = ?ctx.request_id, operation = "stream_preview"))]
pub async fn fallback_preview(
    State(state): State<Arc<AppState>>,
    RequestCtx(ctx): RequestCtx,
    Query(query): Query<PreviewQuery>,
) -> Result<Response, HttpAppError> {
    let previews = state.previews()?;
    let identity = state.resolver.resolve(&query.id, &ctx).await?;

    Ok(match previews.delivery.stream(&identity).await? {
        StreamDelivery::Pending(pending) => pending_response(&identity, pending),
        StreamDelivery::Bytes {
            bytes,
            content_type,
        } => {
            let headers = [
                (header::CONTENT_TYPE, content_type),
                (header::CONTENT_LENGTH, bytes.len().to_string()),
                (header::CACHE_CONTROL, "no-store".to_string()),
            ];
            (StatusCode::OK, headers, bytes).into_response()
        }
    })
}

#[utoipa::path(
    delete,
    path = "/api/v0/preview",
    tag = "previews",
    params(PreviewQuery),
    responses(
        (status = 200, description = "Preview blobs removed", body = DeletedResponse),
        (status = 404, description = "Document not found", body = ErrorResponse),
        (status = 503, description = "Storage not configured", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, ctx), fields(document.id = %query.id, request.id = ?ctx.request_id, operation = "delete_previews"))]
pub async fn delete_previews(
    State(state): State<Arc<AppState>>,
    RequestCtx(ctx): RequestCtx,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<DeletedResponse>, HttpAppError> {
    let previews = state.previews()?;
    let identity = state.resolver.resolve_owned(&query.id, &ctx).await?;

    let deleted = previews
        .delivery
        .coordinator()
        .purge_document(&identity)
        .await?;
    tracing::info!(document_id = %identity.id, deleted, "Preview blobs purged");

    Ok(Json(DeletedResponse { deleted }))
}
