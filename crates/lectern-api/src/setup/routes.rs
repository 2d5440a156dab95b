//! Route configuration and setup

use crate::api_doc::ApiDoc;
use crate::constants::{API_PREFIX, MAX_BODY_BYTES};
use crate::error::init_error_rendering;
use crate::handlers;
use crate::middleware::{context_middleware, request_id_middleware};
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::{delete, get, post},
    Json, Router,
};
use lectern_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;
    init_error_rendering(config);

    let http_concurrency_limit = config.http_concurrency_limit();
    tracing::info!(
        http_concurrency_limit = http_concurrency_limit,
        "HTTP concurrency limit layer enabled"
    );

    let app = public_routes()
        .merge(context_routes(state.clone()))
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}

/// Routes that need no request context.
fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/health", API_PREFIX),
            get(handlers::health::health_check),
        )
        .route(
            "/api/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
}

/// Routes that read the session and namespace from the request context.
fn context_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/preview/ensure", API_PREFIX),
            get(handlers::preview::ensure_preview),
        )
        .route(
            &format!("{}/preview/presign", API_PREFIX),
            get(handlers::preview::presign_preview),
        )
        .route(
            &format!("{}/preview/fallback", API_PREFIX),
            get(handlers::preview::fallback_preview),
        )
        .route(
            &format!("{}/preview", API_PREFIX),
            delete(handlers::preview::delete_previews),
        )
        .route(
            &format!("{}/namespace/previews", API_PREFIX),
            delete(handlers::namespace::purge_namespace_previews),
        )
        .route(
            &format!("{}/maintenance/migrate", API_PREFIX),
            post(handlers::maintenance::migrate_legacy),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.context.clone(),
            context_middleware,
        ))
}
