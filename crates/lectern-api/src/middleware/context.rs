//! Builds the per-request [`RequestContext`] from headers, once.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use lectern_core::{AppError, Namespace, RequestContext};

use crate::auth::bearer_token;
use crate::constants::NAMESPACE_HEADER;
use crate::error::HttpAppError;
use crate::middleware::RequestId;
use crate::state::ContextState;

/// Extractor for the context inserted by [`context_middleware`].
#[derive(Debug, Clone)]
pub struct RequestCtx(pub RequestContext);

impl<S> FromRequestParts<S> for RequestCtx
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .map(RequestCtx)
            .ok_or_else(|| {
                HttpAppError(AppError::Internal(
                    "Request context missing; context middleware not installed".to_string(),
                ))
            })
    }
}

pub async fn context_middleware(
    State(state): State<ContextState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone());

    match build_context(&state, request.headers()) {
        Ok(ctx) => {
            let ctx = match request_id {
                Some(id) => ctx.with_request_id(id),
                None => ctx,
            };
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}

/// A missing token leaves the context anonymous; a malformed or invalid one is a 401.
fn build_context(state: &ContextState, headers: &HeaderMap) -> Result<RequestContext, AppError> {
    let mut ctx = RequestContext::anonymous();

    if let Some(verifier) = &state.sessions {
        if let Some(value) = headers.get(AUTHORIZATION) {
            let token = value
                .to_str()
                .ok()
                .and_then(bearer_token)
                .ok_or_else(|| {
                    AppError::Unauthorized("Expected a Bearer session token".to_string())
                })?;
            ctx = ctx.with_user(verifier.verify(token)?);
        }
    }

    if state.namespace_header_enabled {
        if let Some(value) = headers.get(NAMESPACE_HEADER) {
            let raw = value.to_str().map_err(|_| {
                AppError::InvalidNamespace("Namespace header is not valid text".to_string())
            })?;
            ctx = ctx.with_namespace(Namespace::parse(raw)?);
        }
    }

    Ok(ctx)
}
