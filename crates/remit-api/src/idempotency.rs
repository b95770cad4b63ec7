//! Idempotency middleware for client-retried mutations.
//!
//! On a request bearing an `Idempotency-Key`, the cached response for
//! (key, route) is replayed verbatim and all downstream processing is
//! skipped. Otherwise the handler runs and its first response is persisted
//! in a spawned fire-and-forget task: the response has already been sent,
//! so a persistence failure is logged, never surfaced.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, Response as HttpResponse, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use remit_ledger::StoredResponse;

use crate::server::AppState;

/// Upper bound on cached response bodies.
const MAX_CACHED_BODY_BYTES: usize = 256 * 1024;

/// Axum middleware wiring the idempotency store into a route.
pub async fn idempotency_middleware(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(key) = req
        .headers()
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return next.run(req).await;
    };

    let route = format!("{}:{}", req.method(), req.uri().path());

    match state.idempotency.lookup(&key, &route).await {
        Ok(Some(cached)) => {
            tracing::info!(key = %key, route = %route, "Returning cached idempotent response");
            return replay(&cached);
        }
        Ok(None) => {}
        Err(err) => {
            // A failed lookup never blocks the request.
            tracing::error!(key = %key, route = %route, error = %err, "Idempotency lookup failed");
            return next.run(req).await;
        }
    }

    let response = next.run(req).await;
    cache_response(state, key, route, response).await
}

/// Rebuilds the original response byte-for-byte from the cached record.
fn replay(cached: &StoredResponse) -> Response {
    let status = StatusCode::from_u16(cached.status_code).unwrap_or(StatusCode::OK);
    HttpResponse::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(cached.body.clone()))
        .map_or_else(
            |_| crate::error::ApiError::internal("cached response rebuild failed").into_response(),
            |response| response,
        )
}

/// Buffers the response, schedules the cache write, and rebuilds the
/// response for the client.
async fn cache_response(
    state: Arc<AppState>,
    key: String,
    route: String,
    response: Response,
) -> Response {
    let (parts, body) = response.into_parts();

    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(key = %key, error = %err, "Failed to buffer response for idempotency cache");
            return crate::error::ApiError::internal("response buffering failed").into_response();
        }
    };

    let is_json = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    if is_json {
        if let Ok(body_text) = std::str::from_utf8(&bytes) {
            let status = parts.status.as_u16();
            let body_text = body_text.to_string();
            let store = Arc::clone(&state.idempotency);
            tokio::spawn(async move {
                if let Err(err) = store.store(&key, &route, status, body_text).await {
                    tracing::warn!(key = %key, route = %route, error = %err, "Failed to cache idempotent response");
                }
            });
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}
