//! Request context extraction and authentication middleware.
//!
//! In debug mode, identity is supplied via headers for local development.
//! In production mode, identity is extracted from a verified HS256 JWT
//! (`sub`, `email`, optional `name` and `role` claims).

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::header::HeaderName;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;
use ulid::Ulid;

use crate::error::ApiError;
use crate::server::AppState;

/// Header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request context derived from authentication and headers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Authenticated user identifier.
    pub user_id: String,
    /// Authenticated user email.
    pub email: String,
    /// Display name, when known.
    pub name: Option<String>,
    /// True when the user carries the admin role or is listed in the
    /// configured admin emails.
    pub is_admin: bool,
    /// Request ID for tracing/correlation.
    pub request_id: String,
    /// Optional idempotency key (safe retries).
    pub idempotency_key: Option<String>,
}

impl RequestContext {
    /// Returns the display name, falling back to the email.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }

    /// Rejects non-admin callers.
    ///
    /// # Errors
    ///
    /// Returns `403 FORBIDDEN` when the caller is not an admin.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin access required")
                .with_request_id(self.request_id.clone()))
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(existing) = parts.extensions.get::<Self>() {
            return Ok(existing.clone());
        }

        let headers = &parts.headers;
        let request_id =
            header_string(headers, "X-Request-Id").unwrap_or_else(|| Ulid::new().to_string());
        let idempotency_key = header_string(headers, "Idempotency-Key");

        let (user_id, email, name, role) = if state.config.debug {
            let user_id = header_string(headers, "X-User-Id").ok_or_else(|| {
                ApiError::unauthorized("missing X-User-Id header (debug mode)")
                    .with_request_id(request_id.clone())
            })?;
            let email = header_string(headers, "X-User-Email").ok_or_else(|| {
                ApiError::unauthorized("missing X-User-Email header (debug mode)")
                    .with_request_id(request_id.clone())
            })?;
            let name = header_string(headers, "X-User-Name");
            let role = header_string(headers, "X-User-Role");
            (user_id, email, name, role)
        } else {
            extract_from_jwt(headers, state, &request_id)?
        };

        let is_admin = role.as_deref() == Some("admin")
            || state
                .config
                .admin_emails
                .iter()
                .any(|admin| admin.eq_ignore_ascii_case(&email));

        let ctx = Self {
            user_id,
            email,
            name,
            is_admin,
            request_id,
            idempotency_key,
        };

        parts.extensions.insert(ctx.clone());
        Ok(ctx)
    }
}

type Identity = (String, String, Option<String>, Option<String>);

fn extract_from_jwt(
    headers: &HeaderMap,
    state: &AppState,
    request_id: &str,
) -> Result<Identity, ApiError> {
    let token = bearer_token(headers)
        .ok_or_else(|| ApiError::missing_auth().with_request_id(request_id.to_string()))?;

    let Some(secret) = state.config.jwt_secret.as_deref() else {
        return Err(ApiError::internal("jwt_secret is required when debug=false")
            .with_request_id(request_id.to_string()));
    };

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_nbf = true;

    let data = jsonwebtoken::decode::<Value>(
        &token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| ApiError::invalid_token().with_request_id(request_id.to_string()))?;

    let Some(claims) = data.claims.as_object() else {
        return Err(ApiError::invalid_token().with_request_id(request_id.to_string()));
    };

    let user_id = required_claim(claims, "sub", request_id)?;
    let email = required_claim(claims, "email", request_id)?;
    let name = claims
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string);
    let role = claims
        .get("role")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok((user_id, email, name, role))
}

fn required_claim(
    claims: &serde_json::Map<String, Value>,
    name: &str,
    request_id: &str,
) -> Result<String, ApiError> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::invalid_token().with_request_id(request_id.to_string()))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = header_string(headers, "Authorization")?;
    let token = raw.strip_prefix("Bearer ")?;
    Some(token.to_string())
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name)?.to_str().ok().map(str::to_string)
}

/// Authentication middleware.
///
/// Runs ahead of the route handlers and injects a verified
/// [`RequestContext`] into request extensions; the request ID is echoed on
/// the response.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();

    let ctx = match RequestContext::from_request_parts(&mut parts, &state).await {
        Ok(ctx) => ctx,
        Err(err) => return err.into_response(),
    };

    let mut req = Request::from_parts(parts, body);
    let request_id = ctx.request_id.clone();
    req.extensions_mut().insert(ctx);

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}
