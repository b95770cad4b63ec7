//! API error types and HTTP response mapping.

use axum::http::header::HeaderName;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use remit_core::Error as CoreError;
use remit_flow::Error as FlowError;
use remit_ledger::LedgerError;

/// API result type.
pub type ApiResult<T> = Result<T, ApiError>;

/// Standard JSON error response body.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message (safe for clients).
    pub message: String,
    /// Optional request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// HTTP API error with stable machine-readable code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    request_id: Option<String>,
}

impl ApiError {
    /// Returns an error response for invalid input.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Returns an error response for authentication failures.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// Returns an error response when the Authorization header is missing.
    #[must_use]
    pub fn missing_auth() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "MISSING_AUTH",
            "Authorization header required",
        )
    }

    /// Returns an error response when the bearer token is invalid.
    #[must_use]
    pub fn invalid_token() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "INVALID_TOKEN",
            "Invalid bearer token",
        )
    }

    /// Returns an error response for authorization failures.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    /// Returns an error response for missing resources.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// Returns an error response for conflicts (duplicate idempotency key).
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    /// Returns a 502 for upstream provider failures. The detail is logged;
    /// the client sees a generic message.
    pub fn bad_gateway(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(detail = %detail, "Upstream provider failure");
        Self::new(
            StatusCode::BAD_GATEWAY,
            "PROVIDER_ERROR",
            "Payment provider request failed",
        )
    }

    /// Returns a 503 for persistence or configuration failures. The detail
    /// is logged; the client sees a generic message.
    pub fn service_unavailable(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(detail = %detail, "Service dependency unavailable");
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "Service temporarily unavailable",
        )
    }

    /// Returns an internal error response. The detail is logged; no
    /// internal error text leaks to the caller.
    pub fn internal(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(detail = %detail, "Internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "Internal server error",
        )
    }

    /// Attaches a request ID for correlation.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the human-readable error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            request_id: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = self.request_id;
        let mut response = (
            self.status,
            Json(ApiErrorBody {
                code: self.code.to_string(),
                message: self.message,
                request_id: request_id.clone(),
            }),
        )
            .into_response();

        if let Some(request_id) = request_id {
            if let Ok(value) = HeaderValue::from_str(&request_id) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static("x-request-id"), value);
            }
        }

        response
    }
}

impl From<LedgerError> for ApiError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::InvalidPlan { slug } => {
                Self::bad_request(format!("Invalid plan: {slug}"))
            }
            LedgerError::OrderNotFound { .. } => Self::not_found("Order not found"),
            LedgerError::DuplicateRequest => {
                Self::conflict("Duplicate request for this idempotency key")
            }
            LedgerError::Provider { message } => Self::bad_gateway(message),
            LedgerError::Configuration { message } | LedgerError::Storage { message } => {
                Self::service_unavailable(message)
            }
            LedgerError::Serialization { message } => Self::internal(message),
            LedgerError::Core(err) => Self::from(err),
        }
    }
}

impl From<FlowError> for ApiError {
    fn from(value: FlowError) -> Self {
        match value {
            FlowError::UnknownTrigger { name, available } => {
                Self::bad_request(format!("Unknown trigger \"{name}\". Available: {available}"))
            }
            FlowError::InvalidPayload { message } => {
                Self::bad_request(format!("Invalid payload: {message}"))
            }
            FlowError::Storage { message }
            | FlowError::Serialization { message }
            | FlowError::Mail { message } => Self::internal(message),
            FlowError::Core(err) => Self::from(err),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidId { message } | CoreError::InvalidInput(message) => {
                Self::bad_request(message)
            }
            CoreError::NotFound(message) => Self::not_found(message),
            CoreError::Storage { message, .. } => Self::service_unavailable(message),
            CoreError::Serialization { message }
            | CoreError::PreconditionFailed { message }
            | CoreError::Internal { message } => Self::internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_error_status_mapping() {
        let err = ApiError::from(LedgerError::InvalidPlan {
            slug: "platinum".into(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.message().contains("platinum"));

        let err = ApiError::from(LedgerError::OrderNotFound {
            provider_order_ref: "order_x".into(),
        });
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = ApiError::from(LedgerError::DuplicateRequest);
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err = ApiError::from(LedgerError::provider("keys rejected"));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        let err = ApiError::from(LedgerError::storage("db down"));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn upstream_failures_do_not_leak_detail() {
        let err = ApiError::from(LedgerError::storage("connection to 10.0.0.3 refused"));
        assert!(!err.message().contains("10.0.0.3"));

        let err = ApiError::internal("panic at ledger.rs:42");
        assert!(!err.message().contains("ledger.rs"));
    }

    #[test]
    fn unknown_trigger_maps_to_bad_request() {
        let err = ApiError::from(FlowError::UnknownTrigger {
            name: "nope".into(),
            available: "paymentSuccess".into(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.message().contains("paymentSuccess"));
    }

    #[test]
    fn response_carries_request_id_header() {
        let response = ApiError::bad_request("nope")
            .with_request_id("req_1")
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get("x-request-id").unwrap(),
            &HeaderValue::from_static("req_1")
        );
    }
}
