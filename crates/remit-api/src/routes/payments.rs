//! Payment API routes.
//!
//! ## Routes
//!
//! - `POST /payments/create-order` - create an order for a plan
//! - `POST /payments/verify` - verify a payment confirmation and record it

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use remit_core::{retry, RetryPolicy};
use remit_flow::DispatchJob;
use remit_ledger::RecordPaymentRequest;

use crate::context::RequestContext;
use crate::error::{ApiError, ApiErrorBody};
use crate::server::AppState;

/// Request to create an order.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    /// Plan slug to purchase.
    pub plan_slug: String,
}

/// Created order response.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    /// Ledger order id.
    pub order_id: String,
    /// Provider order reference (placeholder when unconfigured).
    pub provider_order_ref: String,
    /// Amount in minor currency units.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// True when the order exists on the provider side.
    pub provider_configured: bool,
    /// Public provider key id for checkout clients.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_key_id: Option<String>,
    /// Plan slug purchased.
    pub plan: String,
    /// Human-readable status message.
    pub message: String,
}

/// Request to verify a payment confirmation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    /// Provider order reference.
    pub provider_order_ref: String,
    /// Provider payment reference.
    pub provider_payment_ref: String,
    /// Signature over `"{order_ref}|{payment_ref}"`.
    pub provider_signature: String,
    /// Amount reported by the checkout client.
    #[serde(default)]
    pub amount: Option<i64>,
    /// Payment method reported by the checkout client.
    #[serde(default)]
    pub method: Option<String>,
}

/// Successful verification response.
#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyPaymentResponse {
    /// Human-readable status message.
    pub message: String,
    /// Ledger payment id (absent for duplicates).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    /// Ledger order id (absent for duplicates).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Payment status (absent for duplicates).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Creates payment routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/payments/create-order", post(create_order))
        .route("/payments/verify", post(verify_payment))
}

/// Create an order for a plan.
///
/// POST /api/v1/payments/create-order
#[utoipa::path(
    post,
    path = "/api/v1/payments/create-order",
    tag = "payments",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order created", body = CreateOrderResponse),
        (status = 400, description = "Invalid plan", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 409, description = "Duplicate idempotency key", body = ApiErrorBody),
        (status = 502, description = "Provider failure", body = ApiErrorBody),
        (status = 503, description = "Persistence failure", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn create_order(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.plan_slug.trim().is_empty() {
        return Err(ApiError::bad_request("plan_slug is required")
            .with_request_id(ctx.request_id.clone()));
    }

    tracing::info!(
        user_id = %ctx.user_id,
        plan_slug = %req.plan_slug,
        "Creating order"
    );

    let created = state
        .ledger
        .create_order(&ctx.user_id, &req.plan_slug, ctx.idempotency_key.clone())
        .await
        .map_err(|e| ApiError::from(e).with_request_id(ctx.request_id.clone()))?;

    let message = if created.provider_configured {
        "Order created successfully".to_string()
    } else {
        "Payment provider not configured yet. Order saved as placeholder.".to_string()
    };

    Ok(Json(CreateOrderResponse {
        order_id: created.order.id.to_string(),
        provider_order_ref: created.order.provider_order_ref.clone(),
        amount: created.order.amount,
        currency: created.order.currency.clone(),
        provider_configured: created.provider_configured,
        provider_key_id: created.key_id,
        plan: created.plan.slug.to_string(),
        message,
    }))
}

/// Verify a payment confirmation, record it, and dispatch the workflow.
///
/// POST /api/v1/payments/verify
#[utoipa::path(
    post,
    path = "/api/v1/payments/verify",
    tag = "payments",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment captured (or already recorded)", body = VerifyPaymentResponse),
        (status = 400, description = "Invalid signature", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Order not found", body = ApiErrorBody),
        (status = 503, description = "Persistence failure", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn verify_payment(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let valid = state
        .verifier
        .verify_payment(
            &req.provider_order_ref,
            &req.provider_payment_ref,
            &req.provider_signature,
        )
        .map_err(|e| ApiError::from(e).with_request_id(ctx.request_id.clone()))?;

    if !valid {
        tracing::warn!(
            order_ref = %req.provider_order_ref,
            payment_ref = %req.provider_payment_ref,
            "Invalid payment signature"
        );
        return Err(ApiError::bad_request("Invalid payment signature")
            .with_request_id(ctx.request_id.clone()));
    }

    // The payment-reference guard makes recording idempotent, so a couple
    // of retries on transient persistence failures are safe.
    let record = RecordPaymentRequest {
        provider_order_ref: req.provider_order_ref.clone(),
        provider_payment_ref: req.provider_payment_ref.clone(),
        provider_signature: Some(req.provider_signature.clone()),
        amount: req.amount,
        method: req.method.clone(),
    };
    let outcome = retry("record_payment", record_retry_policy(), || {
        state.ledger.record_payment(record.clone())
    })
    .await
    .map_err(|e| ApiError::from(e).with_request_id(ctx.request_id.clone()))?;

    if outcome.duplicate {
        return Ok(Json(VerifyPaymentResponse {
            message: "Payment already recorded".to_string(),
            payment_id: None,
            order_id: None,
            status: None,
        }));
    }

    let payment = outcome
        .payment
        .as_ref()
        .ok_or_else(|| ApiError::internal("recorded payment missing from outcome"))?;

    // Workflow runs in the background; the payer's response does not wait
    // for it.
    state.dispatch.enqueue(DispatchJob {
        trigger: "paymentSuccess".to_string(),
        payload: serde_json::json!({
            "user_id": outcome.order.user_id,
            "client_email": ctx.email,
            "client_name": ctx.display_name(),
            "plan_slug": outcome.order.plan_slug,
            "order_id": outcome.order.id.to_string(),
            "payment_id": payment.id.to_string(),
            "provider_payment_ref": req.provider_payment_ref,
            "amount": outcome.order.amount,
        }),
        triggered_by: "api".to_string(),
    });

    Ok(Json(VerifyPaymentResponse {
        message: "Payment verified successfully".to_string(),
        payment_id: Some(payment.id.to_string()),
        order_id: Some(outcome.order.id.to_string()),
        status: Some("captured".to_string()),
    }))
}

fn record_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        base_delay: std::time::Duration::from_millis(250),
        max_delay: std::time::Duration::from_millis(1000),
    }
}
