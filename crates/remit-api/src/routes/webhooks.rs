//! Provider webhook ingest.
//!
//! The provider signs the raw request body; verification runs over those
//! exact bytes before any JSON parsing. The only rejected requests are a
//! missing or invalid signature (400). Every other outcome - including
//! internal failures - is acknowledged with 200 so the provider does not
//! retry-storm a webhook it cannot fix.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use serde::Deserialize;

use remit_core::{retry, RetryPolicy};
use remit_flow::DispatchJob;
use remit_ledger::{LedgerError, RecordPaymentRequest};

use crate::metrics::record_webhook_event;
use crate::server::AppState;

/// Header carrying the webhook HMAC signature.
pub const SIGNATURE_HEADER: &str = "X-Provider-Signature";

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    event: String,
    #[serde(default)]
    payload: Option<WebhookPayload>,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    payment: Option<PaymentEnvelope>,
}

#[derive(Debug, Deserialize)]
struct PaymentEnvelope {
    entity: PaymentEntity,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Creates webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhooks/payment-provider", post(handle_provider_webhook))
}

fn ack(status: &'static str) -> Response {
    (StatusCode::OK, Json(serde_json::json!({"status": status}))).into_response()
}

fn reject(error: &'static str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": error})),
    )
        .into_response()
}

/// Provider webhook endpoint.
///
/// POST /webhooks/payment-provider
#[utoipa::path(
    post,
    path = "/webhooks/payment-provider",
    tag = "webhooks",
    request_body(content = String, description = "Raw provider event payload", content_type = "application/json"),
    responses(
        (status = 200, description = "Event acknowledged"),
        (status = 400, description = "Missing or invalid signature"),
    )
)]
pub(crate) async fn handle_provider_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        tracing::warn!("Webhook missing {SIGNATURE_HEADER} header");
        return reject("Missing signature");
    };

    match state.verifier.verify_webhook(&body, signature) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("Invalid webhook signature");
            return reject("Invalid signature");
        }
        Err(err) => {
            tracing::error!(error = %err, "Webhook signature verification error");
            return reject("Signature verification failed");
        }
    }

    // Signature checked; from here on, the provider always gets a 200.
    match process_event(&state, &body).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, "Webhook processing failed; acknowledging anyway");
            ack("error_logged")
        }
    }
}

async fn process_event(state: &Arc<AppState>, body: &Bytes) -> Result<Response, LedgerError> {
    let event: WebhookEvent = serde_json::from_slice(body)
        .map_err(|e| LedgerError::serialization(format!("malformed webhook body: {e}")))?;

    tracing::info!(event = %event.event, "Received webhook event");

    match event.event.as_str() {
        "payment.captured" => {
            let Some(payment) = event.payload.and_then(|p| p.payment) else {
                return Err(LedgerError::serialization(
                    "payment.captured event missing payment entity",
                ));
            };
            handle_payment_captured(state, payment.entity).await
        }
        "payment.failed" => {
            let Some(payment) = event.payload.and_then(|p| p.payment) else {
                return Err(LedgerError::serialization(
                    "payment.failed event missing payment entity",
                ));
            };
            handle_payment_failed(state, payment.entity).await
        }
        other => {
            tracing::info!(event = other, "Unhandled webhook event type");
            record_webhook_event(other, "unhandled");
            Ok(ack("unhandled"))
        }
    }
}

async fn handle_payment_captured(
    state: &Arc<AppState>,
    entity: PaymentEntity,
) -> Result<Response, LedgerError> {
    let Some(order_ref) = entity.order_id.clone() else {
        return Err(LedgerError::serialization(
            "payment.captured entity missing order_id",
        ));
    };

    // Skip already-processed payments before touching the order; replayed
    // deliveries are the provider's normal behavior.
    if state
        .ledger
        .find_payment_by_ref(&entity.id)
        .await?
        .is_some()
    {
        tracing::info!(payment_ref = %entity.id, "Webhook payment already processed; skipping");
        record_webhook_event("payment.captured", "already_processed");
        return Ok(ack("already_processed"));
    }

    let record = RecordPaymentRequest {
        provider_order_ref: order_ref,
        provider_payment_ref: entity.id.clone(),
        provider_signature: None,
        amount: entity.amount,
        method: entity.method.clone(),
    };
    let outcome = retry("webhook_record_payment", webhook_retry_policy(), || {
        state.ledger.record_payment(record.clone())
    })
    .await?;

    if !outcome.duplicate {
        let client_email = entity.email.clone().unwrap_or_else(|| "unknown".to_string());
        let payment_id = outcome
            .payment
            .as_ref()
            .map(|p| p.id.to_string())
            .unwrap_or_default();

        state.dispatch.enqueue(DispatchJob {
            trigger: "paymentSuccess".to_string(),
            payload: serde_json::json!({
                "user_id": outcome.order.user_id,
                "client_email": client_email,
                "plan_slug": outcome.order.plan_slug,
                "order_id": outcome.order.id.to_string(),
                "payment_id": payment_id,
                "provider_payment_ref": entity.id,
                "amount": outcome.order.amount,
            }),
            triggered_by: "webhook".to_string(),
        });
    }

    record_webhook_event("payment.captured", "captured");
    Ok(ack("captured"))
}

async fn handle_payment_failed(
    state: &Arc<AppState>,
    entity: PaymentEntity,
) -> Result<Response, LedgerError> {
    tracing::warn!(
        payment_ref = %entity.id,
        order_ref = entity.order_id.as_deref().unwrap_or("unknown"),
        error_code = entity.error_code.as_deref().unwrap_or(""),
        error_description = entity.error_description.as_deref().unwrap_or(""),
        "Payment failed event"
    );

    if let Some(order_ref) = entity.order_id {
        match state.ledger.mark_order_failed(&order_ref).await {
            Ok(_) => {}
            Err(LedgerError::OrderNotFound { .. }) => {
                tracing::warn!(order_ref = %order_ref, "payment.failed for unknown order");
            }
            Err(err) => return Err(err),
        }
    }

    record_webhook_event("payment.failed", "noted");
    Ok(ack("noted"))
}

fn webhook_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        base_delay: std::time::Duration::from_millis(250),
        max_delay: std::time::Duration::from_millis(1000),
    }
}
