//! OpenAPI documentation for the Remit API.

use axum::response::IntoResponse;
use axum::Json;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::ApiErrorBody;
use crate::routes::{agent, payments, webhooks};

/// OpenAPI document for the Remit API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Remit API",
        description = "Payment capture and post-payment workflow service"
    ),
    paths(
        payments::create_order,
        payments::verify_payment,
        webhooks::handle_provider_webhook,
        agent::run_trigger,
        agent::list_triggers,
        agent::list_runs,
    ),
    components(schemas(
        ApiErrorBody,
        payments::CreateOrderRequest,
        payments::CreateOrderResponse,
        payments::VerifyPaymentRequest,
        payments::VerifyPaymentResponse,
        agent::RunTriggerRequest,
        agent::RunTriggerResponse,
        agent::ListTriggersResponse,
        agent::ListRunsResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "payments", description = "Order creation and payment verification"),
        (name = "webhooks", description = "Provider-signed event ingest"),
        (name = "agent", description = "Workflow dispatch and observability"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Handler for the `/openapi.json` endpoint.
pub async fn serve_openapi() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_includes_payment_paths() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_value(&doc).unwrap();
        let paths = json["paths"].as_object().unwrap();
        assert!(paths.contains_key("/api/v1/payments/create-order"));
        assert!(paths.contains_key("/api/v1/payments/verify"));
        assert!(paths.contains_key("/webhooks/payment-provider"));
        assert!(paths.contains_key("/api/v1/agent/run"));
    }
}
