//! HTTP route handlers.

pub mod agent;
pub mod payments;
pub mod webhooks;

use std::sync::Arc;

use axum::Router;

use crate::server::AppState;

/// Payment routes (authenticated; idempotency-guarded).
pub fn payment_routes() -> Router<Arc<AppState>> {
    payments::routes()
}

/// Agent routes (admin-authenticated).
pub fn agent_routes() -> Router<Arc<AppState>> {
    agent::routes()
}

/// Webhook routes (unauthenticated; provider-signed).
pub fn webhook_routes() -> Router<Arc<AppState>> {
    webhooks::routes()
}
