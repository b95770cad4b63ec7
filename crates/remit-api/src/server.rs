//! API server implementation.
//!
//! Assembles the ledger, workflow engine, and HTTP surface, and owns the
//! background dispatch worker and digest scheduler.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use remit_core::{MemoryBackend, Result, StorageBackend};
use remit_flow::triggers::{DailyDigestTrigger, PaymentSuccessTrigger};
use remit_flow::{
    spawn_worker, DigestScheduler, DispatchQueue, HttpMailer, LogMailer, Mailer, MetricsStore,
    Orchestrator, ProjectStore, RunLogStore, StorageRunLog, TaskStore, TriggerRegistry,
};
use remit_ledger::{IdempotencyStore, Ledger, PlanCatalog, RestProvider, SignatureVerifier};

use crate::config::{Config, CorsConfig};

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ReadyResponse {
    /// Service readiness status.
    pub ready: bool,
    /// Optional message about readiness state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Shared application state for all request handlers.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Storage backend (readiness probes).
    pub storage: Arc<dyn StorageBackend>,
    /// Order/payment ledger.
    pub ledger: Arc<Ledger>,
    /// Signature verifier for confirmations and webhooks.
    pub verifier: SignatureVerifier,
    /// Request-level idempotency store.
    pub idempotency: Arc<IdempotencyStore>,
    /// Workflow orchestrator.
    pub orchestrator: Arc<Orchestrator>,
    /// Workflow run log (admin observability).
    pub run_log: Arc<dyn RunLogStore>,
    /// Background dispatch queue.
    pub dispatch: DispatchQueue,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Creates the application state and spawns the dispatch worker.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured provider or mail client cannot be
    /// constructed.
    pub fn new(config: Config, storage: Arc<dyn StorageBackend>) -> Result<Self> {
        let catalog = PlanCatalog::new();

        let verifier = SignatureVerifier::new(
            config.provider.key_secret.clone(),
            config.provider.webhook_secret.clone(),
        );

        let mut ledger = Ledger::new(Arc::clone(&storage), catalog);
        if config.provider.is_configured() {
            let provider = RestProvider::new(
                config.provider.url.clone().unwrap_or_default(),
                config.provider.key_id.clone().unwrap_or_default(),
                config.provider.key_secret.clone().unwrap_or_default(),
            )
            .map_err(|e| remit_core::Error::InvalidInput(e.to_string()))?;
            ledger = ledger.with_provider(Arc::new(provider));
        } else {
            tracing::warn!("Payment provider not configured; orders will use placeholder references");
        }
        let ledger = Arc::new(ledger);

        let mailer: Arc<dyn Mailer> = if config.mail.is_configured() {
            let mailer = HttpMailer::new(
                config.mail.url.clone().unwrap_or_default(),
                config.mail.api_key.clone().unwrap_or_default(),
                config.mail.from.clone(),
            )
            .map_err(|e| remit_core::Error::InvalidInput(e.to_string()))?;
            Arc::new(mailer)
        } else {
            Arc::new(LogMailer)
        };

        let projects = ProjectStore::new(Arc::clone(&storage));
        let tasks = TaskStore::new(Arc::clone(&storage));
        let metrics_store = MetricsStore::new(Arc::clone(&storage));
        let run_log: Arc<dyn RunLogStore> = Arc::new(StorageRunLog::new(Arc::clone(&storage)));
        let admin_email = config.primary_admin_email().map(str::to_string);

        let registry = TriggerRegistry::new()
            .register(Arc::new(PaymentSuccessTrigger::new(
                catalog,
                projects,
                tasks.clone(),
                metrics_store.clone(),
                Arc::clone(&mailer),
                Arc::clone(&run_log),
                admin_email.clone(),
            )))
            .register(Arc::new(DailyDigestTrigger::new(
                metrics_store,
                tasks,
                mailer,
                Arc::clone(&run_log),
                admin_email,
            )));
        let orchestrator = Arc::new(Orchestrator::new(Arc::new(registry)));

        let (dispatch, rx) = DispatchQueue::bounded(config.dispatch_queue_depth);
        spawn_worker(Arc::clone(&orchestrator), rx);

        Ok(Self {
            idempotency: Arc::new(IdempotencyStore::new(Arc::clone(&storage))),
            storage,
            ledger,
            verifier,
            orchestrator,
            run_log,
            dispatch,
            config,
        })
    }
}

/// Health check endpoint handler.
///
/// Returns 200 OK if the service is alive; a shallow check that does not
/// verify dependencies.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check endpoint handler.
///
/// A `head` on a missing key is sufficient to validate the storage path.
async fn ready(axum::extract::State(state): axum::extract::State<Arc<AppState>>) -> impl IntoResponse {
    let check_key = "__remit/ready-check";
    match state.storage.head(check_key).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some(format!("storage check failed: {e}")),
            }),
        ),
    }
}

/// The Remit API server.
pub struct Server {
    config: Config,
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("storage", &"<StorageBackend>")
            .finish()
    }
}

impl Server {
    /// Creates a new server with the given configuration and in-memory
    /// storage (tests/dev); use the builder for production.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            storage: Arc::new(MemoryBackend::new()),
        }
    }

    /// Creates a new `ServerBuilder`.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates the router with all routes and middleware, plus the state
    /// it runs against.
    ///
    /// # Errors
    ///
    /// Returns an error if the application state cannot be constructed.
    fn create_router(&self) -> Result<(Router, Arc<AppState>)> {
        let state = Arc::new(AppState::new(
            self.config.clone(),
            Arc::clone(&self.storage),
        )?);

        let cors = Self::build_cors_layer(&self.config.cors);

        let auth_layer =
            middleware::from_fn_with_state(Arc::clone(&state), crate::context::auth_middleware);
        let idempotency_layer = middleware::from_fn_with_state(
            Arc::clone(&state),
            crate::idempotency::idempotency_middleware,
        );
        let metrics_layer = middleware::from_fn(crate::metrics::metrics_middleware);

        let router = Router::new()
            // Health, ready, metrics, and docs endpoints (no auth required)
            .route("/health", get(health))
            .route("/ready", get(ready))
            .route("/metrics", get(crate::metrics::serve_metrics))
            .route("/openapi.json", get(crate::openapi::serve_openapi))
            // Provider webhook: unauthenticated, verified against the raw body
            .merge(crate::routes::webhook_routes())
            // API routes (auth via RequestContext extractor); the
            // idempotency cache guards only the payment routes
            .nest(
                "/api/v1",
                crate::routes::payment_routes()
                    .route_layer(idempotency_layer)
                    .merge(crate::routes::agent_routes())
                    .layer(auth_layer),
            )
            // Middleware (order matters): metrics outermost for timing,
            // then trace, then CORS.
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(metrics_layer)
            .with_state(Arc::clone(&state));

        Ok((router, state))
    }

    fn build_cors_layer(cors_config: &CorsConfig) -> CorsLayer {
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                header::ACCEPT,
                header::HeaderName::from_static("idempotency-key"),
                header::HeaderName::from_static("x-request-id"),
            ])
            .expose_headers([
                header::CONTENT_TYPE,
                header::HeaderName::from_static("x-request-id"),
            ])
            .max_age(Duration::from_secs(cors_config.max_age_seconds));

        if cors_config.allowed_origins.is_empty() {
            return cors;
        }

        if cors_config.allowed_origins.len() == 1 && cors_config.allowed_origins[0] == "*" {
            return cors.allow_origin(Any);
        }

        let allowed: Vec<HeaderValue> = cors_config
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::error!(origin = %origin, "Invalid CORS origin; skipping");
                    None
                }
            })
            .collect();

        if allowed.is_empty() {
            tracing::warn!("All configured CORS origins were invalid; disabling CORS");
            cors
        } else {
            cors.allow_origin(AllowOrigin::list(allowed))
        }
    }

    /// Starts the server and blocks until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid or the port cannot be
    /// bound.
    pub async fn serve(&self) -> Result<()> {
        self.config.validate()?;

        crate::metrics::init_metrics();

        let (router, state) = self.create_router()?;

        // The digest scheduler feeds the same dispatch queue the HTTP
        // handlers use.
        DigestScheduler::new(
            state.dispatch.clone(),
            self.config.digest_hour_utc,
            self.config.digest_minute_utc,
        )
        .spawn();

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        tracing::info!(http_port = self.config.http_port, "Starting Remit API server");

        let listener =
            tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| remit_core::Error::Internal {
                    message: format!("failed to bind to {addr}: {e}"),
                })?;

        axum::serve(listener, router)
            .await
            .map_err(|e| remit_core::Error::Internal {
                message: format!("server error: {e}"),
            })?;

        Ok(())
    }

    /// Creates a test router for the server.
    ///
    /// Intended for integration tests driving routes without binding a
    /// port; uses this server's configured storage backend.
    ///
    /// # Panics
    ///
    /// Panics if the application state cannot be constructed.
    #[doc(hidden)]
    #[must_use]
    pub fn test_router(&self) -> Router {
        let (router, _state) = self.create_router().expect("test state construction");
        router
    }
}

/// Builder for constructing a server.
pub struct ServerBuilder {
    config: Config,
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("storage", &"<StorageBackend>")
            .finish()
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            storage: Arc::new(MemoryBackend::new()),
        }
    }
}

impl ServerBuilder {
    /// Creates a new server builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the full configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the HTTP port.
    #[must_use]
    pub fn http_port(mut self, port: u16) -> Self {
        self.config.http_port = port;
        self
    }

    /// Enables debug mode (header-based identity instead of JWT).
    #[must_use]
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Sets the JWT HS256 secret used for bearer token verification.
    ///
    /// Required when `debug` is false.
    #[must_use]
    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = Some(secret.into());
        self
    }

    /// Sets the storage backend used by request handlers.
    ///
    /// By default the server uses an in-memory backend intended only for
    /// tests/dev.
    #[must_use]
    pub fn storage_backend(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = storage;
        self
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> Server {
        Server {
            config: self.config,
            storage: self.storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn debug_server() -> Server {
        let config = Config {
            debug: true,
            ..Config::default()
        };
        ServerBuilder::new().config(config).build()
    }

    #[tokio::test]
    async fn test_health_endpoint() -> Result<()> {
        let router = debug_server().test_router();

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .context("build request")?;

        let response = router.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .context("read response body")?;
        let health: HealthResponse = serde_json::from_slice(&body).context("parse JSON body")?;
        assert_eq!(health.status, "ok");
        Ok(())
    }

    #[tokio::test]
    async fn test_ready_endpoint() -> Result<()> {
        let router = debug_server().test_router();

        let request = Request::builder()
            .uri("/ready")
            .body(Body::empty())
            .context("build request")?;

        let response = router.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .context("read response body")?;
        let ready: ReadyResponse = serde_json::from_slice(&body).context("parse JSON body")?;
        assert!(ready.ready);
        Ok(())
    }

    #[tokio::test]
    async fn test_api_routes_require_identity() -> Result<()> {
        let router = debug_server().test_router();

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/payments/create-order")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"plan_slug":"starter"}"#))
            .context("build request")?;

        let response = router.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_openapi_endpoint() -> Result<()> {
        let router = debug_server().test_router();

        let request = Request::builder()
            .uri("/openapi.json")
            .body(Body::empty())
            .context("build request")?;

        let response = router.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .context("read response body")?;
        let doc: serde_json::Value = serde_json::from_slice(&body).context("parse JSON body")?;
        assert!(doc.get("paths").is_some());
        Ok(())
    }
}
