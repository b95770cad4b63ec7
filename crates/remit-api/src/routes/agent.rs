//! Agent (workflow) routes.
//!
//! Admin-only surface for manual dispatch and run observability. Manual
//! dispatch is the recovery path for a `partial_failure`: an operator
//! replays the trigger with the original payload.
//!
//! ## Routes
//!
//! - `POST /agent/run` - dispatch a trigger synchronously
//! - `GET  /agent/triggers` - list registered triggers
//! - `GET  /agent/runs` - recent workflow runs, newest first

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use remit_flow::{TriggerInfo, WorkflowResult, WorkflowRun};

use crate::context::RequestContext;
use crate::error::{ApiError, ApiErrorBody};
use crate::server::AppState;

const DEFAULT_RUNS_LIMIT: usize = 20;
const MAX_RUNS_LIMIT: usize = 100;

/// Request to run a trigger manually.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RunTriggerRequest {
    /// Trigger name.
    pub trigger: String,
    /// Trigger payload.
    pub payload: serde_json::Value,
}

/// Manual trigger run response.
#[derive(Debug, Serialize, ToSchema)]
pub struct RunTriggerResponse {
    /// Trigger name.
    pub trigger: String,
    /// Full workflow result.
    #[schema(value_type = Object)]
    pub result: WorkflowResult,
}

/// Registered triggers response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListTriggersResponse {
    /// Registered triggers.
    #[schema(value_type = Vec<Object>)]
    pub triggers: Vec<TriggerInfo>,
}

/// Query parameters for the runs listing.
#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    /// Maximum runs to return (default 20, max 100).
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Recent runs response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListRunsResponse {
    /// Recent workflow runs, newest first.
    #[schema(value_type = Vec<Object>)]
    pub runs: Vec<WorkflowRun>,
}

/// Creates agent routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/agent/run", post(run_trigger))
        .route("/agent/triggers", get(list_triggers))
        .route("/agent/runs", get(list_runs))
}

/// Manually dispatch a trigger (admin only).
///
/// POST /api/v1/agent/run
#[utoipa::path(
    post,
    path = "/api/v1/agent/run",
    tag = "agent",
    request_body = RunTriggerRequest,
    responses(
        (status = 200, description = "Workflow executed", body = RunTriggerResponse),
        (status = 400, description = "Unknown trigger or invalid payload", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Admin access required", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn run_trigger(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunTriggerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require_admin()?;

    if req.trigger.trim().is_empty() {
        return Err(ApiError::bad_request("Missing required field: trigger")
            .with_request_id(ctx.request_id.clone()));
    }
    if !req.payload.is_object() {
        return Err(ApiError::bad_request("Missing or invalid payload object")
            .with_request_id(ctx.request_id.clone()));
    }

    tracing::info!(
        trigger = %req.trigger,
        admin = %ctx.email,
        "Manual trigger dispatch requested"
    );

    let result = state
        .orchestrator
        .dispatch(&req.trigger, req.payload, "manual")
        .await
        .map_err(|e| ApiError::from(e).with_request_id(ctx.request_id.clone()))?;

    Ok(Json(RunTriggerResponse {
        trigger: req.trigger,
        result,
    }))
}

/// List registered triggers (admin only).
///
/// GET /api/v1/agent/triggers
#[utoipa::path(
    get,
    path = "/api/v1/agent/triggers",
    tag = "agent",
    responses(
        (status = 200, description = "Registered triggers", body = ListTriggersResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Admin access required", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn list_triggers(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require_admin()?;

    Ok(Json(ListTriggersResponse {
        triggers: state.orchestrator.list_triggers(),
    }))
}

/// List recent workflow runs (admin only).
///
/// GET /api/v1/agent/runs
#[utoipa::path(
    get,
    path = "/api/v1/agent/runs",
    tag = "agent",
    params(("limit" = Option<usize>, Query, description = "Maximum runs to return")),
    responses(
        (status = 200, description = "Recent runs", body = ListRunsResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Admin access required", body = ApiErrorBody),
    ),
    security(("bearerAuth" = []))
)]
pub(crate) async fn list_runs(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Query(query): Query<RunsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require_admin()?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_RUNS_LIMIT)
        .min(MAX_RUNS_LIMIT);

    let runs = state
        .run_log
        .recent(limit)
        .await
        .map_err(|e| ApiError::from(e).with_request_id(ctx.request_id.clone()))?;

    Ok(Json(ListRunsResponse { runs }))
}
