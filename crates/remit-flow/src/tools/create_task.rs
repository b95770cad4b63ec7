//! Tool: create the internal fulfillment task.

use std::time::Instant;

use remit_ledger::PlanCatalog;

use crate::payload::PaymentSuccessPayload;
use crate::run::StepRecord;
use crate::task::{NewTask, TaskStore};
use crate::tools::elapsed_ms;

/// Tool name in run records.
pub const NAME: &str = "createTask";

/// Creates the internal task for a provisioned project. The chain only
/// invokes this when the payload carries a `project_id`.
pub async fn execute(
    tasks: &TaskStore,
    catalog: &PlanCatalog,
    payload: &PaymentSuccessPayload,
) -> StepRecord {
    let start = Instant::now();

    let Some(project_id) = payload.project_id.clone() else {
        return StepRecord::failed(NAME, "payload missing project_id", elapsed_ms(start));
    };

    let Some(plan) = catalog.get(&payload.plan_slug) else {
        return StepRecord::failed(
            NAME,
            format!("invalid plan slug: {}", payload.plan_slug),
            elapsed_ms(start),
        );
    };

    let new = NewTask {
        project_id,
        user_id: payload.user_id.clone(),
        client_name: payload.display_name().to_string(),
    };

    match tasks.create(plan, new).await {
        Ok(task) => StepRecord::success(
            NAME,
            serde_json::json!({
                "task_id": task.id.to_string(),
                "priority": task.priority,
            }),
            elapsed_ms(start),
        ),
        Err(err) => {
            tracing::error!(error = %err, "createTask failed");
            StepRecord::failed(NAME, err.to_string(), elapsed_ms(start))
        }
    }
}
