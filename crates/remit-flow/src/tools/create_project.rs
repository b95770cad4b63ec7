//! Tool: provision a project workspace.

use std::time::Instant;

use remit_ledger::PlanCatalog;

use crate::payload::PaymentSuccessPayload;
use crate::project::{NewProject, ProjectStore};
use crate::run::StepRecord;
use crate::tools::elapsed_ms;

/// Tool name in run records.
pub const NAME: &str = "createProject";

/// Provisions a project from the payload. On success the result carries
/// `project_id` and `deadline` for the chain to merge into the payload.
pub async fn execute(
    projects: &ProjectStore,
    catalog: &PlanCatalog,
    payload: &PaymentSuccessPayload,
) -> StepRecord {
    let start = Instant::now();

    let Some(plan) = catalog.get(&payload.plan_slug) else {
        tracing::error!(plan_slug = %payload.plan_slug, "createProject: unknown plan slug");
        return StepRecord::failed(
            NAME,
            format!("invalid plan slug: {}", payload.plan_slug),
            elapsed_ms(start),
        );
    };

    let new = NewProject {
        user_id: payload.user_id.clone(),
        order_id: payload.order_id.clone(),
        payment_id: payload.payment_id.clone(),
        client_name: payload.display_name().to_string(),
    };

    match projects.create(plan, new).await {
        Ok(project) => StepRecord::success(
            NAME,
            serde_json::json!({
                "project_id": project.id.to_string(),
                "deadline": project.deadline,
            }),
            elapsed_ms(start),
        ),
        Err(err) => {
            tracing::error!(error = %err, "createProject failed");
            StepRecord::failed(NAME, err.to_string(), elapsed_ms(start))
        }
    }
}
