//! Tool: persist the workflow run record.
//!
//! Always runs last. An unavailable log store is reported as `skipped`, a
//! write error as `failed`; neither propagates past the orchestrator.

use std::time::Instant;

use crate::run::{RunLogStore, StepRecord, WorkflowRun};
use crate::tools::elapsed_ms;

/// Tool name in run records.
pub const NAME: &str = "logRun";

/// Persists a completed run through the injected log store.
pub async fn execute(store: &dyn RunLogStore, run: &WorkflowRun) -> StepRecord {
    let start = Instant::now();

    if !store.is_ready() {
        tracing::warn!("logRun: run log store not ready; skipping");
        return StepRecord::skipped(NAME, "run log store not ready");
    }

    match store.write(run).await {
        Ok(()) => StepRecord::success(
            NAME,
            serde_json::json!({"run_id": run.id.to_string()}),
            elapsed_ms(start),
        ),
        Err(err) => {
            tracing::error!(error = %err, "logRun failed to write run record");
            StepRecord::failed(NAME, err.to_string(), elapsed_ms(start))
        }
    }
}
