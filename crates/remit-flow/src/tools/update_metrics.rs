//! Tool: update daily dashboard metrics.

use std::time::Instant;

use crate::metrics_store::MetricsStore;
use crate::payload::PaymentSuccessPayload;
use crate::run::StepRecord;
use crate::tools::elapsed_ms;

/// Tool name in run records.
pub const NAME: &str = "updateMetrics";

/// Increments today's revenue and new-project counters.
pub async fn execute(metrics: &MetricsStore, payload: &PaymentSuccessPayload) -> StepRecord {
    let start = Instant::now();

    let result = async {
        metrics.increment_revenue(payload.amount).await?;
        metrics.increment_new_projects().await
    }
    .await;

    match result {
        Ok(()) => StepRecord::success(
            NAME,
            serde_json::json!({
                "revenue_added": payload.amount,
                "new_projects_incremented": true,
            }),
            elapsed_ms(start),
        ),
        Err(err) => {
            tracing::error!(error = %err, "updateMetrics failed");
            StepRecord::failed(NAME, err.to_string(), elapsed_ms(start))
        }
    }
}
