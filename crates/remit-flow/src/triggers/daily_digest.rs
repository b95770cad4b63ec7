//! The `dailyDigest` trigger: the scheduled operations summary.
//!
//! Fired by the scheduler once a day (and manually replayable). Collects
//! today's metrics and open tasks, emails the primary admin a plain-text
//! summary, and logs its own run.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;

use remit_core::WorkflowRunId;

use crate::error::Result;
use crate::mailer::{Email, Mailer};
use crate::metrics::record_workflow_run;
use crate::metrics_store::MetricsStore;
use crate::orchestrator::Trigger;
use crate::run::{aggregate_status, RunLogStore, StepRecord, WorkflowResult, WorkflowRun};
use crate::task::{Task, TaskStore};
use crate::tools::{self, elapsed_ms};

const OPEN_TASKS_LIMIT: usize = 10;

/// Trigger producing the daily admin digest.
pub struct DailyDigestTrigger {
    metrics: MetricsStore,
    tasks: TaskStore,
    mailer: Arc<dyn Mailer>,
    run_log: Arc<dyn RunLogStore>,
    admin_email: Option<String>,
}

impl std::fmt::Debug for DailyDigestTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DailyDigestTrigger")
            .field("admin_email", &self.admin_email)
            .finish_non_exhaustive()
    }
}

impl DailyDigestTrigger {
    /// Creates the trigger with its injected capabilities.
    #[must_use]
    pub fn new(
        metrics: MetricsStore,
        tasks: TaskStore,
        mailer: Arc<dyn Mailer>,
        run_log: Arc<dyn RunLogStore>,
        admin_email: Option<String>,
    ) -> Self {
        Self {
            metrics,
            tasks,
            mailer,
            run_log,
            admin_email,
        }
    }

    fn digest_body(revenue_minor: i64, new_projects: i64, open_tasks: &[Task]) -> String {
        let mut body = format!(
            "Daily digest for {}\n\nRevenue today: {:.2}\nNew projects: {new_projects}\n",
            Utc::now().date_naive(),
            revenue_minor as f64 / 100.0,
        );
        if open_tasks.is_empty() {
            body.push_str("\nNo open tasks.\n");
        } else {
            body.push_str(&format!("\nOpen tasks ({}):\n", open_tasks.len()));
            for task in open_tasks {
                body.push_str(&format!("- [{}] {}\n", task.priority, task.title));
            }
        }
        body
    }
}

#[async_trait]
impl Trigger for DailyDigestTrigger {
    fn name(&self) -> &'static str {
        "dailyDigest"
    }

    fn description(&self) -> &'static str {
        "Sends the daily operations summary email to the primary admin"
    }

    async fn execute(
        &self,
        _payload: serde_json::Value,
        triggered_by: &str,
    ) -> Result<WorkflowResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut steps: Vec<StepRecord> = Vec::with_capacity(2);

        // Step 1: collect today's numbers.
        let collect_start = Instant::now();
        let summary = async {
            let metrics = self.metrics.today().await?;
            let open_tasks = self.tasks.list_open(OPEN_TASKS_LIMIT).await?;
            Ok::<_, crate::error::Error>((metrics, open_tasks))
        }
        .await;

        let collected = match summary {
            Ok((metrics, open_tasks)) => {
                steps.push(StepRecord::success(
                    "collectSummary",
                    serde_json::json!({
                        "total_revenue": metrics.total_revenue,
                        "new_projects": metrics.new_projects,
                        "open_tasks": open_tasks.len(),
                    }),
                    elapsed_ms(collect_start),
                ));
                Some((metrics, open_tasks))
            }
            Err(err) => {
                tracing::error!(error = %err, "dailyDigest: failed to collect summary");
                steps.push(StepRecord::failed(
                    "collectSummary",
                    err.to_string(),
                    elapsed_ms(collect_start),
                ));
                None
            }
        };

        // Step 2: send the digest; still attempted on a collect failure so
        // the admin hears that the digest is degraded.
        let send_start = Instant::now();
        match &self.admin_email {
            None => {
                tracing::warn!("dailyDigest: no admin email configured; skipping send");
                steps.push(StepRecord::skipped("sendDigest", "no admin email configured"));
            }
            Some(admin) => {
                let body = match &collected {
                    Some((metrics, open_tasks)) => {
                        Self::digest_body(metrics.total_revenue, metrics.new_projects, open_tasks)
                    }
                    None => "Daily digest could not be assembled; check service logs.\n".to_string(),
                };
                let email = Email {
                    to: admin.clone(),
                    subject: format!("Daily Digest - {}", Utc::now().date_naive()),
                    body,
                };
                match self.mailer.send(&email).await {
                    Ok(receipt) => steps.push(StepRecord::success(
                        "sendDigest",
                        serde_json::json!({"id": receipt.id}),
                        elapsed_ms(send_start),
                    )),
                    Err(err) => {
                        tracing::error!(error = %err, "dailyDigest: send failed");
                        steps.push(StepRecord::failed(
                            "sendDigest",
                            err.to_string(),
                            elapsed_ms(send_start),
                        ));
                    }
                }
            }
        }

        let status = aggregate_status(&steps);
        let duration_ms = elapsed_ms(start);
        let run = WorkflowRun {
            id: WorkflowRunId::generate(),
            task: "daily_digest".to_string(),
            trigger: self.name().to_string(),
            status,
            duration_ms,
            steps: steps.clone(),
            meta: serde_json::json!({"date": Utc::now().date_naive()}),
            triggered_by: triggered_by.to_string(),
            started_at,
        };
        steps.push(tools::log_run::execute(self.run_log.as_ref(), &run).await);

        record_workflow_run(self.name(), status.as_label());

        Ok(WorkflowResult {
            trigger: self.name().to_string(),
            status,
            duration_ms,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::LogMailer;
    use crate::run::{DisabledRunLog, StepStatus, WorkflowStatus};
    use remit_core::MemoryBackend;

    fn trigger(admin: Option<&str>) -> DailyDigestTrigger {
        let storage = Arc::new(MemoryBackend::new());
        DailyDigestTrigger::new(
            MetricsStore::new(Arc::clone(&storage) as _),
            TaskStore::new(storage as _),
            Arc::new(LogMailer),
            Arc::new(DisabledRunLog),
            admin.map(str::to_string),
        )
    }

    #[tokio::test]
    async fn digest_with_admin_sends_summary() {
        let result = trigger(Some("admin@example.com"))
            .execute(serde_json::json!({}), "scheduler")
            .await
            .unwrap();

        assert_eq!(result.status, WorkflowStatus::Success);
        let send = result.steps.iter().find(|s| s.tool == "sendDigest").unwrap();
        assert_eq!(send.status, StepStatus::Success);
    }

    #[tokio::test]
    async fn digest_without_admin_skips_send() {
        let result = trigger(None)
            .execute(serde_json::json!({}), "scheduler")
            .await
            .unwrap();

        assert_eq!(result.status, WorkflowStatus::Success);
        let send = result.steps.iter().find(|s| s.tool == "sendDigest").unwrap();
        assert_eq!(send.status, StepStatus::Skipped);
    }

    #[test]
    fn digest_body_lists_open_tasks() {
        let body = DailyDigestTrigger::digest_body(399_900, 2, &[]);
        assert!(body.contains("Revenue today: 3999.00"));
        assert!(body.contains("No open tasks"));
    }
}
