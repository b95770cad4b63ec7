//! The `paymentSuccess` trigger: the fixed post-payment tool chain.
//!
//! Steps run in order, each independently outcome-tagged:
//!
//! 1. `createProject` - provisions the workspace; its output enriches the
//!    payload for later steps
//! 2. `createTask` - only if step 1 produced a `project_id`; otherwise
//!    recorded as skipped and the chain continues
//! 3. `sendEmail` - always attempted; admin + client sends are independent
//! 4. `updateMetrics` - always attempted
//! 5. `logRun` - always attempted last; persists the run record
//!
//! No step failure aborts subsequent steps. Any failed step makes the
//! overall status `partial_failure`; recovery is a manual re-dispatch by an
//! operator, never an automatic retry.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;

use remit_core::WorkflowRunId;
use remit_ledger::PlanCatalog;

use crate::error::Result;
use crate::mailer::Mailer;
use crate::metrics::record_workflow_run;
use crate::metrics_store::MetricsStore;
use crate::orchestrator::Trigger;
use crate::payload::PaymentSuccessPayload;
use crate::project::ProjectStore;
use crate::run::{
    aggregate_status, RunLogStore, StepRecord, StepStatus, WorkflowResult, WorkflowRun,
};
use crate::task::TaskStore;
use crate::tools;

/// Trigger fired when a payment is captured and durably recorded.
pub struct PaymentSuccessTrigger {
    catalog: PlanCatalog,
    projects: ProjectStore,
    tasks: TaskStore,
    metrics: MetricsStore,
    mailer: Arc<dyn Mailer>,
    run_log: Arc<dyn RunLogStore>,
    admin_email: Option<String>,
}

impl std::fmt::Debug for PaymentSuccessTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentSuccessTrigger")
            .field("admin_email", &self.admin_email)
            .finish_non_exhaustive()
    }
}

impl PaymentSuccessTrigger {
    /// Creates the trigger with its injected capabilities.
    #[must_use]
    pub fn new(
        catalog: PlanCatalog,
        projects: ProjectStore,
        tasks: TaskStore,
        metrics: MetricsStore,
        mailer: Arc<dyn Mailer>,
        run_log: Arc<dyn RunLogStore>,
        admin_email: Option<String>,
    ) -> Self {
        Self {
            catalog,
            projects,
            tasks,
            metrics,
            mailer,
            run_log,
            admin_email,
        }
    }

    fn enrich_from_project_step(payload: &mut PaymentSuccessPayload, step: &StepRecord) {
        if step.status != StepStatus::Success {
            return;
        }
        let Some(result) = &step.result else {
            return;
        };
        if let Some(project_id) = result.get("project_id").and_then(|v| v.as_str()) {
            payload.project_id = Some(project_id.to_string());
        }
        if let Some(deadline) = result
            .get("deadline")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
        {
            payload.deadline = Some(deadline);
        }
    }
}

#[async_trait]
impl Trigger for PaymentSuccessTrigger {
    fn name(&self) -> &'static str {
        "paymentSuccess"
    }

    fn description(&self) -> &'static str {
        "Triggered on successful payment - creates project, task, sends emails, updates metrics, logs the run"
    }

    async fn execute(
        &self,
        payload: serde_json::Value,
        triggered_by: &str,
    ) -> Result<WorkflowResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut payload = PaymentSuccessPayload::from_value(payload)?;

        tracing::info!(
            order_id = %payload.order_id,
            plan_slug = %payload.plan_slug,
            "Starting paymentSuccess workflow"
        );

        let mut steps: Vec<StepRecord> = Vec::with_capacity(5);

        // Step 1: create project.
        let project_step =
            tools::create_project::execute(&self.projects, &self.catalog, &payload).await;
        Self::enrich_from_project_step(&mut payload, &project_step);
        steps.push(project_step);

        // Step 2: create task, only with a provisioned project.
        if payload.project_id.is_some() {
            steps.push(tools::create_task::execute(&self.tasks, &self.catalog, &payload).await);
        } else {
            steps.push(StepRecord::skipped(
                tools::create_task::NAME,
                "no project_id - project creation failed",
            ));
        }

        // Step 3: notifications, regardless of earlier outcomes.
        steps.push(
            tools::send_email::execute(
                self.mailer.as_ref(),
                self.admin_email.as_deref(),
                &self.catalog,
                &payload,
            )
            .await,
        );

        // Step 4: dashboard metrics.
        steps.push(tools::update_metrics::execute(&self.metrics, &payload).await);

        // Step 5: persist the run record.
        let status = aggregate_status(&steps);
        let duration_ms = tools::elapsed_ms(start);
        let run = WorkflowRun {
            id: WorkflowRunId::generate(),
            task: "payment_success_workflow".to_string(),
            trigger: self.name().to_string(),
            status,
            duration_ms,
            steps: steps.clone(),
            meta: serde_json::json!({
                "order_id": payload.order_id,
                "payment_id": payload.payment_id,
                "provider_payment_ref": payload.provider_payment_ref,
                "plan_slug": payload.plan_slug,
                "amount": payload.amount,
                "project_id": payload.project_id,
            }),
            triggered_by: triggered_by.to_string(),
            started_at,
        };
        steps.push(tools::log_run::execute(self.run_log.as_ref(), &run).await);

        record_workflow_run(self.name(), status.as_label());
        tracing::info!(
            status = status.as_label(),
            duration_ms,
            failures = steps.iter().filter(|s| s.status == StepStatus::Failed).count(),
            "paymentSuccess workflow completed"
        );

        Ok(WorkflowResult {
            trigger: self.name().to_string(),
            status,
            duration_ms,
            steps,
        })
    }
}
