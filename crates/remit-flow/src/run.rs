//! Workflow run records and the run log store.
//!
//! A `WorkflowRun` captures one execution of a named trigger: every step's
//! outcome, the aggregate status, timing, and metadata. Steps accumulate in
//! memory during execution and the record is persisted once, at completion.
//! Runs are never mutated after creation.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use remit_core::{StorageBackend, WorkflowRunId, WritePrecondition};

use crate::error::{Error, Result};

/// Outcome of a single tool step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step completed.
    Success,
    /// Exactly one of the step's independent sub-operations failed.
    PartialFailure,
    /// The step failed.
    Failed,
    /// The step did not run (unmet precondition or unavailable dependency).
    Skipped,
}

impl StepStatus {
    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialFailure => "partial_failure",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// One step's record within a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    /// Tool name.
    pub tool: String,
    /// Step outcome.
    pub status: StepStatus,
    /// Result payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error text on failure or skip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Step duration in milliseconds.
    pub duration_ms: i64,
}

impl StepRecord {
    /// Creates a success record.
    #[must_use]
    pub fn success(tool: impl Into<String>, result: serde_json::Value, duration_ms: i64) -> Self {
        Self {
            tool: tool.into(),
            status: StepStatus::Success,
            result: Some(result),
            error: None,
            duration_ms,
        }
    }

    /// Creates a partial-failure record (some sub-operations succeeded).
    #[must_use]
    pub fn partial(tool: impl Into<String>, result: serde_json::Value, duration_ms: i64) -> Self {
        Self {
            tool: tool.into(),
            status: StepStatus::PartialFailure,
            result: Some(result),
            error: None,
            duration_ms,
        }
    }

    /// Creates a failure record.
    #[must_use]
    pub fn failed(tool: impl Into<String>, error: impl Into<String>, duration_ms: i64) -> Self {
        Self {
            tool: tool.into(),
            status: StepStatus::Failed,
            result: None,
            error: Some(error.into()),
            duration_ms,
        }
    }

    /// Creates a skipped record with an explanatory reason.
    #[must_use]
    pub fn skipped(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            status: StepStatus::Skipped,
            result: None,
            error: Some(reason.into()),
            duration_ms: 0,
        }
    }
}

/// Aggregate status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Every step succeeded (or was skipped / partially failed).
    Success,
    /// At least one step failed; later steps still ran.
    PartialFailure,
    /// The trigger itself failed before producing a chain.
    Failed,
}

impl WorkflowStatus {
    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialFailure => "partial_failure",
            Self::Failed => "failed",
        }
    }
}

/// Computes the aggregate status from step outcomes.
///
/// Only `failed` steps degrade the run; `skipped` and `partial_failure`
/// steps do not (the email step's own partial failure is visible in its
/// record without marking the whole run failed).
#[must_use]
pub fn aggregate_status(steps: &[StepRecord]) -> WorkflowStatus {
    if steps.iter().any(|s| s.status == StepStatus::Failed) {
        WorkflowStatus::PartialFailure
    } else {
        WorkflowStatus::Success
    }
}

/// One execution of a named trigger. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    /// Run identifier.
    pub id: WorkflowRunId,
    /// Task label (e.g. `payment_success_workflow`).
    pub task: String,
    /// Trigger name.
    pub trigger: String,
    /// Aggregate status.
    pub status: WorkflowStatus,
    /// Total duration in milliseconds.
    pub duration_ms: i64,
    /// Ordered step records.
    pub steps: Vec<StepRecord>,
    /// Arbitrary metadata (order id, payment id, plan, amount).
    pub meta: serde_json::Value,
    /// What initiated the run (`api`, `webhook`, `manual`, `scheduler`).
    pub triggered_by: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
}

/// Result returned to dispatchers; mirrors the persisted run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    /// Trigger name.
    pub trigger: String,
    /// Aggregate status.
    pub status: WorkflowStatus,
    /// Total duration in milliseconds.
    pub duration_ms: i64,
    /// Ordered step records.
    pub steps: Vec<StepRecord>,
}

/// Persistence capability for workflow runs.
///
/// The tool chain depends on this interface, never on a concrete storage
/// technology; production wires a storage-backed log, tests and degraded
/// deployments can wire [`DisabledRunLog`].
#[async_trait]
pub trait RunLogStore: Send + Sync {
    /// Returns false when the log store is not ready to accept writes; the
    /// log step records itself as skipped instead of failing.
    fn is_ready(&self) -> bool;

    /// Persists a completed run.
    async fn write(&self, run: &WorkflowRun) -> Result<()>;

    /// Returns recent runs, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<WorkflowRun>>;
}

fn run_path(id: WorkflowRunId) -> String {
    format!("flow/runs/{id}.json")
}

/// Storage-backed run log.
pub struct StorageRunLog {
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for StorageRunLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageRunLog").finish_non_exhaustive()
    }
}

impl StorageRunLog {
    /// Creates a new storage-backed run log.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl RunLogStore for StorageRunLog {
    fn is_ready(&self) -> bool {
        true
    }

    async fn write(&self, run: &WorkflowRun) -> Result<()> {
        let bytes = serde_json::to_vec(run)
            .map(Bytes::from)
            .map_err(|e| Error::serialization(e.to_string()))?;

        self.storage
            .put(&run_path(run.id), bytes, WritePrecondition::DoesNotExist)
            .await
            .map_err(|e| Error::storage(e.to_string()))?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<WorkflowRun>> {
        let mut metas = self
            .storage
            .list("flow/runs/")
            .await
            .map_err(|e| Error::storage(e.to_string()))?;

        // Run IDs are ULIDs, so paths sort by creation time.
        metas.sort_by(|a, b| b.path.cmp(&a.path));
        metas.truncate(limit);

        let mut runs = Vec::with_capacity(metas.len());
        for meta in metas {
            let bytes = self
                .storage
                .get(&meta.path)
                .await
                .map_err(|e| Error::storage(e.to_string()))?;
            let run: WorkflowRun = serde_json::from_slice(&bytes)
                .map_err(|e| Error::serialization(e.to_string()))?;
            runs.push(run);
        }
        Ok(runs)
    }
}

/// Run log used when no log storage is configured. Writes are refused and
/// the log step reports itself skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledRunLog;

#[async_trait]
impl RunLogStore for DisabledRunLog {
    fn is_ready(&self) -> bool {
        false
    }

    async fn write(&self, _run: &WorkflowRun) -> Result<()> {
        Err(Error::storage("run log store is disabled"))
    }

    async fn recent(&self, _limit: usize) -> Result<Vec<WorkflowRun>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remit_core::MemoryBackend;

    fn sample_run(status: WorkflowStatus) -> WorkflowRun {
        WorkflowRun {
            id: WorkflowRunId::generate(),
            task: "payment_success_workflow".into(),
            trigger: "paymentSuccess".into(),
            status,
            duration_ms: 42,
            steps: vec![StepRecord::success("createProject", serde_json::json!({}), 10)],
            meta: serde_json::json!({"order_id": "o_1"}),
            triggered_by: "webhook".into(),
            started_at: Utc::now(),
        }
    }

    #[test]
    fn aggregate_status_rules() {
        let all_ok = vec![
            StepRecord::success("a", serde_json::json!({}), 1),
            StepRecord::skipped("b", "no project"),
            StepRecord::partial("c", serde_json::json!({}), 1),
        ];
        assert_eq!(aggregate_status(&all_ok), WorkflowStatus::Success);

        let with_failure = vec![
            StepRecord::failed("a", "boom", 1),
            StepRecord::success("b", serde_json::json!({}), 1),
        ];
        assert_eq!(aggregate_status(&with_failure), WorkflowStatus::PartialFailure);
    }

    #[test]
    fn step_record_serialization_omits_empty_fields() {
        let record = StepRecord::success("createTask", serde_json::json!({"task_id": "t"}), 5);
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("error"));

        let record = StepRecord::skipped("createTask", "no project_id");
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("result"));
        assert!(json.contains("no project_id"));
    }

    #[tokio::test]
    async fn storage_run_log_roundtrip() {
        let log = StorageRunLog::new(Arc::new(MemoryBackend::new()));
        assert!(log.is_ready());

        let run = sample_run(WorkflowStatus::Success);
        log.write(&run).await.unwrap();

        let recent = log.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, run.id);
        assert_eq!(recent[0].status, WorkflowStatus::Success);
    }

    #[tokio::test]
    async fn recent_returns_newest_first_and_respects_limit() {
        let log = StorageRunLog::new(Arc::new(MemoryBackend::new()));

        // Pin timestamps so ordering does not depend on sub-millisecond
        // ULID randomness.
        let mut first = sample_run(WorkflowStatus::Success);
        first.id = WorkflowRunId::from_ulid(ulid::Ulid::from_parts(1_000, 1));
        log.write(&first).await.unwrap();

        let mut second = sample_run(WorkflowStatus::PartialFailure);
        second.id = WorkflowRunId::from_ulid(ulid::Ulid::from_parts(2_000, 1));
        log.write(&second).await.unwrap();

        let recent = log.recent(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, second.id);
    }

    #[tokio::test]
    async fn disabled_run_log_refuses_writes() {
        let log = DisabledRunLog;
        assert!(!log.is_ready());
        assert!(log.write(&sample_run(WorkflowStatus::Success)).await.is_err());
        assert!(log.recent(5).await.unwrap().is_empty());
    }
}
