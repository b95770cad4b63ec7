//! Internal fulfillment task records.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use remit_core::{StorageBackend, TaskRecordId, WritePrecondition};
use remit_ledger::Plan;

use crate::error::{Error, Result};

/// Lifecycle of a fulfillment task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not yet picked up.
    New,
    /// Being worked on.
    InProgress,
    /// Finished.
    Done,
}

/// An internal task created for a new project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task identifier.
    pub id: TaskRecordId,
    /// Project this task belongs to.
    pub project_id: String,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Current status.
    pub status: TaskStatus,
    /// Priority label from the plan.
    pub priority: String,
    /// Who the task is assigned to.
    pub assigned_to: String,
    /// Due date; matches the project deadline.
    pub due_date: DateTime<Utc>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a fulfillment task.
#[derive(Debug, Clone)]
pub struct NewTask {
    /// The project the task belongs to.
    pub project_id: String,
    /// Owning user identifier.
    pub user_id: String,
    /// Client display name used in the title.
    pub client_name: String,
}

fn task_path(id: TaskRecordId) -> String {
    format!("fulfillment/tasks/{id}.json")
}

/// Storage-backed task store.
#[derive(Clone)]
pub struct TaskStore {
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore").finish_non_exhaustive()
    }
}

impl TaskStore {
    /// Creates a new task store.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Creates the internal task for a freshly provisioned project.
    ///
    /// # Errors
    ///
    /// Returns `Storage` / `Serialization` errors.
    pub async fn create(&self, plan: &Plan, new: NewTask) -> Result<Task> {
        let now = Utc::now();
        let task = Task {
            id: TaskRecordId::generate(),
            project_id: new.project_id,
            title: format!("Build {} project for {}", plan.name, new.client_name),
            description: format!(
                "New {} plan project. Features: {}. Delivery: {} days.",
                plan.name,
                plan.features.join(", "),
                plan.delivery_days
            ),
            status: TaskStatus::New,
            priority: plan.priority.as_label().to_string(),
            assigned_to: "founder".to_string(),
            due_date: now + Duration::days(plan.delivery_days),
            created_at: now,
        };

        let bytes = serde_json::to_vec(&task)
            .map(Bytes::from)
            .map_err(|e| Error::serialization(e.to_string()))?;

        self.storage
            .put(&task_path(task.id), bytes, WritePrecondition::DoesNotExist)
            .await
            .map_err(|e| Error::storage(e.to_string()))?;

        tracing::info!(
            task_id = %task.id,
            project_id = %task.project_id,
            priority = %task.priority,
            "Task created"
        );

        Ok(task)
    }

    /// Returns open (not done) tasks, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Storage` / `Serialization` errors.
    pub async fn list_open(&self, limit: usize) -> Result<Vec<Task>> {
        let mut metas = self
            .storage
            .list("fulfillment/tasks/")
            .await
            .map_err(|e| Error::storage(e.to_string()))?;

        // Task IDs are ULIDs, so paths sort by creation time.
        metas.sort_by(|a, b| b.path.cmp(&a.path));

        let mut tasks = Vec::new();
        for meta in metas {
            if tasks.len() >= limit {
                break;
            }
            let bytes = self
                .storage
                .get(&meta.path)
                .await
                .map_err(|e| Error::storage(e.to_string()))?;
            let task: Task = serde_json::from_slice(&bytes)
                .map_err(|e| Error::serialization(e.to_string()))?;
            if task.status != TaskStatus::Done {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }
}
