//! Project workspace provisioning.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use remit_core::{ProjectId, StorageBackend, WritePrecondition};
use remit_ledger::Plan;

use crate::error::{Error, Result};

/// Lifecycle of a provisioned project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Freshly provisioned, not yet started.
    New,
    /// Being worked on.
    InProgress,
    /// Delivered.
    Done,
}

/// A provisioned project workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project identifier.
    pub id: ProjectId,
    /// Owning user identifier.
    pub user_id: String,
    /// Plan slug the project fulfills.
    pub plan_slug: String,
    /// Originating ledger order id.
    pub order_id: String,
    /// Originating ledger payment id.
    pub payment_id: String,
    /// Display name.
    pub name: String,
    /// Current status.
    pub status: ProjectStatus,
    /// Delivery deadline derived from the plan's delivery window.
    pub deadline: DateTime<Utc>,
    /// Who the project is assigned to.
    pub assigned_to: String,
    /// When the project was provisioned.
    pub created_at: DateTime<Utc>,
}

/// Input for provisioning a project.
#[derive(Debug, Clone)]
pub struct NewProject {
    /// Owning user identifier.
    pub user_id: String,
    /// Originating ledger order id.
    pub order_id: String,
    /// Originating ledger payment id.
    pub payment_id: String,
    /// Client display name used in the project name.
    pub client_name: String,
}

fn project_path(id: ProjectId) -> String {
    format!("fulfillment/projects/{id}.json")
}

/// Storage-backed project store.
#[derive(Clone)]
pub struct ProjectStore {
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for ProjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectStore").finish_non_exhaustive()
    }
}

impl ProjectStore {
    /// Creates a new project store.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Provisions a project workspace for a paid plan.
    ///
    /// # Errors
    ///
    /// Returns `Storage` / `Serialization` errors.
    pub async fn create(&self, plan: &Plan, new: NewProject) -> Result<Project> {
        let now = Utc::now();
        let project = Project {
            id: ProjectId::generate(),
            user_id: new.user_id,
            plan_slug: plan.slug.to_string(),
            order_id: new.order_id,
            payment_id: new.payment_id,
            name: format!("{} Project - {}", plan.name, new.client_name),
            status: ProjectStatus::New,
            deadline: now + Duration::days(plan.delivery_days),
            assigned_to: "founder".to_string(),
            created_at: now,
        };

        let bytes = serde_json::to_vec(&project)
            .map(Bytes::from)
            .map_err(|e| Error::serialization(e.to_string()))?;

        self.storage
            .put(
                &project_path(project.id),
                bytes,
                WritePrecondition::DoesNotExist,
            )
            .await
            .map_err(|e| Error::storage(e.to_string()))?;

        tracing::info!(
            project_id = %project.id,
            plan = plan.slug,
            deadline = %project.deadline,
            "Project created"
        );

        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remit_core::MemoryBackend;
    use remit_ledger::PlanCatalog;

    #[tokio::test]
    async fn create_derives_name_and_deadline_from_plan() {
        let store = ProjectStore::new(Arc::new(MemoryBackend::new()));
        let plan = PlanCatalog::new().get("growth").unwrap();

        let before = Utc::now();
        let project = store
            .create(
                plan,
                NewProject {
                    user_id: "u_1".into(),
                    order_id: "o_1".into(),
                    payment_id: "p_1".into(),
                    client_name: "Chris".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(project.name, "Growth Project - Chris");
        assert_eq!(project.status, ProjectStatus::New);
        let days = (project.deadline - before).num_days();
        assert!((6..=7).contains(&days), "deadline should be ~7 days out");
    }
}
