//! Trigger registry and dispatcher.
//!
//! The registry is an explicit object constructed once at process start and
//! injected wherever dispatch happens; there is no global trigger table, so
//! the trigger set is testable in isolation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use remit_core::observability::workflow_span;

use crate::error::{Error, Result};
use crate::run::WorkflowResult;

/// A named, registered workflow entry point.
#[async_trait]
pub trait Trigger: Send + Sync {
    /// Registry name (e.g. `paymentSuccess`).
    fn name(&self) -> &'static str;

    /// Human-readable description for introspection.
    fn description(&self) -> &'static str;

    /// Executes the trigger's workflow.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload is unusable or the trigger fails
    /// before producing a chain; step-level failures are reported inside
    /// the returned result, not as errors.
    async fn execute(
        &self,
        payload: serde_json::Value,
        triggered_by: &str,
    ) -> Result<WorkflowResult>;
}

/// Introspection record for a registered trigger.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerInfo {
    /// Trigger name.
    pub name: String,
    /// Trigger description.
    pub description: String,
}

/// The set of registered triggers.
#[derive(Default)]
pub struct TriggerRegistry {
    triggers: BTreeMap<&'static str, Arc<dyn Trigger>>,
}

impl std::fmt::Debug for TriggerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerRegistry")
            .field("triggers", &self.triggers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TriggerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a trigger. The last registration for a name wins.
    #[must_use]
    pub fn register(mut self, trigger: Arc<dyn Trigger>) -> Self {
        self.triggers.insert(trigger.name(), trigger);
        self
    }

    fn get(&self, name: &str) -> Option<&Arc<dyn Trigger>> {
        self.triggers.get(name)
    }

    fn available(&self) -> String {
        self.triggers.keys().copied().collect::<Vec<_>>().join(", ")
    }

    /// Returns info for every registered trigger.
    #[must_use]
    pub fn infos(&self) -> Vec<TriggerInfo> {
        self.triggers
            .values()
            .map(|t| TriggerInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }
}

/// Looks up triggers by name and executes them.
pub struct Orchestrator {
    registry: Arc<TriggerRegistry>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .finish()
    }
}

impl Orchestrator {
    /// Creates an orchestrator over a registry.
    #[must_use]
    pub fn new(registry: Arc<TriggerRegistry>) -> Self {
        Self { registry }
    }

    /// Dispatches a trigger by name.
    ///
    /// # Errors
    ///
    /// - `UnknownTrigger` when no trigger is registered under `name`;
    ///   reported to the caller, never retried
    /// - Any error the trigger itself raises is logged and re-raised; the
    ///   orchestrator does not swallow trigger-internal crashes
    pub async fn dispatch(
        &self,
        name: &str,
        payload: serde_json::Value,
        triggered_by: &str,
    ) -> Result<WorkflowResult> {
        let Some(trigger) = self.registry.get(name) else {
            return Err(Error::UnknownTrigger {
                name: name.to_string(),
                available: self.registry.available(),
            });
        };

        let span = workflow_span(name, triggered_by);
        let _guard = span.enter();

        tracing::info!(trigger = name, triggered_by, "Dispatching trigger");

        match trigger.execute(payload, triggered_by).await {
            Ok(result) => {
                tracing::info!(
                    trigger = name,
                    status = result.status.as_label(),
                    duration_ms = result.duration_ms,
                    "Trigger completed"
                );
                Ok(result)
            }
            Err(err) => {
                tracing::error!(trigger = name, error = %err, "Trigger raised unhandled error");
                Err(err)
            }
        }
    }

    /// Lists registered triggers. Introspection only; no side effects.
    #[must_use]
    pub fn list_triggers(&self) -> Vec<TriggerInfo> {
        self.registry.infos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::{StepRecord, WorkflowStatus};

    struct EchoTrigger;

    #[async_trait]
    impl Trigger for EchoTrigger {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "returns its payload as a single successful step"
        }

        async fn execute(
            &self,
            payload: serde_json::Value,
            _triggered_by: &str,
        ) -> Result<WorkflowResult> {
            Ok(WorkflowResult {
                trigger: "echo".into(),
                status: WorkflowStatus::Success,
                duration_ms: 0,
                steps: vec![StepRecord::success("echo", payload, 0)],
            })
        }
    }

    struct FailingTrigger;

    #[async_trait]
    impl Trigger for FailingTrigger {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn description(&self) -> &'static str {
            "always fails"
        }

        async fn execute(
            &self,
            _payload: serde_json::Value,
            _triggered_by: &str,
        ) -> Result<WorkflowResult> {
            Err(Error::invalid_payload("nope"))
        }
    }

    fn orchestrator() -> Orchestrator {
        let registry = TriggerRegistry::new()
            .register(Arc::new(EchoTrigger))
            .register(Arc::new(FailingTrigger));
        Orchestrator::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn dispatch_runs_registered_trigger() {
        let result = orchestrator()
            .dispatch("echo", serde_json::json!({"k": "v"}), "manual")
            .await
            .unwrap();
        assert_eq!(result.status, WorkflowStatus::Success);
        assert_eq!(result.steps[0].result.as_ref().unwrap()["k"], "v");
    }

    #[tokio::test]
    async fn dispatch_unknown_trigger_lists_available() {
        let err = orchestrator()
            .dispatch("missing", serde_json::json!({}), "manual")
            .await
            .unwrap_err();

        let Error::UnknownTrigger { name, available } = err else {
            panic!("expected UnknownTrigger, got {err}");
        };
        assert_eq!(name, "missing");
        assert!(available.contains("echo"));
        assert!(available.contains("failing"));
    }

    #[tokio::test]
    async fn trigger_errors_propagate() {
        let err = orchestrator()
            .dispatch("failing", serde_json::json!({}), "manual")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPayload { .. }));
    }

    #[tokio::test]
    async fn list_triggers_reports_name_and_description() {
        let infos = orchestrator().list_triggers();
        assert_eq!(infos.len(), 2);
        assert!(infos.iter().any(|i| i.name == "echo"));
    }
}
