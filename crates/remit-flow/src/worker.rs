//! Supervised background dispatch.
//!
//! HTTP handlers must not await workflow completion: the response to the
//! payer returns as soon as the payment is durably recorded, and the chain
//! runs in the background. Jobs flow through a bounded queue into a single
//! worker task, so background runs are observable (every one ends in the
//! run log) and a flooded queue sheds load by dropping jobs with an error
//! log instead of blocking the response path.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::metrics::record_dispatch_dropped;
use crate::orchestrator::Orchestrator;

/// A background dispatch request.
#[derive(Debug, Clone)]
pub struct DispatchJob {
    /// Trigger name to dispatch.
    pub trigger: String,
    /// Trigger payload.
    pub payload: serde_json::Value,
    /// What initiated the run (`api`, `webhook`, `scheduler`).
    pub triggered_by: String,
}

/// Sending half of the dispatch queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DispatchQueue {
    tx: mpsc::Sender<DispatchJob>,
}

impl DispatchQueue {
    /// Creates a bounded queue, returning the sender and the receiver to
    /// hand to [`spawn_worker`].
    #[must_use]
    pub fn bounded(depth: usize) -> (Self, mpsc::Receiver<DispatchJob>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (Self { tx }, rx)
    }

    /// Enqueues a job without waiting.
    ///
    /// Returns false (and logs) when the queue is full or the worker is
    /// gone; the caller's response path is never blocked.
    pub fn enqueue(&self, job: DispatchJob) -> bool {
        let trigger = job.trigger.clone();
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::error!(trigger, "Dispatch queue full; dropping background job");
                record_dispatch_dropped(&trigger);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!(trigger, "Dispatch worker stopped; dropping background job");
                record_dispatch_dropped(&trigger);
                false
            }
        }
    }
}

/// Spawns the worker task draining the queue through the orchestrator.
///
/// Workflow failures are logged here and observable via the run log; they
/// never reach the HTTP caller that enqueued the job. The worker exits when
/// every `DispatchQueue` clone is dropped.
pub fn spawn_worker(
    orchestrator: Arc<Orchestrator>,
    mut rx: mpsc::Receiver<DispatchJob>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let result = orchestrator
                .dispatch(&job.trigger, job.payload, &job.triggered_by)
                .await;

            match result {
                Ok(outcome) => tracing::debug!(
                    trigger = %job.trigger,
                    status = outcome.status.as_label(),
                    "Background dispatch completed"
                ),
                Err(err) => tracing::error!(
                    trigger = %job.trigger,
                    triggered_by = %job.triggered_by,
                    error = %err,
                    "Background dispatch failed"
                ),
            }
        }
        tracing::info!("Dispatch worker draining complete; shutting down");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::orchestrator::{Trigger, TriggerRegistry};
    use crate::run::{WorkflowResult, WorkflowStatus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingTrigger {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Trigger for CountingTrigger {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn description(&self) -> &'static str {
            "counts executions"
        }

        async fn execute(
            &self,
            _payload: serde_json::Value,
            _triggered_by: &str,
        ) -> Result<WorkflowResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(WorkflowResult {
                trigger: "counting".into(),
                status: WorkflowStatus::Success,
                duration_ms: 0,
                steps: Vec::new(),
            })
        }
    }

    fn job() -> DispatchJob {
        DispatchJob {
            trigger: "counting".into(),
            payload: serde_json::json!({}),
            triggered_by: "api".into(),
        }
    }

    #[tokio::test]
    async fn worker_drains_jobs_then_exits_on_close() {
        let calls = Arc::new(AtomicU32::new(0));
        let registry = TriggerRegistry::new().register(Arc::new(CountingTrigger {
            calls: Arc::clone(&calls),
        }));
        let orchestrator = Arc::new(Orchestrator::new(Arc::new(registry)));

        let (queue, rx) = DispatchQueue::bounded(8);
        let handle = spawn_worker(orchestrator, rx);

        assert!(queue.enqueue(job()));
        assert!(queue.enqueue(job()));
        drop(queue);

        handle.await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn full_queue_drops_jobs_without_blocking() {
        // No worker draining: capacity 1 fills immediately.
        let (queue, _rx) = DispatchQueue::bounded(1);
        assert!(queue.enqueue(job()));
        assert!(!queue.enqueue(job()));
    }

    #[tokio::test]
    async fn closed_queue_reports_drop() {
        let (queue, rx) = DispatchQueue::bounded(1);
        drop(rx);
        assert!(!queue.enqueue(job()));
    }
}
