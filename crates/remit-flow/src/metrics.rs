//! Metric recording helpers for workflow execution.

use metrics::counter;

/// Workflow runs counter, labeled by trigger and final status.
pub const WORKFLOW_RUNS: &str = "flow_workflow_runs_total";

/// Background dispatch jobs dropped because the queue was full.
pub const DISPATCH_DROPPED: &str = "flow_dispatch_dropped_total";

/// Records a completed workflow run.
pub fn record_workflow_run(trigger: &str, status: &'static str) {
    counter!(WORKFLOW_RUNS, "trigger" => trigger.to_string(), "status" => status).increment(1);
}

/// Records a dropped background dispatch job.
pub fn record_dispatch_dropped(trigger: &str) {
    counter!(DISPATCH_DROPPED, "trigger" => trigger.to_string()).increment(1);
}
