//! The tools making up the post-payment workflow.
//!
//! Every tool runs to an independently-tagged [`crate::run::StepRecord`]
//! and never raises past its caller; the chain decides what a failure
//! means. Tool names are the stable labels operators see in run records.

pub mod create_project;
pub mod create_task;
pub mod log_run;
pub mod send_email;
pub mod update_metrics;

pub(crate) fn elapsed_ms(start: std::time::Instant) -> i64 {
    i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX)
}
