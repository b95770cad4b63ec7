//! # remit-flow
//!
//! The post-payment workflow engine for Remit.
//!
//! This crate implements everything that happens after a payment is durably
//! recorded:
//!
//! - **Orchestrator**: a registry of named triggers and a dispatcher
//! - **Tool Chain**: the `paymentSuccess` trigger's fixed five-step sequence
//!   with partial-failure semantics
//! - **Run Records**: one `WorkflowRun` per trigger execution, persisted at
//!   completion through an injected log store
//! - **Background Dispatch**: a supervised bounded worker so HTTP handlers
//!   never await workflow completion
//! - **Scheduler**: the daily digest timer
//!
//! ## Partial-failure policy
//!
//! Financial state is already recorded before a chain starts, so step
//! failures are operational follow-ups, not payment-correctness failures.
//! No step failure aborts later steps, nothing is retried blindly
//! (re-running `createProject` would create two projects), and recovery is
//! an operator action via manual dispatch.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod mailer;
pub mod metrics;
pub mod metrics_store;
pub mod orchestrator;
pub mod payload;
pub mod project;
pub mod run;
pub mod scheduler;
pub mod task;
pub mod tools;
pub mod triggers;
pub mod worker;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::mailer::{Email, LogMailer, Mailer};
    pub use crate::metrics_store::{DailyMetrics, MetricsStore};
    pub use crate::orchestrator::{Orchestrator, Trigger, TriggerInfo, TriggerRegistry};
    pub use crate::payload::PaymentSuccessPayload;
    pub use crate::project::{Project, ProjectStore};
    pub use crate::run::{
        DisabledRunLog, RunLogStore, StepRecord, StepStatus, StorageRunLog, WorkflowResult,
        WorkflowRun, WorkflowStatus,
    };
    pub use crate::scheduler::DigestScheduler;
    pub use crate::task::{Task, TaskStore};
    pub use crate::worker::{spawn_worker, DispatchJob, DispatchQueue};
}

pub use error::{Error, Result};
pub use mailer::{Email, HttpMailer, LogMailer, Mailer};
pub use metrics_store::{DailyMetrics, MetricsStore};
pub use orchestrator::{Orchestrator, Trigger, TriggerInfo, TriggerRegistry};
pub use payload::PaymentSuccessPayload;
pub use project::{Project, ProjectStore};
pub use run::{
    DisabledRunLog, RunLogStore, StepRecord, StepStatus, StorageRunLog, WorkflowResult,
    WorkflowRun, WorkflowStatus,
};
pub use scheduler::DigestScheduler;
pub use task::{Task, TaskStore};
pub use worker::{spawn_worker, DispatchJob, DispatchQueue};
