//! # remit-core
//!
//! Core abstractions for the Remit payment-capture and fulfillment service.
//!
//! This crate provides the foundational types used across all Remit components:
//!
//! - **Identifiers**: Strongly-typed ULID identifiers for ledger and workflow entities
//! - **Storage Contract**: Abstract object-storage interface with conditional writes
//! - **Error Types**: Shared error definitions and result types
//! - **Retry**: Bounded exponential backoff with jitter for transient failures
//! - **Observability**: Logging initialization helpers
//!
//! ## Crate Boundary
//!
//! `remit-core` is the only crate allowed to define shared primitives.
//! The ledger and workflow crates build their durable state exclusively on
//! the [`storage::StorageBackend`] contract defined here; its write
//! preconditions are the uniqueness mechanism the payment ledger relies on.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;
pub mod observability;
pub mod retry;
pub mod storage;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::id::{OrderId, PaymentId, ProjectId, TaskRecordId, WorkflowRunId};
    pub use crate::retry::{retry, RetryPolicy};
    pub use crate::storage::{
        MemoryBackend, ObjectMeta, StorageBackend, WritePrecondition, WriteResult,
    };
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use id::{OrderId, PaymentId, ProjectId, TaskRecordId, WorkflowRunId};
pub use observability::{init_logging, LogFormat};
pub use retry::{retry, RetryPolicy};
pub use storage::{MemoryBackend, ObjectMeta, StorageBackend, WritePrecondition, WriteResult};
