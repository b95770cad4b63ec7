//! # remit-ledger
//!
//! The durable source of truth for "was this payment processed".
//!
//! This crate implements the financial side of Remit:
//!
//! - **Plan Catalog**: the purchasable plans an order can be created for
//! - **Provider Client**: order creation against the external payment provider
//! - **Signature Verification**: HMAC-SHA256 authenticity checks for payment
//!   confirmations and webhook bodies
//! - **Ledger**: at-most-once order/payment recording built on storage
//!   write preconditions
//! - **Idempotency Store**: request-level response caching keyed by
//!   (`Idempotency-Key`, route)
//!
//! ## Guarantees
//!
//! - Exactly one `Payment` record per provider payment reference. The
//!   existence check before insert is an optimization; the `DoesNotExist`
//!   write precondition is the correctness mechanism, and a lost race is
//!   reported as a duplicate rather than an error.
//! - Orders transition `created -> paid` or `created -> failed` at most once.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod idempotency;
pub mod ledger;
pub mod metrics;
pub mod plans;
pub mod provider;
pub mod records;
pub mod signature;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{LedgerError, Result};
    pub use crate::idempotency::{IdempotencyStore, StoredResponse};
    pub use crate::ledger::{CreatedOrder, Ledger, PaymentOutcome, RecordPaymentRequest};
    pub use crate::plans::{Plan, PlanCatalog};
    pub use crate::provider::{PaymentProvider, ProviderOrder, RestProvider};
    pub use crate::records::{Order, OrderStatus, Payment, PaymentStatus};
    pub use crate::signature::SignatureVerifier;
}

pub use error::{LedgerError, Result};
pub use idempotency::{IdempotencyStore, StoredResponse};
pub use ledger::{CreatedOrder, Ledger, PaymentOutcome, RecordPaymentRequest};
pub use plans::{Plan, PlanCatalog};
pub use provider::{PaymentProvider, ProviderOrder, RestProvider};
pub use records::{Order, OrderStatus, Payment, PaymentStatus};
pub use signature::SignatureVerifier;
