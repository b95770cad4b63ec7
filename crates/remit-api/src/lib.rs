//! # remit-api
//!
//! HTTP surface for the Remit payment-capture and fulfillment service.
//!
//! Provides:
//!
//! - `POST /api/v1/payments/create-order` - authenticated order creation
//!   with request-level idempotency
//! - `POST /api/v1/payments/verify` - authenticated payment confirmation;
//!   records the payment and dispatches the background workflow
//! - `POST /webhooks/payment-provider` - provider-signed webhook ingest
//!   over the raw request body
//! - `POST /api/v1/agent/run`, `GET /api/v1/agent/triggers`,
//!   `GET /api/v1/agent/runs` - admin workflow dispatch and observability
//! - `/health`, `/ready`, `/metrics`, `/openapi.json` - operational
//!   endpoints

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod context;
pub mod error;
pub mod idempotency;
pub mod metrics;
pub mod openapi;
pub mod routes;
pub mod server;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use server::{AppState, Server, ServerBuilder};
