//! Observability infrastructure for Remit.
//!
//! Structured logging with consistent spans. This module provides
//! initialization helpers and span constructors used across components.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `remit_ledger=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for ledger operations with standard fields.
#[must_use]
pub fn ledger_span(operation: &str, provider_ref: &str) -> Span {
    tracing::info_span!("ledger", op = operation, provider_ref = provider_ref)
}

/// Creates a span for workflow trigger executions.
#[must_use]
pub fn workflow_span(trigger: &str, triggered_by: &str) -> Span {
    tracing::info_span!("workflow", trigger = trigger, triggered_by = triggered_by)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Pretty);
    }

    #[test]
    fn span_helpers_create_spans() {
        let span = ledger_span("record_payment", "pay_123");
        let _guard = span.enter();
        tracing::info!("test message in span");

        let span = workflow_span("paymentSuccess", "webhook");
        let _guard = span.enter();
        tracing::info!("workflow message");
    }
}
