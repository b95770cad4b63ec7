//! Metric recording helpers for ledger operations.

use metrics::counter;

/// Orders created counter.
pub const ORDERS_CREATED: &str = "ledger_orders_created_total";

/// Payments recorded counter, labeled by outcome.
pub const PAYMENTS_RECORDED: &str = "ledger_payments_recorded_total";

/// Records an order creation.
pub fn record_order_created(provider_configured: bool) {
    let mode = if provider_configured {
        "provider"
    } else {
        "placeholder"
    };
    counter!(ORDERS_CREATED, "mode" => mode).increment(1);
}

/// Records a payment recording outcome (`recorded`, `duplicate`,
/// `race_duplicate`).
pub fn record_payment_outcome(outcome: &'static str) {
    counter!(PAYMENTS_RECORDED, "outcome" => outcome).increment(1);
}
