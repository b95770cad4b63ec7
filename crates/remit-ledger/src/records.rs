//! Durable ledger records: orders and payments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use remit_core::{OrderId, PaymentId};

/// Lifecycle of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order created, awaiting payment.
    Created,
    /// A payment was captured against this order.
    Paid,
    /// The provider reported the payment failed.
    Failed,
}

impl OrderStatus {
    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }
}

/// An intent to pay.
///
/// Created on order-creation requests, transitioned to `paid`/`failed`
/// exactly once by payment recording, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Order identifier.
    pub id: OrderId,
    /// Owning user identifier.
    pub user_id: String,
    /// Plan slug this order purchases.
    pub plan_slug: String,
    /// Plan name at time of purchase.
    pub plan_name: String,
    /// Provider-issued order reference, or a `placeholder_` reference when
    /// the provider is not configured.
    pub provider_order_ref: String,
    /// Amount in minor currency units.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Current status.
    pub status: OrderStatus,
    /// Idempotency key the order was created under, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
    /// When the order was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns true if this order was created without a configured provider.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.provider_order_ref.starts_with("placeholder_")
    }
}

/// Status of a payment record. Payments are only recorded once captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// The payment was captured by the provider.
    Captured,
}

/// A confirmed capture against an order. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Payment identifier.
    pub id: PaymentId,
    /// The order this payment captures.
    pub order_id: OrderId,
    /// Globally-unique provider payment reference; the core idempotency
    /// guard.
    pub provider_payment_ref: String,
    /// Signature supplied with an API confirmation; absent for
    /// webhook-sourced records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_signature: Option<String>,
    /// Amount in minor currency units.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Always `captured`.
    pub status: PaymentStatus,
    /// Payment method reported by the provider.
    pub method: String,
    /// When the payment was verified and recorded.
    pub verified_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_serialization_roundtrip() {
        let order = Order {
            id: OrderId::generate(),
            user_id: "user_1".into(),
            plan_slug: "starter".into(),
            plan_name: "Starter".into(),
            provider_order_ref: "order_abc".into(),
            amount: 399_900,
            currency: "INR".into(),
            status: OrderStatus::Created,
            idempotency_key: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&order).unwrap();
        let parsed: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, order.id);
        assert_eq!(parsed.status, OrderStatus::Created);
        // Absent idempotency key is omitted, not null.
        assert!(!json.contains("idempotencyKey"));
    }

    #[test]
    fn placeholder_detection() {
        let mut order = Order {
            id: OrderId::generate(),
            user_id: "user_1".into(),
            plan_slug: "starter".into(),
            plan_name: "Starter".into(),
            provider_order_ref: "placeholder_01ABC".into(),
            amount: 399_900,
            currency: "INR".into(),
            status: OrderStatus::Created,
            idempotency_key: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(order.is_placeholder());

        order.provider_order_ref = "order_abc".into();
        assert!(!order.is_placeholder());
    }

    #[test]
    fn status_labels() {
        assert_eq!(OrderStatus::Created.as_label(), "created");
        assert_eq!(OrderStatus::Paid.as_label(), "paid");
        assert_eq!(OrderStatus::Failed.as_label(), "failed");
    }
}
