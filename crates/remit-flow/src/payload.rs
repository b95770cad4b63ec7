//! Trigger payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Payload for the `paymentSuccess` trigger.
///
/// Built by the payment endpoints and webhook handler; also accepted from
/// manual dispatch for operator replay. Earlier steps enrich the payload
/// (`project_id`, `deadline`) for later steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSuccessPayload {
    /// Owning user identifier.
    pub user_id: String,
    /// Client notification address.
    pub client_email: String,
    /// Client display name; falls back to the email when absent.
    #[serde(default)]
    pub client_name: Option<String>,
    /// Plan slug the payment purchased.
    pub plan_slug: String,
    /// Ledger order identifier.
    pub order_id: String,
    /// Ledger payment identifier.
    pub payment_id: String,
    /// Provider payment reference.
    pub provider_payment_ref: String,
    /// Amount in minor currency units.
    pub amount: i64,
    /// Set by the create-project step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Set by the create-project step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

impl PaymentSuccessPayload {
    /// Parses the payload from a raw trigger payload.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPayload` naming the first missing or
    /// mistyped field.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::invalid_payload(e.to_string()))
    }

    /// Returns the client's display name, falling back to the email.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.client_name.as_deref().unwrap_or(&self.client_email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_payload() {
        let payload = PaymentSuccessPayload::from_value(serde_json::json!({
            "user_id": "u_1",
            "client_email": "c@example.com",
            "plan_slug": "starter",
            "order_id": "o_1",
            "payment_id": "p_1",
            "provider_payment_ref": "pay_1",
            "amount": 399900,
        }))
        .unwrap();

        assert_eq!(payload.display_name(), "c@example.com");
        assert!(payload.project_id.is_none());
    }

    #[test]
    fn missing_field_is_invalid_payload() {
        let err = PaymentSuccessPayload::from_value(serde_json::json!({
            "user_id": "u_1",
        }))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPayload { .. }));
    }

    #[test]
    fn display_name_prefers_explicit_name() {
        let payload = PaymentSuccessPayload::from_value(serde_json::json!({
            "user_id": "u_1",
            "client_email": "c@example.com",
            "client_name": "Chris",
            "plan_slug": "starter",
            "order_id": "o_1",
            "payment_id": "p_1",
            "provider_payment_ref": "pay_1",
            "amount": 399900,
        }))
        .unwrap();
        assert_eq!(payload.display_name(), "Chris");
    }
}
