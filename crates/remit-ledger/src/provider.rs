//! Payment provider client.
//!
//! The provider issues order references that payers check out against and
//! signs the confirmations the verifier checks. When no provider is
//! configured the ledger falls back to placeholder order references so the
//! system stays operable in degraded/test mode.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// An order as created on the provider side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOrder {
    /// Provider-issued order reference.
    pub reference: String,
    /// Amount in minor currency units.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Caller-supplied receipt label.
    pub receipt: String,
}

/// Client for the external payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates an order on the provider side.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Provider` if the provider rejects the request
    /// or is unreachable.
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
        notes: &serde_json::Value,
    ) -> Result<ProviderOrder>;

    /// Returns the public key identifier checkout clients need.
    fn key_id(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    id: String,
    amount: i64,
    currency: String,
    receipt: String,
}

/// REST client for the payment provider's order API.
///
/// Authenticates with HTTP basic auth (key id / key secret). Timeouts are
/// bounded so a slow provider cannot wedge order creation.
pub struct RestProvider {
    base_url: String,
    key_id: String,
    key_secret: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for RestProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestProvider")
            .field("base_url", &self.base_url)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl RestProvider {
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a new REST provider client.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` if the HTTP client cannot be
    /// constructed.
    pub fn new(
        base_url: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            client,
        })
    }
}

#[async_trait]
impl PaymentProvider for RestProvider {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
        notes: &serde_json::Value,
    ) -> Result<ProviderOrder> {
        let endpoint = format!("{}/v1/orders", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&CreateOrderRequest {
                amount,
                currency,
                receipt,
                notes,
            })
            .send()
            .await
            .map_err(|e| LedgerError::provider(format!("order creation request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = %status,
                body = %body,
                "Provider rejected order creation"
            );
            return Err(LedgerError::provider(format!(
                "provider rejected order creation (status={status})"
            )));
        }

        let created: CreateOrderResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::provider(format!("malformed provider response: {e}")))?;

        Ok(ProviderOrder {
            reference: created.id,
            amount: created.amount,
            currency: created.currency,
            receipt: created.receipt,
        })
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_provider_debug_redacts_secret() {
        let provider =
            RestProvider::new("https://provider.test/", "key_abc", "secret_xyz").unwrap();
        let rendered = format!("{provider:?}");
        assert!(rendered.contains("key_abc"));
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("secret_xyz"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let provider = RestProvider::new("https://provider.test///", "k", "s").unwrap();
        assert_eq!(provider.base_url, "https://provider.test");
    }
}
