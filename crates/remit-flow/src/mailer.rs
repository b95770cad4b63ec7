//! Email delivery.
//!
//! The tool chain depends on the [`Mailer`] capability, not a concrete
//! delivery service. Production wires [`HttpMailer`]; when no mail service
//! is configured, [`LogMailer`] logs the message instead of sending so the
//! rest of the workflow keeps working in degraded mode.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An outbound email.
#[derive(Debug, Clone, Serialize)]
pub struct Email {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Receipt from a delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Delivery service message id (or `logged-only`).
    pub id: String,
}

/// Email delivery capability.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers one email.
    ///
    /// # Errors
    ///
    /// Returns `Error::Mail` when delivery fails.
    async fn send(&self, email: &Email) -> Result<SendReceipt>;
}

/// Mailer used when no delivery service is configured: logs the message
/// and reports success.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<SendReceipt> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Mail service not configured; logging email instead"
        );
        Ok(SendReceipt {
            id: "logged-only".to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// REST mailer for a transactional email service.
pub struct HttpMailer {
    endpoint: String,
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMailer")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

impl HttpMailer {
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a new REST mailer.
    ///
    /// # Errors
    ///
    /// Returns `Error::Mail` if the HTTP client cannot be constructed.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::mail(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            from: from.into(),
            client,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<SendReceipt> {
        let response = self
            .client
            .post(format!("{}/emails", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&SendRequest {
                from: &self.from,
                to: [email.to.as_str()],
                subject: &email.subject,
                text: &email.body,
            })
            .send()
            .await
            .map_err(|e| Error::mail(format!("send request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, to = %email.to, "Email send rejected");
            return Err(Error::mail(format!("email send rejected (status={status})")));
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| Error::mail(format!("malformed mail service response: {e}")))?;

        tracing::info!(id = %sent.id, to = %email.to, subject = %email.subject, "Email sent");
        Ok(SendReceipt { id: sent.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let receipt = LogMailer
            .send(&Email {
                to: "a@example.com".into(),
                subject: "hi".into(),
                body: "body".into(),
            })
            .await
            .unwrap();
        assert_eq!(receipt.id, "logged-only");
    }

    #[test]
    fn http_mailer_debug_redacts_key() {
        let mailer = HttpMailer::new("https://mail.test", "sk_live_secret", "n@example.com").unwrap();
        let rendered = format!("{mailer:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("sk_live_secret"));
    }
}
