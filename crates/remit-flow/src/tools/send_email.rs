//! Tool: notify admin and client.
//!
//! The two sends are independent: the combined step status is `success`
//! only if both succeed, `partial_failure` if exactly one fails, and
//! `failed` if both fail. An unconfigured admin address skips that
//! sub-send without counting as a failure.

use std::time::Instant;

use remit_ledger::PlanCatalog;

use crate::mailer::{Email, Mailer};
use crate::payload::PaymentSuccessPayload;
use crate::run::{StepRecord, StepStatus};
use crate::tools::elapsed_ms;

/// Tool name in run records.
pub const NAME: &str = "sendEmail";

enum SubSend {
    Sent(String),
    Skipped(&'static str),
    Failed(String),
}

impl SubSend {
    fn failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    fn as_json(&self) -> serde_json::Value {
        match self {
            Self::Sent(id) => serde_json::json!({"status": "sent", "id": id}),
            Self::Skipped(reason) => serde_json::json!({"status": "skipped", "reason": reason}),
            Self::Failed(error) => serde_json::json!({"status": "failed", "error": error}),
        }
    }
}

fn display_amount(amount_minor: i64) -> String {
    format!("{:.2}", amount_minor as f64 / 100.0)
}

/// Sends the admin and client notifications for a captured payment.
pub async fn execute(
    mailer: &dyn Mailer,
    admin_email: Option<&str>,
    catalog: &PlanCatalog,
    payload: &PaymentSuccessPayload,
) -> StepRecord {
    let start = Instant::now();

    let plan = catalog.get(&payload.plan_slug);
    let plan_name = plan.map_or(payload.plan_slug.as_str(), |p| p.name);
    let delivery_days = plan.map_or(7, |p| p.delivery_days);
    let amount = display_amount(payload.amount);

    let admin = match admin_email {
        Some(to) => {
            let email = Email {
                to: to.to_string(),
                subject: format!("New Paid Project - {plan_name} Plan"),
                body: format!(
                    "Client: {}\nEmail: {}\nPlan: {plan_name}\nAmount: {amount}\nProject: {}\n",
                    payload.display_name(),
                    payload.client_email,
                    payload.project_id.as_deref().unwrap_or("not provisioned"),
                ),
            };
            match mailer.send(&email).await {
                Ok(receipt) => SubSend::Sent(receipt.id),
                Err(err) => {
                    tracing::error!(error = %err, "sendEmail: admin notification failed");
                    SubSend::Failed(err.to_string())
                }
            }
        }
        None => {
            tracing::warn!("sendEmail: no admin email configured; skipping admin notification");
            SubSend::Skipped("no admin email configured")
        }
    };

    let client_email = Email {
        to: payload.client_email.clone(),
        subject: format!("Payment Received - {plan_name} Plan"),
        body: format!(
            "Hi {},\n\nWe've received your payment of {amount} for the {plan_name} plan.\n\
             Expected delivery: {delivery_days} days.\n\nOur team will contact you shortly.\n",
            payload.display_name(),
        ),
    };
    let client = match mailer.send(&client_email).await {
        Ok(receipt) => SubSend::Sent(receipt.id),
        Err(err) => {
            tracing::error!(error = %err, "sendEmail: client notification failed");
            SubSend::Failed(err.to_string())
        }
    };

    let failures = usize::from(admin.failed()) + usize::from(client.failed());
    let status = match failures {
        0 => StepStatus::Success,
        1 => StepStatus::PartialFailure,
        _ => StepStatus::Failed,
    };

    let result = serde_json::json!({
        "admin": admin.as_json(),
        "client": client.as_json(),
    });

    match status {
        StepStatus::Failed => {
            let mut record =
                StepRecord::failed(NAME, "both notification sends failed", elapsed_ms(start));
            record.result = Some(result);
            record
        }
        StepStatus::PartialFailure => StepRecord::partial(NAME, result, elapsed_ms(start)),
        _ => StepRecord::success(NAME, result, elapsed_ms(start)),
    }
}
