//! Order creation and at-most-once payment recording.
//!
//! ## Storage layout
//!
//! ```text
//! ledger/orders/{order_id}.json          Order record
//! ledger/orders/by_ref/{provider_ref}    pointer: provider order ref -> order id
//! ledger/orders/by_key/{key_hash}        idempotency-key claim for order creation
//! ledger/payments/{provider_payment_ref}.json   Payment record
//! ```
//!
//! The payment record is keyed by the provider payment reference and written
//! with a `DoesNotExist` precondition. That write is the at-most-once
//! guarantee: the existence check before it is an optimization, and a lost
//! race surfaces as `PreconditionFailed`, which is reported as a duplicate
//! rather than an error.
//!
//! Storage failures are reported as `LedgerError::Storage` and are NOT
//! retried here; retry is the caller's responsibility.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use ulid::Ulid;

use remit_core::{retry, OrderId, PaymentId, RetryPolicy, StorageBackend, WritePrecondition, WriteResult};

use crate::error::{LedgerError, Result};
use crate::metrics::{record_order_created, record_payment_outcome};
use crate::plans::{Plan, PlanCatalog};
use crate::provider::PaymentProvider;
use crate::records::{Order, OrderStatus, Payment, PaymentStatus};

const DEFAULT_CURRENCY: &str = "INR";

/// Attempts for the order-status CAS loop before giving up.
const STATUS_CAS_ATTEMPTS: usize = 3;

fn order_path(id: OrderId) -> String {
    format!("ledger/orders/{id}.json")
}

fn order_ref_path(provider_order_ref: &str) -> String {
    format!("ledger/orders/by_ref/{provider_order_ref}")
}

fn order_key_path(idempotency_key: &str) -> String {
    format!(
        "ledger/orders/by_key/{}",
        crate::idempotency::IdempotencyStore::hash_key(idempotency_key)
    )
}

fn payment_path(provider_payment_ref: &str) -> String {
    format!("ledger/payments/{provider_payment_ref}.json")
}

fn provider_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        base_delay: std::time::Duration::from_millis(500),
        max_delay: std::time::Duration::from_millis(2000),
    }
}

/// Request to record a captured payment.
#[derive(Debug, Clone)]
pub struct RecordPaymentRequest {
    /// Provider order reference the payment was made against.
    pub provider_order_ref: String,
    /// Globally-unique provider payment reference.
    pub provider_payment_ref: String,
    /// Signature from an API confirmation; `None` for webhook-sourced
    /// records.
    pub provider_signature: Option<String>,
    /// Amount reported with the capture; defaults to the order amount.
    pub amount: Option<i64>,
    /// Payment method reported by the provider.
    pub method: Option<String>,
}

/// Result of recording a payment.
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    /// True if a payment for this reference was already recorded and no new
    /// write happened.
    pub duplicate: bool,
    /// The order the payment references.
    pub order: Order,
    /// The newly recorded payment; `None` on duplicates.
    pub payment: Option<Payment>,
}

/// Result of creating an order.
#[derive(Debug, Clone)]
pub struct CreatedOrder {
    /// The persisted order.
    pub order: Order,
    /// True if the order was created on the provider side.
    pub provider_configured: bool,
    /// Public provider key id for checkout clients, when configured.
    pub key_id: Option<String>,
    /// The plan the order purchases.
    pub plan: &'static Plan,
}

/// The durable order/payment ledger.
pub struct Ledger {
    storage: Arc<dyn StorageBackend>,
    catalog: PlanCatalog,
    provider: Option<Arc<dyn PaymentProvider>>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("catalog", &self.catalog)
            .field("provider_configured", &self.provider.is_some())
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// Creates a ledger over the given storage backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, catalog: PlanCatalog) -> Self {
        Self {
            storage,
            catalog,
            provider: None,
        }
    }

    /// Attaches a payment provider. Without one, orders are created with
    /// placeholder references.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Returns the plan catalog.
    #[must_use]
    pub const fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    /// Creates an order for a plan.
    ///
    /// Resolves the plan, creates a provider-side order when a provider is
    /// configured (placeholder reference otherwise), and persists the Order.
    ///
    /// # Errors
    ///
    /// - `InvalidPlan` for unknown or non-purchasable slugs
    /// - `DuplicateRequest` if the idempotency key was already claimed for
    ///   order creation
    /// - `Provider` if the payment provider rejects the request
    /// - `Storage` on persistence failure
    pub async fn create_order(
        &self,
        user_id: &str,
        plan_slug: &str,
        idempotency_key: Option<String>,
    ) -> Result<CreatedOrder> {
        let plan = self
            .catalog
            .get(plan_slug)
            .filter(|p| p.is_purchasable())
            .ok_or_else(|| LedgerError::InvalidPlan {
                slug: plan_slug.to_string(),
            })?;

        // Claim the idempotency key before any provider call, so a
        // concurrent retry cannot mint a second provider order. At most one
        // order exists per key on this route.
        if let Some(key) = idempotency_key.as_deref() {
            let claim = self
                .storage
                .put(
                    &order_key_path(key),
                    Bytes::from(user_id.to_string()),
                    WritePrecondition::DoesNotExist,
                )
                .await
                .map_err(storage_err)?;
            if !claim.is_success() {
                return Err(LedgerError::DuplicateRequest);
            }
        }

        let (provider_order_ref, provider_configured, key_id) = match &self.provider {
            Some(provider) => {
                let receipt = format!("rm_{}", Ulid::new());
                let notes = serde_json::json!({
                    "user_id": user_id,
                    "plan_slug": plan.slug,
                    "plan_name": plan.name,
                });
                let created = match retry("provider_create_order", provider_retry_policy(), || {
                    provider.create_order(plan.price_minor, DEFAULT_CURRENCY, &receipt, &notes)
                })
                .await
                {
                    Ok(created) => created,
                    Err(err) => {
                        // No order was produced; release the key so the
                        // client can retry the whole request later.
                        if let Some(key) = idempotency_key.as_deref() {
                            if let Err(cleanup) = self.storage.delete(&order_key_path(key)).await {
                                tracing::warn!(error = %cleanup, "Failed to release idempotency claim");
                            }
                        }
                        return Err(err);
                    }
                };
                (created.reference, true, Some(provider.key_id().to_string()))
            }
            None => (format!("placeholder_{}", Ulid::new()), false, None),
        };

        let now = Utc::now();
        let order = Order {
            id: OrderId::generate(),
            user_id: user_id.to_string(),
            plan_slug: plan.slug.to_string(),
            plan_name: plan.name.to_string(),
            provider_order_ref: provider_order_ref.clone(),
            amount: plan.price_minor,
            currency: DEFAULT_CURRENCY.to_string(),
            status: OrderStatus::Created,
            idempotency_key,
            created_at: now,
            updated_at: now,
        };

        // The by_ref pointer enforces "at most one order per provider
        // reference". Provider refs and placeholder ULIDs are both unique,
        // so a precondition failure here means a provider bug or replayed
        // reference.
        let pointer = self
            .storage
            .put(
                &order_ref_path(&provider_order_ref),
                Bytes::from(order.id.to_string()),
                WritePrecondition::DoesNotExist,
            )
            .await
            .map_err(storage_err)?;
        if !pointer.is_success() {
            return Err(LedgerError::storage(format!(
                "provider order reference already mapped: {provider_order_ref}"
            )));
        }

        self.put_json(&order_path(order.id), &order, WritePrecondition::DoesNotExist)
            .await?;

        record_order_created(provider_configured);
        tracing::info!(
            order_id = %order.id,
            provider_ref = %provider_order_ref,
            plan = plan.slug,
            amount = plan.price_minor,
            provider_configured,
            "Order created"
        );

        Ok(CreatedOrder {
            order,
            provider_configured,
            key_id,
            plan,
        })
    }

    /// Records a captured payment against its order.
    ///
    /// Safe under concurrent invocation for the same payment reference:
    /// exactly one caller records the payment, every other caller observes
    /// `duplicate = true`.
    ///
    /// # Errors
    ///
    /// - `OrderNotFound` if no order exists for the provider order reference
    /// - `Storage` on persistence failure
    pub async fn record_payment(&self, req: RecordPaymentRequest) -> Result<PaymentOutcome> {
        let order = self
            .find_order_by_ref(&req.provider_order_ref)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound {
                provider_order_ref: req.provider_order_ref.clone(),
            })?;

        // Fast path: the payment is already recorded. This check keeps the
        // common replay cheap; correctness does not depend on it.
        if self
            .find_payment_by_ref(&req.provider_payment_ref)
            .await?
            .is_some()
        {
            tracing::warn!(
                payment_ref = %req.provider_payment_ref,
                "Duplicate payment detected"
            );
            record_payment_outcome("duplicate");
            return Ok(PaymentOutcome {
                duplicate: true,
                order,
                payment: None,
            });
        }

        let payment = Payment {
            id: PaymentId::generate(),
            order_id: order.id,
            provider_payment_ref: req.provider_payment_ref.clone(),
            provider_signature: req.provider_signature,
            amount: req.amount.unwrap_or(order.amount),
            currency: order.currency.clone(),
            status: PaymentStatus::Captured,
            method: req.method.unwrap_or_else(|| "unknown".to_string()),
            verified_at: Utc::now(),
        };

        let bytes = to_bytes(&payment)?;
        let result = self
            .storage
            .put(
                &payment_path(&req.provider_payment_ref),
                bytes,
                WritePrecondition::DoesNotExist,
            )
            .await
            .map_err(storage_err)?;

        if let WriteResult::PreconditionFailed { .. } = result {
            // Lost the race to a concurrent recorder. The payment exists;
            // treat exactly like the fast-path duplicate.
            tracing::warn!(
                payment_ref = %req.provider_payment_ref,
                "Concurrent payment recording detected; treating as duplicate"
            );
            record_payment_outcome("race_duplicate");
            return Ok(PaymentOutcome {
                duplicate: true,
                order,
                payment: None,
            });
        }

        let order = self
            .transition_order_status(order.id, OrderStatus::Paid)
            .await?;

        record_payment_outcome("recorded");
        tracing::info!(
            payment_id = %payment.id,
            order_id = %order.id,
            payment_ref = %payment.provider_payment_ref,
            amount = payment.amount,
            "Payment recorded"
        );

        Ok(PaymentOutcome {
            duplicate: false,
            order,
            payment: Some(payment),
        })
    }

    /// Marks the order for a provider reference as failed.
    ///
    /// Only orders still in `created` are transitioned; an order that
    /// already captured a payment is left untouched (out-of-order
    /// `payment.failed` after `payment.captured` must not clobber it).
    /// Returns true if the order was transitioned.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound` or `Storage` errors.
    pub async fn mark_order_failed(&self, provider_order_ref: &str) -> Result<bool> {
        let order = self
            .find_order_by_ref(provider_order_ref)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound {
                provider_order_ref: provider_order_ref.to_string(),
            })?;

        if order.status != OrderStatus::Created {
            tracing::warn!(
                order_id = %order.id,
                status = order.status.as_label(),
                "Ignoring payment.failed for order not in created state"
            );
            return Ok(false);
        }

        self.transition_order_status(order.id, OrderStatus::Failed)
            .await?;
        Ok(true)
    }

    /// Returns the order for a provider order reference, if any.
    ///
    /// # Errors
    ///
    /// Returns `Storage` / `Serialization` errors.
    pub async fn find_order_by_ref(&self, provider_order_ref: &str) -> Result<Option<Order>> {
        let Some(pointer) = self.get_optional(&order_ref_path(provider_order_ref)).await? else {
            return Ok(None);
        };

        let id_str = String::from_utf8(pointer.to_vec())
            .map_err(|e| LedgerError::serialization(format!("invalid order pointer: {e}")))?;
        let order_id: OrderId = id_str
            .trim()
            .parse()
            .map_err(|e: remit_core::Error| LedgerError::serialization(e.to_string()))?;

        self.get_order(order_id).await.map(Some)
    }

    /// Loads an order by id.
    ///
    /// # Errors
    ///
    /// Returns `Storage` errors, including a storage-level not-found for a
    /// dangling pointer.
    pub async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.get_json(&order_path(id)).await
    }

    /// Returns the payment for a provider payment reference, if any.
    ///
    /// # Errors
    ///
    /// Returns `Storage` / `Serialization` errors.
    pub async fn find_payment_by_ref(
        &self,
        provider_payment_ref: &str,
    ) -> Result<Option<Payment>> {
        match self.get_optional(&payment_path(provider_payment_ref)).await? {
            Some(bytes) => from_bytes(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Transitions an order's status with a bounded CAS loop.
    async fn transition_order_status(&self, id: OrderId, to: OrderStatus) -> Result<Order> {
        let path = order_path(id);

        for _ in 0..STATUS_CAS_ATTEMPTS {
            let meta = self
                .storage
                .head(&path)
                .await
                .map_err(storage_err)?
                .ok_or_else(|| LedgerError::storage(format!("order record missing: {id}")))?;

            let mut order: Order = self.get_json(&path).await?;
            order.status = to;
            order.updated_at = Utc::now();

            let result = self
                .storage
                .put(
                    &path,
                    to_bytes(&order)?,
                    WritePrecondition::MatchesVersion(meta.version),
                )
                .await
                .map_err(storage_err)?;

            if result.is_success() {
                return Ok(order);
            }
            // Concurrent writer updated the order; re-read and retry.
        }

        Err(LedgerError::storage(format!(
            "order status transition contended beyond {STATUS_CAS_ATTEMPTS} attempts: {id}"
        )))
    }

    async fn get_optional(&self, path: &str) -> Result<Option<Bytes>> {
        match self.storage.get(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(remit_core::Error::NotFound(_)) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let bytes = self.storage.get(path).await.map_err(storage_err)?;
        from_bytes(&bytes)
    }

    async fn put_json<T: Serialize>(
        &self,
        path: &str,
        value: &T,
        precondition: WritePrecondition,
    ) -> Result<()> {
        let result = self
            .storage
            .put(path, to_bytes(value)?, precondition)
            .await
            .map_err(storage_err)?;
        if !result.is_success() {
            return Err(LedgerError::storage(format!(
                "conditional write rejected: {path}"
            )));
        }
        Ok(())
    }
}

fn to_bytes<T: Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| LedgerError::serialization(e.to_string()))
}

fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| LedgerError::serialization(e.to_string()))
}

fn storage_err(e: remit_core::Error) -> LedgerError {
    LedgerError::storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use remit_core::MemoryBackend;

    use crate::provider::{PaymentProvider, ProviderOrder};

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(MemoryBackend::new()), PlanCatalog::new())
    }

    struct FakeProvider;

    #[async_trait]
    impl PaymentProvider for FakeProvider {
        async fn create_order(
            &self,
            amount: i64,
            currency: &str,
            receipt: &str,
            _notes: &serde_json::Value,
        ) -> Result<ProviderOrder> {
            Ok(ProviderOrder {
                reference: format!("order_{receipt}"),
                amount,
                currency: currency.to_string(),
                receipt: receipt.to_string(),
            })
        }

        fn key_id(&self) -> &str {
            "key_test"
        }
    }

    struct RejectingProvider;

    #[async_trait]
    impl PaymentProvider for RejectingProvider {
        async fn create_order(
            &self,
            _amount: i64,
            _currency: &str,
            _receipt: &str,
            _notes: &serde_json::Value,
        ) -> Result<ProviderOrder> {
            Err(LedgerError::provider("keys rejected"))
        }

        fn key_id(&self) -> &str {
            "key_test"
        }
    }

    fn record_request(order_ref: &str, payment_ref: &str) -> RecordPaymentRequest {
        RecordPaymentRequest {
            provider_order_ref: order_ref.to_string(),
            provider_payment_ref: payment_ref.to_string(),
            provider_signature: Some("sig".to_string()),
            amount: None,
            method: Some("upi".to_string()),
        }
    }

    #[tokio::test]
    async fn create_order_without_provider_uses_placeholder() {
        let ledger = ledger();
        let created = ledger.create_order("user_1", "starter", None).await.unwrap();

        assert!(!created.provider_configured);
        assert!(created.key_id.is_none());
        assert!(created.order.is_placeholder());
        assert_eq!(created.order.amount, 399_900);
        assert_eq!(created.order.status, OrderStatus::Created);
    }

    #[tokio::test]
    async fn create_order_with_provider_uses_provider_reference() {
        let ledger = ledger().with_provider(Arc::new(FakeProvider));
        let created = ledger.create_order("user_1", "growth", None).await.unwrap();

        assert!(created.provider_configured);
        assert_eq!(created.key_id.as_deref(), Some("key_test"));
        assert!(created.order.provider_order_ref.starts_with("order_rm_"));
    }

    #[tokio::test]
    async fn create_order_rejects_unknown_and_custom_plans() {
        let ledger = ledger();

        let err = ledger.create_order("u", "platinum", None).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPlan { .. }));

        let err = ledger.create_order("u", "custom", None).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPlan { .. }));
    }

    #[tokio::test]
    async fn reused_idempotency_key_is_a_duplicate_request() {
        let ledger = ledger();
        ledger
            .create_order("u", "starter", Some("key-1".to_string()))
            .await
            .unwrap();

        let err = ledger
            .create_order("u", "starter", Some("key-1".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateRequest));

        // A different key is unaffected.
        ledger
            .create_order("u", "starter", Some("key-2".to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn provider_rejection_propagates() {
        let ledger = ledger().with_provider(Arc::new(RejectingProvider));
        let err = ledger.create_order("u", "starter", None).await.unwrap_err();
        assert!(matches!(err, LedgerError::Provider { .. }));
    }

    #[tokio::test]
    async fn provider_rejection_releases_idempotency_claim() {
        let storage = Arc::new(MemoryBackend::new());
        let failing = Ledger::new(Arc::clone(&storage) as _, PlanCatalog::new())
            .with_provider(Arc::new(RejectingProvider));

        let err = failing
            .create_order("u", "starter", Some("key-1".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Provider { .. }));

        // The failed request consumed nothing; the same key works once the
        // provider recovers.
        let recovered = Ledger::new(storage as _, PlanCatalog::new())
            .with_provider(Arc::new(FakeProvider));
        recovered
            .create_order("u", "starter", Some("key-1".to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn record_payment_marks_order_paid() {
        let ledger = ledger();
        let created = ledger.create_order("user_1", "starter", None).await.unwrap();
        let order_ref = created.order.provider_order_ref.clone();

        let outcome = ledger
            .record_payment(record_request(&order_ref, "pay_1"))
            .await
            .unwrap();

        assert!(!outcome.duplicate);
        let payment = outcome.payment.expect("payment recorded");
        assert_eq!(payment.order_id, created.order.id);
        assert_eq!(payment.amount, created.order.amount);
        assert_eq!(outcome.order.status, OrderStatus::Paid);

        let reloaded = ledger.get_order(created.order.id).await.unwrap();
        assert_eq!(reloaded.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn record_payment_unknown_order_fails() {
        let ledger = ledger();
        let err = ledger
            .record_payment(record_request("order_missing", "pay_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::OrderNotFound { .. }));
    }

    #[tokio::test]
    async fn duplicate_payment_reference_is_reported_not_rewritten() {
        let ledger = ledger();
        let created = ledger.create_order("user_1", "starter", None).await.unwrap();
        let order_ref = created.order.provider_order_ref.clone();

        let first = ledger
            .record_payment(record_request(&order_ref, "pay_1"))
            .await
            .unwrap();
        assert!(!first.duplicate);

        let second = ledger
            .record_payment(record_request(&order_ref, "pay_1"))
            .await
            .unwrap();
        assert!(second.duplicate);
        assert!(second.payment.is_none());

        let stored = ledger.find_payment_by_ref("pay_1").await.unwrap().unwrap();
        assert_eq!(stored.id, first.payment.unwrap().id);
    }

    #[tokio::test]
    async fn concurrent_recording_yields_exactly_one_payment() {
        let storage = Arc::new(MemoryBackend::new());
        let ledger = Arc::new(Ledger::new(storage, PlanCatalog::new()));
        let created = ledger.create_order("user_1", "pro", None).await.unwrap();
        let order_ref = created.order.provider_order_ref.clone();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            let order_ref = order_ref.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .record_payment(record_request(&order_ref, "pay_contended"))
                    .await
                    .unwrap()
            }));
        }

        let mut recorded = 0;
        let mut duplicates = 0;
        for handle in handles {
            let outcome = handle.await.unwrap();
            if outcome.duplicate {
                duplicates += 1;
            } else {
                recorded += 1;
            }
        }

        assert_eq!(recorded, 1, "exactly one caller records the payment");
        assert_eq!(duplicates, 7);
    }

    #[tokio::test]
    async fn mark_order_failed_only_from_created() {
        let ledger = ledger();
        let created = ledger.create_order("user_1", "starter", None).await.unwrap();
        let order_ref = created.order.provider_order_ref.clone();

        assert!(ledger.mark_order_failed(&order_ref).await.unwrap());
        let order = ledger.get_order(created.order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Failed);

        // A paid order is never downgraded by a stale failure event.
        let paid = ledger.create_order("user_2", "starter", None).await.unwrap();
        let paid_ref = paid.order.provider_order_ref.clone();
        ledger
            .record_payment(record_request(&paid_ref, "pay_2"))
            .await
            .unwrap();
        assert!(!ledger.mark_order_failed(&paid_ref).await.unwrap());
        let order = ledger.get_order(paid.order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
    }
}
