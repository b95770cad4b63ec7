//! Request-level idempotency: (key, route) -> cached response.
//!
//! Guards client-retried order creation: a repeated request bearing the
//! same `Idempotency-Key` receives the original response verbatim instead
//! of re-executing. The webhook path is NOT guarded here; its idempotency
//! comes from the ledger's payment-reference uniqueness.
//!
//! ## Storage layout
//!
//! ```text
//! idempotency/{route}/{key_hash_prefix}/{key_hash}.json
//! ```
//!
//! Where `route` is `METHOD:path` with `/` flattened, `key_hash` is
//! `SHA256(key)` and `key_hash_prefix` its first 2 hex characters.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use remit_core::{StorageBackend, WritePrecondition};

use crate::error::{LedgerError, Result};

/// A cached first response for an idempotency key.
///
/// The body is kept as the raw JSON text that was sent, so a replay is
/// byte-identical to the original response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResponse {
    /// The idempotency key the response was stored under.
    pub key: String,
    /// The route (`METHOD:path`) the key applies to.
    pub route: String,
    /// HTTP status code of the original response.
    pub status_code: u16,
    /// Raw JSON body of the original response.
    pub body: String,
    /// When the response was cached.
    pub created_at: DateTime<Utc>,
}

/// Durable (key, route) -> response store.
pub struct IdempotencyStore {
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for IdempotencyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotencyStore").finish_non_exhaustive()
    }
}

impl IdempotencyStore {
    /// Creates a new idempotency store.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Computes the SHA-256 hash of an idempotency key.
    #[must_use]
    pub fn hash_key(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn record_path(route: &str, key: &str) -> String {
        let key_hash = Self::hash_key(key);
        let prefix = &key_hash[..2];
        let route = route.replace('/', "_");
        format!("idempotency/{route}/{prefix}/{key_hash}.json")
    }

    /// Returns the cached response for (key, route), if one exists.
    ///
    /// # Errors
    ///
    /// Returns `Storage` / `Serialization` errors.
    pub async fn lookup(&self, key: &str, route: &str) -> Result<Option<StoredResponse>> {
        let path = Self::record_path(route, key);
        match self.storage.get(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| LedgerError::serialization(e.to_string())),
            Err(remit_core::Error::NotFound(_)) => Ok(None),
            Err(e) => Err(LedgerError::storage(e.to_string())),
        }
    }

    /// Persists the first response for (key, route).
    ///
    /// Write-once: if another request already stored a response for this
    /// key the existing record wins and this call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Storage` / `Serialization` errors.
    pub async fn store(
        &self,
        key: &str,
        route: &str,
        status_code: u16,
        body: impl Into<String>,
    ) -> Result<()> {
        let record = StoredResponse {
            key: key.to_string(),
            route: route.to_string(),
            status_code,
            body: body.into(),
            created_at: Utc::now(),
        };

        let bytes = serde_json::to_vec(&record)
            .map(Bytes::from)
            .map_err(|e| LedgerError::serialization(e.to_string()))?;

        let path = Self::record_path(route, key);
        let result = self
            .storage
            .put(&path, bytes, WritePrecondition::DoesNotExist)
            .await
            .map_err(|e| LedgerError::storage(e.to_string()))?;

        if !result.is_success() {
            tracing::debug!(key, route, "Idempotency record already present; keeping original");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remit_core::MemoryBackend;

    fn store() -> IdempotencyStore {
        IdempotencyStore::new(Arc::new(MemoryBackend::new()))
    }

    #[test]
    fn key_hash_is_stable_and_hex() {
        let h1 = IdempotencyStore::hash_key("abc");
        let h2 = IdempotencyStore::hash_key("abc");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn record_path_fans_out_by_hash_prefix() {
        let path = IdempotencyStore::record_path("POST:/api/v1/payments/create-order", "key-1");
        let hash = IdempotencyStore::hash_key("key-1");
        assert!(path.starts_with(&format!(
            "idempotency/POST:_api_v1_payments_create-order/{}/",
            &hash[..2]
        )));
        assert!(path.ends_with(".json"));
    }

    #[tokio::test]
    async fn lookup_missing_returns_none() {
        assert!(store().lookup("k", "POST:/x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_then_lookup_replays_response_verbatim() {
        let store = store();
        let body = r#"{"order_id":"o_1","amount":399900}"#;
        store.store("k", "POST:/x", 200, body).await.unwrap();

        let cached = store.lookup("k", "POST:/x").await.unwrap().unwrap();
        assert_eq!(cached.status_code, 200);
        assert_eq!(cached.body, body);
    }

    #[tokio::test]
    async fn same_key_different_route_is_distinct() {
        let store = store();
        store.store("k", "POST:/x", 200, r#"{"n":1}"#).await.unwrap();

        assert!(store.lookup("k", "POST:/y").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_write_wins() {
        let store = store();
        store.store("k", "POST:/x", 200, r#"{"n":1}"#).await.unwrap();
        store.store("k", "POST:/x", 503, r#"{"n":2}"#).await.unwrap();

        let cached = store.lookup("k", "POST:/x").await.unwrap().unwrap();
        assert_eq!(cached.status_code, 200);
        assert_eq!(cached.body, r#"{"n":1}"#);
    }
}
