//! Storage backend abstraction for durable Remit state.
//!
//! This module defines the storage contract the ledger and workflow layers
//! build on:
//! - Conditional writes with preconditions (CAS semantics)
//! - Object metadata including `last_modified` and an opaque version token
//!
//! The version token is an opaque `String` so backends with different
//! native versioning (numeric generations, ETags) can implement the same
//! contract. The `DoesNotExist` precondition is load-bearing: it is the
//! mechanism that makes payment recording at-most-once.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// Precondition for conditional writes (CAS operations).
#[derive(Debug, Clone)]
pub enum WritePrecondition {
    /// Write only if object does not exist.
    DoesNotExist,
    /// Write only if object's version matches the given token.
    MatchesVersion(String),
    /// Write unconditionally.
    None,
}

/// Result of a conditional write.
#[derive(Debug, Clone)]
pub enum WriteResult {
    /// Write succeeded, returns new version token.
    Success {
        /// The new version token after the write.
        version: String,
    },
    /// Precondition failed, returns current version token.
    PreconditionFailed {
        /// The current version that caused the precondition to fail.
        current_version: String,
    },
}

impl WriteResult {
    /// Returns true if the write was applied.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Object path (key).
    pub path: String,
    /// Object size in bytes.
    pub size: u64,
    /// Object version token for CAS operations.
    pub version: String,
    /// Last modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Storage backend trait for durable object state.
///
/// All storage backends (cloud object storage, memory) implement this trait.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads entire object.
    ///
    /// Returns `Error::NotFound` if object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes with optional precondition.
    ///
    /// Returns `WriteResult::PreconditionFailed` if the precondition is not
    /// met. Never returns an error for precondition failure - that's a
    /// normal result callers must handle.
    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult>;

    /// Deletes an object.
    ///
    /// Succeeds even if object doesn't exist (idempotent).
    async fn delete(&self, path: &str) -> Result<()>;

    /// Lists objects with the given prefix.
    ///
    /// Returns empty vec if no objects match.
    ///
    /// **Ordering**: arbitrary; callers requiring deterministic order must
    /// sort the results.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Gets object metadata without reading content.
    ///
    /// Returns `None` if object doesn't exist.
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>>;
}

/// In-memory storage backend for testing and degraded/dev operation.
///
/// Thread-safe via `RwLock`. Uses numeric versions internally (stored as
/// strings) to simulate generation-style conditional writes.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    version: i64,
    last_modified: DateTime<Utc>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let mut objects = self.objects.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        let current = objects.get(path);

        match precondition {
            WritePrecondition::DoesNotExist => {
                if let Some(obj) = current {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: obj.version.to_string(),
                    });
                }
            }
            WritePrecondition::MatchesVersion(expected) => {
                let expected_num: i64 = expected.parse().unwrap_or(-1);
                match current {
                    Some(obj) if obj.version != expected_num => {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: obj.version.to_string(),
                        });
                    }
                    None => {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: "0".to_string(),
                        });
                    }
                    _ => {}
                }
            }
            WritePrecondition::None => {}
        }

        let new_version = current.map_or(1, |o| o.version + 1);
        objects.insert(
            path.to_string(),
            StoredObject {
                data,
                version: new_version,
                last_modified: Utc::now(),
            },
        );

        Ok(WriteResult::Success {
            version: new_version.to_string(),
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        objects.remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(objects
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, obj)| ObjectMeta {
                path: path.clone(),
                size: obj.data.len() as u64,
                version: obj.version.to_string(),
                last_modified: Some(obj.last_modified),
            })
            .collect())
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(objects.get(path).map(|obj| ObjectMeta {
            path: path.to_string(),
            size: obj.data.len() as u64,
            version: obj.version.to_string(),
            last_modified: Some(obj.last_modified),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_and_get_roundtrip() {
        let backend = MemoryBackend::new();
        let result = backend
            .put("a/b.json", Bytes::from_static(b"{}"), WritePrecondition::None)
            .await
            .unwrap();
        assert!(result.is_success());

        let data = backend.get("a/b.json").await.unwrap();
        assert_eq!(&data[..], b"{}");
    }

    #[tokio::test]
    async fn get_missing_returns_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.get("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn does_not_exist_precondition_rejects_second_write() {
        let backend = MemoryBackend::new();
        let first = backend
            .put("x", Bytes::from_static(b"1"), WritePrecondition::DoesNotExist)
            .await
            .unwrap();
        assert!(first.is_success());

        let second = backend
            .put("x", Bytes::from_static(b"2"), WritePrecondition::DoesNotExist)
            .await
            .unwrap();
        assert!(matches!(second, WriteResult::PreconditionFailed { .. }));

        // Original content untouched.
        assert_eq!(&backend.get("x").await.unwrap()[..], b"1");
    }

    #[tokio::test]
    async fn matches_version_precondition_detects_stale_writer() {
        let backend = MemoryBackend::new();
        let WriteResult::Success { version } = backend
            .put("x", Bytes::from_static(b"1"), WritePrecondition::None)
            .await
            .unwrap()
        else {
            panic!("expected success");
        };

        // A concurrent writer bumps the version.
        backend
            .put("x", Bytes::from_static(b"2"), WritePrecondition::None)
            .await
            .unwrap();

        let stale = backend
            .put(
                "x",
                Bytes::from_static(b"3"),
                WritePrecondition::MatchesVersion(version),
            )
            .await
            .unwrap();
        assert!(matches!(stale, WriteResult::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let backend = MemoryBackend::new();
        for path in ["runs/1", "runs/2", "orders/1"] {
            backend
                .put(path, Bytes::from_static(b"{}"), WritePrecondition::None)
                .await
                .unwrap();
        }

        let runs = backend.list("runs/").await.unwrap();
        assert_eq!(runs.len(), 2);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let backend = MemoryBackend::new();
        backend.delete("nope").await.unwrap();
        backend
            .put("yes", Bytes::from_static(b"1"), WritePrecondition::None)
            .await
            .unwrap();
        backend.delete("yes").await.unwrap();
        assert!(backend.head("yes").await.unwrap().is_none());
    }
}
