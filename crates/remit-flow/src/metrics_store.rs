//! Daily dashboard metrics.
//!
//! Metrics live in one object per UTC day. Increments use a
//! read-modify-write loop guarded by a `MatchesVersion` precondition so
//! concurrent payment captures cannot lose updates: the loser of a CAS race
//! re-reads and retries.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use remit_core::{StorageBackend, WritePrecondition};

use crate::error::{Error, Result};

/// Attempts for the increment CAS loop before giving up.
const INCREMENT_CAS_ATTEMPTS: usize = 5;

/// Counters for one UTC day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyMetrics {
    /// The day the counters cover.
    pub date: NaiveDate,
    /// Revenue captured today, in minor currency units.
    pub total_revenue: i64,
    /// Projects provisioned today.
    pub new_projects: i64,
}

impl DailyMetrics {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_revenue: 0,
            new_projects: 0,
        }
    }
}

fn metrics_path(date: NaiveDate) -> String {
    format!("metrics/daily/{date}.json")
}

/// Storage-backed daily metrics store.
#[derive(Clone)]
pub struct MetricsStore {
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for MetricsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsStore").finish_non_exhaustive()
    }
}

impl MetricsStore {
    /// Creates a new metrics store.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Returns today's counters (zeroes if nothing was recorded yet).
    ///
    /// # Errors
    ///
    /// Returns `Storage` / `Serialization` errors.
    pub async fn today(&self) -> Result<DailyMetrics> {
        let date = Utc::now().date_naive();
        match self.load(date).await? {
            Some((metrics, _)) => Ok(metrics),
            None => Ok(DailyMetrics::empty(date)),
        }
    }

    /// Adds captured revenue to today's counters.
    ///
    /// # Errors
    ///
    /// Returns `Storage` errors, including sustained CAS contention.
    pub async fn increment_revenue(&self, amount_minor: i64) -> Result<()> {
        self.update_today(|m| m.total_revenue += amount_minor).await
    }

    /// Counts a newly provisioned project in today's counters.
    ///
    /// # Errors
    ///
    /// Returns `Storage` errors, including sustained CAS contention.
    pub async fn increment_new_projects(&self) -> Result<()> {
        self.update_today(|m| m.new_projects += 1).await
    }

    async fn update_today(&self, apply: impl Fn(&mut DailyMetrics)) -> Result<()> {
        let date = Utc::now().date_naive();
        let path = metrics_path(date);

        for _ in 0..INCREMENT_CAS_ATTEMPTS {
            let (mut metrics, precondition) = match self.load(date).await? {
                Some((metrics, version)) => {
                    (metrics, WritePrecondition::MatchesVersion(version))
                }
                None => (DailyMetrics::empty(date), WritePrecondition::DoesNotExist),
            };

            apply(&mut metrics);

            let bytes = serde_json::to_vec(&metrics)
                .map(Bytes::from)
                .map_err(|e| Error::serialization(e.to_string()))?;

            let result = self
                .storage
                .put(&path, bytes, precondition)
                .await
                .map_err(|e| Error::storage(e.to_string()))?;

            if result.is_success() {
                return Ok(());
            }
            // Lost the CAS race; re-read and retry with fresh counters.
        }

        Err(Error::storage(format!(
            "metrics update contended beyond {INCREMENT_CAS_ATTEMPTS} attempts: {path}"
        )))
    }

    async fn load(&self, date: NaiveDate) -> Result<Option<(DailyMetrics, String)>> {
        let path = metrics_path(date);
        let Some(meta) = self
            .storage
            .head(&path)
            .await
            .map_err(|e| Error::storage(e.to_string()))?
        else {
            return Ok(None);
        };

        let bytes = self
            .storage
            .get(&path)
            .await
            .map_err(|e| Error::storage(e.to_string()))?;
        let metrics: DailyMetrics = serde_json::from_slice(&bytes)
            .map_err(|e| Error::serialization(e.to_string()))?;

        Ok(Some((metrics, meta.version)))
    }
}
