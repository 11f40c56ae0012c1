//! GitHub metrics behind a rolling 24-hour local cache.
//!
//! The snapshot and its timestamp live under two separate keys. A fresh,
//! well-formed entry is returned without touching the network; anything else
//! triggers one refresh. Refresh failures fall back to
//! `MetricsSnapshot::default()`, which is never written to the store.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::cache::{CacheEntry, CacheError, LocalStore};
use crate::models::MetricsSnapshot;

pub const METRICS_KEY: &str = "github_metrics";
pub const METRICS_TIMESTAMP_KEY: &str = "github_metrics_timestamp";

/// Rolling freshness window for cached metrics.
pub const METRICS_MAX_AGE_HOURS: i64 = 24;

pub struct MetricsCache {
    store: LocalStore,
    api: ApiClient,
}

impl MetricsCache {
    pub fn new(store: LocalStore, api: ApiClient) -> Self {
        Self { store, api }
    }

    /// Load the stored snapshot together with its timestamp.
    ///
    /// Returns `Ok(None)` when either key is missing or the timestamp is not
    /// a number; such an entry can never be fresh. A payload that does not
    /// parse is reported as `CacheError::Malformed`.
    pub fn load_cached(&self) -> Result<Option<CacheEntry<MetricsSnapshot>>, CacheError> {
        let stored_at = match self.store.get(METRICS_TIMESTAMP_KEY)? {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(millis) => millis,
                Err(_) => return Ok(None),
            },
            None => return Ok(None),
        };

        Ok(self
            .store
            .get_json::<MetricsSnapshot>(METRICS_KEY)?
            .map(|payload| CacheEntry {
                payload,
                stored_at_epoch_millis: stored_at,
            }))
    }

    fn save(&self, snapshot: &MetricsSnapshot, now: DateTime<Utc>) -> Result<(), CacheError> {
        self.store.set_json(METRICS_KEY, snapshot)?;
        self.store
            .set(METRICS_TIMESTAMP_KEY, &now.timestamp_millis().to_string())
    }

    fn discard(&self) {
        for key in [METRICS_KEY, METRICS_TIMESTAMP_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key = key, error = %e, "Failed to remove corrupt metrics entry");
            }
        }
    }

    pub async fn get_metrics(&self) -> MetricsSnapshot {
        self.get_metrics_at(Utc::now()).await
    }

    /// Resolve metrics as of `now`. Never fails.
    pub async fn get_metrics_at(&self, now: DateTime<Utc>) -> MetricsSnapshot {
        let max_age = Duration::hours(METRICS_MAX_AGE_HOURS);

        match self.load_cached() {
            Ok(Some(entry)) if entry.is_fresh(max_age, now) => {
                debug!(age = %entry.age_display(now), "Serving cached GitHub metrics");
                return entry.payload;
            }
            Ok(_) => {}
            Err(e) if e.is_malformed() => {
                warn!(error = %e, "Failed to parse cached GitHub metrics");
                self.discard();
            }
            Err(e) => {
                warn!(error = %e, "Failed to read cached GitHub metrics");
            }
        }

        match self.api.fetch_metrics().await {
            Ok(snapshot) => {
                if let Err(e) = self.save(&snapshot, now) {
                    warn!(error = %e, "Failed to cache GitHub metrics");
                }
                snapshot
            }
            Err(e) => {
                warn!(error = %e, "GitHub API error, using default metrics");
                MetricsSnapshot::default()
            }
        }
    }
}
