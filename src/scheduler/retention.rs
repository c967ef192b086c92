use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::error::Result;
use crate::metrics;
use crate::state::ClusterStore;

/// Removes clusters whose `last_seen_at` is older than the retention
/// window, cascading to their link rows and associations. Items are
/// never touched; raw content retention belongs to the ingestion side.
pub struct RetentionSweeper {
    store: Arc<dyn ClusterStore>,
    retention_days: i64,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn ClusterStore>, retention_days: i64) -> Self {
        Self {
            store,
            retention_days,
        }
    }

    /// Run one sweep. Idempotent: a second run over the same state
    /// purges nothing.
    pub async fn sweep(&self) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(self.retention_days);
        tracing::info!(cutoff = %cutoff, "Starting retention sweep");

        let purged = self.store.purge_stale(cutoff).await?;
        metrics::CLUSTERS_PURGED_TOTAL.inc_by(purged);

        if purged > 0 {
            tracing::info!(purged = purged, "Retention sweep removed stale clusters");
        } else {
            tracing::debug!("Retention sweep found nothing to purge");
        }
        Ok(purged)
    }
}
