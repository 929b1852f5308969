//! Retention cleanup.
//!
//! Rate-limited by the caller through `SyncWatermark::cleanup_due`. The remote
//! adapter chunks its own deletes, so one call here may cost several
//! round-trips.

use tracing::info;

use super::{CleanupSummary, SyncCoordinator, SyncError};

impl SyncCoordinator {
    pub(super) async fn cleanup_expired(&self, now: i64) -> Result<CleanupSummary, SyncError> {
        let threshold = now.saturating_sub(self.config.retention_millis());

        let local_deleted = self
            .local
            .delete_older_than(threshold)
            .await
            .map_err(SyncError::local)?;
        let remote_deleted = self
            .remote
            .delete_older_than(threshold)
            .await
            .map_err(SyncError::remote)?;

        crate::metrics::record_cleanup(local_deleted, remote_deleted);
        info!(threshold, local_deleted, remote_deleted, "Retention cleanup complete");

        Ok(CleanupSummary { threshold, local_deleted, remote_deleted })
    }
}
