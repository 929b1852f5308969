//! Round steps: upload pending, incremental download, merge.

use tracing::debug;

use crate::read_record::{ReadRecord, SyncStatus};
use crate::storage::traits::DownloadBatch;

use super::merge::{plan_merge, MergeDecision};
use super::{MergeSummary, SyncCoordinator, SyncError};

impl SyncCoordinator {
    /// Upload every row not yet confirmed by the remote, then mark it synced.
    ///
    /// Also drains whatever the queue manager failed to flush.
    pub(super) async fn upload_pending(&self) -> Result<usize, SyncError> {
        let mut pending = self
            .local
            .get_by_status(SyncStatus::Pending)
            .await
            .map_err(SyncError::local)?;
        pending.extend(
            self.local
                .get_by_status(SyncStatus::Failed)
                .await
                .map_err(SyncError::local)?,
        );

        if pending.is_empty() {
            return Ok(0);
        }

        self.remote.upload_batch(&pending).await.map_err(SyncError::remote)?;

        let ids: Vec<String> = pending.iter().map(|r| r.item_id.clone()).collect();
        self.local
            .update_status(&ids, SyncStatus::Synced)
            .await
            .map_err(SyncError::local)?;

        crate::metrics::record_items_uploaded("coordinator", ids.len());
        debug!(count = ids.len(), "Pending reads uploaded");
        Ok(ids.len())
    }

    pub(super) async fn download_changes(&self, since: i64) -> Result<DownloadBatch, SyncError> {
        let batch = self.remote.download_since(since).await.map_err(SyncError::remote)?;
        crate::metrics::record_items_downloaded(batch.records.len());
        debug!(
            since,
            count = batch.records.len(),
            max_updated_at = batch.max_updated_at,
            full_pull = since == 0,
            "Remote changes downloaded"
        );
        Ok(batch)
    }

    /// Merge downloaded records into the local store.
    ///
    /// Local counterparts are fetched with one batched lookup; only records
    /// that insert or overwrite are written back. Applying the same batch twice
    /// leaves the store as it was after the first application.
    pub async fn merge_with_local(
        &self,
        remote: Vec<ReadRecord>,
    ) -> Result<MergeSummary, SyncError> {
        if remote.is_empty() {
            return Ok(MergeSummary::default());
        }

        let mut ids: Vec<String> = remote.iter().map(|r| r.item_id.clone()).collect();
        ids.sort_unstable();
        ids.dedup();

        let local = self.local.get_by_ids(&ids).await.map_err(SyncError::local)?;
        let (writes, summary) = plan_merge(local, remote);

        if !writes.is_empty() {
            self.local.upsert_all(&writes).await.map_err(SyncError::local)?;
        }

        for (decision, count) in [
            (MergeDecision::Insert, summary.inserted),
            (MergeDecision::Overwrite, summary.overwritten),
            (MergeDecision::KeepLocal, summary.kept_local),
        ] {
            crate::metrics::record_merge_decisions(decision.label(), count);
        }
        debug!(
            inserted = summary.inserted,
            overwritten = summary.overwritten,
            kept_local = summary.kept_local,
            "Merge applied"
        );
        Ok(summary)
    }
}
