// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

use crate::read_record::{ReadRecord, SyncStatus};
use crate::watermark::SyncWatermark;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("No authenticated user")]
    NotAuthenticated,
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Storage operation timed out: {0}")]
    Timeout(String),
    #[error("Batch of {size} operations exceeds backend limit of {max}")]
    BatchTooLarge { size: usize, max: usize },
}

/// Result of an incremental pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadBatch {
    /// Records with `updatedAt >= since`
    pub records: Vec<ReadRecord>,
    /// Largest server `updatedAt` among `records`, or `since` when empty
    pub max_updated_at: i64,
}

/// Durable per-device table of read records.
///
/// Owns `sync_status`. Implementations provide single-row upsert atomicity;
/// the engine never asks for cross-row transactions.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn upsert(&self, record: &ReadRecord) -> Result<(), StorageError>;

    /// Store `record` only if no row exists for its id, atomically.
    /// Returns `true` when this call created the row.
    async fn insert_if_absent(&self, record: &ReadRecord) -> Result<bool, StorageError>;

    /// Default implementation falls back to sequential upserts.
    async fn upsert_all(&self, records: &[ReadRecord]) -> Result<(), StorageError> {
        for record in records {
            self.upsert(record).await?;
        }
        Ok(())
    }

    async fn get_by_status(&self, status: SyncStatus) -> Result<Vec<ReadRecord>, StorageError>;

    /// Fetch every record whose id is in `ids`, in a single query.
    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<ReadRecord>, StorageError>;

    async fn update_status(&self, ids: &[String], status: SyncStatus) -> Result<(), StorageError>;

    /// Delete rows read strictly before `timestamp`. Returns rows removed.
    async fn delete_older_than(&self, timestamp: i64) -> Result<u64, StorageError>;

    async fn count(&self, status: SyncStatus) -> Result<u64, StorageError>;
}

/// Per-user document collection shared by all of a user's devices.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upsert keyed by `item_id`. The server stamps its own `updatedAt`.
    async fn upload_batch(&self, records: &[ReadRecord]) -> Result<(), StorageError>;

    /// Records with `updatedAt >= since`; `since == 0` is a full pull.
    async fn download_since(&self, since: i64) -> Result<DownloadBatch, StorageError>;

    /// Delete documents read before `timestamp`, chunking internally to stay
    /// under the backend's per-request ceiling. Returns documents removed.
    async fn delete_older_than(&self, timestamp: i64) -> Result<u64, StorageError>;
}

/// Process-wide persisted checkpoints.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn load(&self) -> Result<SyncWatermark, StorageError>;
    async fn save(&self, watermark: &SyncWatermark) -> Result<(), StorageError>;
}
