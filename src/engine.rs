// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Read-sync engine.
//!
//! [`ReadSyncEngine`] wires the local store, the remote store, the coordinator
//! and the batch queue together, and is what a host application holds on to.
//!
//! # Write path
//!
//! ```text
//! mark_as_read → insert PENDING if absent → add_to_queue → flush at threshold
//!                                                        ↘ coordinator round picks up leftovers
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use read_sync_engine::{
//!     ReadSyncEngine, SyncConfig, InMemoryLocalStore, InMemoryRemoteStore,
//!     InMemoryWatermarkStore, StaticIdentity, SystemClock,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let clock = Arc::new(SystemClock);
//! let identity = Arc::new(StaticIdentity::signed_in("user-1"));
//! let engine = ReadSyncEngine::new(
//!     SyncConfig::default(),
//!     Arc::new(InMemoryLocalStore::new()),
//!     Arc::new(InMemoryRemoteStore::new(identity, clock.clone())),
//!     Arc::new(InMemoryWatermarkStore::new()),
//!     clock,
//! ).unwrap();
//!
//! engine.mark_as_read("article-42").await.unwrap();
//! assert!(engine.is_read("article-42").await.unwrap());
//! assert_eq!(engine.pending_count().await.unwrap(), 1);
//! # }
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::batching::queue_manager::BatchQueueManager;
use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::coordinator::{BatchOutcome, RecoveryOutcome, SyncCoordinator, SyncError, SyncReport};
use crate::read_record::{ReadRecord, SyncStatus};
use crate::storage::sql::SqlLocalStore;
use crate::storage::traits::{LocalStore, RemoteStore, WatermarkStore};

pub struct ReadSyncEngine {
    config: SyncConfig,
    local: Arc<dyn LocalStore>,
    clock: Arc<dyn Clock>,
    coordinator: Arc<SyncCoordinator>,
    queue: BatchQueueManager,
}

impl ReadSyncEngine {
    pub fn new(
        config: SyncConfig,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        watermarks: Arc<dyn WatermarkStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SyncError> {
        config.validate().map_err(SyncError::Config)?;

        let coordinator = Arc::new(SyncCoordinator::new(
            config.clone(),
            local.clone(),
            remote.clone(),
            watermarks,
            clock.clone(),
        ));
        let queue = BatchQueueManager::new(&config, local.clone(), remote, coordinator.clone());

        info!(
            device_class = %config.device_class,
            batch_threshold = config.batch_threshold,
            retention_days = config.retention_days,
            "Read sync engine created"
        );
        Ok(Self { config, local, clock, coordinator, queue })
    }

    /// Build an engine on a SQLite file holding both reads and checkpoints.
    pub async fn open_sqlite(
        config: SyncConfig,
        path: impl AsRef<Path>,
        remote: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SyncError> {
        let store = Arc::new(SqlLocalStore::open(path).await.map_err(SyncError::local)?);
        Self::new(config, store.clone(), remote, store, clock)
    }

    /// Record that the user read `item_id` on this device.
    ///
    /// The read is durable once this returns `Ok`, whatever happens to the
    /// upload. Reading an item twice keeps the first `read_at`.
    #[tracing::instrument(skip(self))]
    pub async fn mark_as_read(&self, item_id: &str) -> Result<Option<BatchOutcome>, SyncError> {
        let record = ReadRecord::new(item_id, self.clock.now_millis(), self.config.device_class);
        let inserted = self
            .local
            .insert_if_absent(&record)
            .await
            .map_err(SyncError::local)?;
        if !inserted {
            debug!(item_id, "Item already read");
            return Ok(None);
        }
        self.queue.add_to_queue(item_id).await
    }

    pub async fn is_read(&self, item_id: &str) -> Result<bool, SyncError> {
        let found = self
            .local
            .get_by_ids(&[item_id.to_string()])
            .await
            .map_err(SyncError::local)?;
        Ok(!found.is_empty())
    }

    /// Which of `item_ids` have been read, in one lookup.
    pub async fn read_ids(&self, item_ids: &[String]) -> Result<HashSet<String>, SyncError> {
        let found = self.local.get_by_ids(item_ids).await.map_err(SyncError::local)?;
        Ok(found.into_iter().map(|r| r.item_id).collect())
    }

    pub async fn pending_count(&self) -> Result<u64, SyncError> {
        let pending = self
            .local
            .count(SyncStatus::Pending)
            .await
            .map_err(SyncError::local)?;
        crate::metrics::set_pending_rows(pending);
        Ok(pending)
    }

    /// Upload whatever is queued now (timer, app moving to background).
    pub async fn force_flush(&self) -> BatchOutcome {
        self.queue.force_flush().await
    }

    pub async fn perform_full_sync_with_retry(&self) -> Result<SyncReport, SyncError> {
        self.coordinator.perform_full_sync_with_retry().await
    }

    /// Call once at startup, before new reads arrive.
    pub async fn recover_pending_items(&self) -> Result<RecoveryOutcome, SyncError> {
        self.queue.recover_pending_items().await
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    #[must_use]
    pub fn queue(&self) -> &BatchQueueManager {
        &self.queue
    }
}
