// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batch queue manager.
//!
//! Turns bursts of read events into a few well-sized remote writes without
//! ever losing an event to a crash:
//!
//! 1. The caller persists the read locally as `Pending` (durable copy).
//! 2. [`BatchQueueManager::add_to_queue`] loads it back and queues a transient copy.
//! 3. At `batch_threshold` queued items the caller's task flushes inline.
//! 4. At `queue_ceiling` a detached flush also fires, without blocking.
//!
//! A failed flush changes nothing locally. The rows stay `Pending` and the next
//! coordinator round picks them up; they are never re-queued in memory.

use std::sync::Arc;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::coordinator::{BatchOutcome, RecoveryOutcome, SyncCoordinator, SyncError};
use crate::read_record::{ReadRecord, SyncStatus};
use crate::storage::traits::{LocalStore, RemoteStore};
use super::read_queue::ReadQueue;

/// What caused a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Queue reached `batch_threshold`
    Threshold,
    /// Queue reached `queue_ceiling`
    Ceiling,
    /// Explicit request (timer, app going to background)
    Manual,
}

impl FlushTrigger {
    fn label(&self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::Ceiling => "ceiling",
            Self::Manual => "manual",
        }
    }
}

/// The parts a flush needs, cheap to clone into a detached task.
#[derive(Clone)]
struct Flusher {
    queue: Arc<ReadQueue<ReadRecord>>,
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
}

impl Flusher {
    async fn flush(&self, trigger: FlushTrigger) -> BatchOutcome {
        let batch = self.queue.drain();
        crate::metrics::set_queue_depth(self.queue.len());

        if batch.is_empty() {
            return BatchOutcome::Empty;
        }
        let count = batch.len();
        debug!(count, trigger = trigger.label(), "Flushing read queue");

        if let Err(e) = self.remote.upload_batch(&batch).await {
            let error = SyncError::remote(e);
            crate::metrics::record_flush(trigger.label(), "error", count);
            warn!(count, trigger = trigger.label(), error = %error, "Queue flush failed, reads stay pending");
            return BatchOutcome::Failed { count, error };
        }

        let ids: Vec<String> = batch.into_iter().map(|r| r.item_id).collect();
        if let Err(e) = self.local.update_status(&ids, SyncStatus::Synced).await {
            let error = SyncError::local(e);
            crate::metrics::record_flush(trigger.label(), "error", count);
            warn!(count, error = %error, "Uploaded reads could not be marked synced");
            return BatchOutcome::Failed { count, error };
        }

        crate::metrics::record_flush(trigger.label(), "success", count);
        crate::metrics::record_items_uploaded("queue", count);
        info!(count, trigger = trigger.label(), "Queue flush complete");
        BatchOutcome::Uploaded { count }
    }
}

pub struct BatchQueueManager {
    batch_threshold: usize,
    queue_ceiling: usize,
    flusher: Flusher,
    coordinator: Arc<SyncCoordinator>,
    detached: Mutex<JoinSet<BatchOutcome>>,
}

impl BatchQueueManager {
    pub fn new(
        config: &SyncConfig,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        coordinator: Arc<SyncCoordinator>,
    ) -> Self {
        Self {
            batch_threshold: config.batch_threshold.max(1),
            queue_ceiling: config.queue_ceiling.max(config.batch_threshold.max(1)),
            flusher: Flusher {
                queue: Arc::new(ReadQueue::new()),
                local,
                remote,
            },
            coordinator,
            detached: Mutex::new(JoinSet::new()),
        }
    }

    /// Queue a read that the caller already persisted as `Pending`.
    ///
    /// Returns the outcome of the inline flush when this item brought the
    /// queue to the batch threshold, `None` otherwise. Must be called from
    /// within a tokio runtime.
    pub async fn add_to_queue(&self, item_id: &str) -> Result<Option<BatchOutcome>, SyncError> {
        let record = self
            .flusher
            .local
            .get_by_ids(&[item_id.to_string()])
            .await
            .map_err(SyncError::local)?
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::NotFound(item_id.to_string()))?;

        let depth = self.flusher.queue.push(record);
        crate::metrics::set_queue_depth(depth);
        debug!(item_id, depth, "Read queued");

        if depth >= self.queue_ceiling {
            warn!(depth, ceiling = self.queue_ceiling, "Read queue at ceiling, detaching flush");
            let flusher = self.flusher.clone();
            let mut detached = self.detached.lock();
            reap_finished(&mut detached);
            detached.spawn(async move { flusher.flush(FlushTrigger::Ceiling).await });
        }

        if depth >= self.batch_threshold {
            return Ok(Some(self.flusher.flush(FlushTrigger::Threshold).await));
        }
        Ok(None)
    }

    /// Flush whatever is queued, regardless of the threshold.
    pub async fn force_flush(&self) -> BatchOutcome {
        self.flusher.flush(FlushTrigger::Manual).await
    }

    /// Startup recovery: rows left `Pending` by a previous process are synced
    /// through a full coordinator round, not re-queued in memory.
    pub async fn recover_pending_items(&self) -> Result<RecoveryOutcome, SyncError> {
        let pending = self
            .flusher
            .local
            .count(SyncStatus::Pending)
            .await
            .map_err(SyncError::local)?;
        crate::metrics::set_pending_rows(pending);

        if pending == 0 {
            debug!("No pending reads to recover");
            return Ok(RecoveryOutcome { pending_found: 0, synced: None });
        }

        info!(pending, "Recovering reads left pending by a previous run");
        let report = self.coordinator.perform_full_sync_with_retry().await?;
        Ok(RecoveryOutcome { pending_found: pending, synced: Some(report) })
    }

    /// Current in-memory queue depth.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.flusher.queue.len()
    }

    /// Wait for the detached ceiling flushes not yet reaped.
    ///
    /// Flushes that finished before a later spawn were already collected and
    /// are not returned here.
    pub async fn wait_for_detached(&self) -> Vec<BatchOutcome> {
        let mut tasks = std::mem::take(&mut *self.detached.lock());
        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "Detached flush task failed"),
            }
        }
        outcomes
    }
}

/// Drop detached flushes that already finished, logging their outcome.
fn reap_finished(set: &mut JoinSet<BatchOutcome>) {
    while let Some(joined) = set.try_join_next() {
        match joined {
            Ok(outcome) => debug!(success = outcome.is_success(), "Detached flush reaped"),
            Err(e) => warn!(error = %e, "Detached flush task failed"),
        }
    }
}
