// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync coordinator.
//!
//! The [`SyncCoordinator`] runs one authoritative synchronization round:
//! - upload every local row still waiting for the remote
//! - pull remote changes since the download watermark
//! - merge them into the local store (last writer wins, PHONE wins ties)
//! - at most once per cleanup interval, drop records past retention
//!
//! then persists the new checkpoints. Rounds are idempotent: a failed round
//! leaves the checkpoints where they were and can simply be run again.
//!
//! # Round state
//!
//! ```text
//! Idle → Uploading → Downloading → Merging → Cleaning (optional) → Idle
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use read_sync_engine::{
//!     SyncCoordinator, SyncConfig, SyncPhase, InMemoryLocalStore, InMemoryRemoteStore,
//!     InMemoryWatermarkStore, StaticIdentity, SystemClock,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let clock = Arc::new(SystemClock);
//! let identity = Arc::new(StaticIdentity::signed_in("user-1"));
//! let coordinator = SyncCoordinator::new(
//!     SyncConfig::default(),
//!     Arc::new(InMemoryLocalStore::new()),
//!     Arc::new(InMemoryRemoteStore::new(identity, clock.clone())),
//!     Arc::new(InMemoryWatermarkStore::new()),
//!     clock,
//! );
//!
//! let report = coordinator.perform_full_sync().await.unwrap();
//! assert_eq!(report.uploaded, 0);
//! assert_eq!(coordinator.phase(), SyncPhase::Idle);
//! # }
//! ```

mod types;
mod merge;
mod steps;
mod cleanup;

pub use types::{
    SyncPhase, SyncError, BatchOutcome, MergeSummary, CleanupSummary, SyncReport,
    RecoveryOutcome,
};
pub use merge::{resolve, plan_merge, MergeDecision};

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::resilience::retry::{retry, RetryConfig};
use crate::storage::traits::{LocalStore, RemoteStore, WatermarkStore};

/// Orchestrates synchronization rounds between one device's local store and
/// the user's remote collection.
///
/// # Thread Safety
///
/// `Send + Sync`; share it behind an `Arc`. Concurrent rounds are serialized
/// so checkpoint writes never interleave.
pub struct SyncCoordinator {
    pub(super) config: SyncConfig,
    pub(super) local: Arc<dyn LocalStore>,
    pub(super) remote: Arc<dyn RemoteStore>,
    pub(super) watermarks: Arc<dyn WatermarkStore>,
    pub(super) clock: Arc<dyn Clock>,

    /// Current round state (broadcast to watchers)
    phase: watch::Sender<SyncPhase>,
    phase_rx: watch::Receiver<SyncPhase>,

    /// Single-flight gate for rounds
    // Held across awaits. Guards no data, it only serializes rounds.
    round: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(
        config: SyncConfig,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        watermarks: Arc<dyn WatermarkStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (phase, phase_rx) = watch::channel(SyncPhase::Idle);
        Self {
            config,
            local,
            remote,
            watermarks,
            clock,
            phase,
            phase_rx,
            round: Mutex::new(()),
        }
    }

    /// Get current round state.
    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        *self.phase_rx.borrow()
    }

    /// Get a receiver to watch round state changes.
    #[must_use]
    pub fn phase_receiver(&self) -> watch::Receiver<SyncPhase> {
        self.phase_rx.clone()
    }

    pub(super) fn set_phase(&self, phase: SyncPhase) {
        let _ = self.phase.send(phase);
    }

    /// Run one full round: upload, download, merge, optional cleanup.
    #[tracing::instrument(skip(self))]
    pub async fn perform_full_sync(&self) -> Result<SyncReport, SyncError> {
        let _round = self.round.lock().await;
        let started = Instant::now();

        let result = self.run_round().await;
        self.set_phase(SyncPhase::Idle);

        match &result {
            Ok(report) => {
                crate::metrics::record_sync_round("success", started.elapsed());
                info!(
                    uploaded = report.uploaded,
                    downloaded = report.downloaded,
                    inserted = report.merged.inserted,
                    overwritten = report.merged.overwritten,
                    cleaned = report.cleanup.is_some(),
                    watermark = report.watermark.last_download_since,
                    "Sync round complete"
                );
            }
            Err(e) => {
                crate::metrics::record_sync_round("error", started.elapsed());
                warn!(error = %e, "Sync round aborted");
            }
        }
        result
    }

    /// Run rounds until one succeeds, up to the configured attempt count,
    /// waiting `retry_base_delay * attempt` between attempts.
    pub async fn perform_full_sync_with_retry(&self) -> Result<SyncReport, SyncError> {
        self.perform_full_sync_with_max_retries(self.config.max_retries).await
    }

    /// Same as [`perform_full_sync_with_retry`](Self::perform_full_sync_with_retry)
    /// with an explicit attempt count.
    pub async fn perform_full_sync_with_max_retries(
        &self,
        max_retries: usize,
    ) -> Result<SyncReport, SyncError> {
        let policy = RetryConfig::full_sync(max_retries, self.config.retry_base_delay());
        retry("full_sync", &policy, || self.perform_full_sync()).await
    }

    async fn run_round(&self) -> Result<SyncReport, SyncError> {
        let mut watermark = self.watermarks.load().await.map_err(SyncError::local)?;

        self.set_phase(SyncPhase::Uploading);
        let uploaded = self.upload_pending().await?;

        self.set_phase(SyncPhase::Downloading);
        let download = self.download_changes(watermark.last_download_since).await?;
        let downloaded = download.records.len();

        self.set_phase(SyncPhase::Merging);
        let merged = self.merge_with_local(download.records).await?;

        let now = self.clock.now_millis();
        let cleanup = if watermark.cleanup_due(now, self.config.cleanup_interval_millis()) {
            self.set_phase(SyncPhase::Cleaning);
            let summary = self.cleanup_expired(now).await?;
            watermark.last_cleanup_at = now;
            Some(summary)
        } else {
            None
        };

        watermark.advance_download(download.max_updated_at);
        watermark.last_full_sync_at = now;
        self.watermarks.save(&watermark).await.map_err(SyncError::local)?;

        Ok(SyncReport { uploaded, downloaded, merged, cleanup, watermark })
    }
}

#[cfg(test)]
mod tests;
