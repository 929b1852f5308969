//! Public types for the sync coordinator and queue manager.

use thiserror::Error;

use crate::resilience::retry::Retryable;
use crate::storage::traits::StorageError;
use crate::watermark::SyncWatermark;

/// Coordinator round state.
///
/// ```text
/// Idle → Uploading → Downloading → Merging → Cleaning (optional) → Idle
/// ```
///
/// A failure in any step returns straight to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Uploading,
    Downloading,
    Merging,
    Cleaning,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Uploading => write!(f, "Uploading"),
            Self::Downloading => write!(f, "Downloading"),
            Self::Merging => write!(f, "Merging"),
            Self::Cleaning => write!(f, "Cleaning"),
        }
    }
}

/// Engine-level failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Network, quota, timeout. Safe to retry; local rows stay pending.
    #[error("Remote store failure: {0}")]
    Remote(StorageError),
    /// Nobody is signed in. Retrying cannot help.
    #[error("No authenticated user")]
    Unauthenticated,
    /// The local database failed. Fatal for the current operation.
    #[error("Local store failure: {0}")]
    Local(StorageError),
    /// Queue admission for an item that was never persisted locally.
    #[error("No local read record for '{0}'")]
    NotFound(String),
    /// Settings rejected by `SyncConfig::validate`.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    /// Classify a remote-store error.
    pub fn remote(err: StorageError) -> Self {
        match err {
            StorageError::NotAuthenticated => Self::Unauthenticated,
            other => Self::Remote(other),
        }
    }

    pub fn local(err: StorageError) -> Self {
        Self::Local(err)
    }
}

impl Retryable for SyncError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(inner) => inner.is_retryable(),
            Self::Unauthenticated | Self::Local(_) | Self::NotFound(_) | Self::Config(_) => false,
        }
    }
}

/// What a queue flush did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Nothing was queued
    Empty,
    /// `count` records uploaded and marked synced
    Uploaded { count: usize },
    /// Upload (or the status write after it) failed; rows stay pending
    Failed { count: usize, error: SyncError },
}

impl BatchOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Records drained from the queue by this flush.
    #[must_use]
    pub fn drained(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Uploaded { count } | Self::Failed { count, .. } => *count,
        }
    }
}

/// Per-round merge tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Remote records with no local counterpart
    pub inserted: usize,
    /// Local rows replaced by a later (or PHONE tie-winning) remote record
    pub overwritten: usize,
    /// Remote records discarded in favour of the local row
    pub kept_local: usize,
}

impl MergeSummary {
    #[must_use]
    pub fn written(&self) -> usize {
        self.inserted + self.overwritten
    }
}

/// Rows removed by a retention pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    /// Records read before this instant were removed
    pub threshold: i64,
    pub local_deleted: u64,
    pub remote_deleted: u64,
}

/// Result of one successful coordinator round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub uploaded: usize,
    pub downloaded: usize,
    pub merged: MergeSummary,
    /// `None` when the rate limit skipped cleanup
    pub cleanup: Option<CleanupSummary>,
    /// Checkpoints persisted at the end of the round
    pub watermark: SyncWatermark,
}

/// Result of startup recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryOutcome {
    /// Pending rows left behind by a previous process
    pub pending_found: u64,
    /// Report of the recovery round, if one was needed
    pub synced: Option<SyncReport>,
}
