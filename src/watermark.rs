// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Persisted sync checkpoints.

use serde::{Deserialize, Serialize};

/// Three independent timestamps (epoch millis), zero meaning "never".
///
/// Read at the start of a coordinator round and written back only when the
/// round succeeds. A failed round leaves them untouched, so the next round
/// retries from the same boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncWatermark {
    /// High-watermark for incremental pull (inclusive)
    pub last_download_since: i64,
    /// Gate for the cleanup rate limit
    pub last_cleanup_at: i64,
    /// Informational
    pub last_full_sync_at: i64,
}

impl SyncWatermark {
    /// True when no download has ever completed.
    #[must_use]
    pub fn is_first_pull(&self) -> bool {
        self.last_download_since == 0
    }

    /// Whether enough time has passed since the last cleanup.
    #[must_use]
    pub fn cleanup_due(&self, now: i64, interval_ms: i64) -> bool {
        now.saturating_sub(self.last_cleanup_at) >= interval_ms
    }

    /// Advance the download boundary without ever moving it backwards.
    pub fn advance_download(&mut self, observed_max: i64) {
        self.last_download_since = self.last_download_since.max(observed_max);
    }
}
