// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the read-sync engine.
//!
//! # Example
//!
//! ```
//! use read_sync_engine::{SyncConfig, DeviceClass};
//!
//! // Minimal config (uses defaults)
//! let config = SyncConfig::default();
//! assert_eq!(config.batch_threshold, 10);
//! assert_eq!(config.retention_days, 60);
//!
//! // A set-top box that flushes sooner
//! let config = SyncConfig {
//!     device_class: DeviceClass::Box,
//!     batch_threshold: 5,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;
use serde::Deserialize;

use crate::read_record::DeviceClass;

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;

/// Configuration for the sync engine.
///
/// All fields have defaults matching the production tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Device category stamped on reads made by this process
    #[serde(default = "default_device_class")]
    pub device_class: DeviceClass,

    /// Queue depth that triggers an inline flush
    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: usize,

    /// Queue depth that triggers a detached flush no matter what
    #[serde(default = "default_queue_ceiling")]
    pub queue_ceiling: usize,

    /// Records older than this are deleted by cleanup, locally and remotely
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Minimum spacing between two cleanup passes
    #[serde(default = "default_cleanup_interval_hours")]
    pub cleanup_interval_hours: u32,

    /// Attempts made by `perform_full_sync_with_retry`
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Backoff unit; attempt N waits N times this
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Deletes per remote round-trip during cleanup
    #[serde(default = "default_remote_delete_chunk_size")]
    pub remote_delete_chunk_size: usize,

    /// Hard per-request operation ceiling of the remote backend
    #[serde(default = "default_remote_max_batch_ops")]
    pub remote_max_batch_ops: usize,

    /// Period of the background trigger
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
}

fn default_device_class() -> DeviceClass { DeviceClass::Phone }
fn default_batch_threshold() -> usize { 10 }
fn default_queue_ceiling() -> usize { 50 }
fn default_retention_days() -> u32 { 60 }
fn default_cleanup_interval_hours() -> u32 { 24 }
fn default_max_retries() -> usize { 3 }
fn default_retry_base_delay_ms() -> u64 { 1000 }
fn default_remote_delete_chunk_size() -> usize { 400 }
fn default_remote_max_batch_ops() -> usize { 500 }
fn default_sync_interval_secs() -> u64 { 15 * 60 }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            device_class: default_device_class(),
            batch_threshold: default_batch_threshold(),
            queue_ceiling: default_queue_ceiling(),
            retention_days: default_retention_days(),
            cleanup_interval_hours: default_cleanup_interval_hours(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            remote_delete_chunk_size: default_remote_delete_chunk_size(),
            remote_max_batch_ops: default_remote_max_batch_ops(),
            sync_interval_secs: default_sync_interval_secs(),
        }
    }
}

impl SyncConfig {
    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_threshold == 0 {
            return Err("batch_threshold must be at least 1".into());
        }
        if self.queue_ceiling < self.batch_threshold {
            return Err(format!(
                "queue_ceiling ({}) must not be below batch_threshold ({})",
                self.queue_ceiling, self.batch_threshold
            ));
        }
        if self.max_retries == 0 {
            return Err("max_retries must be at least 1".into());
        }
        if self.remote_delete_chunk_size == 0
            || self.remote_delete_chunk_size > self.remote_max_batch_ops
        {
            return Err(format!(
                "remote_delete_chunk_size ({}) must be within 1..={}",
                self.remote_delete_chunk_size, self.remote_max_batch_ops
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn retention_millis(&self) -> i64 {
        i64::from(self.retention_days) * MILLIS_PER_DAY
    }

    #[must_use]
    pub fn cleanup_interval_millis(&self) -> i64 {
        i64::from(self.cleanup_interval_hours) * MILLIS_PER_HOUR
    }

    #[must_use]
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}
