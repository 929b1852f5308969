// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Read record data structure.
//!
//! A [`ReadRecord`] is the unit that flows through the engine: one entry per
//! item ever marked read by any of the user's devices.
//!
//! # Example
//!
//! ```
//! use read_sync_engine::{ReadRecord, DeviceClass, SyncStatus};
//!
//! let record = ReadRecord::new("item-42", 1_700_000_000_000, DeviceClass::Phone);
//!
//! assert_eq!(record.item_id, "item-42");
//! assert_eq!(record.sync_status, SyncStatus::Pending);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::storage::traits::StorageError;

/// Coarse device category. Only consulted as a conflict tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceClass {
    Phone,
    Box,
}

impl DeviceClass {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phone => "PHONE",
            Self::Box => "BOX",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PHONE" => Some(Self::Phone),
            "BOX" => Some(Self::Box),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local-only replication state of a record.
///
/// Transitions: `Pending → Synced`, `Pending → Failed → Synced`. A `Synced`
/// row only goes back to anything else through a remote overwrite during merge,
/// which itself lands as `Synced`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
}

impl SyncStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Synced => "SYNCED",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "SYNCED" => Some(Self::Synced),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One item marked read on some device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRecord {
    /// Stable content-derived id, unique per user
    pub item_id: String,
    /// When the item was read (epoch millis), set once by the reading device
    pub read_at: i64,
    /// Device category of the reader
    pub device_class: DeviceClass,
    /// Local replication state. Never sent to the remote store.
    #[serde(skip, default = "default_status")]
    pub sync_status: SyncStatus,
}

fn default_status() -> SyncStatus {
    SyncStatus::Synced
}

impl ReadRecord {
    /// Create a freshly read record, not yet replicated.
    pub fn new(item_id: impl Into<String>, read_at: i64, device_class: DeviceClass) -> Self {
        Self {
            item_id: item_id.into(),
            read_at,
            device_class,
            sync_status: SyncStatus::Pending,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: SyncStatus) -> Self {
        self.sync_status = status;
        self
    }

    /// Encode as a remote document. The server stamps `updatedAt` itself.
    #[must_use]
    pub fn to_document(&self, updated_at: i64) -> Value {
        json!({
            "itemId": self.item_id,
            "readAt": self.read_at,
            "deviceClass": self.device_class,
            "updatedAt": updated_at,
        })
    }

    /// Decode a remote document. Records coming from the remote are `Synced`.
    pub fn from_document(doc: &Value) -> Result<Self, StorageError> {
        serde_json::from_value::<ReadRecord>(doc.clone())
            .map(|record| record.with_status(SyncStatus::Synced))
            .map_err(|e| StorageError::Backend(format!("malformed read document: {}", e)))
    }
}
