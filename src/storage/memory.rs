// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::atomic::{AtomicU64, Ordering};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::read_record::{ReadRecord, SyncStatus};
use crate::watermark::SyncWatermark;
use super::traits::{LocalStore, StorageError, WatermarkStore};

/// Local store kept in a `DashMap`. Not durable; for tests and ephemeral devices.
pub struct InMemoryLocalStore {
    data: DashMap<String, ReadRecord>,
    id_lookups: AtomicU64,
}

impl InMemoryLocalStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            id_lookups: AtomicU64::new(0),
        }
    }

    /// Get current record count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Snapshot a single record
    #[must_use]
    pub fn get(&self, item_id: &str) -> Option<ReadRecord> {
        self.data.get(item_id).map(|r| r.value().clone())
    }

    /// Number of `get_by_ids` queries served so far
    #[must_use]
    pub fn id_lookup_count(&self) -> u64 {
        self.id_lookups.load(Ordering::Relaxed)
    }

    /// All records, sorted by id
    #[must_use]
    pub fn snapshot(&self) -> Vec<ReadRecord> {
        let mut records: Vec<ReadRecord> = self.data.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        records
    }
}

impl Default for InMemoryLocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalStore for InMemoryLocalStore {
    async fn upsert(&self, record: &ReadRecord) -> Result<(), StorageError> {
        self.data.insert(record.item_id.clone(), record.clone());
        Ok(())
    }

    async fn insert_if_absent(&self, record: &ReadRecord) -> Result<bool, StorageError> {
        match self.data.entry(record.item_id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(true)
            }
        }
    }

    async fn get_by_status(&self, status: SyncStatus) -> Result<Vec<ReadRecord>, StorageError> {
        Ok(self
            .data
            .iter()
            .filter(|r| r.sync_status == status)
            .map(|r| r.value().clone())
            .collect())
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<ReadRecord>, StorageError> {
        self.id_lookups.fetch_add(1, Ordering::Relaxed);
        Ok(ids
            .iter()
            .filter_map(|id| self.data.get(id).map(|r| r.value().clone()))
            .collect())
    }

    async fn update_status(&self, ids: &[String], status: SyncStatus) -> Result<(), StorageError> {
        for id in ids {
            if let Some(mut record) = self.data.get_mut(id) {
                record.sync_status = status;
            }
        }
        Ok(())
    }

    async fn delete_older_than(&self, timestamp: i64) -> Result<u64, StorageError> {
        let mut removed = 0u64;
        self.data.retain(|_, record| {
            let keep = record.read_at >= timestamp;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    async fn count(&self, status: SyncStatus) -> Result<u64, StorageError> {
        Ok(self.data.iter().filter(|r| r.sync_status == status).count() as u64)
    }
}

/// Watermark held in process memory.
#[derive(Default)]
pub struct InMemoryWatermarkStore {
    watermark: Mutex<SyncWatermark>,
}

impl InMemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_watermark(watermark: SyncWatermark) -> Self {
        Self { watermark: Mutex::new(watermark) }
    }

    #[must_use]
    pub fn current(&self) -> SyncWatermark {
        *self.watermark.lock()
    }
}

#[async_trait]
impl WatermarkStore for InMemoryWatermarkStore {
    async fn load(&self) -> Result<SyncWatermark, StorageError> {
        Ok(*self.watermark.lock())
    }

    async fn save(&self, watermark: &SyncWatermark) -> Result<(), StorageError> {
        *self.watermark.lock() = *watermark;
        Ok(())
    }
}
