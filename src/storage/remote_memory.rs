// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process document store standing in for the hosted one.
//!
//! Behaves like the real backend where the engine can tell the difference:
//! documents live in per-user collections, the server stamps `updatedAt`,
//! every request is capped at `max_batch_ops` operations, and nothing works
//! without a signed-in user. Several devices share one instance through `Arc`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::identity::IdentityProvider;
use crate::read_record::ReadRecord;
use super::traits::{DownloadBatch, RemoteStore, StorageError};

/// One round-trip to the backend, as seen by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteRequest {
    Upload { ops: usize },
    Query,
    Delete { ops: usize },
}

pub struct InMemoryRemoteStore {
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    /// user id -> (item id -> document)
    collections: DashMap<String, BTreeMap<String, Value>>,
    max_batch_ops: usize,
    delete_chunk_size: usize,
    available: AtomicBool,
    requests: Mutex<Vec<RemoteRequest>>,
}

impl InMemoryRemoteStore {
    /// Ceiling observed on the hosted backend
    pub const DEFAULT_MAX_BATCH_OPS: usize = 500;
    /// Chunk size that stays clear of the ceiling
    pub const DEFAULT_DELETE_CHUNK_SIZE: usize = 400;

    pub fn new(identity: Arc<dyn IdentityProvider>, clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(
            identity,
            clock,
            Self::DEFAULT_MAX_BATCH_OPS,
            Self::DEFAULT_DELETE_CHUNK_SIZE,
        )
    }

    /// Use the batch ceiling and delete chunk size from `config`.
    pub fn from_config(
        config: &SyncConfig,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_limits(
            identity,
            clock,
            config.remote_max_batch_ops,
            config.remote_delete_chunk_size,
        )
    }

    pub fn with_limits(
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        max_batch_ops: usize,
        delete_chunk_size: usize,
    ) -> Self {
        Self {
            identity,
            clock,
            collections: DashMap::new(),
            max_batch_ops: max_batch_ops.max(1),
            delete_chunk_size: delete_chunk_size.clamp(1, max_batch_ops.max(1)),
            available: AtomicBool::new(true),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Simulate losing or regaining connectivity.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Every request served so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RemoteRequest> {
        self.requests.lock().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    /// Number of upload round-trips served so far.
    #[must_use]
    pub fn upload_calls(&self) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| matches!(r, RemoteRequest::Upload { .. }))
            .count()
    }

    /// Raw document for `item_id` in `user`'s collection.
    #[must_use]
    pub fn document(&self, user: &str, item_id: &str) -> Option<Value> {
        self.collections.get(user).and_then(|c| c.get(item_id).cloned())
    }

    #[must_use]
    pub fn document_count(&self, user: &str) -> usize {
        self.collections.get(user).map(|c| c.len()).unwrap_or(0)
    }

    /// Seed a document with an explicit server stamp, bypassing the clock.
    pub fn seed(&self, user: &str, record: &ReadRecord, updated_at: i64) {
        self.collections
            .entry(user.to_string())
            .or_default()
            .insert(record.item_id.clone(), record.to_document(updated_at));
    }

    fn authorize(&self) -> Result<String, StorageError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StorageError::Timeout("remote store unreachable".into()));
        }
        self.identity.current_user().ok_or(StorageError::NotAuthenticated)
    }

    fn check_ops(&self, ops: usize) -> Result<(), StorageError> {
        if ops > self.max_batch_ops {
            return Err(StorageError::BatchTooLarge { size: ops, max: self.max_batch_ops });
        }
        Ok(())
    }
}

fn updated_at_of(doc: &Value) -> i64 {
    doc.get("updatedAt").and_then(Value::as_i64).unwrap_or(0)
}

fn read_at_of(doc: &Value) -> i64 {
    doc.get("readAt").and_then(Value::as_i64).unwrap_or(0)
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn upload_batch(&self, records: &[ReadRecord]) -> Result<(), StorageError> {
        let user = self.authorize()?;

        for chunk in records.chunks(self.max_batch_ops) {
            self.check_ops(chunk.len())?;
            let stamp = self.clock.now_millis();
            let mut collection = self.collections.entry(user.clone()).or_default();
            for record in chunk {
                collection.insert(record.item_id.clone(), record.to_document(stamp));
            }
            drop(collection);
            self.requests.lock().push(RemoteRequest::Upload { ops: chunk.len() });
        }

        debug!(user = %user, count = records.len(), "Remote upload committed");
        Ok(())
    }

    async fn download_since(&self, since: i64) -> Result<DownloadBatch, StorageError> {
        let user = self.authorize()?;
        self.requests.lock().push(RemoteRequest::Query);

        let Some(collection) = self.collections.get(&user) else {
            return Ok(DownloadBatch { records: Vec::new(), max_updated_at: since });
        };

        let mut records = Vec::new();
        let mut max_updated_at = since;
        for doc in collection.values().filter(|doc| updated_at_of(doc) >= since) {
            records.push(ReadRecord::from_document(doc)?);
            max_updated_at = max_updated_at.max(updated_at_of(doc));
        }

        Ok(DownloadBatch { records, max_updated_at })
    }

    async fn delete_older_than(&self, timestamp: i64) -> Result<u64, StorageError> {
        let user = self.authorize()?;

        let doomed: Vec<String> = match self.collections.get(&user) {
            Some(collection) => collection
                .iter()
                .filter(|(_, doc)| read_at_of(doc) < timestamp)
                .map(|(id, _)| id.clone())
                .collect(),
            None => return Ok(0),
        };

        let mut deleted = 0u64;
        for chunk in doomed.chunks(self.delete_chunk_size) {
            self.check_ops(chunk.len())?;
            if let Some(mut collection) = self.collections.get_mut(&user) {
                for id in chunk {
                    if collection.remove(id).is_some() {
                        deleted += 1;
                    }
                }
            }
            self.requests.lock().push(RemoteRequest::Delete { ops: chunk.len() });
        }

        debug!(user = %user, deleted, chunks = doomed.len().div_ceil(self.delete_chunk_size), "Remote cleanup committed");
        Ok(deleted)
    }
}
