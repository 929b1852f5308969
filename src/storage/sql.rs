// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Durable local store on SQLite.
//!
//! Two tables live in the same file:
//!
//! ```sql
//! read_records   (item_id PK, read_at, device_class, sync_status)
//! sync_watermark (id = 1, last_download_since, last_cleanup_at, last_full_sync_at)
//! ```
//!
//! `sync_status` and `read_at` are indexed: the engine scans by status on every
//! round and deletes by age during cleanup.

use async_trait::async_trait;
use sqlx::{AnyPool, Row, any::{AnyPoolOptions, AnyRow}};
use std::sync::Once;
use std::time::Duration;
use tracing::{debug, info};

use crate::read_record::{DeviceClass, ReadRecord, SyncStatus};
use crate::resilience::retry::{retry, RetryConfig};
use crate::watermark::SyncWatermark;
use super::traits::{LocalStore, StorageError, WatermarkStore};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

/// Rows per multi-row statement; keeps bind counts well under SQLite's limit.
const ROWS_PER_STATEMENT: usize = 200;
/// Ids per `IN (...)` clause.
const IDS_PER_STATEMENT: usize = 500;

fn backend(e: sqlx::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub struct SqlLocalStore {
    pool: AnyPool,
}

impl SqlLocalStore {
    /// Open (or create) the store at a connection string such as
    /// `sqlite://reads.db?mode=rwc`.
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        install_drivers();

        let pool = retry("sql_connect", &RetryConfig::startup(), || async {
            AnyPoolOptions::new()
                .max_connections(4)
                .acquire_timeout(Duration::from_secs(10))
                .connect(connection_string)
                .await
                .map_err(backend)
        })
        .await?;

        let store = Self { pool };
        store.enable_wal_mode().await?;
        store.init_schema().await?;
        info!(url = %connection_string, "Local read store ready");
        Ok(store)
    }

    /// Open a store file on disk, creating it if missing.
    pub async fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StorageError> {
        let url = format!("sqlite://{}?mode=rwc", path.as_ref().to_string_lossy());
        Self::new(&url).await
    }

    async fn enable_wal_mode(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to enable WAL mode: {}", e)))?;

        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to set synchronous mode: {}", e)))?;

        Ok(())
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        const STATEMENTS: [&str; 4] = [
            r#"
            CREATE TABLE IF NOT EXISTS read_records (
                item_id TEXT PRIMARY KEY,
                read_at INTEGER NOT NULL,
                device_class TEXT NOT NULL,
                sync_status TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_read_records_status ON read_records (sync_status)",
            "CREATE INDEX IF NOT EXISTS idx_read_records_read_at ON read_records (read_at)",
            r#"
            CREATE TABLE IF NOT EXISTS sync_watermark (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                last_download_since INTEGER NOT NULL,
                last_cleanup_at INTEGER NOT NULL,
                last_full_sync_at INTEGER NOT NULL
            )
            "#,
        ];

        for sql in STATEMENTS {
            retry("sql_init_schema", &RetryConfig::startup(), || async {
                sqlx::query(sql).execute(&self.pool).await.map_err(backend)
            })
            .await?;
        }
        Ok(())
    }

    fn decode(row: &AnyRow) -> Result<ReadRecord, StorageError> {
        let item_id: String = row.try_get("item_id").map_err(backend)?;
        let read_at: i64 = row.try_get("read_at").map_err(backend)?;
        let class: String = row.try_get("device_class").map_err(backend)?;
        let status: String = row.try_get("sync_status").map_err(backend)?;

        let device_class = DeviceClass::parse(&class).ok_or_else(|| {
            StorageError::Backend(format!("unknown device class '{}' for '{}'", class, item_id))
        })?;
        let sync_status = SyncStatus::parse(&status).ok_or_else(|| {
            StorageError::Backend(format!("unknown sync status '{}' for '{}'", status, item_id))
        })?;

        Ok(ReadRecord { item_id, read_at, device_class, sync_status })
    }

    async fn upsert_chunk(&self, chunk: &[ReadRecord]) -> Result<(), StorageError> {
        let sql = format!(
            "INSERT INTO read_records (item_id, read_at, device_class, sync_status) VALUES {} \
             ON CONFLICT(item_id) DO UPDATE SET \
             read_at = excluded.read_at, \
             device_class = excluded.device_class, \
             sync_status = excluded.sync_status",
            vec!["(?, ?, ?, ?)"; chunk.len()].join(", ")
        );

        let mut query = sqlx::query(&sql);
        for record in chunk {
            query = query
                .bind(record.item_id.clone())
                .bind(record.read_at)
                .bind(record.device_class.as_str().to_string())
                .bind(record.sync_status.as_str().to_string());
        }
        query.execute(&self.pool).await.map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl LocalStore for SqlLocalStore {
    async fn upsert(&self, record: &ReadRecord) -> Result<(), StorageError> {
        self.upsert_chunk(std::slice::from_ref(record)).await
    }

    async fn insert_if_absent(&self, record: &ReadRecord) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "INSERT INTO read_records (item_id, read_at, device_class, sync_status) \
             VALUES (?, ?, ?, ?) ON CONFLICT(item_id) DO NOTHING",
        )
        .bind(record.item_id.clone())
        .bind(record.read_at)
        .bind(record.device_class.as_str().to_string())
        .bind(record.sync_status.as_str().to_string())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected() == 1)
    }

    async fn upsert_all(&self, records: &[ReadRecord]) -> Result<(), StorageError> {
        for chunk in records.chunks(ROWS_PER_STATEMENT) {
            retry("sql_upsert_all", &RetryConfig::query(), || self.upsert_chunk(chunk)).await?;
        }
        debug!(count = records.len(), "Local upsert_all complete");
        Ok(())
    }

    async fn get_by_status(&self, status: SyncStatus) -> Result<Vec<ReadRecord>, StorageError> {
        let rows = sqlx::query(
            "SELECT item_id, read_at, device_class, sync_status FROM read_records WHERE sync_status = ?",
        )
        .bind(status.as_str().to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(Self::decode).collect()
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<ReadRecord>, StorageError> {
        let mut records = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(IDS_PER_STATEMENT) {
            let sql = format!(
                "SELECT item_id, read_at, device_class, sync_status FROM read_records WHERE item_id IN ({})",
                placeholders(chunk.len())
            );
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id.clone());
            }
            let rows = query.fetch_all(&self.pool).await.map_err(backend)?;
            for row in &rows {
                records.push(Self::decode(row)?);
            }
        }

        Ok(records)
    }

    async fn update_status(&self, ids: &[String], status: SyncStatus) -> Result<(), StorageError> {
        for chunk in ids.chunks(IDS_PER_STATEMENT) {
            let sql = format!(
                "UPDATE read_records SET sync_status = ? WHERE item_id IN ({})",
                placeholders(chunk.len())
            );
            let mut query = sqlx::query(&sql).bind(status.as_str().to_string());
            for id in chunk {
                query = query.bind(id.clone());
            }
            query.execute(&self.pool).await.map_err(backend)?;
        }
        Ok(())
    }

    async fn delete_older_than(&self, timestamp: i64) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM read_records WHERE read_at < ?")
            .bind(timestamp)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected())
    }

    async fn count(&self, status: SyncStatus) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM read_records WHERE sync_status = ?")
            .bind(status.as_str().to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        let count: i64 = row.try_get("cnt").map_err(backend)?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl WatermarkStore for SqlLocalStore {
    async fn load(&self) -> Result<SyncWatermark, StorageError> {
        let row = sqlx::query(
            "SELECT last_download_since, last_cleanup_at, last_full_sync_at FROM sync_watermark WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => Ok(SyncWatermark {
                last_download_since: row.try_get("last_download_since").map_err(backend)?,
                last_cleanup_at: row.try_get("last_cleanup_at").map_err(backend)?,
                last_full_sync_at: row.try_get("last_full_sync_at").map_err(backend)?,
            }),
            None => Ok(SyncWatermark::default()),
        }
    }

    async fn save(&self, watermark: &SyncWatermark) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO sync_watermark (id, last_download_since, last_cleanup_at, last_full_sync_at) \
             VALUES (1, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             last_download_since = excluded.last_download_since, \
             last_cleanup_at = excluded.last_cleanup_at, \
             last_full_sync_at = excluded.last_full_sync_at",
        )
        .bind(watermark.last_download_since)
        .bind(watermark.last_cleanup_at)
        .bind(watermark.last_full_sync_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}
