// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Read Sync Engine
//!
//! Keeps a user's "item was read" records consistent across their devices.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Write Path                           │
//! │  • mark_as_read() persists PENDING locally (durable)        │
//! │  • BatchQueueManager queues a transient copy                │
//! │  • Flush at 10 queued reads, detached flush at 50           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                    (Batched upload, mark SYNCED)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Remote Store (per user)                    │
//! │  • One document per item, server-assigned updatedAt        │
//! │  • Request ceiling of 500 ops, deletes chunked at 400      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              (SyncCoordinator round, periodic or on demand)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Coordinator Round                       │
//! │  • Upload leftovers → download since watermark → merge     │
//! │  • Last writer wins, PHONE wins ties                       │
//! │  • Retention cleanup at most once per 24h                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
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
//! // Startup: sync whatever a previous run left pending
//! engine.recover_pending_items().await.unwrap();
//!
//! engine.mark_as_read("article-1").await.unwrap();
//! engine.force_flush().await;
//! let report = engine.perform_full_sync_with_retry().await.unwrap();
//! assert_eq!(report.downloaded, 1);
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`engine`]: The [`ReadSyncEngine`] composition root
//! - [`coordinator`]: Sync rounds, merge and retention cleanup
//! - [`batching`]: Transient read queue and its flush policy
//! - [`storage`]: Storage ports plus memory and SQLite adapters
//! - [`resilience`]: Retry policies
//! - [`trigger`]: Timer-driven sync

pub mod config;
pub mod read_record;
pub mod watermark;
pub mod clock;
pub mod identity;
pub mod storage;
pub mod batching;
pub mod resilience;
pub mod coordinator;
pub mod engine;
pub mod trigger;
pub mod metrics;

pub use config::SyncConfig;
pub use read_record::{ReadRecord, DeviceClass, SyncStatus};
pub use watermark::SyncWatermark;
pub use clock::{Clock, SystemClock, ManualClock};
pub use identity::{IdentityProvider, StaticIdentity};
pub use storage::traits::{LocalStore, RemoteStore, WatermarkStore, StorageError, DownloadBatch};
pub use storage::memory::{InMemoryLocalStore, InMemoryWatermarkStore};
pub use storage::remote_memory::{InMemoryRemoteStore, RemoteRequest};
pub use storage::sql::SqlLocalStore;
pub use batching::read_queue::ReadQueue;
pub use batching::queue_manager::{BatchQueueManager, FlushTrigger};
pub use coordinator::{
    SyncCoordinator, SyncPhase, SyncError, BatchOutcome, MergeSummary, CleanupSummary,
    SyncReport, RecoveryOutcome, MergeDecision,
};
pub use resilience::retry::{RetryConfig, Backoff, Retryable};
pub use engine::ReadSyncEngine;
pub use trigger::PeriodicSyncTrigger;
