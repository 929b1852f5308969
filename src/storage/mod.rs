// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Storage ports and adapters.
//!
//! - [`traits`]: the `LocalStore`, `RemoteStore` and `WatermarkStore` ports
//! - [`memory`]: in-process local store and watermark store
//! - [`remote_memory`]: in-process remote store with per-user collections
//! - [`sql`]: durable SQLite local store (reads plus checkpoints)

pub mod traits;
pub mod memory;
pub mod remote_memory;
pub mod sql;
