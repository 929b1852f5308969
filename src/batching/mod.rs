// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Read batching: the transient queue and the manager that flushes it.

pub mod read_queue;
pub mod queue_manager;
