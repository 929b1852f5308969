// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Concurrent FIFO with an atomic depth counter.
//!
//! Producers push from any task; drains pop one item at a time, so two
//! concurrent drains never claim the same item. The counter is only moved
//! while the queue lock is held and therefore never disagrees with the
//! queue's real length.
//!
//! # Example
//!
//! ```
//! use read_sync_engine::ReadQueue;
//!
//! let queue = ReadQueue::new();
//! assert_eq!(queue.push("a1"), 1);
//! assert_eq!(queue.push("a2"), 2);
//!
//! assert_eq!(queue.drain(), vec!["a1", "a2"]);
//! assert!(queue.is_empty());
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::Mutex;

pub struct ReadQueue<T> {
    items: Mutex<VecDeque<T>>,
    depth: AtomicUsize,
}

impl<T> ReadQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            depth: AtomicUsize::new(0),
        }
    }

    /// Append an item and return the depth including it.
    pub fn push(&self, item: T) -> usize {
        let mut items = self.items.lock();
        items.push_back(item);
        self.depth.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Remove the oldest item.
    pub fn pop(&self) -> Option<T> {
        let mut items = self.items.lock();
        let item = items.pop_front();
        if item.is_some() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
        }
        item
    }

    /// Pop until empty. Items pushed while draining may be included.
    pub fn drain(&self) -> Vec<T> {
        let mut drained = Vec::new();
        while let Some(item) = self.pop() {
            drained.push(item);
        }
        drained
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for ReadQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
