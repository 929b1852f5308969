// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Conflict resolution between downloaded and local read records.
//!
//! Last writer wins on `read_at`. On an exact tie the PHONE record wins, so
//! the outcome never depends on which device merges first.

use std::collections::HashMap;

use crate::read_record::{DeviceClass, ReadRecord, SyncStatus};
use super::types::MergeSummary;

/// Decision for one downloaded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// No local counterpart
    Insert,
    /// Remote wins
    Overwrite,
    /// Local wins (later read, or tie not won by remote)
    KeepLocal,
}

impl MergeDecision {
    #[must_use]
    pub fn writes(&self) -> bool {
        !matches!(self, Self::KeepLocal)
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Overwrite => "overwrite",
            Self::KeepLocal => "keep_local",
        }
    }
}

/// Resolve one remote record against its local counterpart.
#[must_use]
pub fn resolve(local: Option<&ReadRecord>, remote: &ReadRecord) -> MergeDecision {
    let Some(local) = local else {
        return MergeDecision::Insert;
    };

    if remote.read_at > local.read_at {
        MergeDecision::Overwrite
    } else if remote.read_at == local.read_at
        && remote.device_class == DeviceClass::Phone
        && local.device_class != DeviceClass::Phone
    {
        MergeDecision::Overwrite
    } else {
        MergeDecision::KeepLocal
    }
}

/// Plan a merge of `remote` against the local rows in `local`.
///
/// Returns the records to write (all `Synced`) and a tally. When the download
/// holds the same id twice, later entries are resolved against the outcome of
/// earlier ones, so the result is the same as applying them one by one.
pub fn plan_merge(
    local: Vec<ReadRecord>,
    remote: Vec<ReadRecord>,
) -> (Vec<ReadRecord>, MergeSummary) {
    let mut current: HashMap<String, ReadRecord> =
        local.into_iter().map(|r| (r.item_id.clone(), r)).collect();
    let mut pending_writes: HashMap<String, ReadRecord> = HashMap::new();
    let mut summary = MergeSummary::default();

    for incoming in remote {
        let decision = resolve(current.get(&incoming.item_id), &incoming);
        match decision {
            MergeDecision::Insert => summary.inserted += 1,
            MergeDecision::Overwrite => summary.overwritten += 1,
            MergeDecision::KeepLocal => summary.kept_local += 1,
        }
        if decision.writes() {
            let record = incoming.with_status(SyncStatus::Synced);
            current.insert(record.item_id.clone(), record.clone());
            pending_writes.insert(record.item_id.clone(), record);
        }
    }

    let mut writes: Vec<ReadRecord> = pending_writes.into_values().collect();
    writes.sort_by(|a, b| a.item_id.cmp(&b.item_id));
    (writes, summary)
}
