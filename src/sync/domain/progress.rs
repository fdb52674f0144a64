//! Progress counters, chunk cursors, and migration reports.

use super::UnmatchedItem;
use serde::{Deserialize, Serialize};

/// Monotonic progress summary of a sync task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    items_processed: u64,
    items_total: Option<u64>,
}

impl SyncProgress {
    /// Creates a progress snapshot.
    #[must_use]
    pub const fn new(items_processed: u64, items_total: Option<u64>) -> Self {
        Self {
            items_processed,
            items_total,
        }
    }

    /// Returns the number of source items processed so far.
    #[must_use]
    pub const fn items_processed(self) -> u64 {
        self.items_processed
    }

    /// Returns the size of the source collection when last observed.
    #[must_use]
    pub const fn items_total(self) -> Option<u64> {
        self.items_total
    }

    /// Returns completion in whole percent, capped at 100.
    #[must_use]
    pub fn percent(self) -> Option<u8> {
        let total = self.items_total?;
        if total == 0 {
            return Some(100);
        }
        let scaled = self.items_processed.saturating_mul(100).checked_div(total)?;
        Some(u8::try_from(scaled.min(100)).unwrap_or(100))
    }

    /// Returns progress advanced by `delta` items.
    ///
    /// The processed count never decreases. The total follows the latest
    /// observation but is raised to the processed count when the source
    /// collection shrank under an in-flight migration.
    #[must_use]
    pub fn advanced(self, delta: u64, observed_total: Option<u64>) -> Self {
        let items_processed = self.items_processed.saturating_add(delta);
        let items_total = observed_total
            .or(self.items_total)
            .map(|total| total.max(items_processed));
        Self {
            items_processed,
            items_total,
        }
    }
}

/// Result summary of a migration, merged across chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Source items visited.
    pub items_processed: u64,
    /// Items newly written to the destination.
    pub items_added: u64,
    /// Items the destination already held.
    pub items_already_present: u64,
    /// Items a dry run would have written.
    pub items_would_add: u64,
    /// Items without a destination collection.
    pub items_skipped: u64,
    /// Items the destination service could not resolve.
    pub unmatched: Vec<UnmatchedItem>,
}

impl SyncReport {
    /// Folds a later chunk's report into this one.
    pub fn merge(&mut self, other: Self) {
        self.items_processed = self.items_processed.saturating_add(other.items_processed);
        self.items_added = self.items_added.saturating_add(other.items_added);
        self.items_already_present = self
            .items_already_present
            .saturating_add(other.items_already_present);
        self.items_would_add = self.items_would_add.saturating_add(other.items_would_add);
        self.items_skipped = self.items_skipped.saturating_add(other.items_skipped);
        self.unmatched.extend(other.unmatched);
    }

    /// Returns this report merged with `other`.
    #[must_use]
    pub fn merged(mut self, other: Self) -> Self {
        self.merge(other);
        self
    }
}

/// Resume cursor persisted while a task waits at a chunk boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkState {
    /// Position in the ordered source enumeration where the next chunk starts.
    pub offset: u64,
    /// Report accumulated by the chunks completed so far.
    pub accumulated: SyncReport,
}

impl ChunkState {
    /// Creates a cursor at `offset` carrying the accumulated report.
    #[must_use]
    pub const fn new(offset: u64, accumulated: SyncReport) -> Self {
        Self {
            offset,
            accumulated,
        }
    }
}
