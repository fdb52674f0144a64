//! Chunk executor port: one bounded slice of migration work.

use crate::sync::domain::{
    LibraryItem, MigrationId, SyncReport, SyncTask, SyncTaskId, SyncType,
};
use async_trait::async_trait;

/// Inputs for one chunk of a sync task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    /// Task being advanced.
    pub task_id: SyncTaskId,
    /// Kind and direction of the migration.
    pub sync_type: SyncType,
    /// Whether destination writes are suppressed.
    pub dry_run: bool,
    /// Position in the ordered source enumeration to start from.
    pub offset: u64,
    /// Migration run link, if any.
    pub migration_id: Option<MigrationId>,
    /// Source playlists to migrate. Empty selects all.
    pub playlists: Vec<String>,
}

impl ChunkRequest {
    /// Builds the request for `task` starting at `offset`.
    #[must_use]
    pub fn for_task(task: &SyncTask, offset: u64) -> Self {
        Self {
            task_id: task.id(),
            sync_type: task.sync_type(),
            dry_run: task.dry_run(),
            offset,
            migration_id: task.migration_id(),
            playlists: task.playlists().to_vec(),
        }
    }

    /// Returns `true` when `item` belongs to the requested slice of the
    /// source. Items outside a playlist are never selected by name.
    #[must_use]
    pub fn selects(&self, item: &LibraryItem) -> bool {
        if self.playlists.is_empty() {
            return true;
        }
        item.playlist()
            .is_some_and(|name| self.playlists.iter().any(|selected| selected == name))
    }
}

/// Result of executing one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// The slice finished and more source items remain.
    Continue {
        /// Offset the next chunk starts from.
        new_offset: u64,
        /// Source items visited by this chunk.
        items_processed_delta: u64,
        /// Source collection size observed by this chunk.
        items_total: u64,
        /// This chunk's share of the report.
        report: SyncReport,
    },
    /// No source items remain.
    Done {
        /// Source collection size observed by this chunk.
        items_total: u64,
        /// This chunk's share of the report.
        report: SyncReport,
    },
    /// The chunk failed and the task cannot make progress.
    Fatal {
        /// Human-readable failure description.
        error: String,
    },
}

/// Executes one bounded chunk of migration work.
///
/// Executors must be idempotent with respect to `offset`: running the same
/// request twice must not duplicate destination writes.
#[async_trait]
pub trait ChunkExecutor: Send + Sync {
    /// Runs the chunk described by `request`.
    async fn execute_chunk(&self, request: &ChunkRequest) -> ChunkOutcome;
}
