//! Sync task aggregate root.

use super::{
    ChunkState, MigrationId, SyncDomainError, SyncProgress, SyncReport, SyncStatus, SyncTaskId,
    SyncType, UserId,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Parameter object for creating a new sync task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSyncTask {
    /// Task owner.
    pub user_id: UserId,
    /// Kind and direction of the migration.
    pub sync_type: SyncType,
    /// Whether destination writes are suppressed.
    pub dry_run: bool,
    /// Migration run this task belongs to, if any.
    pub migration_id: Option<MigrationId>,
    /// Names of the source playlists to migrate. Empty selects all.
    pub playlists: Vec<String>,
}

/// Sync task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTask {
    id: SyncTaskId,
    user_id: UserId,
    sync_type: SyncType,
    dry_run: bool,
    migration_id: Option<MigrationId>,
    #[serde(default)]
    playlists: Vec<String>,
    status: SyncStatus,
    progress: SyncProgress,
    chunk_state: Option<ChunkState>,
    report: Option<SyncReport>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted sync task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSyncTaskData {
    /// Persisted task identifier.
    pub id: SyncTaskId,
    /// Persisted owner.
    pub user_id: UserId,
    /// Persisted sync type.
    pub sync_type: SyncType,
    /// Persisted dry-run flag.
    pub dry_run: bool,
    /// Persisted migration link.
    pub migration_id: Option<MigrationId>,
    /// Persisted playlist selection.
    pub playlists: Vec<String>,
    /// Persisted lifecycle status.
    pub status: SyncStatus,
    /// Persisted progress.
    pub progress: SyncProgress,
    /// Persisted resume cursor.
    pub chunk_state: Option<ChunkState>,
    /// Persisted completion report.
    pub report: Option<SyncReport>,
    /// Persisted failure description.
    pub error: Option<String>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl SyncTask {
    /// Creates a new task in [`SyncStatus::Pending`].
    ///
    /// The playlist selection is stored sorted and without duplicates.
    #[must_use]
    pub fn new(request: NewSyncTask, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        let mut playlists = request.playlists;
        playlists.sort_unstable();
        playlists.dedup();
        Self {
            id: SyncTaskId::new(),
            user_id: request.user_id,
            sync_type: request.sync_type,
            dry_run: request.dry_run,
            migration_id: request.migration_id,
            playlists,
            status: SyncStatus::Pending,
            progress: SyncProgress::default(),
            chunk_state: None,
            report: None,
            error: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedSyncTaskData) -> Self {
        Self {
            id: data.id,
            user_id: data.user_id,
            sync_type: data.sync_type,
            dry_run: data.dry_run,
            migration_id: data.migration_id,
            playlists: data.playlists,
            status: data.status,
            progress: data.progress,
            chunk_state: data.chunk_state,
            report: data.report,
            error: data.error,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> SyncTaskId {
        self.id
    }

    /// Returns the task owner.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns `true` when the task belongs to `user_id`.
    #[must_use]
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    /// Returns the migration kind and direction.
    #[must_use]
    pub const fn sync_type(&self) -> SyncType {
        self.sync_type
    }

    /// Returns whether destination writes are suppressed.
    #[must_use]
    pub const fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Returns the migration run link, if any.
    #[must_use]
    pub const fn migration_id(&self) -> Option<MigrationId> {
        self.migration_id
    }

    /// Returns the selected source playlists. Empty means every playlist.
    #[must_use]
    pub fn playlists(&self) -> &[String] {
        &self.playlists
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> SyncStatus {
        self.status
    }

    /// Returns the progress summary.
    #[must_use]
    pub const fn progress(&self) -> SyncProgress {
        self.progress
    }

    /// Returns the resume cursor, present only in
    /// [`SyncStatus::ChunkComplete`].
    #[must_use]
    pub const fn chunk_state(&self) -> Option<&ChunkState> {
        self.chunk_state.as_ref()
    }

    /// Returns the completion report.
    #[must_use]
    pub const fn report(&self) -> Option<&SyncReport> {
        self.report.as_ref()
    }

    /// Returns the failure description.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns `true` when the task is non-terminal and has not been
    /// updated since `cutoff`.
    #[must_use]
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.status.is_active() && self.updated_at < cutoff
    }

    /// Moves a pending task to [`SyncStatus::Running`] for its first chunk.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::InvalidStatusTransition`] unless the task
    /// is pending.
    pub fn start(&mut self, clock: &impl Clock) -> Result<(), SyncDomainError> {
        if self.status != SyncStatus::Pending {
            return Err(self.invalid_transition(SyncStatus::Running));
        }
        self.transition_to(SyncStatus::Running, clock)
    }

    /// Moves a paused task back to [`SyncStatus::Running`] and hands out its
    /// resume cursor.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::NotResumable`] unless the task is in
    /// [`SyncStatus::ChunkComplete`] with a cursor present. The task is left
    /// unchanged on error.
    pub fn resume(&mut self, clock: &impl Clock) -> Result<ChunkState, SyncDomainError> {
        let not_resumable = SyncDomainError::NotResumable {
            task_id: self.id,
            status: self.status,
        };
        if self.status != SyncStatus::ChunkComplete {
            return Err(not_resumable);
        }
        let cursor = self.chunk_state.take().ok_or(not_resumable)?;
        self.transition_to(SyncStatus::Running, clock)?;
        Ok(cursor)
    }

    /// Records a finished chunk with more work remaining.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::InvalidStatusTransition`] unless the task
    /// is running.
    pub fn pause_at(
        &mut self,
        cursor: ChunkState,
        progress: SyncProgress,
        clock: &impl Clock,
    ) -> Result<(), SyncDomainError> {
        self.transition_to(SyncStatus::ChunkComplete, clock)?;
        self.chunk_state = Some(cursor);
        self.raise_progress(progress);
        Ok(())
    }

    /// Records the final chunk and stores the merged report.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::InvalidStatusTransition`] unless the task
    /// is running.
    pub fn complete(
        &mut self,
        report: SyncReport,
        progress: SyncProgress,
        clock: &impl Clock,
    ) -> Result<(), SyncDomainError> {
        self.transition_to(SyncStatus::Completed, clock)?;
        self.report = Some(report);
        self.raise_progress(progress);
        Ok(())
    }

    /// Marks the task failed with a human-readable error.
    ///
    /// Progress keeps its last recorded value.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::InvalidStatusTransition`] when the task is
    /// already terminal.
    pub fn fail(
        &mut self,
        error: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), SyncDomainError> {
        self.transition_to(SyncStatus::Failed, clock)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Marks the task cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::InvalidStatusTransition`] when the task is
    /// already terminal.
    pub fn cancel(&mut self, clock: &impl Clock) -> Result<(), SyncDomainError> {
        self.transition_to(SyncStatus::Cancelled, clock)
    }

    /// Applies a validated status change and clears the cursor when leaving
    /// [`SyncStatus::ChunkComplete`].
    fn transition_to(
        &mut self,
        target: SyncStatus,
        clock: &impl Clock,
    ) -> Result<(), SyncDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(self.invalid_transition(target));
        }
        self.status = target;
        self.chunk_state = None;
        self.updated_at = clock.utc();
        Ok(())
    }

    const fn invalid_transition(&self, to: SyncStatus) -> SyncDomainError {
        SyncDomainError::InvalidStatusTransition {
            task_id: self.id,
            from: self.status,
            to,
        }
    }

    fn raise_progress(&mut self, progress: SyncProgress) {
        if progress.items_processed() >= self.progress.items_processed() {
            self.progress = progress;
        }
    }
}
