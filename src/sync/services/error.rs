//! Caller-facing errors of the sync services.

use super::ledger::LedgerError;
use crate::sync::{
    domain::{MigrationId, SyncDomainError, SyncStatus, SyncTaskId},
    ports::{ActiveCacheError, TaskStoreError},
};
use thiserror::Error;

/// A request that is valid in form but not in the task's current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncConflict {
    /// The user already has a non-terminal task.
    #[error("an active sync task already exists: {task_id} is {status}")]
    ActiveTaskExists {
        /// The existing task.
        task_id: SyncTaskId,
        /// Its current status.
        status: SyncStatus,
    },

    /// Continuation was requested for a task not waiting at a chunk boundary.
    #[error("task {task_id} cannot be continued while {status}")]
    NotResumable {
        /// Task named by the request.
        task_id: SyncTaskId,
        /// Its current status.
        status: SyncStatus,
    },

    /// Cancellation was requested for a finished task.
    #[error("task {task_id} is already {status}")]
    AlreadyTerminal {
        /// Task named by the request.
        task_id: SyncTaskId,
        /// Its terminal status.
        status: SyncStatus,
    },

    /// The state machine does not allow the requested move.
    #[error("task {task_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Task named by the request.
        task_id: SyncTaskId,
        /// Current status.
        from: SyncStatus,
        /// Rejected target status.
        to: SyncStatus,
    },

    /// Another writer changed the task between read and write.
    #[error("task {task_id} changed concurrently: expected {expected}, found {found}")]
    StatusChanged {
        /// Task named by the request.
        task_id: SyncTaskId,
        /// Status observed before mutating.
        expected: SyncStatus,
        /// Status found at write time.
        found: SyncStatus,
    },
}

impl SyncConflict {
    /// Returns the task's status as seen when the conflict was detected.
    #[must_use]
    pub const fn current_status(&self) -> SyncStatus {
        match self {
            Self::ActiveTaskExists { status, .. }
            | Self::NotResumable { status, .. }
            | Self::AlreadyTerminal { status, .. } => *status,
            Self::InvalidTransition { from, .. } => *from,
            Self::StatusChanged { found, .. } => *found,
        }
    }
}

/// Errors returned by [`SyncOrchestrator`](super::SyncOrchestrator) and
/// [`StaleTaskReaper`](super::StaleTaskReaper).
#[derive(Debug, Error)]
pub enum SyncError {
    /// No task with this identifier exists for the requesting user.
    #[error("sync task not found: {0}")]
    NotFound(SyncTaskId),

    /// The user has no tasks in this migration run.
    #[error("migration not found: {0}")]
    MigrationNotFound(MigrationId),

    /// The task's state does not permit the request.
    #[error(transparent)]
    Conflict(#[from] SyncConflict),

    /// The cache and the record store disagree about the task.
    #[error("task {task_id} is inconsistent between cache and record store: {source}")]
    Inconsistency {
        /// Affected task.
        task_id: SyncTaskId,
        /// Store failure that followed the cache write.
        source: TaskStoreError,
    },

    /// Domain validation failed.
    #[error(transparent)]
    Domain(SyncDomainError),

    /// The active task cache failed.
    #[error(transparent)]
    Cache(ActiveCacheError),

    /// The record store failed.
    #[error(transparent)]
    Store(#[from] TaskStoreError),
}

/// Result type for sync service operations.
pub type SyncResult<T> = Result<T, SyncError>;

impl From<SyncDomainError> for SyncError {
    fn from(err: SyncDomainError) -> Self {
        match err {
            SyncDomainError::NotResumable { task_id, status } => {
                Self::Conflict(SyncConflict::NotResumable { task_id, status })
            }
            SyncDomainError::InvalidStatusTransition { task_id, from, to } => {
                Self::Conflict(SyncConflict::InvalidTransition { task_id, from, to })
            }
            SyncDomainError::InvalidUserId(_) | SyncDomainError::SelectionNotApplicable(_) => {
                Self::Domain(err)
            }
        }
    }
}

impl From<ActiveCacheError> for SyncError {
    fn from(err: ActiveCacheError) -> Self {
        match err {
            ActiveCacheError::ActiveTaskExists {
                task_id, status, ..
            } => Self::Conflict(SyncConflict::ActiveTaskExists { task_id, status }),
            ActiveCacheError::Conflict {
                task_id,
                expected,
                found,
            } => Self::Conflict(SyncConflict::StatusChanged {
                task_id,
                expected,
                found,
            }),
            ActiveCacheError::DuplicateTask(_)
            | ActiveCacheError::NotCached(_)
            | ActiveCacheError::Unavailable(_) => Self::Cache(err),
        }
    }
}

impl From<LedgerError> for SyncError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Cache(cache) => cache.into(),
            LedgerError::Store(TaskStoreError::Conflict {
                task_id,
                expected,
                found,
            }) => Self::Conflict(SyncConflict::StatusChanged {
                task_id,
                expected,
                found,
            }),
            LedgerError::Store(store) => Self::Store(store),
            LedgerError::Diverged { task_id, source } => Self::Inconsistency { task_id, source },
        }
    }
}
