//! Error types for sync domain validation and parsing.

use super::{SyncKind, SyncStatus, SyncTaskId};
use thiserror::Error;

/// Errors returned while constructing or mutating sync domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncDomainError {
    /// The user identifier is empty or malformed.
    #[error("invalid user identifier '{0}'")]
    InvalidUserId(String),

    /// The requested status change is not allowed by the task state machine.
    #[error("invalid status transition for task {task_id}: {from} -> {to}")]
    InvalidStatusTransition {
        /// Task whose transition was rejected.
        task_id: SyncTaskId,
        /// Status before the attempted transition.
        from: SyncStatus,
        /// Requested target status.
        to: SyncStatus,
    },

    /// The task is not paused at a chunk boundary with a resume cursor.
    #[error("task {task_id} cannot be continued while {status}")]
    NotResumable {
        /// Task that cannot be continued.
        task_id: SyncTaskId,
        /// Current task status.
        status: SyncStatus,
    },

    /// A playlist selection was given for a migration that is not of
    /// playlists.
    #[error("playlist selection does not apply to {0} migrations")]
    SelectionNotApplicable(SyncKind),
}

/// Error returned while parsing sync statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown sync status: {0}")]
pub struct ParseSyncStatusError(pub String);

/// Error returned while parsing sync types from requests or persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown sync type: {0}")]
pub struct ParseSyncTypeError(pub String);
