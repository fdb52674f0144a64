//! Sync task status and its transition table.

use super::ParseSyncStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a sync task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Task has been created and its first chunk has not started.
    Pending,
    /// A chunk is executing.
    Running,
    /// A chunk finished and more work remains; waiting for continuation.
    ChunkComplete,
    /// All work finished and the report is available.
    Completed,
    /// The task stopped on an unrecoverable error.
    Failed,
    /// The task was cancelled by its owner.
    Cancelled,
}

impl SyncStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Running,
        Self::ChunkComplete,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::ChunkComplete => "chunk_complete",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` when no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns `true` for statuses that count towards the single active
    /// task allowed per user.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Returns `true` when the state machine permits moving to `target`.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Running | Self::Failed | Self::Cancelled)
                | (
                    Self::Running,
                    Self::ChunkComplete | Self::Completed | Self::Failed | Self::Cancelled
                )
                | (
                    Self::ChunkComplete,
                    Self::Running | Self::Failed | Self::Cancelled
                )
        )
    }
}

impl TryFrom<&str> for SyncStatus {
    type Error = ParseSyncStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "chunk_complete" => Ok(Self::ChunkComplete),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseSyncStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
