//! Roll-up of the tasks that make up one migration run.

use super::{MigrationId, SyncReport, SyncStatus, SyncTask, SyncTaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure descriptions recorded when a task lost its worker rather than
/// failing on its own.
const INTERRUPTION_PREFIXES: [&str; 2] = ["stale:", "interrupted:"];

/// Overall state of a migration run, derived from its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    /// At least one task is still non-terminal.
    InProgress,
    /// Every task completed.
    Completed,
    /// A task failed on its own.
    Failed,
    /// A task was failed because its worker went away: it went stale or the
    /// engine restarted.
    Interrupted,
    /// A task was cancelled and none failed.
    Cancelled,
}

impl MigrationStatus {
    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` once no task of the run can change any more.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        !matches!(self, Self::InProgress)
    }

    fn of(tasks: &[SyncTask]) -> Self {
        let any = |predicate: fn(&SyncTask) -> bool| tasks.iter().any(predicate);
        if any(|task| task.status().is_active()) {
            Self::InProgress
        } else if any(was_interrupted) {
            Self::Interrupted
        } else if any(|task| task.status() == SyncStatus::Failed) {
            Self::Failed
        } else if any(|task| task.status() == SyncStatus::Cancelled) {
            Self::Cancelled
        } else {
            Self::Completed
        }
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn was_interrupted(task: &SyncTask) -> bool {
    task.status() == SyncStatus::Failed
        && task
            .error()
            .is_some_and(|error| INTERRUPTION_PREFIXES.iter().any(|prefix| error.starts_with(prefix)))
}

/// One migration run as a user sees it in their history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    /// Migration run identifier.
    pub migration_id: MigrationId,
    /// Status derived from the run's tasks.
    pub status: MigrationStatus,
    /// Tasks of the run, oldest first.
    pub tasks: Vec<SyncTaskId>,
    /// Creation time of the first task.
    pub started_at: DateTime<Utc>,
    /// Last update of any task, once the run is finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Reports of the finished tasks added together.
    pub report: SyncReport,
}

impl MigrationSummary {
    /// Rolls up the tasks of one run. Returns `None` for an empty run.
    #[must_use]
    pub fn from_tasks(migration_id: MigrationId, tasks: &[SyncTask]) -> Option<Self> {
        let started_at = tasks.iter().map(SyncTask::created_at).min()?;
        let status = MigrationStatus::of(tasks);
        let completed_at = if status.is_finished() {
            tasks.iter().map(SyncTask::updated_at).max()
        } else {
            None
        };
        let report = tasks
            .iter()
            .filter_map(SyncTask::report)
            .cloned()
            .fold(SyncReport::default(), SyncReport::merged);

        let mut ordered: Vec<&SyncTask> = tasks.iter().collect();
        ordered.sort_by_key(|task| task.created_at());
        Some(Self {
            migration_id,
            status,
            tasks: ordered.into_iter().map(SyncTask::id).collect(),
            started_at,
            completed_at,
            report,
        })
    }
}
