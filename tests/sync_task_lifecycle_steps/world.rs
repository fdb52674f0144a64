//! Shared world state for sync task lifecycle BDD scenarios.

use crate::test_helpers::ManualClock;
use crossfade::sync::{
    adapters::memory::{InMemoryActiveTaskCache, InMemoryLibrary, InMemoryTaskRecordStore},
    domain::{SyncTaskId, UserId},
    services::{
        LibraryChunkExecutor, ScheduledChunk, SyncError, SyncOrchestrator, TaskStatusView,
    },
};
use rstest::fixture;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Executor type used by the BDD world.
pub type WorldExecutor = LibraryChunkExecutor<InMemoryLibrary, InMemoryLibrary>;

/// Orchestrator type used by the BDD world.
pub type WorldOrchestrator = SyncOrchestrator<
    InMemoryTaskRecordStore,
    InMemoryActiveTaskCache,
    WorldExecutor,
    ManualClock,
>;

/// Chunk type handed out by the world's orchestrator.
pub type WorldChunk =
    ScheduledChunk<InMemoryTaskRecordStore, InMemoryActiveTaskCache, WorldExecutor, ManualClock>;

/// Scenario world for sync task lifecycle behaviour tests.
pub struct SyncWorld {
    pub service_a: Arc<InMemoryLibrary>,
    pub service_b: Arc<InMemoryLibrary>,
    pub clock: Arc<ManualClock>,
    pub orchestrator: WorldOrchestrator,
    pub user: Option<UserId>,
    pub task_id: Option<SyncTaskId>,
    pub pending_chunk: Option<WorldChunk>,
    pub last_error: Option<SyncError>,
    pub active: Option<Option<TaskStatusView>>,
}

impl SyncWorld {
    /// Creates a world migrating 100 items per chunk.
    #[must_use]
    pub fn new() -> Self {
        let service_a = Arc::new(InMemoryLibrary::new());
        let service_b = Arc::new(InMemoryLibrary::new());
        let clock = Arc::new(ManualClock::new());
        let executor = Arc::new(LibraryChunkExecutor::new(
            Arc::clone(&service_a),
            Arc::clone(&service_b),
            NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN),
        ));
        let orchestrator = SyncOrchestrator::new(
            Arc::new(InMemoryTaskRecordStore::new()),
            Arc::new(InMemoryActiveTaskCache::new()),
            executor,
            Arc::clone(&clock),
        );

        Self {
            service_a,
            service_b,
            clock,
            orchestrator,
            user: None,
            task_id: None,
            pending_chunk: None,
            last_error: None,
            active: None,
        }
    }

    /// Returns the scenario's user.
    ///
    /// # Errors
    ///
    /// Returns an error when no user was introduced by a step.
    pub fn user(&self) -> Result<&UserId, eyre::Report> {
        self.user
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing user in scenario world"))
    }

    /// Returns the scenario's task.
    ///
    /// # Errors
    ///
    /// Returns an error when no task was started by a step.
    pub fn task_id(&self) -> Result<SyncTaskId, eyre::Report> {
        self.task_id
            .ok_or_else(|| eyre::eyre!("missing task in scenario world"))
    }
}

impl Default for SyncWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> SyncWorld {
    SyncWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
