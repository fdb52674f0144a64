//! Application services for sync task orchestration.

mod error;
mod executor;
mod ledger;
mod orchestrator;
mod reaper;

pub use error::{SyncConflict, SyncError, SyncResult};
pub use executor::LibraryChunkExecutor;
pub use ledger::{LedgerError, LedgerResult, TaskLedger};
pub use orchestrator::{
    Accepted, ChunkDisposition, ScheduledChunk, StartSyncRequest, SyncOrchestrator, SyncReceipt,
    TaskStatusView,
};
pub use reaper::{INTERRUPTED_ERROR, ReapReport, StaleTaskReaper};
