//! Port contracts for sync task orchestration.
//!
//! Ports define infrastructure-agnostic interfaces used by sync services.

pub mod active_cache;
pub mod executor;
pub mod library_client;
pub mod record_store;

pub use active_cache::{ActiveCacheError, ActiveCacheResult, ActiveTaskCache};
pub use executor::{ChunkExecutor, ChunkOutcome, ChunkRequest};
pub use library_client::{
    EnsureOutcome, LibraryClient, LibraryClientError, LibraryClientResult, WriteMode,
};
pub use record_store::{TaskRecordStore, TaskStoreError, TaskStoreResult};
