//! In-memory adapters for sync task orchestration.

mod active_cache;
mod library;
mod record_store;

pub use active_cache::InMemoryActiveTaskCache;
pub use library::InMemoryLibrary;
pub use record_store::InMemoryTaskRecordStore;
