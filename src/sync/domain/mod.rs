//! Domain model for sync task orchestration.
//!
//! The sync domain models migration tasks, their status machine, progress
//! cursors and reports, the roll-up of migration runs, and the library values exchanged with streaming
//! services, keeping all infrastructure concerns outside the domain boundary.

mod error;
mod ids;
mod library;
mod migration;
mod progress;
mod status;
mod sync_type;
mod task;

pub use error::{ParseSyncStatusError, ParseSyncTypeError, SyncDomainError};
pub use ids::{MigrationId, SyncTaskId, UserId};
pub use library::{CollectionRef, LibraryItem, UnmatchedItem};
pub use migration::{MigrationStatus, MigrationSummary};
pub use progress::{ChunkState, SyncProgress, SyncReport};
pub use status::SyncStatus;
pub use sync_type::{SyncDirection, SyncKind, SyncType};
pub use task::{NewSyncTask, PersistedSyncTaskData, SyncTask};
