//! Streaming-service client port used by chunk execution.

use crate::sync::domain::{CollectionRef, LibraryItem};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for library client operations.
pub type LibraryClientResult<T> = Result<T, LibraryClientError>;

/// Whether a destination write is applied or only evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMode {
    /// Apply the write.
    Apply,
    /// Report what would happen without mutating the account.
    DryRun,
}

impl WriteMode {
    /// Returns the mode matching a task's dry-run flag.
    #[must_use]
    pub const fn for_dry_run(dry_run: bool) -> Self {
        if dry_run { Self::DryRun } else { Self::Apply }
    }
}

/// Result of an idempotent `ensure_present` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnsureOutcome {
    /// The item was written.
    Added,
    /// The collection already contained the item; nothing was written.
    AlreadyPresent,
    /// Dry run: the item would have been written.
    WouldAdd,
    /// The service has no equivalent of the item.
    Unmatched,
}

/// Account-level library access for one streaming service.
///
/// Implementations own authentication and per-call retry policy, including
/// backoff on rate limiting.
#[async_trait]
pub trait LibraryClient: Send + Sync {
    /// Enumerates a collection in an order that is stable across calls
    /// within one migration.
    async fn list(&self, collection: &CollectionRef) -> LibraryClientResult<Vec<LibraryItem>>;

    /// Makes sure `item` is in `collection`.
    ///
    /// Repeated calls with the same arguments leave the account unchanged
    /// after the first. [`WriteMode::DryRun`] never mutates.
    async fn ensure_present(
        &self,
        collection: &CollectionRef,
        item: &LibraryItem,
        mode: WriteMode,
    ) -> LibraryClientResult<EnsureOutcome>;
}

/// Errors returned by library clients after their own retries are exhausted.
#[derive(Debug, Clone, Error)]
pub enum LibraryClientError {
    /// The collection does not exist in the account.
    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionRef),

    /// The service rejected or failed the request.
    #[error("service error: {0}")]
    Service(Arc<dyn std::error::Error + Send + Sync>),
}

impl LibraryClientError {
    /// Wraps a service-level error.
    pub fn service(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Service(Arc::new(err))
    }
}
