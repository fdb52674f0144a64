//! Chunk executor backed by the two streaming-service library clients.

use crate::sync::{
    domain::{SyncDirection, SyncReport, UnmatchedItem},
    ports::{
        ChunkExecutor, ChunkOutcome, ChunkRequest, EnsureOutcome, LibraryClient,
        LibraryClientResult, WriteMode,
    },
};
use async_trait::async_trait;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Migrates one slice of a source collection into the destination account.
///
/// The source collection is re-listed on every chunk, narrowed to the
/// task's playlist selection, and the slice `[offset, offset + chunk_size)`
/// is written with `ensure_present`, so a chunk repeated at the same offset
/// writes nothing twice.
pub struct LibraryChunkExecutor<A, B>
where
    A: LibraryClient,
    B: LibraryClient,
{
    service_a: Arc<A>,
    service_b: Arc<B>,
    chunk_size: NonZeroUsize,
}

impl<A, B> LibraryChunkExecutor<A, B>
where
    A: LibraryClient,
    B: LibraryClient,
{
    /// Creates an executor over the two accounts.
    #[must_use]
    pub const fn new(service_a: Arc<A>, service_b: Arc<B>, chunk_size: NonZeroUsize) -> Self {
        Self {
            service_a,
            service_b,
            chunk_size,
        }
    }

    /// Returns the number of source items handled per chunk.
    #[must_use]
    pub const fn chunk_size(&self) -> NonZeroUsize {
        self.chunk_size
    }

    async fn migrate(
        &self,
        source: &dyn LibraryClient,
        destination: &dyn LibraryClient,
        request: &ChunkRequest,
    ) -> LibraryClientResult<ChunkOutcome> {
        let kind = request.sync_type.kind();
        let mut items = source.list(&kind.source_collection()).await?;
        items.retain(|item| request.selects(item));
        let total = items.len();
        let items_total = to_u64(total);
        let start = usize::try_from(request.offset).unwrap_or(usize::MAX).min(total);
        let end = start.saturating_add(self.chunk_size.get()).min(total);

        let mode = WriteMode::for_dry_run(request.dry_run);
        let mut report = SyncReport::default();
        for item in items.get(start..end).unwrap_or_default() {
            report.items_processed += 1;
            let Some(collection) = kind.destination_for(item) else {
                report.items_skipped += 1;
                continue;
            };
            match destination.ensure_present(&collection, item, mode).await? {
                EnsureOutcome::Added => report.items_added += 1,
                EnsureOutcome::AlreadyPresent => report.items_already_present += 1,
                EnsureOutcome::WouldAdd => report.items_would_add += 1,
                EnsureOutcome::Unmatched => report.unmatched.push(UnmatchedItem::from(item)),
            }
        }

        if end < total {
            Ok(ChunkOutcome::Continue {
                new_offset: to_u64(end),
                items_processed_delta: to_u64(end - start),
                items_total,
                report,
            })
        } else {
            Ok(ChunkOutcome::Done {
                items_total,
                report,
            })
        }
    }
}

fn to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[async_trait]
impl<A, B> ChunkExecutor for LibraryChunkExecutor<A, B>
where
    A: LibraryClient,
    B: LibraryClient,
{
    async fn execute_chunk(&self, request: &ChunkRequest) -> ChunkOutcome {
        let (source, destination): (&dyn LibraryClient, &dyn LibraryClient) =
            match request.sync_type.direction() {
                SyncDirection::AToB => (&*self.service_a, &*self.service_b),
                SyncDirection::BToA => (&*self.service_b, &*self.service_a),
            };

        match self.migrate(source, destination, request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(
                    task_id = %request.task_id,
                    offset = request.offset,
                    error = %err,
                    "chunk failed"
                );
                ChunkOutcome::Fatal {
                    error: err.to_string(),
                }
            }
        }
    }
}
