//! In-memory streaming-service account for tests and local runs.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::sync::{
    domain::{CollectionRef, LibraryItem},
    ports::{EnsureOutcome, LibraryClient, LibraryClientError, LibraryClientResult, WriteMode},
};

/// Thread-safe in-memory library account.
///
/// Source collections are seeded with [`InMemoryLibrary::seed`]; playlist
/// items are listed in playlist-name order under
/// [`CollectionRef::AllPlaylists`]. Destination writes are keyed by the
/// item's source key, which makes `ensure_present` idempotent.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLibrary {
    state: Arc<RwLock<LibraryState>>,
}

#[derive(Debug, Default)]
struct LibraryState {
    collections: HashMap<CollectionRef, Vec<LibraryItem>>,
    unmatched_keys: HashSet<String>,
    writes: Vec<(CollectionRef, String)>,
    fail_after_writes: Option<usize>,
    list_failure: Option<String>,
}

/// Failure injected by [`InMemoryLibrary::fail_after_writes`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
struct InjectedFailure(String);

impl InMemoryLibrary {
    /// Creates an empty account.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn write_state(&self) -> LibraryClientResult<std::sync::RwLockWriteGuard<'_, LibraryState>> {
        self.state
            .write()
            .map_err(|err| LibraryClientError::service(InjectedFailure(err.to_string())))
    }

    fn read_state(&self) -> LibraryClientResult<std::sync::RwLockReadGuard<'_, LibraryState>> {
        self.state
            .read()
            .map_err(|err| LibraryClientError::service(InjectedFailure(err.to_string())))
    }

    /// Appends items to a collection.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryClientError::Service`] when the lock is poisoned.
    pub fn seed(
        &self,
        collection: CollectionRef,
        items: impl IntoIterator<Item = LibraryItem>,
    ) -> LibraryClientResult<()> {
        let mut state = self.write_state()?;
        state.collections.entry(collection).or_default().extend(items);
        Ok(())
    }

    /// Removes an item from a collection by source key.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryClientError::Service`] when the lock is poisoned.
    pub fn remove(&self, collection: &CollectionRef, key: &str) -> LibraryClientResult<()> {
        let mut state = self.write_state()?;
        if let Some(items) = state.collections.get_mut(collection) {
            items.retain(|item| item.key() != key);
        }
        Ok(())
    }

    /// Marks a source key as having no equivalent on this service.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryClientError::Service`] when the lock is poisoned.
    pub fn mark_unmatched(&self, key: impl Into<String>) -> LibraryClientResult<()> {
        let mut state = self.write_state()?;
        state.unmatched_keys.insert(key.into());
        Ok(())
    }

    /// Makes every write after the first `writes` successful ones fail.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryClientError::Service`] when the lock is poisoned.
    pub fn fail_after_writes(&self, writes: usize) -> LibraryClientResult<()> {
        let mut state = self.write_state()?;
        state.fail_after_writes = Some(state.writes.len().saturating_add(writes));
        Ok(())
    }

    /// Makes every `list` call fail with `message`.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryClientError::Service`] when the lock is poisoned.
    pub fn fail_listing(&self, message: impl Into<String>) -> LibraryClientResult<()> {
        let mut state = self.write_state()?;
        state.list_failure = Some(message.into());
        Ok(())
    }

    /// Removes injected failures.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryClientError::Service`] when the lock is poisoned.
    pub fn heal(&self) -> LibraryClientResult<()> {
        let mut state = self.write_state()?;
        state.fail_after_writes = None;
        state.list_failure = None;
        Ok(())
    }

    /// Returns every applied write as `(collection, source key)`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryClientError::Service`] when the lock is poisoned.
    pub fn writes(&self) -> LibraryClientResult<Vec<(CollectionRef, String)>> {
        Ok(self.read_state()?.writes.clone())
    }

    /// Returns the items currently held by a collection.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryClientError::Service`] when the lock is poisoned.
    pub fn items(&self, collection: &CollectionRef) -> LibraryClientResult<Vec<LibraryItem>> {
        Ok(self
            .read_state()?
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }
}

fn list_all_playlists(state: &LibraryState) -> Vec<LibraryItem> {
    let mut playlists: Vec<(&String, &Vec<LibraryItem>)> = state
        .collections
        .iter()
        .filter_map(|(collection, items)| match collection {
            CollectionRef::Playlist(name) => Some((name, items)),
            CollectionRef::Favorites | CollectionRef::AllPlaylists => None,
        })
        .collect();
    playlists.sort_by(|left, right| left.0.cmp(right.0));
    playlists
        .into_iter()
        .flat_map(|(name, items)| items.iter().map(|item| item.clone().in_playlist(name.as_str())))
        .collect()
}

#[async_trait]
impl LibraryClient for InMemoryLibrary {
    async fn list(&self, collection: &CollectionRef) -> LibraryClientResult<Vec<LibraryItem>> {
        let state = self.read_state()?;
        if let Some(message) = &state.list_failure {
            return Err(LibraryClientError::service(InjectedFailure(message.clone())));
        }
        match collection {
            CollectionRef::AllPlaylists => Ok(list_all_playlists(&state)),
            CollectionRef::Favorites => Ok(state
                .collections
                .get(collection)
                .cloned()
                .unwrap_or_default()),
            CollectionRef::Playlist(_) => state
                .collections
                .get(collection)
                .cloned()
                .ok_or_else(|| LibraryClientError::CollectionNotFound(collection.clone())),
        }
    }

    async fn ensure_present(
        &self,
        collection: &CollectionRef,
        item: &LibraryItem,
        mode: WriteMode,
    ) -> LibraryClientResult<EnsureOutcome> {
        let mut state = self.write_state()?;
        if state.unmatched_keys.contains(item.key()) {
            return Ok(EnsureOutcome::Unmatched);
        }
        let present = state
            .collections
            .get(collection)
            .is_some_and(|items| items.iter().any(|held| held.key() == item.key()));
        if present {
            return Ok(EnsureOutcome::AlreadyPresent);
        }
        if mode == WriteMode::DryRun {
            return Ok(EnsureOutcome::WouldAdd);
        }
        if state
            .fail_after_writes
            .is_some_and(|limit| state.writes.len() >= limit)
        {
            return Err(LibraryClientError::service(InjectedFailure(format!(
                "write rejected for {}",
                item.key()
            ))));
        }

        let stored = match collection {
            CollectionRef::Playlist(name) => item.clone().in_playlist(name.as_str()),
            CollectionRef::Favorites | CollectionRef::AllPlaylists => item.clone(),
        };
        state
            .collections
            .entry(collection.clone())
            .or_default()
            .push(stored);
        state.writes.push((collection.clone(), item.key().to_owned()));
        Ok(EnsureOutcome::Added)
    }
}
