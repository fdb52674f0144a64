//! Kind and direction of a library migration.

use super::{CollectionRef, LibraryItem, ParseSyncTypeError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of library data being migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    /// Saved tracks.
    Favorites,
    /// Playlists and their tracks.
    Playlists,
}

impl SyncKind {
    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Favorites => "favorites",
            Self::Playlists => "playlists",
        }
    }

    /// Returns the source collection enumerated for this kind.
    #[must_use]
    pub const fn source_collection(self) -> CollectionRef {
        match self {
            Self::Favorites => CollectionRef::Favorites,
            Self::Playlists => CollectionRef::AllPlaylists,
        }
    }

    /// Returns the destination collection an item is written to.
    ///
    /// Playlist items without a playlist name have no destination and yield
    /// `None`.
    #[must_use]
    pub fn destination_for(self, item: &LibraryItem) -> Option<CollectionRef> {
        match self {
            Self::Favorites => Some(CollectionRef::Favorites),
            Self::Playlists => item
                .playlist()
                .map(|name| CollectionRef::Playlist(name.to_owned())),
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which account is the source of the migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Service A is the source and service B the destination.
    AToB,
    /// Service B is the source and service A the destination.
    BToA,
}

impl SyncDirection {
    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AToB => "a_to_b",
            Self::BToA => "b_to_a",
        }
    }
}

/// Kind and direction of a sync task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SyncType {
    kind: SyncKind,
    direction: SyncDirection,
}

impl SyncType {
    /// Creates a sync type.
    #[must_use]
    pub const fn new(kind: SyncKind, direction: SyncDirection) -> Self {
        Self { kind, direction }
    }

    /// Favorites from service A to service B.
    #[must_use]
    pub const fn favorites() -> Self {
        Self::new(SyncKind::Favorites, SyncDirection::AToB)
    }

    /// Playlists from service A to service B.
    #[must_use]
    pub const fn playlists() -> Self {
        Self::new(SyncKind::Playlists, SyncDirection::AToB)
    }

    /// Returns the migrated category.
    #[must_use]
    pub const fn kind(self) -> SyncKind {
        self.kind
    }

    /// Returns the migration direction.
    #[must_use]
    pub const fn direction(self) -> SyncDirection {
        self.direction
    }

    /// Returns the canonical `kind:direction` representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match (self.kind, self.direction) {
            (SyncKind::Favorites, SyncDirection::AToB) => "favorites:a_to_b",
            (SyncKind::Favorites, SyncDirection::BToA) => "favorites:b_to_a",
            (SyncKind::Playlists, SyncDirection::AToB) => "playlists:a_to_b",
            (SyncKind::Playlists, SyncDirection::BToA) => "playlists:b_to_a",
        }
    }
}

impl TryFrom<&str> for SyncType {
    type Error = ParseSyncTypeError;

    /// Parses `kind` or `kind:direction`; a bare kind means `a_to_b`.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        let (kind_part, direction_part) = normalized
            .split_once(':')
            .unwrap_or((normalized.as_str(), "a_to_b"));

        let kind = match kind_part {
            "favorites" => SyncKind::Favorites,
            "playlists" => SyncKind::Playlists,
            _ => return Err(ParseSyncTypeError(value.to_owned())),
        };
        let direction = match direction_part {
            "a_to_b" => SyncDirection::AToB,
            "b_to_a" => SyncDirection::BToA,
            _ => return Err(ParseSyncTypeError(value.to_owned())),
        };

        Ok(Self::new(kind, direction))
    }
}

impl TryFrom<String> for SyncType {
    type Error = ParseSyncTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<SyncType> for String {
    fn from(value: SyncType) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
