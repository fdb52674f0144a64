//! Library value objects exchanged with streaming-service clients.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a collection within one streaming-service account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum CollectionRef {
    /// The account's saved tracks.
    Favorites,
    /// Every playlist track in the account, flattened in playlist order.
    AllPlaylists,
    /// A single playlist addressed by name.
    Playlist(String),
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Favorites => f.write_str("favorites"),
            Self::AllPlaylists => f.write_str("playlists"),
            Self::Playlist(name) => write!(f, "playlist:{name}"),
        }
    }
}

/// A track as enumerated from a source collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryItem {
    key: String,
    title: String,
    artist: String,
    album: Option<String>,
    isrc: Option<String>,
    playlist: Option<String>,
}

impl LibraryItem {
    /// Creates an item with its stable source key and display fields.
    #[must_use]
    pub fn new(key: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            artist: artist.into(),
            album: None,
            isrc: None,
            playlist: None,
        }
    }

    /// Sets the album name.
    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    /// Sets the International Standard Recording Code.
    #[must_use]
    pub fn with_isrc(mut self, isrc: impl Into<String>) -> Self {
        self.isrc = Some(isrc.into());
        self
    }

    /// Sets the playlist the item was enumerated from.
    #[must_use]
    pub fn in_playlist(mut self, playlist: impl Into<String>) -> Self {
        self.playlist = Some(playlist.into());
        self
    }

    /// Returns the stable source key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the track title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the artist name.
    #[must_use]
    pub fn artist(&self) -> &str {
        &self.artist
    }

    /// Returns the album name, if known.
    #[must_use]
    pub fn album(&self) -> Option<&str> {
        self.album.as_deref()
    }

    /// Returns the ISRC, if known.
    #[must_use]
    pub fn isrc(&self) -> Option<&str> {
        self.isrc.as_deref()
    }

    /// Returns the source playlist name for playlist items.
    #[must_use]
    pub fn playlist(&self) -> Option<&str> {
        self.playlist.as_deref()
    }
}

/// Summary of an item the destination service could not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedItem {
    /// Stable source key.
    pub key: String,
    /// Track title.
    pub title: String,
    /// Artist name.
    pub artist: String,
    /// Album name, if known.
    pub album: Option<String>,
    /// Source playlist, for playlist migrations.
    pub playlist: Option<String>,
}

impl From<&LibraryItem> for UnmatchedItem {
    fn from(item: &LibraryItem) -> Self {
        Self {
            key: item.key.clone(),
            title: item.title.clone(),
            artist: item.artist.clone(),
            album: item.album.clone(),
            playlist: item.playlist.clone(),
        }
    }
}
