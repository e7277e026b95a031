use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod api;
pub mod auth;

#[derive(Debug)]
pub struct SpotifyError;

impl fmt::Display for SpotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Spotify error")
    }
}

impl std::error::Error for SpotifyError {}

pub type SpotifyResult<T> = error_stack::Result<T, SpotifyError>;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn uri(&self) -> String {
        format!("spotify:track:{}", self.0)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PlaylistId(pub String);

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
    pub display_name: Option<String>,
}

/// Top search hit for a local track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogTrack {
    pub id: TrackId,
    pub name: String,
    pub artist: String,
}

/// Operations the playlist reconciler needs from the remote catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// First playlist of `user` whose name is exactly `name`.
    async fn find_playlist_by_name(
        &self,
        user: &UserIdentity,
        name: &str,
    ) -> SpotifyResult<Option<PlaylistId>>;

    async fn create_playlist(
        &self,
        user: &UserIdentity,
        name: &str,
        public: bool,
    ) -> SpotifyResult<PlaylistId>;

    async fn list_playlist_track_ids(&self, playlist: &PlaylistId)
        -> SpotifyResult<HashSet<TrackId>>;

    /// Top ranked track for a free text query, `None` when nothing matches.
    async fn search_top_track(&self, query: &str) -> SpotifyResult<Option<CatalogTrack>>;

    async fn add_track_to_playlist(
        &self,
        playlist: &PlaylistId,
        track: &TrackId,
    ) -> SpotifyResult<()>;
}
