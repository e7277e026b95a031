use std::collections::HashSet;

use async_trait::async_trait;
use error_stack::{IntoReport, ResultExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::AppConfig;
use crate::spotify::{
    Catalog, CatalogTrack, PlaylistId, SpotifyError, SpotifyResult, TrackId, UserIdentity,
};

#[derive(Serialize, Deserialize, Clone, Debug)]
struct ApiArtist {
    name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct ApiTrack {
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<ApiArtist>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct PlaylistItem {
    track: Option<ApiTrack>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct ApiPlaylist {
    id: String,
    name: String,
}

/// Spotify's paging object.
#[derive(Serialize, Deserialize, Clone, Debug)]
struct Page<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct SearchResponse {
    tracks: Page<ApiTrack>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct ApiUser {
    id: String,
    display_name: Option<String>,
}

impl From<ApiUser> for UserIdentity {
    fn from(user: ApiUser) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name,
        }
    }
}

impl ApiTrack {
    fn into_catalog_track(self) -> Option<CatalogTrack> {
        let id = self.id?;
        let artist = self
            .artists
            .first()
            .map(|artist| artist.name.clone())
            .unwrap_or_default();
        Some(CatalogTrack {
            id: TrackId(id),
            name: self.name,
            artist,
        })
    }
}

fn first_playlist_named(playlists: &[ApiPlaylist], name: &str) -> Option<PlaylistId> {
    playlists
        .iter()
        .find(|playlist| playlist.name == name)
        .map(|playlist| PlaylistId(playlist.id.clone()))
}

/// Items without a track or without an id (local files added through the
/// desktop app) carry nothing to compare against.
fn track_ids(items: Vec<PlaylistItem>) -> impl Iterator<Item = TrackId> {
    items
        .into_iter()
        .filter_map(|item| item.track.and_then(|track| track.id))
        .map(TrackId)
}

/// An authorized Spotify client bound to the user that granted access.
#[derive(Debug, Clone)]
pub struct SpotifySession {
    client: Client,
    access_token: String,
    user: UserIdentity,
}

impl SpotifySession {
    /// Resolves the current user for `access_token`.
    pub async fn connect(client: Client, access_token: String) -> SpotifyResult<Self> {
        let user: ApiUser = get_json(&client, &access_token, &api_url("/me"), &[]).await?;
        Ok(Self {
            client,
            access_token,
            user: user.into(),
        })
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> SpotifyResult<T> {
        get_json(&self.client, &self.access_token, url, query).await
    }

    async fn post<T: DeserializeOwned>(&self, url: &str, body: serde_json::Value) -> SpotifyResult<T> {
        self.client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .into_report()
            .change_context(SpotifyError)?
            .error_for_status()
            .into_report()
            .change_context(SpotifyError)
            .attach_printable_lazy(|| format!("POST {url}"))?
            .json::<T>()
            .await
            .into_report()
            .change_context(SpotifyError)
    }

    /// Follows `next` links until the last page.
    async fn get_all<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> SpotifyResult<Vec<T>> {
        let first: Page<T> = self.get(url, query).await?;
        let mut items = first.items;
        let mut next_url = first.next;
        while let Some(url) = next_url {
            let page: Page<T> = self.get(&url, &[]).await?;
            items.extend(page.items);
            next_url = page.next;
        }
        Ok(items)
    }
}

fn api_url(path: &str) -> String {
    format!("{}{}", AppConfig::SPOTIFY_API_URL, path)
}

async fn get_json<T: DeserializeOwned>(
    client: &Client,
    access_token: &str,
    url: &str,
    query: &[(&str, &str)],
) -> SpotifyResult<T> {
    client
        .get(url)
        .bearer_auth(access_token)
        .query(query)
        .send()
        .await
        .into_report()
        .change_context(SpotifyError)?
        .error_for_status()
        .into_report()
        .change_context(SpotifyError)
        .attach_printable_lazy(|| format!("GET {url}"))?
        .json::<T>()
        .await
        .into_report()
        .change_context(SpotifyError)
}

#[async_trait]
impl Catalog for SpotifySession {
    async fn find_playlist_by_name(
        &self,
        user: &UserIdentity,
        name: &str,
    ) -> SpotifyResult<Option<PlaylistId>> {
        let url = api_url(&format!("/users/{}/playlists", user.id));
        let mut page: Page<ApiPlaylist> = self.get(&url, &[("limit", "50")]).await?;
        loop {
            if let Some(playlist_id) = first_playlist_named(&page.items, name) {
                return Ok(Some(playlist_id));
            }
            match page.next {
                Some(next_url) => page = self.get(&next_url, &[]).await?,
                None => return Ok(None),
            }
        }
    }

    async fn create_playlist(
        &self,
        user: &UserIdentity,
        name: &str,
        public: bool,
    ) -> SpotifyResult<PlaylistId> {
        let url = api_url(&format!("/users/{}/playlists", user.id));
        let playlist: ApiPlaylist = self
            .post(&url, json!({ "name": name, "public": public }))
            .await?;
        Ok(PlaylistId(playlist.id))
    }

    async fn list_playlist_track_ids(
        &self,
        playlist: &PlaylistId,
    ) -> SpotifyResult<HashSet<TrackId>> {
        let url = api_url(&format!("/playlists/{}/tracks", playlist.0));
        let items: Vec<PlaylistItem> = self
            .get_all(&url, &[("limit", "100"), ("fields", "items(track(id,name)),next")])
            .await?;
        let ids = track_ids(items).collect::<HashSet<_>>();
        debug!("Playlist {playlist} holds {} tracks", ids.len());
        Ok(ids)
    }

    async fn search_top_track(&self, query: &str) -> SpotifyResult<Option<CatalogTrack>> {
        let response: SearchResponse = self
            .get(
                &api_url("/search"),
                &[("q", query), ("type", "track"), ("limit", "1")],
            )
            .await?;
        Ok(response
            .tracks
            .items
            .into_iter()
            .next()
            .and_then(ApiTrack::into_catalog_track))
    }

    async fn add_track_to_playlist(
        &self,
        playlist: &PlaylistId,
        track: &TrackId,
    ) -> SpotifyResult<()> {
        let url = api_url(&format!("/playlists/{}/tracks", playlist.0));
        let _: serde_json::Value = self.post(&url, json!({ "uris": [track.uri()] })).await?;
        Ok(())
    }
}
