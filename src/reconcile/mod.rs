use std::fmt;
use std::path::Path;

use colored::Colorize;
use error_stack::ResultExt;
use tracing::{debug, error, info};

use crate::library::extractor::MetadataExtractor;
use crate::library::tags::TagReader;
use crate::spotify::{Catalog, PlaylistId, UserIdentity};


/// Failures that stop a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileError {
    ResolvePlaylist,
    FetchMembership,
    ExtractTracks,
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::ResolvePlaylist => f.write_str("Playlist resolution error"),
            ReconcileError::FetchMembership => f.write_str("Playlist membership fetch error"),
            ReconcileError::ExtractTracks => f.write_str("Local track extraction error"),
        }
    }
}

impl std::error::Error for ReconcileError {}

pub type ReconcileResult<T> = error_stack::Result<T, ReconcileError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub playlist_id: PlaylistId,
    pub playlist_created: bool,
    pub local_tracks: usize,
    pub added: usize,
    pub already_present: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl ReconcileSummary {
    pub fn print(&self, playlist_name: &str) {
        println!(
            "{} {} ({} local tracks)",
            "Synced playlist".green(),
            playlist_name.cyan(),
            self.local_tracks
        );
        println!("  added:           {}", self.added.to_string().green());
        println!("  already present: {}", self.already_present);
        println!("  not found:       {}", self.not_found.to_string().yellow());
        println!("  failed:          {}", self.failed.to_string().red());
    }
}

/// Brings a remote playlist up to date with the audio files of a local
/// directory. Tracks are only ever added, never removed.
pub struct Reconciler<'a, C: Catalog, R: TagReader> {
    catalog: &'a C,
    user: &'a UserIdentity,
    extractor: &'a MetadataExtractor<R>,
    playlist_name: &'a str,
}

impl<'a, C: Catalog, R: TagReader> Reconciler<'a, C, R> {
    pub fn new(
        catalog: &'a C,
        user: &'a UserIdentity,
        extractor: &'a MetadataExtractor<R>,
        playlist_name: &'a str,
    ) -> Self {
        Self {
            catalog,
            user,
            extractor,
            playlist_name,
        }
    }

    pub async fn run(&self, directory: &Path) -> ReconcileResult<ReconcileSummary> {
        let (playlist_id, playlist_created) = self.resolve_playlist().await?;

        // Membership is read once; tracks added by someone else during the
        // run are not seen.
        let existing_track_ids = self
            .catalog
            .list_playlist_track_ids(&playlist_id)
            .await
            .change_context(ReconcileError::FetchMembership)?;

        let records = self
            .extractor
            .extract_metadata(directory)
            .change_context(ReconcileError::ExtractTracks)?;

        let mut summary = ReconcileSummary {
            playlist_id: playlist_id.clone(),
            playlist_created,
            local_tracks: records.len(),
            added: 0,
            already_present: 0,
            not_found: 0,
            failed: 0,
        };

        for record in &records {
            let query = record.search_query();
            let track = match self.catalog.search_top_track(&query).await {
                Ok(Some(track)) => track,
                Ok(None) => {
                    debug!("No match for '{query}'");
                    summary.not_found += 1;
                    continue;
                }
                Err(report) => {
                    error!("Search failed for '{query}': {report:?}");
                    summary.failed += 1;
                    continue;
                }
            };

            if existing_track_ids.contains(&track.id) {
                info!("Track already exists: {} by {}", track.name, track.artist);
                summary.already_present += 1;
                continue;
            }

            info!("Adding track: {} by {}", track.name, track.artist);
            match self
                .catalog
                .add_track_to_playlist(&playlist_id, &track.id)
                .await
            {
                Ok(()) => summary.added += 1,
                Err(report) => {
                    error!(
                        "Failed to add {} by {} to the playlist: {report:?}",
                        track.name, track.artist
                    );
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn resolve_playlist(&self) -> ReconcileResult<(PlaylistId, bool)> {
        let existing = self
            .catalog
            .find_playlist_by_name(self.user, self.playlist_name)
            .await
            .change_context(ReconcileError::ResolvePlaylist)?;
        if let Some(playlist_id) = existing {
            info!("Playlist '{}' already exists", self.playlist_name);
            return Ok((playlist_id, false));
        }

        let playlist_id = self
            .catalog
            .create_playlist(self.user, self.playlist_name, true)
            .await
            .change_context(ReconcileError::ResolvePlaylist)
            .attach_printable_lazy(|| format!("Could not create '{}'", self.playlist_name))?;
        info!("Created new playlist '{}'", self.playlist_name);
        Ok((playlist_id, true))
    }
}
