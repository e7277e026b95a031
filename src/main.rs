use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use comfy_table::Table;
use error_stack::fmt::{Charset, ColorMode};
use error_stack::{Report, ResultExt};
use tracing::info;

use crate::config::{AppConfig, SpotifyCredentials};
use crate::library::extractor::MetadataExtractor;
use crate::reconcile::Reconciler;
use crate::selection::select_directory;
use crate::spotify::auth::SpotifyAuth;

mod config;
mod library;
mod logger;
mod network;
mod reconcile;
mod selection;
mod spotify;

#[derive(Debug)]
pub struct PlaylistSyncError;
impl fmt::Display for PlaylistSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Playlist sync error")
    }
}
impl std::error::Error for PlaylistSyncError {}

pub type PlaylistSyncResult<T> = error_stack::Result<T, PlaylistSyncError>;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Sync a folder of local audio files into a Spotify playlist")]
struct Cli {
    #[command(subcommand)]
    command: PlaylistSyncCommands,
}

#[derive(Subcommand, Debug, PartialEq, Clone)]
enum PlaylistSyncCommands {
    /// Add the local tracks of a folder to a Spotify playlist
    Sync {
        /// Folder with the audio files, a picker opens when omitted
        #[clap(long, short)]
        directory: Option<PathBuf>,
        /// Name of the playlist to create or update
        #[clap(long, short, default_value = AppConfig::DEFAULT_PLAYLIST_NAME)]
        playlist: String,
        /// Where to write the diagnostic log
        #[clap(long, default_value = AppConfig::LOG_FILE)]
        log_file: PathBuf,
    },
    /// Show the title and artist read from each local file
    Scan {
        /// Folder with the audio files, a picker opens when omitted
        #[clap(long, short)]
        directory: Option<PathBuf>,
        /// Where to write the diagnostic log
        #[clap(long, default_value = AppConfig::LOG_FILE)]
        log_file: PathBuf,
    },
    /// Forget the cached Spotify authorization
    Logout,
}

impl PlaylistSyncCommands {
    pub async fn execute(&self) -> PlaylistSyncResult<()> {
        match self {
            PlaylistSyncCommands::Sync {
                directory,
                playlist,
                log_file,
            } => sync(directory.clone(), playlist, log_file).await,
            PlaylistSyncCommands::Scan {
                directory,
                log_file,
            } => scan(directory.clone(), log_file),
            PlaylistSyncCommands::Logout => {
                let removed = SpotifyAuth::logout().change_context(PlaylistSyncError)?;
                if removed {
                    println!("{}", "Spotify authorization removed".green());
                } else {
                    println!("{}", "No cached Spotify authorization found".yellow());
                }
                Ok(())
            }
        }
    }
}

async fn sync(directory: Option<PathBuf>, playlist: &str, log_file: &Path) -> PlaylistSyncResult<()> {
    logger::init(log_file).change_context(PlaylistSyncError)?;

    let directory = select_directory(directory).change_context(PlaylistSyncError)?;
    let credentials = SpotifyCredentials::from_env().change_context(PlaylistSyncError)?;

    network::ensure_reachable(
        AppConfig::SPOTIFY_API_HOST,
        443,
        Duration::from_secs(AppConfig::NETWORK_CHECK_TIMEOUT_SECS),
    )
    .await
    .change_context(PlaylistSyncError)
    .attach(Suggestion("check your internet connection".to_string()))?;

    let session = SpotifyAuth::new(&credentials)
        .change_context(PlaylistSyncError)?
        .authenticate()
        .await
        .change_context(PlaylistSyncError)?;

    info!("Syncing {} into '{playlist}'", directory.display());
    let extractor = MetadataExtractor::new();
    let summary = Reconciler::new(&session, session.user(), &extractor, playlist)
        .run(&directory)
        .await
        .change_context(PlaylistSyncError)?;
    info!(
        "Finished: {} added, {} already present, {} not found, {} failed",
        summary.added, summary.already_present, summary.not_found, summary.failed
    );
    summary.print(playlist);
    Ok(())
}

fn scan(directory: Option<PathBuf>, log_file: &Path) -> PlaylistSyncResult<()> {
    logger::init(log_file).change_context(PlaylistSyncError)?;

    let directory = select_directory(directory).change_context(PlaylistSyncError)?;
    let records = MetadataExtractor::new()
        .extract_metadata(&directory)
        .change_context(PlaylistSyncError)?;
    let mut table = Table::new();
    table.set_header(vec!["#", "Title", "Artist"]);
    for (index, record) in records.iter().enumerate() {
        table.add_row(vec![
            (index + 1).to_string(),
            record.title.clone(),
            record.artist.clone(),
        ]);
    }
    println!("{table}");
    println!("{} tracks in {}", records.len(), directory.display().to_string().cyan());
    Ok(())
}

pub struct Suggestion(String);

impl Suggestion {
    pub fn set_report() {
        Report::set_charset(Charset::Utf8);
        Report::set_color_mode(ColorMode::Color);
        Report::install_debug_hook::<Self>(|Self(value), context| {
            context.push_body(format!("{}: {value}", "suggestion".yellow()))
        });
    }
}

async fn run() -> PlaylistSyncResult<()> {
    let cli = Cli::parse();

    Suggestion::set_report();

    cli.command.execute().await
}

#[tokio::main]
async fn main() -> PlaylistSyncResult<()> {
    run().await
}
