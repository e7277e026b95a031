use std::{env, fmt};

use error_stack::{IntoReport, Report, ResultExt};
use url::Url;

use crate::Suggestion;

#[derive(Debug)]
pub struct ConfigError;
impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Configuration error")
    }
}
impl std::error::Error for ConfigError {}

pub type ConfigResult<T> = error_stack::Result<T, ConfigError>;

/// `AppConfig` holds static configuration values for the application.
pub struct AppConfig;

impl AppConfig {
    pub const SPOTIFY_AUTH_URL: &'static str = "https://accounts.spotify.com/authorize";
    pub const SPOTIFY_TOKEN_URL: &'static str = "https://accounts.spotify.com/api/token";
    pub const SPOTIFY_API_URL: &'static str = "https://api.spotify.com/v1";
    /// Host checked for reachability before any remote call.
    pub const SPOTIFY_API_HOST: &'static str = "api.spotify.com";
    pub const SPOTIFY_SCOPES: [&'static str; 2] = ["playlist-modify-public", "playlist-read-private"];
    pub const OAUTH_CALLBACK_TIMEOUT_SECS: u64 = 300;
    pub const NETWORK_CHECK_TIMEOUT_SECS: u64 = 5;
    pub const DEFAULT_PLAYLIST_NAME: &'static str = "Local Tracks";
    pub const AUDIO_EXTENSIONS: [&'static str; 3] = ["mp3", "m4a", "flac"];
    pub const LOG_FILE: &'static str = "app.log";
    pub const TOKEN_DIR: &'static str = ".playlist-sync";
    pub const TOKEN_FILE: &'static str = "spotify_token.json";
}

const CLIENT_ID_VAR: &str = "SPOTIFY_CLIENT_ID";
const CLIENT_SECRET_VAR: &str = "SPOTIFY_CLIENT_SECRET";
const REDIRECT_URI_VAR: &str = "SPOTIFY_REDIRECT_URI";

/// Credentials of the Spotify application, read from the environment
/// (or a `.env` file in the working directory).
#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Url,
}

impl SpotifyCredentials {
    pub fn from_env() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the credentials from any key lookup. Every missing variable is
    /// reported at once so the user can fix the `.env` file in one go.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let client_id = read(CLIENT_ID_VAR);
        let client_secret = read(CLIENT_SECRET_VAR);
        let redirect_uri = read(REDIRECT_URI_VAR);

        let missing = [
            (CLIENT_ID_VAR, client_id.is_none()),
            (CLIENT_SECRET_VAR, client_secret.is_none()),
            (REDIRECT_URI_VAR, redirect_uri.is_none()),
        ]
        .iter()
        .filter(|(_, absent)| *absent)
        .map(|(key, _)| *key)
        .collect::<Vec<_>>();

        match (client_id, client_secret, redirect_uri) {
            (Some(client_id), Some(client_secret), Some(redirect_uri)) => Ok(Self {
                client_id,
                client_secret,
                redirect_uri: parse_redirect_uri(&redirect_uri)?,
            }),
            _ => Err(Report::new(ConfigError)
                .attach_printable(format!(
                    "Missing environment variables: {}",
                    missing.join(", ")
                ))
                .attach(Suggestion(format!(
                    "set {} in your environment or in a .env file",
                    missing.join(", ")
                )))),
        }
    }
}

/// The redirect URI must point to a local host and port where the OAuth
/// callback server can listen.
pub fn parse_redirect_uri(raw: &str) -> ConfigResult<Url> {
    let url = Url::parse(raw)
        .into_report()
        .change_context(ConfigError)
        .attach_printable_lazy(|| format!("{REDIRECT_URI_VAR} is not a valid url: {raw}"))?;
    if url.host_str().is_none() || url.port_or_known_default().is_none() {
        return Err(Report::new(ConfigError).attach_printable(format!(
            "{REDIRECT_URI_VAR} must include a host and a port: {raw}"
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_credentials_from_complete_environment() {
        let credentials = SpotifyCredentials::from_lookup(lookup_from(&[
            (CLIENT_ID_VAR, "id"),
            (CLIENT_SECRET_VAR, "secret"),
            (REDIRECT_URI_VAR, "http://localhost:8888/callback"),
        ]))
        .unwrap();
        assert_eq!(credentials.client_id, "id");
        assert_eq!(credentials.client_secret, "secret");
        assert_eq!(credentials.redirect_uri.port(), Some(8888));
        assert_eq!(credentials.redirect_uri.path(), "/callback");
    }

    #[test]
    fn test_missing_variables_are_all_reported() {
        let report = SpotifyCredentials::from_lookup(lookup_from(&[(CLIENT_ID_VAR, "id")]))
            .unwrap_err();
        let message = format!("{report:?}");
        assert!(message.contains(CLIENT_SECRET_VAR));
        assert!(message.contains(REDIRECT_URI_VAR));
        assert!(!message.contains(&format!("variables: {CLIENT_ID_VAR}")));
    }

    #[test]
    fn test_blank_variable_counts_as_missing() {
        let result = SpotifyCredentials::from_lookup(lookup_from(&[
            (CLIENT_ID_VAR, "id"),
            (CLIENT_SECRET_VAR, "   "),
            (REDIRECT_URI_VAR, "http://localhost:8888/callback"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_redirect_uri_validation() {
        assert!(parse_redirect_uri("http://127.0.0.1:8888/callback").is_ok());
        assert!(parse_redirect_uri("not a url").is_err());
        assert!(parse_redirect_uri("mailto:someone@example.com").is_err());
    }
}
