use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use colored::Colorize;
use error_stack::{IntoReport, Report, ResultExt};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, RefreshToken,
    Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{AppConfig, SpotifyCredentials};
use crate::spotify::api::SpotifySession;
use crate::Suggestion;

#[derive(Debug)]
pub struct AuthError;

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Authentication error")
    }
}

impl std::error::Error for AuthError {}

pub type AuthResult<T> = error_stack::Result<T, AuthError>;

/// Seconds before the real expiry at which a cached token is treated as
/// expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    fn from_response(response: &BasicTokenResponse, previous_refresh: Option<String>) -> Self {
        Self {
            access_token: response.access_token().secret().to_string(),
            // Spotify may omit the refresh token on refresh; the old one stays valid.
            refresh_token: response
                .refresh_token()
                .map(|token| token.secret().to_string())
                .or(previous_refresh),
            expires_at: Utc::now()
                + chrono::Duration::seconds(
                    response
                        .expires_in()
                        .map(|d| d.as_secs() as i64)
                        .unwrap_or(3600),
                ),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - chrono::Duration::seconds(EXPIRY_MARGIN_SECS) <= now
    }

    pub fn load(path: &Path) -> AuthResult<Self> {
        let token_json = std::fs::read_to_string(path)
            .into_report()
            .change_context(AuthError)
            .attach_printable_lazy(|| format!("No cached token at {}", path.display()))?;
        serde_json::from_str(&token_json)
            .into_report()
            .change_context(AuthError)
            .attach_printable("Cached token is not valid JSON")
    }

    pub fn save(&self, path: &Path) -> AuthResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .into_report()
                .change_context(AuthError)?;
        }
        let token_json = serde_json::to_string_pretty(self)
            .into_report()
            .change_context(AuthError)?;
        std::fs::write(path, token_json)
            .into_report()
            .change_context(AuthError)
            .attach_printable_lazy(|| format!("Failed to write {}", path.display()))
    }
}

pub struct SpotifyAuth {
    client: BasicClient,
    redirect_uri: Url,
    token_path: PathBuf,
}

impl SpotifyAuth {
    pub fn new(credentials: &SpotifyCredentials) -> AuthResult<Self> {
        Ok(Self {
            client: oauth_client(credentials)?,
            redirect_uri: credentials.redirect_uri.clone(),
            token_path: Self::token_path()?,
        })
    }

    pub fn token_path() -> AuthResult<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or(AuthError)
            .into_report()
            .attach_printable("Could not determine the home directory")?;
        Ok(home_dir
            .join(AppConfig::TOKEN_DIR)
            .join(AppConfig::TOKEN_FILE))
    }

    /// Removes the cached token so the next run asks for consent again.
    pub fn logout() -> AuthResult<bool> {
        let token_path = Self::token_path()?;
        if !token_path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&token_path)
            .into_report()
            .change_context(AuthError)?;
        Ok(true)
    }

    /// Returns a session for the user that granted access. A cached token is
    /// reused or refreshed when possible, otherwise the browser consent flow
    /// runs.
    pub async fn authenticate(&self) -> AuthResult<SpotifySession> {
        let token = self.obtain_token().await?;
        token.save(&self.token_path)?;

        let session = SpotifySession::connect(reqwest::Client::new(), token.access_token)
            .await
            .change_context(AuthError)
            .attach(Suggestion(
                "run `playlist-sync logout` and authorize the application again".to_string(),
            ))?;
        info!(
            "Authenticated with Spotify as {} ({})",
            session.user().id,
            session.user().display_name.as_deref().unwrap_or("no display name")
        );
        Ok(session)
    }

    async fn obtain_token(&self) -> AuthResult<StoredToken> {
        let cached = match StoredToken::load(&self.token_path) {
            Ok(token) => Some(token),
            Err(report) => {
                debug!("No usable cached token: {report:?}");
                None
            }
        };

        if let Some(token) = cached {
            if !token.is_expired(Utc::now()) {
                debug!("Using cached Spotify token");
                return Ok(token);
            }
            if let Some(refresh_token) = token.refresh_token {
                match self.refresh(refresh_token).await {
                    Ok(token) => return Ok(token),
                    Err(report) => warn!("Token refresh failed, authorizing again: {report:?}"),
                }
            }
        }

        self.authorize_interactively().await
    }

    async fn refresh(&self, refresh_token: String) -> AuthResult<StoredToken> {
        info!("Spotify access token expired, refreshing");
        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(async_http_client)
            .await
            .map_err(|err| Report::new(AuthError).attach_printable(format!("{err:?}")))?;
        Ok(StoredToken::from_response(&response, Some(refresh_token)))
    }

    async fn authorize_interactively(&self) -> AuthResult<StoredToken> {
        let mut request = self.client.authorize_url(CsrfToken::new_random);
        for scope in AppConfig::SPOTIFY_SCOPES {
            request = request.add_scope(Scope::new(scope.to_string()));
        }
        let (auth_url, csrf_token) = request.url();

        println!("{}", "Opening browser for Spotify authorization...".cyan());
        println!(
            "If the browser doesn't open, visit: {}",
            auth_url.to_string().blue()
        );
        if webbrowser::open(auth_url.as_str()).is_err() {
            println!("{}", "Failed to open browser automatically".yellow());
        }

        let callback = self.wait_for_callback().await?;
        let code = callback.into_code(csrf_token.secret())?;

        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(async_http_client)
            .await
            .map_err(|err| Report::new(AuthError).attach_printable(format!("{err:?}")))
            .attach_printable("Failed to exchange the authorization code")?;
        Ok(StoredToken::from_response(&response, None))
    }

    async fn wait_for_callback(&self) -> AuthResult<Callback> {
        use tiny_http::{Header, Response, Server};

        let host = self.redirect_uri.host_str().unwrap_or("localhost");
        let port = self.redirect_uri.port_or_known_default().unwrap_or(80);
        let server = Server::http(format!("{host}:{port}"))
            .map_err(|err| Report::new(AuthError).attach_printable(err.to_string()))
            .attach_printable_lazy(|| format!("Could not listen on {host}:{port}"))?;
        info!("Waiting for the authorization callback on {}", self.redirect_uri);

        let timeout = Duration::from_secs(AppConfig::OAUTH_CALLBACK_TIMEOUT_SECS);
        let start = std::time::Instant::now();
        loop {
            if start.elapsed() > timeout {
                return Err(Report::new(AuthError)
                    .attach_printable("Timed out waiting for the authorization callback"));
            }

            match server.recv_timeout(Duration::from_millis(100)) {
                Ok(Some(request)) => {
                    let callback = Callback::parse(request.url(), self.redirect_uri.path());
                    let Some(callback) = callback else {
                        let _ = request
                            .respond(Response::from_string("Not Found").with_status_code(404));
                        continue;
                    };
                    let html = if callback.error.is_some() {
                        "<h1>Authorization denied</h1><p>You can close this tab.</p>"
                    } else {
                        "<h1>Authentication successful!</h1><p>You can close this browser tab now.</p>"
                    };
                    let mut response = Response::from_string(html);
                    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"text/html"[..]) {
                        response = response.with_header(header);
                    }
                    let _ = request.respond(response);
                    return Ok(callback);
                }
                Ok(None) => tokio::time::sleep(Duration::from_millis(50)).await,
                Err(err) => {
                    return Err(Report::new(AuthError).attach_printable(err.to_string()));
                }
            }
        }
    }
}

fn oauth_client(credentials: &SpotifyCredentials) -> AuthResult<BasicClient> {
    Ok(BasicClient::new(
        ClientId::new(credentials.client_id.clone()),
        Some(ClientSecret::new(credentials.client_secret.clone())),
        AuthUrl::new(AppConfig::SPOTIFY_AUTH_URL.to_string())
            .into_report()
            .change_context(AuthError)?,
        Some(
            TokenUrl::new(AppConfig::SPOTIFY_TOKEN_URL.to_string())
                .into_report()
                .change_context(AuthError)?,
        ),
    )
    .set_redirect_uri(
        RedirectUrl::from_url(credentials.redirect_uri.clone()),
    ))
}

/// Query parameters Spotify appends to the redirect URI.
#[derive(Debug, Default, PartialEq, Eq)]
struct Callback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl Callback {
    /// Parses a request target such as `/callback?code=..&state=..`. Requests
    /// for any other path yield `None`.
    fn parse(request_url: &str, expected_path: &str) -> Option<Self> {
        let url = Url::parse("http://localhost").ok()?.join(request_url).ok()?;
        if url.path() != expected_path {
            return None;
        }
        let mut callback = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => callback.code = Some(value.into_owned()),
                "state" => callback.state = Some(value.into_owned()),
                "error" => callback.error = Some(value.into_owned()),
                _ => {}
            }
        }
        Some(callback)
    }

    fn into_code(self, expected_state: &str) -> AuthResult<String> {
        if let Some(error) = self.error {
            return Err(Report::new(AuthError)
                .attach_printable(format!("Spotify authorization was denied: {error}")));
        }
        if self.state.as_deref() != Some(expected_state) {
            return Err(Report::new(AuthError)
                .attach_printable("State mismatch in the authorization callback"));
        }
        self.code
            .ok_or(AuthError)
            .into_report()
            .attach_printable("Authorization callback carried no code")
    }
}
