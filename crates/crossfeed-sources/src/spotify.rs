// SPDX-License-Identifier: GPL-3.0-or-later

//! Spotify follow-list source.
//!
//! Reading the follow list needs a user token, obtained once through the authorization-code
//! flow before the source is built:
//! 1. [`SpotifyAuthorizer::authorize_url`] produces the consent page URL
//! 2. the operator approves and pastes back the redirected URL (or just the code)
//! 3. [`SpotifyFollowedArtists::connect`] exchanges the code and verifies the token

use crate::paging::{paginate, Page};
use crossfeed_config::Secret;
use crossfeed_domain::{NameStream, SourceError, SourceKind, SourceProvider};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::num::NonZeroUsize;
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";
const SPOTIFY_ACCOUNTS_BASE: &str = "https://accounts.spotify.com";
/// Largest page `/me/following` serves.
pub const MAX_PAGE_SIZE: usize = 50;
const SCOPE: &str = "user-follow-read";

/// Application credentials registered with Spotify.
#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: Secret,
    pub redirect_uri: String,
}

/// Drives the authorization-code consent step.
pub struct SpotifyAuthorizer {
    client: Client,
    credentials: SpotifyCredentials,
    accounts_base_url: String,
    state: String,
}

impl SpotifyAuthorizer {
    pub fn new(credentials: SpotifyCredentials, accounts_base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            credentials,
            accounts_base_url: accounts_base_url
                .unwrap_or_else(|| SPOTIFY_ACCOUNTS_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            state: Uuid::new_v4().simple().to_string(),
        }
    }

    /// The consent page the operator has to open.
    pub fn authorize_url(&self) -> Result<Url, SpotifyError> {
        let mut url = Url::parse(&format!("{}/authorize", self.accounts_base_url))
            .map_err(|e| SpotifyError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.credentials.redirect_uri)
            .append_pair("scope", SCOPE)
            .append_pair("state", &self.state);
        Ok(url)
    }

    /// Pull the authorization code out of whatever the operator pasted.
    ///
    /// Accepts the full redirect URL (state is checked) or the bare code.
    pub fn extract_code(&self, pasted: &str) -> Result<String, SpotifyError> {
        let pasted = pasted.trim();
        if pasted.is_empty() {
            return Err(SpotifyError::ConsentDenied("no code provided".to_string()));
        }

        let Ok(url) = Url::parse(pasted) else {
            return Ok(pasted.to_string());
        };

        let mut code = None;
        let mut state = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => return Err(SpotifyError::ConsentDenied(value.into_owned())),
                _ => {}
            }
        }

        if state.as_deref() != Some(self.state.as_str()) {
            return Err(SpotifyError::StateMismatch);
        }

        code.ok_or_else(|| SpotifyError::ConsentDenied("redirect carried no code".to_string()))
    }

    /// Exchange an authorization code for a user access token.
    #[instrument(skip_all)]
    pub async fn exchange_code(&self, code: &str) -> Result<Secret, SpotifyError> {
        let url = format!("{}/api/token", self.accounts_base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.credentials.client_id,
                Some(self.credentials.client_secret.expose()),
            )
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let reason = serde_json::from_str::<TokenError>(&body)
                .map(|e| e.error_description.unwrap_or(e.error))
                .unwrap_or(body);
            return Err(SpotifyError::Authorization(reason));
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        debug!(target: "spotify", expires_in = token.expires_in, "access token issued");
        Ok(Secret::new(token.access_token))
    }
}

/// Struct representing the Spotify followed-artists source.
pub struct SpotifyFollowedArtists {
    token: Secret,
    client: Client,
    /// Base URL stored without a trailing slash.
    api_base_url: String,
}

impl SpotifyFollowedArtists {
    /// Build from an already issued user token. No request is made.
    pub fn with_token(token: Secret, api_base_url: Option<String>) -> Self {
        Self {
            token,
            client: Client::new(),
            api_base_url: api_base_url
                .unwrap_or_else(|| SPOTIFY_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// Complete the consent step and return a verified source.
    pub async fn connect(
        authorizer: &SpotifyAuthorizer,
        pasted_redirect: &str,
        api_base_url: Option<String>,
    ) -> Result<Self, SourceError> {
        let code = authorizer
            .extract_code(pasted_redirect)
            .map_err(SpotifyError::into_source_error)?;
        let token = authorizer
            .exchange_code(&code)
            .await
            .map_err(SpotifyError::into_source_error)?;

        Self::with_token(token, api_base_url).verified().await
    }

    /// Check the token against the current-user endpoint so bad credentials fail early.
    pub async fn verified(self) -> Result<Self, SourceError> {
        let url = format!("{}/me", self.api_base_url);
        let profile: UserProfile = self
            .get_json(&url, &[])
            .await
            .map_err(SpotifyError::into_source_error)?;
        info!(
            target: "spotify",
            user = profile.display_name.as_deref().unwrap_or(profile.id.as_str()),
            "authorized"
        );
        Ok(self)
    }

    /// Fetch one page of followed artists, continuing after the artist id `after`.
    #[instrument(skip(self))]
    pub async fn fetch_page(
        &self,
        after: Option<&str>,
        per_page: usize,
    ) -> Result<FollowedPage, SpotifyError> {
        let url = format!("{}/me/following", self.api_base_url);
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE).to_string();

        let mut query = vec![("type", "artist"), ("limit", per_page.as_str())];
        if let Some(after) = after {
            query.push(("after", after));
        }

        let body: FollowingEnvelope = self.get_json(&url, &query).await?;
        let artists = body.artists;

        // `next` is null on the last page even when a cursor is present.
        let after = artists
            .next
            .as_ref()
            .and(artists.cursors.and_then(|c| c.after));

        Ok(FollowedPage {
            names: artists.items.into_iter().map(|artist| artist.name).collect(),
            after,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SpotifyError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(self.token.expose())
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SpotifyError::HttpStatus { status, body });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

impl SourceProvider for SpotifyFollowedArtists {
    fn kind(&self) -> SourceKind {
        SourceKind::Spotify
    }

    fn names(&self, limit: NonZeroUsize) -> NameStream<'_> {
        paginate(limit, None::<String>, move |after, remaining| async move {
            let fetched = self
                .fetch_page(after.as_deref(), remaining.min(MAX_PAGE_SIZE))
                .await
                .map_err(SpotifyError::into_source_error)?;

            Ok::<_, SourceError>(Page {
                names: fetched.names,
                next: fetched.after.map(Some),
            })
        })
    }
}

/// One page of the follow list.
#[derive(Debug, Clone)]
pub struct FollowedPage {
    pub names: Vec<String>,
    /// Cursor for the next page, `None` on the last one.
    pub after: Option<String>,
}

/// Error type returned by the Spotify source.
#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("token exchange rejected: {0}")]
    Authorization(String),
    #[error("consent not granted: {0}")]
    ConsentDenied(String),
    #[error("redirect state does not match this authorization request")]
    StateMismatch,
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl SpotifyError {
    pub fn is_authentication(&self) -> bool {
        match self {
            Self::Authorization(_) | Self::ConsentDenied(_) | Self::StateMismatch => true,
            Self::HttpStatus { status, .. } => {
                *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
            }
            _ => false,
        }
    }

    pub fn into_source_error(self) -> SourceError {
        if self.is_authentication() {
            SourceError::authentication(SourceKind::Spotify, self.to_string())
        } else {
            SourceError::unavailable(SourceKind::Spotify, self.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FollowingEnvelope {
    artists: FollowingArtists,
}

#[derive(Debug, Deserialize)]
struct FollowingArtists {
    #[serde(default)]
    items: Vec<FollowedArtist>,
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    cursors: Option<Cursors>,
}

#[derive(Debug, Deserialize)]
struct FollowedArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Cursors {
    #[serde(default)]
    after: Option<String>,
}
