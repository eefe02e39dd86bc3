// SPDX-License-Identifier: GPL-3.0-or-later

//! Last.fm library source: every artist the user has scrobbled.

use crate::paging::{paginate, Page};
use crossfeed_config::Secret;
use crossfeed_domain::{NameStream, SourceError, SourceKind, SourceProvider};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer};
use std::num::NonZeroUsize;
use thiserror::Error;
use tracing::{debug, instrument};

const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0";
/// Largest page `library.getArtists` serves.
pub const MAX_PAGE_SIZE: usize = 1000;
/// Error codes meaning the key, session or account is not usable.
const AUTH_ERROR_CODES: [u32; 5] = [4, 9, 10, 14, 26];

/// Struct representing the Last.fm library source.
pub struct LastFmLibrary {
    api_key: Secret,
    username: String,
    client: Client,
    page_size: usize,
    /// Base URL stored without a trailing slash.
    base_url: String,
}

impl LastFmLibrary {
    /// Creates a new Last.fm library source for `username`.
    pub fn new(api_key: Secret, username: impl Into<String>, base_url: Option<String>) -> Self {
        let client = Client::builder()
            .user_agent(concat!("crossfeed/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|error| {
                debug!(
                    ?error,
                    "Failed to build Last.fm HTTP client with custom user agent, falling back to default client"
                );
                Client::new()
            });

        Self {
            api_key,
            username: username.into(),
            client,
            page_size: 200,
            base_url: base_url
                .unwrap_or_else(|| LASTFM_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// Sets how many artists are requested per page, clamped to `1..=MAX_PAGE_SIZE`.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Fetches one page of the user's library, ordered by play count.
    #[instrument(skip(self), fields(user = %self.username))]
    pub async fn fetch_page(&self, page: u32, per_page: usize) -> Result<ArtistPage, LastFmError> {
        let url = format!("{}/", self.base_url);
        debug!(target: "lastfm", page, per_page, "Fetching Last.fm library page");

        let per_page = per_page.to_string();
        let page_param = page.to_string();
        let params = [
            ("method", "library.getartists"),
            ("user", self.username.as_str()),
            ("api_key", self.api_key.expose()),
            ("format", "json"),
            ("page", page_param.as_str()),
            ("limit", per_page.as_str()),
        ];

        let response = self.client.get(&url).query(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let envelope = parse_lastfm_body(status, &body)?;
        let attr = envelope.artists.attr;

        Ok(ArtistPage {
            names: envelope
                .artists
                .artist
                .into_iter()
                .map(|artist| artist.name)
                .collect(),
            page: attr.as_ref().map(|a| a.page).unwrap_or(page),
            total_pages: attr.map(|a| a.total_pages).unwrap_or(page),
        })
    }
}

impl SourceProvider for LastFmLibrary {
    fn kind(&self) -> SourceKind {
        SourceKind::LastFm
    }

    fn names(&self, limit: NonZeroUsize) -> NameStream<'_> {
        // Page numbers are offsets of `per_page`, so it must stay fixed across the walk.
        let per_page = limit.get().min(self.page_size);

        paginate(limit, 1u32, move |page, _remaining| async move {
            let fetched = self
                .fetch_page(page, per_page)
                .await
                .map_err(LastFmError::into_source_error)?;

            let next = (fetched.page < fetched.total_pages).then_some(fetched.page + 1);
            Ok::<_, SourceError>(Page {
                names: fetched.names,
                next,
            })
        })
    }
}

/// One page of artist names from a Last.fm library.
#[derive(Debug, Clone)]
pub struct ArtistPage {
    pub names: Vec<String>,
    pub page: u32,
    pub total_pages: u32,
}

/// Error type returned by the Last.fm source.
#[derive(Debug, Error)]
pub enum LastFmError {
    /// Network or protocol failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Last.fm returned `{"error": code, "message": ...}`.
    #[error("Last.fm API error {code}: {message}")]
    Api { code: u32, message: String },
    /// Non-success status without a Last.fm error body.
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    /// Body did not match the expected shape.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl LastFmError {
    pub fn is_authentication(&self) -> bool {
        match self {
            Self::Api { code, .. } => AUTH_ERROR_CODES.contains(code),
            Self::HttpStatus { status, .. } => {
                *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
            }
            _ => false,
        }
    }

    pub fn into_source_error(self) -> SourceError {
        if self.is_authentication() {
            SourceError::authentication(SourceKind::LastFm, self.to_string())
        } else {
            SourceError::unavailable(SourceKind::LastFm, self.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct LibraryEnvelope {
    artists: LibraryArtists,
}

#[derive(Debug, Deserialize)]
struct LibraryArtists {
    #[serde(default)]
    artist: Vec<LibraryArtist>,
    #[serde(rename = "@attr")]
    attr: Option<PageAttr>,
}

#[derive(Debug, Deserialize)]
struct LibraryArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PageAttr {
    #[serde(deserialize_with = "number_or_string")]
    page: u32,
    #[serde(rename = "totalPages", deserialize_with = "number_or_string")]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: u32,
    #[serde(default)]
    message: String,
}

fn parse_lastfm_body(status: StatusCode, body: &str) -> Result<LibraryEnvelope, LastFmError> {
    // Last.fm sends its error object with either a 200 or a 4xx status.
    if let Ok(api_error) = serde_json::from_str::<ApiErrorBody>(body) {
        return Err(LastFmError::Api {
            code: api_error.error,
            message: api_error.message,
        });
    }

    if !status.is_success() {
        return Err(LastFmError::HttpStatus {
            status,
            body: body.to_string(),
        });
    }

    Ok(serde_json::from_str(body)?)
}

/// Last.fm encodes page counters as JSON strings.
fn number_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
