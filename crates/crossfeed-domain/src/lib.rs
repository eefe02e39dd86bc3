// SPDX-License-Identifier: GPL-3.0-or-later
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// Value Objects
// ============================================================================

/// An artist display name as reported by a library source. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtistName(String);

impl ArtistName {
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidArtistName> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(InvalidArtistName);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a candidate's display name.
    ///
    /// Both sides are NFC-normalized first so precomposed and combining forms agree.
    pub fn matches(&self, display_name: &str) -> bool {
        fold(&self.0) == fold(display_name)
    }
}

fn fold(value: &str) -> String {
    value.nfc().collect::<String>().to_lowercase()
}

impl fmt::Display for ArtistName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ArtistName {
    type Error = InvalidArtistName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArtistName> for String {
    fn from(value: ArtistName) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("artist name must not be blank")]
pub struct InvalidArtistName;

/// One search hit returned by a [`SearchBackend`] for a single query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub display_name: String,
    /// Opaque, stable identifier handed to the download engine.
    pub identifier: String,
    /// Position in the backend's result list, 0 being its best guess.
    pub source_rank: usize,
}

/// Outcome of applying the resolution policy to one artist name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionDecision {
    Skip,
    SelectOne(MatchCandidate),
    SelectMany(Vec<MatchCandidate>),
}

impl ResolutionDecision {
    /// Build a multi-selection, keeping the first occurrence of each identifier.
    pub fn select_many(candidates: impl IntoIterator<Item = MatchCandidate>) -> Self {
        let mut seen = HashSet::new();
        let unique = candidates
            .into_iter()
            .filter(|candidate| seen.insert(candidate.identifier.clone()))
            .collect();
        Self::SelectMany(unique)
    }

    pub fn candidates(&self) -> &[MatchCandidate] {
        match self {
            Self::Skip => &[],
            Self::SelectOne(candidate) => std::slice::from_ref(candidate),
            Self::SelectMany(candidates) => candidates,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    LastFm,
    Spotify,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastFm => "lastfm",
            Self::Spotify => "spotify",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = UnknownSource;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "lastfm" => Ok(Self::LastFm),
            "spotify" => Ok(Self::Spotify),
            other => Err(UnknownSource(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown source '{0}' (expected lastfm or spotify)")]
pub struct UnknownSource(pub String);

/// Audio quality passed through to the download engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bitrate {
    Mp3_128,
    Mp3_320,
    Flac,
}

impl Bitrate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3_128 => "128",
            Self::Mp3_320 => "320",
            Self::Flac => "flac",
        }
    }
}

impl FromStr for Bitrate {
    type Err = UnknownBitrate;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "128" | "mp3_128" => Ok(Self::Mp3_128),
            "320" | "mp3_320" => Ok(Self::Mp3_320),
            "flac" | "9" => Ok(Self::Flac),
            other => Err(UnknownBitrate(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown bitrate '{0}' (expected 128, 320 or flac)")]
pub struct UnknownBitrate(pub String);

// ============================================================================
// Result Accumulation
// ============================================================================

/// Ordered, duplicate-free set of resolved identifiers.
///
/// Insertion order is first-seen order across the whole run; offering an identifier
/// again never moves it.
#[derive(Debug, Clone, Default)]
pub struct ResultAccumulator {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `identifier` if it has not been seen. Returns whether it was appended.
    pub fn add(&mut self, identifier: impl Into<String>) -> bool {
        let identifier = identifier.into();
        if self.seen.contains(&identifier) {
            return false;
        }
        self.seen.insert(identifier.clone());
        self.order.push(identifier);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Snapshot of the resolved identifiers in first-seen order.
    pub fn finalize(&self) -> Vec<String> {
        self.order.clone()
    }
}

// ============================================================================
// Collaborator Contracts
// ============================================================================

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{source_kind} authentication failed: {message}")]
    Authentication {
        source_kind: SourceKind,
        message: String,
    },
    #[error("{source_kind} unavailable: {message}")]
    Unavailable {
        source_kind: SourceKind,
        message: String,
    },
}

impl SourceError {
    pub fn authentication(source_kind: SourceKind, message: impl Into<String>) -> Self {
        Self::Authentication {
            source_kind,
            message: message.into(),
        }
    }

    pub fn unavailable(source_kind: SourceKind, message: impl Into<String>) -> Self {
        Self::Unavailable {
            source_kind,
            message: message.into(),
        }
    }

    pub fn source_kind(&self) -> SourceKind {
        match self {
            Self::Authentication { source_kind, .. } | Self::Unavailable { source_kind, .. } => {
                *source_kind
            }
        }
    }
}

#[derive(Debug, Error)]
#[error("search for '{query}' failed: {message}")]
pub struct SearchError {
    pub query: String,
    pub message: String,
}

impl SearchError {
    pub fn new(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download engine authentication failed: {0}")]
    Authentication(String),
    #[error("could not start download engine: {0}")]
    Spawn(#[from] std::io::Error),
    /// The stored session cookie could not be read or written.
    #[error("could not access ARL file {path}: {source}")]
    ArlFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("download engine failed: {0}")]
    Engine(String),
}

pub type NameStream<'a> = BoxStream<'a, Result<ArtistName, SourceError>>;

/// An external catalog producing artist names.
///
/// `names` performs a fresh fetch every time it is called and yields at most `limit`
/// names. Paging is internal to the provider.
pub trait SourceProvider: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn names(&self, limit: NonZeroUsize) -> NameStream<'_>;
}

/// Free-text artist search, best match first. No hits is an empty list, not an error.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<MatchCandidate>, SearchError>;
}

/// The engine that retrieves the resolved artists.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    async fn login(&self) -> Result<(), DownloadError>;

    async fn download_batch(
        &self,
        identifiers: &[String],
        quality_override: Option<Bitrate>,
    ) -> Result<(), DownloadError>;
}
