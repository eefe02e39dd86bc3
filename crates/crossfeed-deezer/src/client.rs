// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{DeezerError, Result};
use crate::models::{ApiErrorBody, Artist, GatewayResponse, SearchResponse, UserData};
use crate::rate_limiter::RateLimiter;
use async_trait::async_trait;
use crossfeed_domain::{MatchCandidate, SearchBackend, SearchError};
use moka::sync::Cache;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, trace};
use url::Url;

const DEEZER_API_BASE: &str = "https://api.deezer.com";
const DEEZER_SITE_BASE: &str = "https://www.deezer.com";
const DEFAULT_SEARCH_LIMIT: u32 = 25;
const QUOTA_EXCEEDED_CODE: u32 = 4;
const NO_DATA_CODE: u32 = 800;
const USER_AGENT: &str = concat!("crossfeed/", env!("CARGO_PKG_VERSION"));

/// Deezer API client with request pacing and a per-run search cache.
#[derive(Clone)]
pub struct DeezerClient {
    client: Client,
    base_url: String,
    site_base_url: String,
    search_limit: u32,
    rate_limiter: RateLimiter,
    search_cache: Cache<String, Vec<Artist>>,
}

impl DeezerClient {
    /// Create a new Deezer client with default settings.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a client builder for custom configuration.
    pub fn builder() -> DeezerClientBuilder {
        DeezerClientBuilder::default()
    }

    /// Search for artists by name, best match first.
    ///
    /// Identical queries are answered from the cache for the lifetime of the client.
    ///
    /// # Example
    /// ```no_run
    /// # use crossfeed_deezer::DeezerClient;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = DeezerClient::new()?;
    /// let artists = client.search_artists("Daft Punk").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self))]
    pub async fn search_artists(&self, query: &str) -> Result<Vec<Artist>> {
        if let Some(cached) = self.search_cache.get(&query.to_string()) {
            trace!(target: "deezer", "search cache hit");
            return Ok(cached);
        }

        let mut url = Url::parse(&format!("{}/search/artist", self.base_url))
            .map_err(|e| DeezerError::InvalidResponse(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("limit", &self.search_limit.to_string());

        let artists = match self
            .get::<SearchResponse<Artist>>(self.client.get(url.as_str()))
            .await
        {
            Ok(page) => page.data,
            Err(DeezerError::Api { code, .. }) if code == NO_DATA_CODE => Vec::new(),
            Err(err) => return Err(err),
        };

        debug!(target: "deezer", hits = artists.len(), "artist search complete");
        self.search_cache.insert(query.to_string(), artists.clone());
        Ok(artists)
    }

    /// Check that an ARL session cookie belongs to a logged-in account.
    #[instrument(skip_all)]
    pub async fn verify_arl(&self, arl: &str) -> Result<UserData> {
        let mut url = Url::parse(&format!("{}/ajax/gw-light.php", self.site_base_url))
            .map_err(|e| DeezerError::InvalidResponse(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("method", "deezer.getUserData")
            .append_pair("input", "3")
            .append_pair("api_version", "1.0")
            .append_pair("api_token", "");

        let request = self
            .client
            .post(url.as_str())
            .header("Cookie", format!("arl={}", arl.trim()));
        let response: GatewayResponse = self.get(request).await?;

        let user = response.results.user;
        if user.user_id == 0 {
            return Err(DeezerError::InvalidSession);
        }

        debug!(target: "deezer", user_id = user.user_id, "ARL session verified");
        Ok(UserData {
            user_id: user.user_id,
            name: user.blog_name,
        })
    }

    /// Internal method to perform a paced request and decode Deezer's JSON envelope.
    async fn get<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.rate_limiter.acquire().await;

        let response = request.header("User-Agent", USER_AGENT).send().await?;

        let status = response.status();
        debug!(target: "deezer", "response status: {}", status);

        if status == 429 {
            return Err(DeezerError::RateLimitExceeded);
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DeezerError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        trace!(target: "deezer", "response body: {}", body);

        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| DeezerError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        // Deezer reports API failures with a 200 status and an `error` object.
        if let Some(error) = value.get("error").filter(|error| error.is_object()) {
            let error: ApiErrorBody = serde_json::from_value(error.clone())
                .map_err(|e| DeezerError::InvalidResponse(e.to_string()))?;
            if error.code == QUOTA_EXCEEDED_CODE {
                return Err(DeezerError::RateLimitExceeded);
            }
            return Err(DeezerError::Api {
                code: error.code,
                kind: error.kind,
                message: error.message,
            });
        }

        serde_json::from_value(value)
            .map_err(|e| DeezerError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl SearchBackend for DeezerClient {
    async fn search(&self, query: &str) -> std::result::Result<Vec<MatchCandidate>, SearchError> {
        let artists = self
            .search_artists(query)
            .await
            .map_err(|err| SearchError::new(query, err.to_string()))?;

        Ok(artists
            .into_iter()
            .enumerate()
            .map(|(rank, artist)| MatchCandidate {
                identifier: artist.link(),
                display_name: artist.name,
                source_rank: rank,
            })
            .collect())
    }
}

/// Builder for configuring a Deezer client.
#[derive(Debug)]
pub struct DeezerClientBuilder {
    base_url: String,
    site_base_url: String,
    timeout: Duration,
    rate_limit_interval: Duration,
    search_limit: u32,
    cache_capacity: u64,
}

impl Default for DeezerClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEEZER_API_BASE.to_string(),
            site_base_url: DEEZER_SITE_BASE.to_string(),
            timeout: Duration::from_secs(30),
            rate_limit_interval: Duration::from_millis(100),
            search_limit: DEFAULT_SEARCH_LIMIT,
            cache_capacity: 10_000,
        }
    }
}

impl DeezerClientBuilder {
    /// Set a custom API base URL (useful for testing with mock servers).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set a custom site URL hosting the session gateway (useful for testing).
    pub fn site_base_url(mut self, url: impl Into<String>) -> Self {
        self.site_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set request timeout duration.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set rate limit interval between requests.
    pub fn rate_limit_interval(mut self, interval: Duration) -> Self {
        self.rate_limit_interval = interval;
        self
    }

    /// Set how many candidates a single search returns.
    pub fn search_limit(mut self, limit: u32) -> Self {
        self.search_limit = limit.max(1);
        self
    }

    /// Build the Deezer client.
    pub fn build(self) -> Result<DeezerClient> {
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(DeezerClient {
            client,
            base_url: self.base_url,
            site_base_url: self.site_base_url,
            search_limit: self.search_limit,
            rate_limiter: RateLimiter::new(self.rate_limit_interval),
            search_cache: Cache::new(self.cache_capacity),
        })
    }
}
