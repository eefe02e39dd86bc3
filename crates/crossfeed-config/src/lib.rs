// SPDX-License-Identifier: GPL-3.0-or-later
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const ENV_PREFIX: &str = "CROSSFEED_";

/// A credential value that never appears in logs or debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Accept search matches without asking the operator.
    pub lazy: bool,
    /// Under lazy mode, keep only the first `accuracy` matches. Zero or negative means unbounded.
    pub accuracy: i64,
    /// Maximum number of artists fetched from each source.
    pub limit: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            lazy: false,
            accuracy: -1,
            limit: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastFmConfig {
    pub api_key: Option<Secret>,
    pub username: Option<String>,
    pub base_url: Option<String>,
    pub page_size: usize,
}

impl Default for LastFmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            username: None,
            base_url: None,
            page_size: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<Secret>,
    pub redirect_uri: String,
    /// A pre-issued user token; when present the consent step is skipped.
    pub access_token: Option<Secret>,
    pub api_base_url: Option<String>,
    pub accounts_base_url: Option<String>,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: "https://example.com/callback".to_string(),
            access_token: None,
            api_base_url: None,
            accounts_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeezerConfig {
    pub base_url: Option<String>,
    pub gateway_url: Option<String>,
    pub min_request_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for DeezerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            gateway_url: None,
            // Deezer allows 50 requests per 5 seconds.
            min_request_interval_ms: 100,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    pub program: String,
    pub working_dir: String,
    pub arl: Option<Secret>,
    /// One of `128`, `320` or `flac`; unset keeps the engine's own default.
    pub bitrate: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            program: "deemix".to_string(),
            working_dir: ".".to_string(),
            arl: None,
            bitrate: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub telemetry: TelemetryConfig,
    pub resolution: ResolutionConfig,
    pub lastfm: LastFmConfig,
    pub spotify: SpotifyConfig,
    pub deezer: DeezerConfig,
    pub download: DownloadConfig,
}

/// Load configuration from defaults, optional TOML file, and environment overrides (prefix: CROSSFEED_).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let config: AppConfig = figment(config_path)
        .extract()
        .context("invalid crossfeed configuration")?;
    info!(target: "config", "configuration loaded");
    Ok(config)
}

fn figment(config_path: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Write the default configuration to `path` unless a file already exists there.
///
/// Returns `true` when a new file was created.
pub fn write_default(path: &Path) -> Result<bool> {
    if path.exists() {
        info!(target: "config", path = %path.display(), "configuration file already present");
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }

    let body = toml::to_string_pretty(&AppConfig::default())
        .context("serializing default configuration")?;
    let header = "# crossfeed configuration\n\
                  # Every key may be overridden with CROSSFEED_<SECTION>__<KEY> environment variables.\n\n";
    fs::write(path, format!("{header}{body}"))
        .with_context(|| format!("writing {}", path.display()))?;

    info!(target: "config", path = %path.display(), "default configuration written");
    Ok(true)
}
