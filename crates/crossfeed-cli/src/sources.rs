// SPDX-License-Identifier: GPL-3.0-or-later

//! Opens the requested sources, asking the operator for anything the configuration lacks.

use crossfeed_application::{PromptChannel, PromptError};
use crossfeed_config::{AppConfig, LastFmConfig, Secret, SpotifyConfig};
use crossfeed_domain::{SourceError, SourceKind, SourceProvider};
use crossfeed_sources::{LastFmLibrary, SpotifyAuthorizer, SpotifyCredentials, SpotifyFollowedArtists};
use tracing::{debug, error, info};

/// Open every requested source. Sources that fail to open are logged and left out.
///
/// Only a closed or broken prompt is an error. `open_browser` lets the Spotify consent page
/// be launched automatically.
pub async fn open_sources(
    kinds: &[SourceKind],
    config: &AppConfig,
    console: &mut dyn PromptChannel,
    open_browser: bool,
) -> Result<Vec<Box<dyn SourceProvider>>, PromptError> {
    let mut opened: Vec<Box<dyn SourceProvider>> = Vec::with_capacity(kinds.len());

    for kind in kinds {
        let source: Result<Box<dyn SourceProvider>, SourceError> = match kind {
            SourceKind::LastFm => {
                Ok(Box::new(lastfm(&config.lastfm, console)?) as Box<dyn SourceProvider>)
            }
            SourceKind::Spotify => spotify(&config.spotify, console, open_browser)
                .await?
                .map(|source| Box::new(source) as Box<dyn SourceProvider>),
        };

        match source {
            Ok(source) => {
                info!(target: "cli", source = %kind, "source ready");
                opened.push(source);
            }
            Err(err) => {
                error!(target: "cli", source = %kind, error = %err, "could not open source");
                console.show(&format!("Skipping {kind}: {err}"))?;
            }
        }
    }

    Ok(opened)
}

fn lastfm(config: &LastFmConfig, console: &mut dyn PromptChannel) -> Result<LastFmLibrary, PromptError> {
    let api_key = match config.api_key.clone().filter(|key| !key.is_blank()) {
        Some(key) => key,
        None => Secret::new(ask(console, "Last.fm API key: ")?),
    };
    let username = match config.username.clone().filter(|name| !name.trim().is_empty()) {
        Some(name) => name,
        None => ask(console, "Last.fm username: ")?,
    };

    Ok(LastFmLibrary::new(api_key, username, config.base_url.clone()).with_page_size(config.page_size))
}

/// The outer result carries prompt failures, the inner one a source that would not open.
async fn spotify(
    config: &SpotifyConfig,
    console: &mut dyn PromptChannel,
    open_browser: bool,
) -> Result<Result<SpotifyFollowedArtists, SourceError>, PromptError> {
    if let Some(token) = config.access_token.clone().filter(|token| !token.is_blank()) {
        debug!(target: "cli", "using configured Spotify access token");
        return Ok(SpotifyFollowedArtists::with_token(token, config.api_base_url.clone())
            .verified()
            .await);
    }

    let client_id = match config.client_id.clone().filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => ask(console, "Spotify client id: ")?,
    };
    let client_secret = match config.client_secret.clone().filter(|secret| !secret.is_blank()) {
        Some(secret) => secret,
        None => Secret::new(ask(console, "Spotify client secret: ")?),
    };

    let authorizer = SpotifyAuthorizer::new(
        SpotifyCredentials {
            client_id,
            client_secret,
            redirect_uri: config.redirect_uri.clone(),
        },
        config.accounts_base_url.clone(),
    );
    let url = match authorizer.authorize_url() {
        Ok(url) => url,
        Err(err) => return Ok(Err(err.into_source_error())),
    };

    console.show("Authorize crossfeed to read the artists you follow:")?;
    console.show(url.as_str())?;
    if open_browser {
        if let Err(err) = webbrowser::open(url.as_str()) {
            debug!(target: "cli", error = %err, "could not open a browser");
        }
    }
    let pasted = ask(console, "Paste the URL you were redirected to: ")?;

    Ok(SpotifyFollowedArtists::connect(&authorizer, &pasted, config.api_base_url.clone()).await)
}

/// Read a non-blank answer.
fn ask(console: &mut dyn PromptChannel, prompt: &str) -> Result<String, PromptError> {
    loop {
        let answer = console.read_line(prompt)?;
        let answer = answer.trim();
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
    }
}
