// SPDX-License-Identifier: GPL-3.0-or-later

//! Command-line definitions.

use clap::{Args, Parser, Subcommand};
use crossfeed_application::ResolutionPolicy;
use crossfeed_config::{AppConfig, ResolutionConfig};
use crossfeed_domain::{Bitrate, SourceKind};
use std::num::NonZeroUsize;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_FILE: &str = "crossfeed.toml";

/// Queue Deezer downloads for the artists in your Last.fm library or Spotify follow list.
#[derive(Parser, Debug)]
#[command(name = "crossfeed", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve artists from the given sources and download them
    Run(RunArgs),
    /// Write a default configuration file
    Init {
        /// Where to write the file
        #[arg(long, env = "CROSSFEED_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Sources to read artists from: lastfm, spotify
    #[arg(required = true, num_args = 1..)]
    pub sources: Vec<SourceKind>,

    /// Accept the top matches instead of asking
    #[arg(long)]
    pub lazy: bool,

    /// With --lazy, how many matches to take per artist (zero or negative takes all)
    #[arg(long, allow_negative_numbers = true)]
    pub lazy_accuracy: Option<i64>,

    /// Maximum number of artists read from each source
    #[arg(long)]
    pub limit: Option<NonZeroUsize>,

    /// Download quality: 128, 320 or flac
    #[arg(long)]
    pub bitrate: Option<Bitrate>,

    /// Configuration file; missing files are ignored
    #[arg(long, env = "CROSSFEED_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Resolve and print the artist links without downloading
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    /// Flags win over the configuration file and environment.
    pub fn apply(&self, config: &mut AppConfig) {
        if self.lazy {
            config.resolution.lazy = true;
        }
        if let Some(accuracy) = self.lazy_accuracy {
            config.resolution.accuracy = accuracy;
        }
        if let Some(limit) = self.limit {
            config.resolution.limit = limit.get();
        }
    }

    /// Requested sources in the order given, each once.
    pub fn unique_sources(&self) -> Vec<SourceKind> {
        let mut unique = Vec::with_capacity(self.sources.len());
        for kind in &self.sources {
            if !unique.contains(kind) {
                unique.push(*kind);
            }
        }
        unique
    }
}

pub fn policy(resolution: &ResolutionConfig) -> ResolutionPolicy {
    if resolution.lazy {
        ResolutionPolicy::lazy(resolution.accuracy)
    } else {
        ResolutionPolicy::Interactive
    }
}
