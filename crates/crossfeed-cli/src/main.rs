// SPDX-License-Identifier: GPL-3.0-or-later

mod cli;
mod sources;

use std::io::{self, IsTerminal};
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands, RunArgs};
use crossfeed_application::{
    deliver, ConsoleChannel, DeemixSink, MatchResolver, Pipeline, PipelineError, PromptChannel,
    PromptError,
};
use crossfeed_config::{load as load_config, write_default, DeezerConfig};
use crossfeed_deezer::DeezerClient;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    match Cli::parse().command {
        Commands::Init { config } => init(&config),
        Commands::Run(args) => run(args).await,
    }
}

fn init_tracing(default_level: &str) {
    // stdout carries the prompt protocol
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_writer(io::stderr);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn init(path: &Path) -> Result<()> {
    init_tracing("info");

    if write_default(path)? {
        println!("Wrote default configuration to {}", path.display());
    } else {
        println!("{} already exists, left untouched", path.display());
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = load_config(Some(args.config.as_path()))?;
    init_tracing(&config.telemetry.log_level);
    args.apply(&mut config);

    let limit = NonZeroUsize::new(config.resolution.limit)
        .context("resolution.limit must be at least 1")?;
    let deezer = deezer_client(&config.deezer)?;
    let mut console = ConsoleChannel::stdio();

    let sources = match sources::open_sources(
        &args.unique_sources(),
        &config,
        &mut console,
        io::stdout().is_terminal(),
    )
    .await
    {
        Ok(sources) => sources,
        Err(PromptError::Closed) => bail!("input closed while opening sources, nothing was downloaded"),
        Err(err) => return Err(err.into()),
    };
    if sources.is_empty() {
        bail!("none of the requested sources could be opened");
    }

    let pipeline = Pipeline::new(MatchResolver::new(&deezer, cli::policy(&config.resolution)), limit);
    let report = match pipeline.run(&sources, &mut console).await {
        Ok(report) => report,
        Err(PipelineError::Aborted) => {
            warn!(target: "cli", "operator closed input, aborting without download");
            bail!("run aborted, nothing was downloaded");
        }
        Err(err) => return Err(err.into()),
    };

    for line in report.summary_lines() {
        console.show(&line)?;
    }

    if args.dry_run {
        for identifier in &report.identifiers {
            console.show(identifier)?;
        }
        info!(target: "cli", count = report.identifiers.len(), "dry run, skipping download");
        return Ok(());
    }

    let sink = DeemixSink::from_config(&config.download, deezer.clone());
    deliver(&sink, &report.identifiers, args.bitrate)
        .await
        .context("download failed")?;

    info!(target: "cli", count = report.identifiers.len(), "run complete");
    Ok(())
}

fn deezer_client(config: &DeezerConfig) -> Result<DeezerClient> {
    let mut builder = DeezerClient::builder()
        .rate_limit_interval(Duration::from_millis(config.min_request_interval_ms))
        .timeout(Duration::from_secs(config.timeout_secs));
    if let Some(url) = &config.base_url {
        builder = builder.base_url(url.as_str());
    }
    if let Some(url) = &config.gateway_url {
        builder = builder.site_base_url(url.as_str());
    }
    builder.build().context("building Deezer client")
}
