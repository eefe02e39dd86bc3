// SPDX-License-Identifier: GPL-3.0-or-later

//! Download sink driving the deemix command-line client.

use async_trait::async_trait;
use crossfeed_config::{DownloadConfig, Secret};
use crossfeed_deezer::{DeezerClient, DeezerError};
use crossfeed_domain::{Bitrate, DownloadError, DownloadSink};
use std::io;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Where deemix keeps its session cookie when run with `--portable`.
const ARL_FILE: &str = "config/.arl";

pub struct DeemixSink {
    program: String,
    working_dir: PathBuf,
    arl: Option<Secret>,
    default_bitrate: Option<Bitrate>,
    deezer: DeezerClient,
}

impl DeemixSink {
    pub fn new(
        program: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        arl: Option<Secret>,
        deezer: DeezerClient,
    ) -> Self {
        Self {
            program: program.into(),
            working_dir: working_dir.into(),
            arl: arl.filter(|arl| !arl.is_blank()),
            default_bitrate: None,
            deezer,
        }
    }

    /// Build from the `[download]` section. An unparseable bitrate is ignored with a warning.
    pub fn from_config(config: &DownloadConfig, deezer: DeezerClient) -> Self {
        let default_bitrate = config.bitrate.as_deref().and_then(|raw| match raw.parse() {
            Ok(bitrate) => Some(bitrate),
            Err(err) => {
                warn!(target: "deemix", error = %err, "ignoring configured bitrate");
                None
            }
        });

        Self {
            default_bitrate,
            ..Self::new(
                config.program.clone(),
                config.working_dir.clone(),
                config.arl.clone(),
                deezer,
            )
        }
    }

    fn arl_path(&self) -> PathBuf {
        self.working_dir.join(ARL_FILE)
    }

    /// Configured ARL first, then the one deemix saved on a previous run.
    async fn session_cookie(&self) -> Result<Secret, DownloadError> {
        if let Some(arl) = &self.arl {
            return Ok(arl.clone());
        }

        let path = self.arl_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) if !contents.trim().is_empty() => Ok(Secret::new(contents.trim())),
            Ok(_) => Err(missing_arl(&path)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(missing_arl(&path)),
            Err(err) => Err(arl_file_error(&path, err)),
        }
    }

    /// Save the configured ARL where deemix looks for it, unless one is already there.
    async fn persist_arl(&self, arl: &Secret) -> Result<(), DownloadError> {
        let path = self.arl_path();
        let file_error = |err| arl_file_error(&path, err);
        if tokio::fs::try_exists(&path).await.map_err(file_error)? {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(file_error)?;
        }
        tokio::fs::write(&path, arl.expose())
            .await
            .map_err(file_error)?;
        debug!(target: "deemix", path = %path.display(), "stored session cookie");
        Ok(())
    }
}

fn missing_arl(path: &Path) -> DownloadError {
    DownloadError::Authentication(format!(
        "no ARL configured and none found at {}",
        path.display()
    ))
}

fn arl_file_error(path: &Path, source: io::Error) -> DownloadError {
    DownloadError::ArlFile {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl DownloadSink for DeemixSink {
    #[instrument(skip(self))]
    async fn login(&self) -> Result<(), DownloadError> {
        let arl = self.session_cookie().await?;

        let user = self.deezer.verify_arl(arl.expose()).await.map_err(|err| match err {
            DeezerError::InvalidSession => {
                DownloadError::Authentication("ARL is not logged in".to_string())
            }
            other => DownloadError::Engine(format!("could not verify ARL: {other}")),
        })?;

        if self.arl.is_some() {
            self.persist_arl(&arl).await?;
        }

        info!(
            target: "deemix",
            user_id = user.user_id,
            user = user.name.as_deref().unwrap_or("unknown"),
            "logged in to Deezer"
        );
        Ok(())
    }

    #[instrument(skip(self, identifiers), fields(count = identifiers.len()))]
    async fn download_batch(
        &self,
        identifiers: &[String],
        quality_override: Option<Bitrate>,
    ) -> Result<(), DownloadError> {
        let mut command = Command::new(&self.program);
        command.current_dir(&self.working_dir).arg("--portable");
        if let Some(bitrate) = quality_override.or(self.default_bitrate) {
            command.arg("-b").arg(bitrate.as_str());
        }
        command.args(identifiers);

        info!(target: "deemix", program = %self.program, "running download engine");
        let status = command.status().await?;
        if !status.success() {
            return Err(DownloadError::Engine(format!(
                "{} exited with {status}",
                self.program
            )));
        }

        info!(target: "deemix", "download engine finished");
        Ok(())
    }
}
