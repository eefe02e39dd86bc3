// SPDX-License-Identifier: GPL-3.0-or-later

//! Drains sources one at a time and resolves every name into the accumulator.

use crate::prompt::{PromptChannel, PromptError};
use crate::resolver::{MatchResolver, Resolution, ResolveError};
use crossfeed_domain::{
    Bitrate, DownloadError, DownloadSink, ResultAccumulator, SourceError, SourceKind,
    SourceProvider,
};
use futures_util::StreamExt;
use std::num::NonZeroUsize;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The operator closed the prompt; nothing is downloaded.
    #[error("run aborted by operator")]
    Aborted,
    #[error(transparent)]
    Prompt(PromptError),
}

impl From<PromptError> for PipelineError {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::Closed => Self::Aborted,
            other => Self::Prompt(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source_kind: SourceKind,
    pub error: String,
    /// Whether the failure was a credential problem rather than an outage.
    pub authentication: bool,
}

/// What a run did, in the order it happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Resolved identifiers, deduplicated, in first-seen order.
    pub identifiers: Vec<String>,
    pub names_seen: usize,
    pub names_resolved: usize,
    pub skipped: Vec<String>,
    pub no_match: Vec<String>,
    pub failed_queries: Vec<QueryFailure>,
    pub failed_sources: Vec<SourceFailure>,
}

impl RunReport {
    /// One-paragraph summary for the operator.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "{} names read, {} resolved, {} unique artists queued",
            self.names_seen,
            self.names_resolved,
            self.identifiers.len()
        )];

        if !self.skipped.is_empty() {
            lines.push(format!("skipped: {}", self.skipped.join(", ")));
        }
        if !self.no_match.is_empty() {
            lines.push(format!("no match: {}", self.no_match.join(", ")));
        }
        for failure in &self.failed_queries {
            lines.push(format!("search failed for {}: {}", failure.name, failure.error));
        }
        for failure in &self.failed_sources {
            lines.push(format!("source {} failed: {}", failure.source_kind, failure.error));
        }
        lines
    }
}

pub struct Pipeline<'a> {
    resolver: MatchResolver<'a>,
    limit: NonZeroUsize,
}

impl<'a> Pipeline<'a> {
    pub fn new(resolver: MatchResolver<'a>, limit: NonZeroUsize) -> Self {
        Self { resolver, limit }
    }

    /// Resolve every name from every source, in source order then name order.
    ///
    /// Source and per-query failures are recorded and the run continues. Only the operator
    /// closing the prompt ends it early.
    pub async fn run(
        &self,
        sources: &[Box<dyn SourceProvider>],
        prompt: &mut dyn PromptChannel,
    ) -> Result<RunReport, PipelineError> {
        let mut accumulator = ResultAccumulator::new();
        let mut report = RunReport::default();

        for source in sources {
            let kind = source.kind();
            info!(target: "pipeline", source = %kind, limit = self.limit.get(), "reading source");

            let mut names = source.names(self.limit);
            let mut read = 0usize;
            while let Some(item) = names.next().await {
                let name = match item {
                    Ok(name) => name,
                    Err(err) => {
                        record_source_failure(&mut report, err);
                        break;
                    }
                };
                read += 1;
                report.names_seen += 1;

                match self.resolver.resolve(&name, prompt).await {
                    Ok(Resolution::NoMatch) => {
                        warn!(target: "pipeline", name = %name, "no match");
                        report.no_match.push(name.to_string());
                    }
                    Ok(Resolution::Decided(decision)) if decision.candidates().is_empty() => {
                        // explicit skip, or multi-select finished with nothing picked
                        info!(target: "pipeline", name = %name, "skipped by operator");
                        report.skipped.push(name.to_string());
                    }
                    Ok(Resolution::Decided(decision)) => {
                        let added = decision
                            .candidates()
                            .iter()
                            .filter(|c| accumulator.add(c.identifier.as_str()))
                            .count();
                        report.names_resolved += 1;
                        info!(target: "pipeline", name = %name, added, total = accumulator.len(), "resolved");
                    }
                    Err(ResolveError::Search(err)) => {
                        warn!(target: "pipeline", name = %name, error = %err, "search failed, continuing");
                        report.failed_queries.push(QueryFailure {
                            name: name.to_string(),
                            error: err.to_string(),
                        });
                    }
                    Err(ResolveError::Prompt(err)) => return Err(err.into()),
                }
            }

            info!(target: "pipeline", source = %kind, read, "source done");
        }

        report.identifiers = accumulator.finalize();
        Ok(report)
    }
}

fn record_source_failure(report: &mut RunReport, err: SourceError) {
    let authentication = matches!(err, SourceError::Authentication { .. });
    error!(target: "pipeline", source = %err.source_kind(), error = %err, "source failed, moving on");
    report.failed_sources.push(SourceFailure {
        source_kind: err.source_kind(),
        error: err.to_string(),
        authentication,
    });
}

/// Log in once and hand the whole resolved set to the sink.
///
/// An empty set makes no sink calls.
pub async fn deliver(
    sink: &dyn DownloadSink,
    identifiers: &[String],
    quality_override: Option<Bitrate>,
) -> Result<(), DownloadError> {
    if identifiers.is_empty() {
        info!(target: "pipeline", "nothing to download");
        return Ok(());
    }

    sink.login().await?;
    info!(target: "pipeline", count = identifiers.len(), "starting download");
    sink.download_batch(identifiers, quality_override).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolutionPolicy;
    use crate::test_support::{
        candidate, FakeBackend, FakeSource, RecordingSink, ScriptedChannel, SinkCall,
    };

    fn limit(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn id(name: &str) -> String {
        candidate(name, 0).identifier
    }

    #[tokio::test]
    async fn test_resolves_across_sources_in_order_without_duplicates() {
        let backend = FakeBackend::default()
            .with("Low", &["Low"])
            .with("Slowdive", &["Slowdive"])
            .with("Grouper", &["Grouper"]);
        let sources: Vec<Box<dyn SourceProvider>> = vec![
            Box::new(FakeSource::new(SourceKind::LastFm, &["Slowdive", "Low"])),
            Box::new(FakeSource::new(SourceKind::Spotify, &["Low", "Grouper"])),
        ];

        let pipeline = Pipeline::new(
            MatchResolver::new(&backend, ResolutionPolicy::Interactive),
            limit(500),
        );
        let report = pipeline
            .run(&sources, &mut ScriptedChannel::default())
            .await
            .unwrap();

        assert_eq!(report.identifiers, vec![id("Slowdive"), id("Low"), id("Grouper")]);
        assert_eq!(report.names_seen, 4);
        assert_eq!(report.names_resolved, 4);
    }

    #[tokio::test]
    async fn test_limit_applies_per_source() {
        let backend = FakeBackend::default().with("A", &["A"]).with("C", &["C"]);
        let sources: Vec<Box<dyn SourceProvider>> = vec![
            Box::new(FakeSource::new(SourceKind::LastFm, &["A", "B"])),
            Box::new(FakeSource::new(SourceKind::Spotify, &["C", "D"])),
        ];

        let pipeline = Pipeline::new(MatchResolver::new(&backend, ResolutionPolicy::lazy(-1)), limit(1));
        let report = pipeline
            .run(&sources, &mut ScriptedChannel::default())
            .await
            .unwrap();

        assert_eq!(report.names_seen, 2);
        assert_eq!(report.identifiers, vec![id("A"), id("C")]);
    }

    #[tokio::test]
    async fn test_no_match_and_search_failure_do_not_stop_the_run() {
        let backend = FakeBackend::default()
            .failing("Broken")
            .with("Low", &["Low"]);
        let sources: Vec<Box<dyn SourceProvider>> = vec![Box::new(FakeSource::new(
            SourceKind::LastFm,
            &["Nobody", "Broken", "Low"],
        ))];

        let pipeline = Pipeline::new(
            MatchResolver::new(&backend, ResolutionPolicy::Interactive),
            limit(500),
        );
        let report = pipeline
            .run(&sources, &mut ScriptedChannel::default())
            .await
            .unwrap();

        assert_eq!(report.identifiers, vec![id("Low")]);
        assert_eq!(report.no_match, vec!["Nobody".to_string()]);
        assert_eq!(report.failed_queries.len(), 1);
        assert_eq!(report.failed_queries[0].name, "Broken");
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_failed_source_keeps_progress_and_continues() {
        let backend = FakeBackend::default().with("Low", &["Low"]).with("Grouper", &["Grouper"]);
        let sources: Vec<Box<dyn SourceProvider>> = vec![
            Box::new(FakeSource::new(SourceKind::Spotify, &["Low"]).failing_after()),
            Box::new(FakeSource::new(SourceKind::LastFm, &["Grouper"])),
        ];

        let pipeline = Pipeline::new(
            MatchResolver::new(&backend, ResolutionPolicy::Interactive),
            limit(500),
        );
        let report = pipeline
            .run(&sources, &mut ScriptedChannel::default())
            .await
            .unwrap();

        assert_eq!(report.identifiers, vec![id("Low"), id("Grouper")]);
        assert_eq!(report.failed_sources.len(), 1);
        assert_eq!(report.failed_sources[0].source_kind, SourceKind::Spotify);
        assert!(report.failed_sources[0].authentication);
    }

    #[tokio::test]
    async fn test_operator_skip_is_reported() {
        let backend = FakeBackend::default().with("Someone", &["X", "Y"]);
        let sources: Vec<Box<dyn SourceProvider>> =
            vec![Box::new(FakeSource::new(SourceKind::LastFm, &["Someone"]))];

        let pipeline = Pipeline::new(
            MatchResolver::new(&backend, ResolutionPolicy::Interactive),
            limit(500),
        );
        let report = pipeline
            .run(&sources, &mut ScriptedChannel::new(["-1"]))
            .await
            .unwrap();

        assert!(report.identifiers.is_empty());
        assert_eq!(report.skipped, vec!["Someone".to_string()]);
        assert!(report.summary_lines().iter().any(|l| l == "skipped: Someone"));
    }

    #[tokio::test]
    async fn test_multi_select_without_picks_counts_as_skipped() {
        let backend = FakeBackend::default()
            .with("Someone", &["X", "Y"])
            .with("Low", &["Low"]);
        let sources: Vec<Box<dyn SourceProvider>> = vec![Box::new(FakeSource::new(
            SourceKind::LastFm,
            &["Someone", "Low"],
        ))];

        let pipeline = Pipeline::new(
            MatchResolver::new(&backend, ResolutionPolicy::Interactive),
            limit(500),
        );
        let report = pipeline
            .run(&sources, &mut ScriptedChannel::new(["-2", "-1"]))
            .await
            .unwrap();

        assert_eq!(report.identifiers, vec![id("Low")]);
        assert_eq!(report.names_resolved, 1);
        assert_eq!(report.skipped, vec!["Someone".to_string()]);
        assert_eq!(
            report.summary_lines(),
            vec![
                "2 names read, 1 resolved, 1 unique artists queued".to_string(),
                "skipped: Someone".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_closed_prompt_aborts_run() {
        let backend = FakeBackend::default()
            .with("Low", &["Low"])
            .with("Someone", &["X", "Y"]);
        let sources: Vec<Box<dyn SourceProvider>> = vec![Box::new(FakeSource::new(
            SourceKind::LastFm,
            &["Low", "Someone"],
        ))];

        let pipeline = Pipeline::new(
            MatchResolver::new(&backend, ResolutionPolicy::Interactive),
            limit(500),
        );
        let result = pipeline.run(&sources, &mut ScriptedChannel::default()).await;

        assert!(matches!(result, Err(PipelineError::Aborted)));
    }

    #[tokio::test]
    async fn test_deliver_logs_in_then_downloads_once() {
        let sink = RecordingSink::default();
        let identifiers = vec![id("Low"), id("Grouper")];

        deliver(&sink, &identifiers, Some(Bitrate::Flac)).await.unwrap();

        assert_eq!(
            sink.calls(),
            vec![
                SinkCall::Login,
                SinkCall::Download(identifiers.clone(), Some(Bitrate::Flac))
            ]
        );
    }

    #[tokio::test]
    async fn test_deliver_stops_when_login_fails() {
        let sink = RecordingSink {
            reject_login: true,
            ..RecordingSink::default()
        };

        let result = deliver(&sink, &[id("Low")], None).await;

        assert!(matches!(result, Err(DownloadError::Authentication(_))));
        assert_eq!(sink.calls(), vec![SinkCall::Login]);
    }

    #[tokio::test]
    async fn test_deliver_skips_empty_set() {
        let sink = RecordingSink::default();
        deliver(&sink, &[], None).await.unwrap();
        assert!(sink.calls().is_empty());
    }
}
