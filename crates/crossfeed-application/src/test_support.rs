// SPDX-License-Identifier: GPL-3.0-or-later

//! In-memory doubles for the collaborator traits.

use crate::prompt::{PromptChannel, PromptError};
use async_trait::async_trait;
use crossfeed_domain::{
    ArtistName, Bitrate, DownloadError, DownloadSink, MatchCandidate, NameStream, SearchBackend,
    SearchError, SourceError, SourceKind, SourceProvider,
};
use futures_util::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) fn candidate(name: &str, rank: usize) -> MatchCandidate {
    MatchCandidate {
        display_name: name.to_string(),
        identifier: format!("https://www.deezer.com/artist/{}", name.to_lowercase()),
        source_rank: rank,
    }
}

pub(crate) fn candidates(names: &[&str]) -> Vec<MatchCandidate> {
    names
        .iter()
        .enumerate()
        .map(|(rank, name)| candidate(name, rank))
        .collect()
}

pub(crate) fn ids(candidates: &[MatchCandidate]) -> Vec<String> {
    candidates.iter().map(|c| c.identifier.clone()).collect()
}

/// Replays canned answers; runs dry as a closed input stream.
#[derive(Default)]
pub(crate) struct ScriptedChannel {
    answers: VecDeque<String>,
    pub shown: Vec<String>,
    pub prompts: usize,
}

impl ScriptedChannel {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl PromptChannel for ScriptedChannel {
    fn show(&mut self, line: &str) -> Result<(), PromptError> {
        self.shown.push(line.to_string());
        Ok(())
    }

    fn read_line(&mut self, _prompt: &str) -> Result<String, PromptError> {
        self.prompts += 1;
        self.answers.pop_front().ok_or(PromptError::Closed)
    }
}

/// Search backend answering from a fixed table; unknown queries return no hits.
#[derive(Default)]
pub(crate) struct FakeBackend {
    results: HashMap<String, Vec<MatchCandidate>>,
    failing: Vec<String>,
    calls: AtomicUsize,
}

impl FakeBackend {
    pub fn with(mut self, query: &str, names: &[&str]) -> Self {
        self.results.insert(query.to_string(), candidates(names));
        self
    }

    pub fn failing(mut self, query: &str) -> Self {
        self.failing.push(query.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchBackend for FakeBackend {
    async fn search(&self, query: &str) -> Result<Vec<MatchCandidate>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|q| q == query) {
            return Err(SearchError::new(query, "backend unavailable"));
        }
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }
}

/// Source yielding fixed names, optionally failing after them.
pub(crate) struct FakeSource {
    kind: SourceKind,
    names: Vec<String>,
    fail_after: bool,
}

impl FakeSource {
    pub fn new(kind: SourceKind, names: &[&str]) -> Self {
        Self {
            kind,
            names: names.iter().map(|n| n.to_string()).collect(),
            fail_after: false,
        }
    }

    pub fn failing_after(mut self) -> Self {
        self.fail_after = true;
        self
    }
}

impl SourceProvider for FakeSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn names(&self, limit: NonZeroUsize) -> NameStream<'_> {
        let mut items: Vec<Result<ArtistName, SourceError>> = self
            .names
            .iter()
            .take(limit.get())
            .filter_map(|n| ArtistName::new(n.clone()).ok())
            .map(Ok)
            .collect();
        if self.fail_after {
            items.push(Err(SourceError::authentication(self.kind, "token expired")));
        }
        stream::iter(items).boxed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SinkCall {
    Login,
    Download(Vec<String>, Option<Bitrate>),
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    pub calls: Mutex<Vec<SinkCall>>,
    pub reject_login: bool,
}

impl RecordingSink {
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DownloadSink for RecordingSink {
    async fn login(&self) -> Result<(), DownloadError> {
        self.calls.lock().unwrap().push(SinkCall::Login);
        if self.reject_login {
            return Err(DownloadError::Authentication("bad arl".to_string()));
        }
        Ok(())
    }

    async fn download_batch(
        &self,
        identifiers: &[String],
        quality_override: Option<Bitrate>,
    ) -> Result<(), DownloadError> {
        self.calls
            .lock()
            .unwrap()
            .push(SinkCall::Download(identifiers.to_vec(), quality_override));
        Ok(())
    }
}
