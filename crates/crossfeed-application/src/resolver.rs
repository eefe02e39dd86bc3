// SPDX-License-Identifier: GPL-3.0-or-later

//! Turns one artist name into zero or more download identifiers.

use crate::prompt::{PromptChannel, PromptError};
use crossfeed_domain::{ArtistName, MatchCandidate, ResolutionDecision, SearchBackend, SearchError};
use std::num::NonZeroUsize;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Top-level answer: drop this name.
pub const SKIP: i64 = -1;
/// Top-level answer: switch to picking several candidates.
pub const MULTI_SELECT: i64 = -2;
/// Multi-select answer: stop picking.
pub const FINISH: i64 = -1;
/// Multi-select answer: take every candidate and stop.
pub const SELECT_ALL: i64 = -2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// Accept the first `accuracy` candidates without asking; all of them when unbounded.
    Lazy { accuracy: Option<NonZeroUsize> },
    /// Ask the operator whenever the best candidate is not an exact match.
    Interactive,
}

impl ResolutionPolicy {
    /// Lazy policy from a raw accuracy setting; zero or negative means unbounded.
    pub fn lazy(accuracy: i64) -> Self {
        Self::Lazy {
            accuracy: usize::try_from(accuracy).ok().and_then(NonZeroUsize::new),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The backend had no candidates at all.
    NoMatch,
    Decided(ResolutionDecision),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

pub struct MatchResolver<'a> {
    backend: &'a dyn SearchBackend,
    policy: ResolutionPolicy,
}

impl<'a> MatchResolver<'a> {
    pub fn new(backend: &'a dyn SearchBackend, policy: ResolutionPolicy) -> Self {
        Self { backend, policy }
    }

    #[instrument(skip_all, fields(name = %name))]
    pub async fn resolve(
        &self,
        name: &ArtistName,
        prompt: &mut dyn PromptChannel,
    ) -> Result<Resolution, ResolveError> {
        let mut candidates = self.backend.search(name.as_str()).await?;
        if candidates.is_empty() {
            return Ok(Resolution::NoMatch);
        }

        if name.matches(&candidates[0].display_name) {
            debug!(target: "resolver", identifier = %candidates[0].identifier, "exact match");
            return Ok(Resolution::Decided(ResolutionDecision::SelectOne(
                candidates.swap_remove(0),
            )));
        }

        let decision = match self.policy {
            ResolutionPolicy::Lazy { accuracy } => {
                if let Some(accuracy) = accuracy {
                    candidates.truncate(accuracy.get());
                }
                ResolutionDecision::select_many(candidates)
            }
            ResolutionPolicy::Interactive => choose(name, candidates, prompt)?,
        };

        info!(
            target: "resolver",
            selected = decision.candidates().len(),
            skipped = decision.is_skip(),
            "name resolved"
        );
        Ok(Resolution::Decided(decision))
    }
}

fn choose(
    name: &ArtistName,
    mut candidates: Vec<MatchCandidate>,
    prompt: &mut dyn PromptChannel,
) -> Result<ResolutionDecision, PromptError> {
    prompt.show("")?;
    prompt.show(&format!("No exact match for \"{name}\". Candidates:"))?;
    for (index, candidate) in candidates.iter().enumerate() {
        prompt.show(&format!("  [{index}] {}", candidate.display_name))?;
    }
    prompt.show(&format!(
        "Pick an index, {SKIP} to skip, {MULTI_SELECT} to pick several."
    ))?;

    loop {
        match prompt.read_index("> ")? {
            SKIP => return Ok(ResolutionDecision::Skip),
            MULTI_SELECT => return choose_many(candidates, prompt),
            answer => match checked_index(answer, candidates.len()) {
                Some(index) => {
                    return Ok(ResolutionDecision::SelectOne(candidates.swap_remove(index)))
                }
                None => out_of_range(prompt, answer, candidates.len())?,
            },
        }
    }
}

fn choose_many(
    candidates: Vec<MatchCandidate>,
    prompt: &mut dyn PromptChannel,
) -> Result<ResolutionDecision, PromptError> {
    prompt.show(&format!(
        "Enter one index per line, {FINISH} when done, {SELECT_ALL} to take all."
    ))?;

    let mut picked = Vec::new();
    loop {
        match prompt.read_index("+ ")? {
            FINISH => return Ok(ResolutionDecision::select_many(picked)),
            SELECT_ALL => return Ok(ResolutionDecision::select_many(candidates)),
            answer => match checked_index(answer, candidates.len()) {
                Some(index) => picked.push(candidates[index].clone()),
                None => out_of_range(prompt, answer, candidates.len())?,
            },
        }
    }
}

fn checked_index(answer: i64, len: usize) -> Option<usize> {
    usize::try_from(answer).ok().filter(|index| *index < len)
}

fn out_of_range(
    prompt: &mut dyn PromptChannel,
    answer: i64,
    len: usize,
) -> Result<(), PromptError> {
    debug!(target: "resolver", answer, len, "index out of range");
    prompt.show(&format!(
        "{answer} is not a listed index (0 to {}).",
        len.saturating_sub(1)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{candidates, ids, FakeBackend, ScriptedChannel};

    fn name(value: &str) -> ArtistName {
        ArtistName::new(value).unwrap()
    }

    fn xyz_backend() -> FakeBackend {
        FakeBackend::default().with("Someone", &["X", "Y", "Z"])
    }

    async fn decide(
        backend: &FakeBackend,
        policy: ResolutionPolicy,
        query: &str,
        prompt: &mut ScriptedChannel,
    ) -> ResolutionDecision {
        match MatchResolver::new(backend, policy)
            .resolve(&name(query), prompt)
            .await
            .expect("resolution succeeds")
        {
            Resolution::Decided(decision) => decision,
            Resolution::NoMatch => panic!("expected a decision"),
        }
    }

    #[tokio::test]
    async fn test_exact_match_selects_first_without_prompt() {
        let backend = FakeBackend::default().with("Radiohead", &["Radiohead", "Radiohead (Live)"]);
        let mut prompt = ScriptedChannel::default();

        for policy in [ResolutionPolicy::Interactive, ResolutionPolicy::lazy(-1)] {
            let decision = decide(&backend, policy, "Radiohead", &mut prompt).await;
            assert_eq!(
                ids(decision.candidates()),
                ids(&candidates(&["Radiohead"]))
            );
        }
        assert_eq!(prompt.prompts, 0);
        assert!(prompt.shown.is_empty());
    }

    #[tokio::test]
    async fn test_exact_match_ignores_case() {
        let backend = FakeBackend::default().with("radiohead", &["RadioHead", "Other"]);
        let mut prompt = ScriptedChannel::default();

        let decision = decide(&backend, ResolutionPolicy::Interactive, "radiohead", &mut prompt).await;
        assert!(matches!(decision, ResolutionDecision::SelectOne(ref c) if c.display_name == "RadioHead"));
        assert_eq!(prompt.prompts, 0);
    }

    #[tokio::test]
    async fn test_lazy_takes_top_candidates() {
        let backend = xyz_backend();
        let mut prompt = ScriptedChannel::default();

        let decision = decide(&backend, ResolutionPolicy::lazy(2), "Someone", &mut prompt).await;
        assert_eq!(ids(decision.candidates()), ids(&candidates(&["X", "Y"])));
        assert_eq!(prompt.prompts, 0);
    }

    #[tokio::test]
    async fn test_lazy_without_bound_takes_everything() {
        let backend = xyz_backend();
        let mut prompt = ScriptedChannel::default();

        for accuracy in [-1, 0] {
            let decision =
                decide(&backend, ResolutionPolicy::lazy(accuracy), "Someone", &mut prompt).await;
            assert_eq!(decision.candidates().len(), 3);
        }
    }

    #[tokio::test]
    async fn test_lazy_bound_larger_than_results() {
        let backend = xyz_backend();
        let mut prompt = ScriptedChannel::default();

        let decision = decide(&backend, ResolutionPolicy::lazy(10), "Someone", &mut prompt).await;
        assert_eq!(decision.candidates().len(), 3);
    }

    #[tokio::test]
    async fn test_interactive_single_index() {
        let backend = xyz_backend();
        let mut prompt = ScriptedChannel::new(["2"]);

        let decision = decide(&backend, ResolutionPolicy::Interactive, "Someone", &mut prompt).await;
        assert_eq!(decision, ResolutionDecision::SelectOne(candidates(&["X", "Y", "Z"])[2].clone()));
        assert!(prompt.shown.iter().any(|line| line == "  [0] X"));
        assert!(prompt.shown.iter().any(|line| line == "  [2] Z"));
    }

    #[tokio::test]
    async fn test_interactive_skip() {
        let backend = xyz_backend();
        let mut prompt = ScriptedChannel::new(["-1"]);

        let decision = decide(&backend, ResolutionPolicy::Interactive, "Someone", &mut prompt).await;
        assert!(decision.is_skip());
        assert!(decision.candidates().is_empty());
    }

    #[tokio::test]
    async fn test_multi_select_appends_each_index_read() {
        let backend = xyz_backend();
        let mut prompt = ScriptedChannel::new(["-2", "1", "0", "-1"]);

        let decision = decide(&backend, ResolutionPolicy::Interactive, "Someone", &mut prompt).await;
        let all = candidates(&["X", "Y", "Z"]);
        assert_eq!(
            decision,
            ResolutionDecision::SelectMany(vec![all[1].clone(), all[0].clone()])
        );
        assert_eq!(prompt.remaining(), 0);
    }

    #[tokio::test]
    async fn test_multi_select_all() {
        let backend = xyz_backend();
        let mut prompt = ScriptedChannel::new(["-2", "-2"]);

        let decision = decide(&backend, ResolutionPolicy::Interactive, "Someone", &mut prompt).await;
        assert_eq!(ids(decision.candidates()), ids(&candidates(&["X", "Y", "Z"])));
    }

    #[tokio::test]
    async fn test_multi_select_dedupes_repeated_index() {
        let backend = xyz_backend();
        let mut prompt = ScriptedChannel::new(["-2", "1", "1", "-1"]);

        let decision = decide(&backend, ResolutionPolicy::Interactive, "Someone", &mut prompt).await;
        assert_eq!(decision.candidates().len(), 1);
    }

    #[tokio::test]
    async fn test_multi_select_with_no_picks_is_empty() {
        let backend = xyz_backend();
        let mut prompt = ScriptedChannel::new(["-2", "-1"]);

        let decision = decide(&backend, ResolutionPolicy::Interactive, "Someone", &mut prompt).await;
        assert_eq!(decision, ResolutionDecision::SelectMany(Vec::new()));
    }

    #[tokio::test]
    async fn test_out_of_range_reprompts() {
        let backend = xyz_backend();
        let mut prompt = ScriptedChannel::new(["5", "-7", "-1"]);

        let decision = decide(&backend, ResolutionPolicy::Interactive, "Someone", &mut prompt).await;
        assert!(decision.is_skip());
        assert_eq!(prompt.prompts, 3);
        assert!(prompt.shown.iter().any(|line| line.starts_with("5 is not a listed index")));
    }

    #[tokio::test]
    async fn test_out_of_range_in_multi_select_reprompts() {
        let backend = xyz_backend();
        let mut prompt = ScriptedChannel::new(["-2", "3", "2", "-1"]);

        let decision = decide(&backend, ResolutionPolicy::Interactive, "Someone", &mut prompt).await;
        assert_eq!(ids(decision.candidates()), ids(&candidates(&["X", "Y", "Z"])[2..]));
    }

    #[tokio::test]
    async fn test_non_integer_reprompts() {
        let backend = xyz_backend();
        let mut prompt = ScriptedChannel::new(["first", "0"]);

        let decision = decide(&backend, ResolutionPolicy::Interactive, "Someone", &mut prompt).await;
        assert_eq!(decision.candidates()[0].display_name, "X");
        assert_eq!(prompt.prompts, 2);
    }

    #[tokio::test]
    async fn test_empty_results_are_no_match() {
        let backend = FakeBackend::default();
        let mut prompt = ScriptedChannel::default();

        let resolution = MatchResolver::new(&backend, ResolutionPolicy::Interactive)
            .resolve(&name("Nobody"), &mut prompt)
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::NoMatch);
        assert_eq!(prompt.prompts, 0);
    }

    #[tokio::test]
    async fn test_search_failure_is_reported() {
        let backend = FakeBackend::default().failing("Someone");
        let mut prompt = ScriptedChannel::default();

        let result = MatchResolver::new(&backend, ResolutionPolicy::Interactive)
            .resolve(&name("Someone"), &mut prompt)
            .await;
        assert!(matches!(result, Err(ResolveError::Search(_))));
    }

    #[tokio::test]
    async fn test_closed_input_surfaces() {
        let backend = xyz_backend();
        let mut prompt = ScriptedChannel::default();

        let result = MatchResolver::new(&backend, ResolutionPolicy::Interactive)
            .resolve(&name("Someone"), &mut prompt)
            .await;
        assert!(matches!(result, Err(ResolveError::Prompt(PromptError::Closed))));
    }
}
