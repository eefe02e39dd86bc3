// SPDX-License-Identifier: GPL-3.0-or-later

//! Resolution pipeline: sources in, Deezer identifiers out, handed to the download engine.

pub mod download;
pub mod pipeline;
pub mod prompt;
pub mod resolver;

#[cfg(test)]
mod test_support;

pub use download::DeemixSink;
pub use pipeline::{deliver, Pipeline, PipelineError, QueryFailure, RunReport, SourceFailure};
pub use prompt::{ConsoleChannel, PromptChannel, PromptError};
pub use resolver::{MatchResolver, Resolution, ResolutionPolicy, ResolveError};
