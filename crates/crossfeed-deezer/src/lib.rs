// SPDX-License-Identifier: GPL-3.0-or-later

//! Deezer API client used to resolve artist names.
//!
//! Provides the public search API (artist search) behind the
//! [`SearchBackend`](crossfeed_domain::SearchBackend) contract, request pacing to stay
//! under Deezer's quota, and a session check for the ARL cookie the download engine uses.

pub mod client;
pub mod error;
pub mod models;
pub mod rate_limiter;

pub use client::{DeezerClient, DeezerClientBuilder};
pub use error::{DeezerError, Result};
pub use models::{Artist, SearchResponse, UserData};
