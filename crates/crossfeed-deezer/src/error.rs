// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeezerError>;

#[derive(Debug, Error)]
pub enum DeezerError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Quota limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid response from Deezer API: {0}")]
    InvalidResponse(String),

    #[error("Deezer API error {code} ({kind}): {message}")]
    Api {
        code: u32,
        kind: String,
        message: String,
    },

    #[error("HTTP error: {status} - {message}")]
    HttpStatus { status: u16, message: String },

    #[error("ARL session is not logged in")]
    InvalidSession,
}
