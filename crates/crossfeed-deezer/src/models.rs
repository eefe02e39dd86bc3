// SPDX-License-Identifier: GPL-3.0-or-later

use serde::{Deserialize, Deserializer, Serialize};

/// Artist as returned by the Deezer search API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artist {
    /// Deezer artist ID.
    pub id: u64,
    /// Artist name.
    pub name: String,
    /// Public artist page, e.g. `https://www.deezer.com/artist/27`.
    #[serde(default)]
    pub link: Option<String>,
}

impl Artist {
    /// The stable link the download engine accepts for this artist.
    pub fn link(&self) -> String {
        match self.link.as_deref() {
            Some(link) if !link.trim().is_empty() => link.to_string(),
            _ => format!("https://www.deezer.com/artist/{}", self.id),
        }
    }
}

/// One page of a Deezer search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    /// Total hits across all pages.
    #[serde(default)]
    pub total: Option<u32>,
    /// URL of the next page, if any.
    #[serde(default)]
    pub next: Option<String>,
}

/// Error object Deezer embeds in otherwise successful responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: u32,
}

/// Account behind an ARL session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserData {
    pub user_id: u64,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GatewayResponse {
    pub results: GatewayResults,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GatewayResults {
    #[serde(rename = "USER")]
    pub user: GatewayUser,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GatewayUser {
    #[serde(rename = "USER_ID", deserialize_with = "number_or_string")]
    pub user_id: u64,
    #[serde(rename = "BLOG_NAME", default)]
    pub blog_name: Option<String>,
}

/// The gateway reports numeric ids either as JSON numbers or as strings.
fn number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
