// SPDX-License-Identifier: GPL-3.0-or-later

//! Library sources that produce the artist names to resolve.

pub mod lastfm;
mod paging;
pub mod spotify;

pub use lastfm::{LastFmError, LastFmLibrary};
pub use spotify::{SpotifyAuthorizer, SpotifyCredentials, SpotifyError, SpotifyFollowedArtists};
