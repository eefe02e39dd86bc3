// SPDX-License-Identifier: GPL-3.0-or-later

//! Turns page-at-a-time fetches into a bounded stream of artist names.

use crossfeed_domain::{ArtistName, NameStream, SourceError};
use futures_util::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::future::Future;
use std::num::NonZeroUsize;
use tracing::trace;

/// One page of raw names plus the cursor for the following page, if any.
pub(crate) struct Page<C> {
    pub names: Vec<String>,
    pub next: Option<C>,
}

struct PagerState<C, F> {
    fetch: F,
    buffer: VecDeque<String>,
    next: Option<C>,
    remaining: usize,
}

/// Stream at most `limit` names, calling `fetch(cursor, remaining)` whenever the buffer runs dry.
///
/// Blank names are dropped without counting against the limit. The stream ends on the first
/// error, after an empty page, or when the source reports no further cursor.
pub(crate) fn paginate<'a, C, F, Fut>(limit: NonZeroUsize, first: C, fetch: F) -> NameStream<'a>
where
    C: Send + 'a,
    F: FnMut(C, usize) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page<C>, SourceError>> + Send + 'a,
{
    let state = PagerState {
        fetch,
        buffer: VecDeque::new(),
        next: Some(first),
        remaining: limit.get(),
    };

    stream::try_unfold(state, next_name).boxed()
}

async fn next_name<C, F, Fut>(
    mut state: PagerState<C, F>,
) -> Result<Option<(ArtistName, PagerState<C, F>)>, SourceError>
where
    F: FnMut(C, usize) -> Fut,
    Fut: Future<Output = Result<Page<C>, SourceError>>,
{
    loop {
        if state.remaining == 0 {
            return Ok(None);
        }

        if let Some(raw) = state.buffer.pop_front() {
            match ArtistName::new(raw) {
                Ok(name) => {
                    state.remaining -= 1;
                    return Ok(Some((name, state)));
                }
                Err(_) => continue,
            }
        }

        let Some(cursor) = state.next.take() else {
            return Ok(None);
        };

        let page = (state.fetch)(cursor, state.remaining).await?;
        trace!(fetched = page.names.len(), more = page.next.is_some(), "page fetched");
        if page.names.is_empty() {
            return Ok(None);
        }
        state.buffer.extend(page.names);
        state.next = page.next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossfeed_domain::SourceKind;
    use futures_util::TryStreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn names(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("artist {i}")).collect()
    }

    #[tokio::test]
    async fn test_stops_at_limit_without_extra_fetches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let stream = paginate(NonZeroUsize::new(3).unwrap(), 1u32, move |page, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(Page {
                    names: names((page as usize - 1) * 2..page as usize * 2),
                    next: Some(page + 1),
                })
            }
        });

        let collected: Vec<ArtistName> = stream.try_collect().await.unwrap();
        let collected: Vec<&str> = collected.iter().map(ArtistName::as_str).collect();
        assert_eq!(collected, vec!["artist 0", "artist 1", "artist 2"]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ends_when_source_has_no_next_page() {
        let stream = paginate(NonZeroUsize::new(10).unwrap(), (), |_, _| async {
            Ok(Page {
                names: names(0..2),
                next: None,
            })
        });

        let collected: Vec<ArtistName> = stream.try_collect().await.unwrap();
        assert_eq!(collected.len(), 2);
    }

    #[tokio::test]
    async fn test_skips_blank_names() {
        let stream = paginate(NonZeroUsize::new(2).unwrap(), (), |_, _| async {
            Ok(Page {
                names: vec!["".to_string(), "  ".to_string(), "Low".to_string()],
                next: None,
            })
        });

        let collected: Vec<ArtistName> = stream.try_collect().await.unwrap();
        assert_eq!(collected, vec![ArtistName::new("Low").unwrap()]);
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let stream = paginate(NonZeroUsize::new(5).unwrap(), 1u32, |page, _| async move {
            if page == 1 {
                Ok(Page {
                    names: names(0..1),
                    next: Some(2),
                })
            } else {
                Err(SourceError::unavailable(SourceKind::LastFm, "boom"))
            }
        });

        let results: Vec<Result<ArtistName, SourceError>> = stream.collect().await;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
