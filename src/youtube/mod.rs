//! Plain YouTube keyword search backend.

pub mod client;
pub mod search;
pub mod types;

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed,
};

use crate::backends::SearchBackend;
use crate::candidate::{Candidate, FeedResolver};
use crate::error::SearchError;
use crate::query::SearchQuery;
use crate::task_queue::TaskQueue;

pub use client::{VideoSearcher, YouTubeScraper};
pub use types::*;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// How many filter variants run at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YouTubeSettings {
    pub concurrency: usize,
    pub pages: PageRange,
    /// Variant searches started per second. Zero disables the limit.
    pub requests_per_second: u32,
}

impl Default for YouTubeSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            pages: PageRange::default(),
            requests_per_second: 2,
        }
    }
}

pub struct YouTubeSearch {
    queue: TaskQueue<String, Vec<RawVideo>, SearchError>,
    resolver: Arc<dyn FeedResolver>,
}

impl YouTubeSearch {
    pub fn new(
        searcher: Arc<dyn VideoSearcher>,
        settings: YouTubeSettings,
        resolver: Arc<dyn FeedResolver>,
    ) -> Self {
        let limiter: Option<Arc<DirectRateLimiter>> = NonZeroU32::new(settings.requests_per_second)
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));
        let pages = settings.pages;

        let queue = TaskQueue::new("youtube", settings.concurrency, move |query: String| {
            let searcher = searcher.clone();
            let limiter = limiter.clone();
            async move {
                if let Some(limiter) = limiter {
                    limiter.until_ready().await;
                }
                searcher.search_videos(&query, pages).await
            }
        });

        Self { queue, resolver }
    }
}

#[async_trait::async_trait]
impl SearchBackend for YouTubeSearch {
    fn name(&self) -> &'static str {
        "youtube"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, SearchError> {
        let expected = search::query_tokens(query);
        let variants = search::variant_queries(query);
        log::debug!(
            "Searching YouTube with {} variants on queue '{}' ({} at a time)",
            variants.len(),
            self.queue.name(),
            self.queue.concurrency()
        );

        let outcomes = self.queue.push(variants.clone()).await;
        log::debug!(
            "{} of {} YouTube variants answered",
            outcomes.iter().filter(|o| o.is_fulfilled()).count(),
            outcomes.len()
        );

        let mut matches = Vec::with_capacity(outcomes.len());
        let mut last_error = None;
        for (variant, outcome) in variants.iter().zip(outcomes) {
            match outcome.into_result() {
                Ok(videos) => matches.push(search::filter_variant(videos, &expected)),
                Err(e) => {
                    log::warn!("YouTube variant '{}' failed: {}", variant, e);
                    last_error = Some(e);
                }
            }
        }

        if matches.is_empty()
            && let Some(e) = last_error
        {
            return Err(e);
        }

        let candidates = search::rank_variants(matches, query, &self.resolver);
        log::info!(
            "YouTube: {} candidates for '{}'",
            candidates.len(),
            query.track
        );
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::client::MockVideoSearcher;
    use super::*;
    use crate::candidate::WatchPageResolver;
    use std::sync::Mutex;

    fn query() -> SearchQuery {
        SearchQuery {
            artists: vec!["Daft Punk".to_string()],
            track: "One More Time".to_string(),
            album: String::new(),
            duration_ms: Some(320_000),
        }
    }

    fn video(id: &str) -> RawVideo {
        RawVideo {
            video_id: id.to_string(),
            title: "Daft Punk - One More Time".to_string(),
            author: "Daft Punk".to_string(),
            timestamp: "5:20".to_string(),
            duration_ms: Some(320_000),
            views: Some(1_000),
        }
    }

    fn backend(searcher: MockVideoSearcher) -> YouTubeSearch {
        YouTubeSearch::new(
            Arc::new(searcher),
            YouTubeSettings {
                requests_per_second: 0,
                ..Default::default()
            },
            Arc::new(WatchPageResolver::new("https://www.youtube.com")),
        )
    }

    fn failure(query: &str) -> SearchError {
        SearchError::Other(format!("variant '{}' failed", query))
    }

    #[tokio::test]
    async fn test_only_last_variant_succeeds() {
        let mut searcher = MockVideoSearcher::new();
        searcher
            .expect_search_videos()
            .times(4)
            .returning(|query, _| {
                if query == "one more time daft punk" {
                    Ok(vec![video("abc")])
                } else {
                    Err(failure(query))
                }
            });

        let candidates = backend(searcher).search(&query()).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source_id, "abc");
    }

    #[tokio::test]
    async fn test_all_variants_fail_with_last_error() {
        let mut searcher = MockVideoSearcher::new();
        searcher
            .expect_search_videos()
            .times(4)
            .returning(|query, _| Err(failure(query)));

        let error = backend(searcher).search(&query()).await.unwrap_err();
        assert_eq!(
            error.to_string(),
            "variant 'one more time daft punk' failed"
        );
    }

    #[tokio::test]
    async fn test_variants_share_the_page_range() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = seen.clone();
        let mut searcher = MockVideoSearcher::new();
        searcher.expect_search_videos().returning(move |query, pages| {
            recorded.lock().unwrap().push((query.to_string(), pages));
            Ok(Vec::new())
        });

        let candidates = backend(searcher).search(&query()).await.unwrap();
        assert!(candidates.is_empty());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|(_, pages)| *pages == PageRange::default()));
        assert!(seen.iter().any(|(query, _)| query.ends_with("lyrics")));
    }

    #[tokio::test]
    async fn test_duplicates_across_variants_collapse() {
        let mut searcher = MockVideoSearcher::new();
        searcher
            .expect_search_videos()
            .returning(|_, _| Ok(vec![video("abc"), video("def")]));

        let candidates = backend(searcher).search(&query()).await.unwrap();
        let mut ids: Vec<&str> = candidates.iter().map(|c| c.source_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["abc", "def"]);
    }

    #[tokio::test]
    async fn test_rate_limited_search_completes() {
        let mut searcher = MockVideoSearcher::new();
        searcher
            .expect_search_videos()
            .times(4)
            .returning(|_, _| Ok(vec![video("abc")]));

        let youtube = YouTubeSearch::new(
            Arc::new(searcher),
            YouTubeSettings {
                requests_per_second: 100,
                ..Default::default()
            },
            Arc::new(WatchPageResolver::new("https://www.youtube.com")),
        );
        let candidates = tokio_test::assert_ok!(youtube.search(&query()).await);
        assert_eq!(candidates.len(), 1);
    }
}
