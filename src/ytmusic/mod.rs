//! YouTube Music backend.
//!
//! Session parameters are scraped once from the landing page and cached in a
//! [`ConfigCell`]. Searches return shelves of raw items which are scored and
//! deduplicated into [`Candidate`]s.

pub mod client;
pub mod search;
pub mod types;

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::backends::SearchBackend;
use crate::candidate::{Candidate, FeedResolver};
use crate::error::SearchError;
use crate::http::HttpTransport;
use crate::query::SearchQuery;

pub use client::{ClientLocale, ConfigCell};
pub use types::*;

const BACKEND: &str = "ytmusic";

// Statuses answered to a search made with an outdated key or client version.
const STALE_SESSION_STATUSES: [u16; 3] = [400, 401, 403];

pub struct YtMusic {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    locale: ClientLocale,
    config: ConfigCell<BackendConfig>,
    resolver: Arc<dyn FeedResolver>,
}

impl YtMusic {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: impl Into<String>,
        locale: ClientLocale,
        resolver: Arc<dyn FeedResolver>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            locale,
            config: ConfigCell::new(),
            resolver,
        }
    }

    /// Cached session parameters, derived on first use.
    pub async fn backend_config(&self) -> Result<Arc<BackendConfig>, SearchError> {
        self.config
            .get_or_derive(|| client::derive_config(self.transport.as_ref(), &self.base_url))
            .await
    }

    /// Re-scrape the session parameters even if some are cached.
    pub async fn force_refresh_config(&self) -> Result<Arc<BackendConfig>, SearchError> {
        self.config
            .force_refresh(|| client::derive_config(self.transport.as_ref(), &self.base_url))
            .await
    }

    pub async fn invalidate_config(&self) {
        self.config.invalidate().await;
    }

    /// Send one search request. A rejected session drops the cached config so
    /// the next call derives a fresh one; the failing call is not retried.
    async fn request(&self, request: client::SearchRequest) -> Result<Value, SearchError> {
        let config = self.backend_config().await?;
        let request = client::build_search_request(&self.base_url, &config, &self.locale, request);
        let response = self.transport.post_json(request).await;

        if let Err(e) = &response
            && e.status().is_some_and(|status| STALE_SESSION_STATUSES.contains(&status))
        {
            log::info!("YouTube Music rejected the session, dropping cached config: {}", e);
            self.invalidate_config().await;
        }
        response
    }

    /// Run a search and return the classified shelves, unscored.
    pub async fn search_shelves(&self, query: &str) -> Result<SearchResults, SearchError> {
        log::debug!("Searching YouTube Music for '{}'", query);
        let response = self.request(client::SearchRequest::for_query(query)).await?;
        let results = search::parse_search_response(&response, None);
        log::debug!(
            "YouTube Music returned {} shelves for '{}'",
            results.shelves.len(),
            query
        );
        Ok(results)
    }

    /// Fetch the next page of the shelf a token was taken from.
    pub async fn continue_shelf(&self, token: &ContinuationToken) -> Result<Shelf, SearchError> {
        log::debug!("Continuing YouTube Music shelf {:?}", token.shelf);
        let mut query = vec![
            ("ctoken".to_string(), token.continuation.clone()),
            ("continuation".to_string(), token.continuation.clone()),
            ("type".to_string(), "next".to_string()),
        ];
        if let Some(itct) = &token.click_tracking_params {
            query.push(("itct".to_string(), itct.clone()));
        }

        let response = self
            .request(client::SearchRequest {
                body: Map::new(),
                query,
            })
            .await?;
        search::parse_continuation_response(&response, token.shelf.clone()).ok_or_else(|| {
            SearchError::malformed(BACKEND, "continuation response has no shelf contents")
        })
    }

    /// Fetch the full listing behind a shelf's "show all" link.
    pub async fn expand_shelf(
        &self,
        descriptor: &ExpansionDescriptor,
    ) -> Result<SearchResults, SearchError> {
        log::debug!(
            "Expanding YouTube Music shelf {:?} for '{}'",
            descriptor.shelf,
            descriptor.query
        );
        let mut request = client::SearchRequest::for_query(&descriptor.query);
        if let Some(params) = &descriptor.params {
            request
                .body
                .insert("params".to_string(), Value::String(params.clone()));
        }

        let response = self.request(request).await?;
        Ok(search::parse_search_response(
            &response,
            Some(&descriptor.shelf),
        ))
    }
}

#[async_trait::async_trait]
impl SearchBackend for YtMusic {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, SearchError> {
        let results = self.search_shelves(&query.joined()).await?;
        let candidates = search::rank_results(&results, query, &self.resolver);
        log::info!(
            "YouTube Music: {} candidates for '{}'",
            candidates.len(),
            query.track
        );
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::search::tests::{one_more_time, response, shelf};
    use super::*;
    use crate::candidate::{CandidateKind, WatchPageResolver};
    use crate::error::ConfigDerivationError;
    use crate::http::{HttpPage, JsonRequest, MockHttpTransport};
    use serde_json::json;

    const BASE_URL: &str = "https://music.youtube.com";
    const LANDING_PAGE: &str = r#"<script>ytcfg.set({"INNERTUBE_API_KEY":"key-123","INNERTUBE_CLIENT_NAME":"WEB_REMIX","INNERTUBE_CLIENT_VERSION":"1.2"});</script>"#;

    fn landing_page(transport: &mut MockHttpTransport, times: usize) {
        transport
            .expect_get_page()
            .times(times)
            .returning(|url| {
                Ok(HttpPage {
                    final_url: url.to_string(),
                    body: LANDING_PAGE.to_string(),
                })
            });
    }

    fn backend(transport: MockHttpTransport) -> YtMusic {
        YtMusic::new(
            Arc::new(transport),
            BASE_URL,
            ClientLocale {
                hl: "en".to_string(),
                gl: "US".to_string(),
            },
            Arc::new(WatchPageResolver::new(BASE_URL)),
        )
    }

    fn query() -> SearchQuery {
        SearchQuery {
            artists: vec!["Daft Punk".to_string()],
            track: "One More Time".to_string(),
            album: String::new(),
            duration_ms: Some(320_000),
        }
    }

    #[tokio::test]
    async fn test_search_ranks_songs() {
        let mut transport = MockHttpTransport::new();
        landing_page(&mut transport, 1);
        transport
            .expect_post_json()
            .withf(|request: &JsonRequest| {
                request.body["query"] == "One More Time Daft Punk"
                    && request
                        .query
                        .contains(&("key".to_string(), "key-123".to_string()))
            })
            .times(2)
            .returning(|_| Ok(response(vec![shelf("Songs", vec![one_more_time()])])));

        let ytmusic = backend(transport);
        for _ in 0..2 {
            let candidates = ytmusic.search(&query()).await.unwrap();
            assert_eq!(candidates.len(), 1);
            assert_eq!(candidates[0].kind, CandidateKind::Song);
            assert_eq!(candidates[0].duration_ms, 320_000);
            assert!(candidates[0].accuracy > 80.0);
        }
    }

    #[tokio::test]
    async fn test_get_feeds_is_lazy() {
        let mut transport = MockHttpTransport::new();
        landing_page(&mut transport, 1);
        transport
            .expect_post_json()
            .returning(|_| Ok(response(vec![shelf("Songs", vec![one_more_time()])])));

        let candidates = backend(transport).search(&query()).await.unwrap();
        let feeds = candidates[0].get_feeds().await.unwrap();
        assert_eq!(feeds.url, "https://music.youtube.com/watch?v=FGBhQbmPwH8");
    }

    #[tokio::test]
    async fn test_region_lock_fails_search() {
        let mut transport = MockHttpTransport::new();
        transport.expect_get_page().returning(|_| {
            Ok(HttpPage {
                final_url: "https://music.youtube.com/coming-soon/".to_string(),
                body: String::new(),
            })
        });
        transport.expect_post_json().never();

        let error = backend(transport).search(&query()).await.unwrap_err();
        assert!(matches!(
            error,
            SearchError::Config(ConfigDerivationError::RegionUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_request_failure_propagates() {
        let mut transport = MockHttpTransport::new();
        landing_page(&mut transport, 1);
        transport.expect_post_json().returning(|request| {
            Err(SearchError::Status {
                url: request.url,
                status: 503,
                status_text: "Service Unavailable".to_string(),
                body: Some("try later".to_string()),
            })
        });

        let error = backend(transport).search(&query()).await.unwrap_err();
        assert_eq!(error.status(), Some(503));
        assert_eq!(error.body(), Some("try later"));
    }

    #[tokio::test]
    async fn test_rejected_session_is_derived_again() {
        let mut transport = MockHttpTransport::new();
        landing_page(&mut transport, 2);
        let mut seq = mockall::Sequence::new();
        transport
            .expect_post_json()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|request| {
                Err(SearchError::Status {
                    url: request.url,
                    status: 403,
                    status_text: "Forbidden".to_string(),
                    body: None,
                })
            });
        transport
            .expect_post_json()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(vec![shelf("Songs", vec![one_more_time()])])));

        let ytmusic = backend(transport);
        let error = ytmusic.search(&query()).await.unwrap_err();
        assert_eq!(error.status(), Some(403));
        assert!(ytmusic.config.cached().await.is_none());

        let candidates = ytmusic.search(&query()).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(ytmusic.config.cached().await.is_some());
    }

    #[tokio::test]
    async fn test_server_error_keeps_config() {
        let mut transport = MockHttpTransport::new();
        landing_page(&mut transport, 1);
        transport.expect_post_json().times(2).returning(|request| {
            Err(SearchError::Status {
                url: request.url,
                status: 500,
                status_text: "Internal Server Error".to_string(),
                body: None,
            })
        });

        let ytmusic = backend(transport);
        assert!(ytmusic.search(&query()).await.is_err());
        assert!(ytmusic.search(&query()).await.is_err());
    }

    #[tokio::test]
    async fn test_force_refresh_config() {
        let mut transport = MockHttpTransport::new();
        landing_page(&mut transport, 2);

        let ytmusic = backend(transport);
        let first = ytmusic.backend_config().await.unwrap();
        let cached = ytmusic.backend_config().await.unwrap();
        assert!(Arc::ptr_eq(&first, &cached));

        let refreshed = ytmusic.force_refresh_config().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &refreshed));
        assert_eq!(*first, *refreshed);
    }

    #[tokio::test]
    async fn test_continue_shelf() {
        let mut transport = MockHttpTransport::new();
        landing_page(&mut transport, 1);
        transport
            .expect_post_json()
            .withf(|request: &JsonRequest| {
                request
                    .query
                    .contains(&("ctoken".to_string(), "CONT-1".to_string()))
                    && request
                        .query
                        .contains(&("itct".to_string(), "CTP-1".to_string()))
                    && request.body.get("query").is_none()
            })
            .returning(|_| {
                Ok(json!({
                    "continuationContents": { "musicShelfContinuation": {
                        "contents": [one_more_time()]
                    } }
                }))
            });

        let token = ContinuationToken {
            shelf: ShelfKind::Songs,
            continuation: "CONT-1".to_string(),
            click_tracking_params: Some("CTP-1".to_string()),
        };
        let shelf = backend(transport).continue_shelf(&token).await.unwrap();
        assert_eq!(shelf.kind, ShelfKind::Songs);
        assert_eq!(shelf.items.len(), 1);
    }

    #[tokio::test]
    async fn test_continue_shelf_rejects_empty_response() {
        let mut transport = MockHttpTransport::new();
        landing_page(&mut transport, 1);
        transport.expect_post_json().returning(|_| Ok(json!({})));

        let token = ContinuationToken {
            shelf: ShelfKind::Videos,
            continuation: "CONT-2".to_string(),
            click_tracking_params: None,
        };
        let error = backend(transport).continue_shelf(&token).await.unwrap_err();
        assert!(matches!(error, SearchError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_expand_shelf_sends_params() {
        let mut transport = MockHttpTransport::new();
        landing_page(&mut transport, 1);
        transport
            .expect_post_json()
            .withf(|request: &JsonRequest| {
                request.body["query"] == "daft punk" && request.body["params"] == "EgWKAQIIAQ"
            })
            .returning(|_| {
                let mut untitled = shelf("Songs", vec![one_more_time()]);
                untitled["musicShelfRenderer"]
                    .as_object_mut()
                    .unwrap()
                    .remove("title");
                Ok(response(vec![untitled]))
            });

        let descriptor = ExpansionDescriptor {
            shelf: ShelfKind::Songs,
            query: "daft punk".to_string(),
            params: Some("EgWKAQIIAQ".to_string()),
        };
        let results = backend(transport).expand_shelf(&descriptor).await.unwrap();
        assert_eq!(results.shelves.len(), 1);
        assert_eq!(results.shelves[0].kind, ShelfKind::Songs);
    }

    #[test]
    fn test_tokens_are_serializable() {
        let token = ContinuationToken {
            shelf: ShelfKind::Unrecognized("Episodes".to_string()),
            continuation: "abc".to_string(),
            click_tracking_params: None,
        };
        let encoded = serde_json::to_string(&token).unwrap();
        let decoded: ContinuationToken = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, token);
    }
}
