use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::{Value, json};
use url::Url;

use crate::candidate::parse_duration;
use crate::error::SearchError;
use crate::http::{HttpTransport, JsonRequest};
use crate::tree_path::{Segment, walk_array, walk_str};
use crate::youtube::types::{PageRange, RawVideo};
use crate::ytmusic::client::extract_client_config;

const BACKEND: &str = "youtube";
/// Search filter restricting results to videos.
const VIDEOS_ONLY: &str = "EgIQAQ==";

static INITIAL_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)ytInitialData"?\]?\s*=\s*(\{.+?\});\s*</script>"#)
        .expect("valid ytInitialData regex")
});

const RESULT_SECTIONS: &[Segment] = &[
    Segment::Key("contents"),
    Segment::Key("twoColumnSearchResultsRenderer"),
    Segment::Key("primaryContents"),
    Segment::Key("sectionListRenderer"),
    Segment::Key("contents"),
];
const APPENDED_SECTIONS: &[Segment] = &[
    Segment::Key("onResponseReceivedCommands"),
    Segment::Index(0),
    Segment::Key("appendContinuationItemsAction"),
    Segment::Key("continuationItems"),
];
const CONTINUATION_TOKEN: &[Segment] = &[
    Segment::Key("continuationItemRenderer"),
    Segment::Key("continuationEndpoint"),
    Segment::Key("continuationCommand"),
    Segment::Key("token"),
];

/// Keyword search over plain YouTube.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VideoSearcher: Send + Sync {
    async fn search_videos(
        &self,
        query: &str,
        pages: PageRange,
    ) -> Result<Vec<RawVideo>, SearchError>;
}

/// Scrapes the results page, then pages through the search endpoint.
pub struct YouTubeScraper {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl YouTubeScraper {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn results_url(&self, query: &str) -> Result<Url, SearchError> {
        let url = format!("{}/results", self.base_url);
        Url::parse_with_params(&url, &[("search_query", query), ("sp", VIDEOS_ONLY)])
            .map_err(|e| SearchError::Other(format!("Invalid search URL {}: {}", url, e)))
    }
}

#[async_trait::async_trait]
impl VideoSearcher for YouTubeScraper {
    async fn search_videos(
        &self,
        query: &str,
        pages: PageRange,
    ) -> Result<Vec<RawVideo>, SearchError> {
        let page = self
            .transport
            .get_page(self.results_url(query)?.as_str())
            .await?;
        let initial = initial_data(&page.body)?;

        let (mut sections, mut token) = split_sections(walk_array(&initial, RESULT_SECTIONS));
        let mut videos = Vec::new();
        let mut current = 1;
        loop {
            if pages.contains(current) {
                videos.extend(sections);
            }
            if current >= pages.end {
                break;
            }
            let Some(continuation) = token.take() else {
                log::debug!("No more result pages for '{}' after page {}", query, current);
                break;
            };

            let config = match extract_client_config(&page.body) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Cannot page YouTube results for '{}': {}", query, e);
                    break;
                }
            };
            let request = JsonRequest::new(
                format!("{}/youtubei/v1/search", self.base_url),
                json!({
                    "context": { "client": {
                        "clientName": config.client_name,
                        "clientVersion": config.client_version,
                    } },
                    "continuation": continuation,
                }),
            )
            .query("key", config.api_key.as_str())
            .query("prettyPrint", "false");

            let response = self.transport.post_json(request).await?;
            (sections, token) = split_sections(walk_array(&response, APPENDED_SECTIONS));
            current += 1;
        }

        log::debug!("YouTube returned {} videos for '{}'", videos.len(), query);
        Ok(videos)
    }
}

fn initial_data(html: &str) -> Result<Value, SearchError> {
    let captures = INITIAL_DATA
        .captures(html)
        .ok_or_else(|| SearchError::malformed(BACKEND, "results page has no ytInitialData"))?;
    serde_json::from_str(&captures[1])
        .map_err(|e| SearchError::malformed(BACKEND, format!("invalid ytInitialData: {}", e)))
}

/// Videos of one page and the token of the next one.
fn split_sections(sections: Option<&Vec<Value>>) -> (Vec<RawVideo>, Option<String>) {
    let mut videos = Vec::new();
    let mut token = None;
    for section in sections.into_iter().flatten() {
        if let Some(next) = walk_str(section, CONTINUATION_TOKEN) {
            token = Some(next.to_string());
            continue;
        }
        let items = walk!(section, "itemSectionRenderer", "contents").and_then(Value::as_array);
        videos.extend(
            items
                .into_iter()
                .flatten()
                .filter_map(|item| item.get("videoRenderer"))
                .filter_map(parse_video),
        );
    }
    (videos, token)
}

fn parse_video(renderer: &Value) -> Option<RawVideo> {
    let timestamp = walk!(renderer, "lengthText", "simpleText")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Some(RawVideo {
        video_id: renderer.get("videoId")?.as_str()?.to_string(),
        title: walk!(renderer, "title", "runs", 0, "text")?.as_str()?.to_string(),
        author: walk!(renderer, "ownerText", "runs", 0, "text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        timestamp: timestamp.to_string(),
        duration_ms: parse_duration(timestamp),
        views: walk!(renderer, "viewCountText", "simpleText")
            .and_then(Value::as_str)
            .and_then(parse_views),
    })
}

/// "1,234,567 views" -> 1234567. "No views" counts as zero.
pub fn parse_views(text: &str) -> Option<u64> {
    let first = text.split_whitespace().next()?;
    if first.eq_ignore_ascii_case("no") {
        return Some(0);
    }
    first.replace([',', '.'], "").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpPage, MockHttpTransport};

    fn video_renderer(id: &str, title: &str, author: &str, length: &str, views: &str) -> Value {
        json!({ "videoRenderer": {
            "videoId": id,
            "title": { "runs": [{ "text": title }] },
            "ownerText": { "runs": [{ "text": author }] },
            "lengthText": { "simpleText": length },
            "viewCountText": { "simpleText": views }
        } })
    }

    fn continuation(token: &str) -> Value {
        json!({ "continuationItemRenderer": { "continuationEndpoint": {
            "continuationCommand": { "token": token }
        } } })
    }

    fn results_page(items: Vec<Value>, next: Option<&str>) -> String {
        let mut sections = vec![json!({ "itemSectionRenderer": { "contents": items } })];
        sections.extend(next.map(continuation));
        let data = json!({ "contents": { "twoColumnSearchResultsRenderer": { "primaryContents": {
            "sectionListRenderer": { "contents": sections }
        } } } });
        format!(
            r#"<script>ytcfg.set({{"INNERTUBE_API_KEY":"yt-key","INNERTUBE_CLIENT_NAME":"WEB","INNERTUBE_CLIENT_VERSION":"2.0"}});</script>
<script>var ytInitialData = {};</script>"#,
            data
        )
    }

    fn transport_with_page(body: String) -> MockHttpTransport {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_get_page()
            .withf(|url: &str| {
                url.starts_with("https://www.youtube.com/results?search_query=daft+punk")
            })
            .times(1)
            .returning(move |url| {
                Ok(HttpPage {
                    final_url: url.to_string(),
                    body: body.clone(),
                })
            });
        transport
    }

    #[test]
    fn test_parse_views() {
        assert_eq!(parse_views("1,234,567 views"), Some(1_234_567));
        assert_eq!(parse_views("1 view"), Some(1));
        assert_eq!(parse_views("No views"), Some(0));
        assert_eq!(parse_views(""), None);
        assert_eq!(parse_views("views"), None);
    }

    #[tokio::test]
    async fn test_first_page_only() {
        let body = results_page(
            vec![
                video_renderer("abc", "One More Time", "Daft Punk", "5:20", "1,000 views"),
                json!({ "shelfRenderer": {} }),
            ],
            Some("NEXT"),
        );
        let mut transport = transport_with_page(body);
        transport.expect_post_json().never();

        let scraper = YouTubeScraper::new(Arc::new(transport), "https://www.youtube.com/");
        let videos = scraper
            .search_videos("daft punk", PageRange::new(1, 1))
            .await
            .unwrap();

        assert_eq!(
            videos,
            vec![RawVideo {
                video_id: "abc".to_string(),
                title: "One More Time".to_string(),
                author: "Daft Punk".to_string(),
                timestamp: "5:20".to_string(),
                duration_ms: Some(320_000),
                views: Some(1_000),
            }]
        );
    }

    #[tokio::test]
    async fn test_follows_continuation() {
        let body = results_page(
            vec![video_renderer("p1", "Page One", "A", "3:00", "10 views")],
            Some("NEXT"),
        );
        let mut transport = transport_with_page(body);
        transport
            .expect_post_json()
            .withf(|request: &JsonRequest| {
                request.body["continuation"] == "NEXT"
                    && request
                        .query
                        .contains(&("key".to_string(), "yt-key".to_string()))
            })
            .times(1)
            .returning(|_| {
                Ok(json!({ "onResponseReceivedCommands": [{ "appendContinuationItemsAction": {
                    "continuationItems": [
                        { "itemSectionRenderer": { "contents": [
                            video_renderer("p2", "Page Two", "B", "4:00", "No views")
                        ] } }
                    ]
                } }] }))
            });

        let scraper = YouTubeScraper::new(Arc::new(transport), "https://www.youtube.com");
        let videos = scraper
            .search_videos("daft punk", PageRange::new(2, 3))
            .await
            .unwrap();

        // page 1 is skipped, page 3 does not exist
        let ids: Vec<&str> = videos.iter().map(|v| v.video_id.as_str()).collect();
        assert_eq!(ids, vec!["p2"]);
        assert_eq!(videos[0].views, Some(0));
    }

    #[tokio::test]
    async fn test_missing_initial_data() {
        let transport = transport_with_page("<html></html>".to_string());
        let scraper = YouTubeScraper::new(Arc::new(transport), "https://www.youtube.com");
        let error = scraper
            .search_videos("daft punk", PageRange::default())
            .await
            .unwrap_err();
        assert!(matches!(error, SearchError::MalformedResponse { .. }));
    }
}
