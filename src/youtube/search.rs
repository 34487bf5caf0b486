use std::sync::Arc;

use crate::candidate::{Candidate, CandidateKind, FeedHandle, FeedResolver};
use crate::query::SearchQuery;
use crate::ranking::{
    YOUTUBE_WEIGHT_THRESHOLD, dedup_and_rank, duration_penalty, youtube_accuracy,
};
use crate::text::{get_weight, strip_text};
use crate::youtube::types::{FILTER_KEYWORDS, RawVideo};

/// Tokens every video title is matched against: track and artists.
pub fn query_tokens(query: &SearchQuery) -> Vec<String> {
    strip_text(
        std::iter::once(query.track.as_str()).chain(query.artists.iter().map(String::as_str)),
    )
}

/// One search string per filter keyword, in [`FILTER_KEYWORDS`] order.
///
/// The keyword is normalized together with the query tokens.
pub fn variant_queries(query: &SearchQuery) -> Vec<String> {
    let base = query_tokens(query);
    FILTER_KEYWORDS
        .iter()
        .map(|keyword| {
            strip_text(base.iter().map(String::as_str).chain(std::iter::once(*keyword))).join(" ")
        })
        .collect()
}

/// The videos of one variant that match the query well enough.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantMatches {
    pub videos: Vec<RawVideo>,
    /// Highest view count among `videos`. Unknown counts are zero.
    pub max_views: u64,
}

pub fn filter_variant(videos: Vec<RawVideo>, expected: &[String]) -> VariantMatches {
    let videos: Vec<RawVideo> = videos
        .into_iter()
        .filter(|video| {
            let actual = strip_text([video.title.as_str(), video.author.as_str()]);
            get_weight(expected, &actual) > YOUTUBE_WEIGHT_THRESHOLD
        })
        .collect();
    let max_views = videos
        .iter()
        .map(|video| video.views.unwrap_or(0))
        .max()
        .unwrap_or(0);

    VariantMatches { videos, max_views }
}

/// Score every kept video against its own variant's view count, then deduplicate.
pub fn rank_variants(
    variants: Vec<VariantMatches>,
    query: &SearchQuery,
    resolver: &Arc<dyn FeedResolver>,
) -> Vec<Candidate> {
    let artists = strip_text(&query.artists);

    let candidates = variants.into_iter().flat_map(|variant| {
        let max_views = variant.max_views;
        let artists = &artists;
        variant.videos.into_iter().map(move |video| {
            let penalty = duration_penalty(query.duration_ms, video.duration_ms.unwrap_or(0));
            let author_weight = get_weight(artists, &strip_text([video.author.as_str()]));
            let accuracy = youtube_accuracy(
                penalty,
                video.views.unwrap_or(0),
                max_views,
                author_weight,
            );
            log::debug!(
                "YouTube '{}' by '{}': author weight {:.1}, accuracy {:.1}",
                video.title,
                video.author,
                author_weight,
                accuracy
            );

            Candidate {
                feeds: FeedHandle::new(video.video_id.as_str(), resolver.clone()),
                title: video.title,
                kind: CandidateKind::Video,
                author: video.author,
                duration: video.timestamp,
                duration_ms: video.duration_ms.unwrap_or(0),
                source_id: video.video_id,
                accuracy,
            }
        })
    });

    dedup_and_rank(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::WatchPageResolver;

    fn video(id: &str, title: &str, author: &str, views: Option<u64>) -> RawVideo {
        RawVideo {
            video_id: id.to_string(),
            title: title.to_string(),
            author: author.to_string(),
            timestamp: "5:20".to_string(),
            duration_ms: Some(320_000),
            views,
        }
    }

    fn query() -> SearchQuery {
        SearchQuery {
            artists: vec!["Daft Punk".to_string()],
            track: "One More Time".to_string(),
            album: "Discovery".to_string(),
            duration_ms: Some(320_000),
        }
    }

    #[test]
    fn test_variant_queries() {
        assert_eq!(
            variant_queries(&query()),
            vec![
                "one more time daft punk official audio",
                "one more time daft punk audio",
                "one more time daft punk lyrics",
                "one more time daft punk",
            ]
        );
    }

    #[test]
    fn test_variant_keyword_already_in_title() {
        let mut query = query();
        query.track = "Audio Lyrics".to_string();
        query.artists.clear();
        assert_eq!(
            variant_queries(&query),
            vec![
                "audio lyrics official",
                "audio lyrics",
                "audio lyrics",
                "audio lyrics",
            ]
        );
    }

    #[test]
    fn test_filter_variant_by_weight() {
        let expected = query_tokens(&query());
        let matches = filter_variant(
            vec![
                video("a", "Daft Punk - One More Time (Official Audio)", "Daft Punk", Some(500)),
                video("b", "One More Time", "Daft Punk - Topic", None),
                video("c", "Harder Better Faster Stronger", "Daft Punk", Some(9_000)),
            ],
            &expected,
        );

        let ids: Vec<&str> = matches.videos.iter().map(|v| v.video_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        // the unrelated video's views do not count
        assert_eq!(matches.max_views, 500);
    }

    #[test]
    fn test_rank_prefers_popular_artist_uploads() {
        let resolver: Arc<dyn FeedResolver> =
            Arc::new(WatchPageResolver::new("https://www.youtube.com"));
        let variant = VariantMatches {
            videos: vec![
                video("cover", "One More Time Daft Punk", "Someone Else", Some(100)),
                video("official", "One More Time", "Daft Punk", Some(1_000)),
            ],
            max_views: 1_000,
        };

        let mut query = query();
        query.duration_ms = Some(300_000);

        let ranked = rank_variants(vec![variant.clone(), variant], &query, &resolver);
        let ids: Vec<&str> = ranked.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(ids, vec!["official", "cover"]);
        assert!(ranked.iter().all(|c| c.kind == CandidateKind::Video));
        assert!(ranked[0].accuracy > ranked[1].accuracy);
    }

    #[test]
    fn test_rank_without_artists() {
        let resolver: Arc<dyn FeedResolver> =
            Arc::new(WatchPageResolver::new("https://www.youtube.com"));
        let mut query = query();
        query.artists.clear();
        query.duration_ms = None;
        let variant = VariantMatches {
            videos: vec![video("x", "One More Time", "Daft Punk", None)],
            max_views: 0,
        };

        let ranked = rank_variants(vec![variant], &query, &resolver);
        // neutral duration penalty, no views, no author match
        assert_eq!(ranked[0].accuracy, 50.0);
    }
}
