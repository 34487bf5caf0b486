use std::sync::Arc;

use serde_json::Value;

use crate::candidate::{Candidate, CandidateKind, FeedHandle, FeedResolver, parse_duration};
use crate::query::SearchQuery;
use crate::ranking::{
    YTMUSIC_ACCURACY_THRESHOLD, YTMUSIC_WEIGHT_THRESHOLD, dedup_and_rank, duration_penalty,
    ytmusic_accuracy,
};
use crate::text::{get_weight, strip_text};
use crate::tree_path::{Segment, walk, walk_array, walk_str};
use crate::ytmusic::types::{
    ContinuationToken, ExpansionDescriptor, ItemDetails, NavRef, RawItem, SearchResults, Shelf,
    ShelfKind,
};

/// Browse ids of artist channels start with this.
const CHANNEL_ID_PREFIX: &str = "UC";
const RUN_SEPARATOR: &str = " • ";

// ============================================================================
// Paths
// ============================================================================

const SECTION_LIST: &[Segment] = &[
    Segment::Key("contents"),
    Segment::Key("tabbedSearchResultsRenderer"),
    Segment::Key("tabs"),
    Segment::Index(0),
    Segment::Key("tabRenderer"),
    Segment::Key("content"),
    Segment::Key("sectionListRenderer"),
    Segment::Key("contents"),
];
const SHELF_CONTINUATION: &[Segment] = &[
    Segment::Key("continuationContents"),
    Segment::Key("musicShelfContinuation"),
];
const TITLE_TEXT: &[Segment] = &[
    Segment::Key("title"),
    Segment::Key("runs"),
    Segment::Index(0),
    Segment::Key("text"),
];
const NEXT_CONTINUATION: &[Segment] = &[
    Segment::Key("continuations"),
    Segment::Index(0),
    Segment::Key("nextContinuationData"),
];
const SEARCH_ENDPOINT: &[Segment] = &[
    Segment::Key("bottomEndpoint"),
    Segment::Key("searchEndpoint"),
];
const PLAY_VIDEO_ID: &[Segment] = &[
    Segment::Key("overlay"),
    Segment::Key("musicItemThumbnailOverlayRenderer"),
    Segment::Key("content"),
    Segment::Key("musicPlayButtonRenderer"),
    Segment::Key("playNavigationEndpoint"),
    Segment::Key("watchEndpoint"),
    Segment::Key("videoId"),
];
const BROWSE_ID: &[Segment] = &[
    Segment::Key("navigationEndpoint"),
    Segment::Key("browseEndpoint"),
    Segment::Key("browseId"),
];
const WATCH_VIDEO_ID: &[Segment] = &[
    Segment::Key("navigationEndpoint"),
    Segment::Key("watchEndpoint"),
    Segment::Key("videoId"),
];
const CARD_LABEL: &[Segment] = &[
    Segment::Key("header"),
    Segment::Key("musicCardShelfHeaderBasicRenderer"),
    Segment::Key("title"),
    Segment::Key("runs"),
    Segment::Index(0),
    Segment::Key("text"),
];
const CARD_SUBTITLE_RUNS: &[Segment] = &[Segment::Key("subtitle"), Segment::Key("runs")];

fn column_runs(item: &Value, column: usize) -> &[Value] {
    walk!(
        item,
        "flexColumns",
        column,
        "musicResponsiveListItemFlexColumnRenderer",
        "text",
        "runs"
    )
    .and_then(Value::as_array)
    .map(Vec::as_slice)
    .unwrap_or_default()
}

// ============================================================================
// Shelf parsing
// ============================================================================

struct Run<'v> {
    text: &'v str,
    browse_id: Option<&'v str>,
}

impl Run<'_> {
    fn nav_ref(&self) -> Option<NavRef> {
        self.browse_id.map(|id| NavRef {
            name: self.text.to_string(),
            id: id.to_string(),
        })
    }

    fn is_channel(&self) -> bool {
        self.browse_id
            .is_some_and(|id| id.starts_with(CHANNEL_ID_PREFIX))
    }
}

fn detail_runs(item: &Value) -> Vec<Run<'_>> {
    text_runs(column_runs(item, 1))
}

fn text_runs(runs: &[Value]) -> Vec<Run<'_>> {
    runs.iter()
        .filter_map(|run| {
            let text = run.get("text")?.as_str()?;
            (text != RUN_SEPARATOR).then(|| Run {
                text,
                browse_id: walk_str(run, BROWSE_ID),
            })
        })
        .collect()
}

/// Parse a full search response into its shelves.
///
/// `fallback` names shelves that come without a title (filtered searches).
pub fn parse_search_response(response: &Value, fallback: Option<&ShelfKind>) -> SearchResults {
    let shelves = walk_array(response, SECTION_LIST)
        .map(|sections| {
            sections
                .iter()
                .filter(|section| section.get("itemSectionRenderer").is_none())
                .map(|section| {
                    if let Some(card) = section.get("musicCardShelfRenderer") {
                        return parse_card_shelf(card);
                    }
                    let shelf = section.get("musicShelfRenderer").unwrap_or(section);
                    let kind = match (walk_str(shelf, TITLE_TEXT), fallback) {
                        (Some(label), _) => ShelfKind::from_label(label),
                        (None, Some(fallback)) => fallback.clone(),
                        (None, None) => {
                            log::debug!("Search section without a recognised shelf title");
                            ShelfKind::Unrecognized(String::new())
                        }
                    };
                    parse_shelf(shelf, kind)
                })
                .collect()
        })
        .unwrap_or_default();

    SearchResults { shelves }
}

/// Parse the response to a continuation request. It continues the shelf `kind`.
pub fn parse_continuation_response(response: &Value, kind: ShelfKind) -> Option<Shelf> {
    walk(response, SHELF_CONTINUATION).map(|shelf| parse_shelf(shelf, kind))
}

pub fn parse_shelf(shelf: &Value, kind: ShelfKind) -> Shelf {
    let items = shelf
        .get("contents")
        .and_then(Value::as_array)
        .map(|contents| {
            contents
                .iter()
                .filter_map(|entry| entry.get("musicResponsiveListItemRenderer"))
                .filter_map(|item| parse_item(item, &kind))
                .collect()
        })
        .unwrap_or_default();

    let continuation = walk(shelf, NEXT_CONTINUATION).and_then(|data| {
        Some(ContinuationToken {
            shelf: kind.clone(),
            continuation: data.get("continuation")?.as_str()?.to_string(),
            click_tracking_params: data
                .get("clickTrackingParams")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    });

    let expansion = walk(shelf, SEARCH_ENDPOINT).and_then(|endpoint| {
        Some(ExpansionDescriptor {
            shelf: kind.clone(),
            query: endpoint.get("query")?.as_str()?.to_string(),
            params: endpoint
                .get("params")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    });

    Shelf {
        kind,
        items,
        continuation,
        expansion,
    }
}

/// The highlighted top result card: one featured item followed by related list
/// items. Cards carry no continuation or expansion.
fn parse_card_shelf(card: &Value) -> Shelf {
    let kind = walk_str(card, CARD_LABEL)
        .map(ShelfKind::from_label)
        .unwrap_or(ShelfKind::TopResult);

    let related = card
        .get("contents")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(|entry| entry.get("musicResponsiveListItemRenderer"))
        .filter_map(|item| parse_item(item, &kind));
    let items = parse_card_item(card, &kind).into_iter().chain(related).collect();

    Shelf {
        kind,
        items,
        continuation: None,
        expansion: None,
    }
}

fn parse_card_item(card: &Value, shelf: &ShelfKind) -> Option<RawItem> {
    let title_run = walk!(card, "title", "runs", 0)?;
    let title = title_run.get("text").and_then(Value::as_str)?.to_string();
    let subtitle = walk_array(card, CARD_SUBTITLE_RUNS)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let ids = ItemIds {
        video_id: walk_str(title_run, WATCH_VIDEO_ID),
        browse_id: walk_str(title_run, BROWSE_ID),
    };
    classify_item(title, &text_runs(subtitle), ids, shelf)
}

// Where an item can be opened from. Which one is required depends on its kind.
struct ItemIds<'v> {
    video_id: Option<&'v str>,
    browse_id: Option<&'v str>,
}

/// Classify and extract one `musicResponsiveListItemRenderer`.
///
/// Returns `None` for unknown kinds and for items missing the id their kind
/// needs to be opened later.
pub fn parse_item(item: &Value, shelf: &ShelfKind) -> Option<RawItem> {
    let title = walk!(
        item,
        "flexColumns",
        0,
        "musicResponsiveListItemFlexColumnRenderer",
        "text",
        "runs",
        0,
        "text"
    )
    .and_then(Value::as_str)?
    .to_string();

    let ids = ItemIds {
        video_id: walk_str(item, PLAY_VIDEO_ID),
        browse_id: walk_str(item, BROWSE_ID),
    };
    classify_item(title, &detail_runs(item), ids, shelf)
}

fn classify_item(
    title: String,
    runs: &[Run<'_>],
    ids: ItemIds<'_>,
    shelf: &ShelfKind,
) -> Option<RawItem> {
    let label = runs.first().map(|run| CandidateKind::from_label(run.text));
    let kind = match shelf.item_kind() {
        Some(kind) => kind,
        None => label.clone()?,
    };
    // Mixed shelves lead the details with the type label.
    let details = if label.as_ref() == Some(&kind) {
        &runs[1..]
    } else {
        &runs[..]
    };

    let details = match &kind {
        CandidateKind::Song | CandidateKind::Video => track_details(ids.video_id?, details),
        CandidateKind::Album => ItemDetails::Album {
            browse_id: ids.browse_id?.to_string(),
            artists: details
                .iter()
                .filter(|run| run.is_channel())
                .filter_map(Run::nav_ref)
                .collect(),
            album_type: runs
                .first()
                .filter(|run| CandidateKind::from_label(run.text) == CandidateKind::Album)
                .map(|run| run.text.to_string()),
            year: details
                .last()
                .filter(|run| run.text.len() == 4 && run.text.chars().all(|c| c.is_ascii_digit()))
                .map(|run| run.text.to_string()),
        },
        CandidateKind::Artist => ItemDetails::Artist {
            browse_id: ids.browse_id?.to_string(),
            subscribers: details
                .iter()
                .find(|run| run.text.contains("subscriber"))
                .and_then(|run| run.text.split_whitespace().next())
                .map(str::to_string),
        },
        CandidateKind::Playlist => {
            let count = details.iter().rposition(|run| leading_count(run.text).is_some());
            ItemDetails::Playlist {
                browse_id: ids.browse_id?.to_string(),
                author: details
                    .iter()
                    .enumerate()
                    .find(|(index, _)| Some(*index) != count)
                    .map(|(_, run)| run.text.to_string()),
                track_count: count.and_then(|index| leading_count(details[index].text)),
            }
        }
        CandidateKind::Other(label) => {
            log::debug!("Skipping '{}' of unsupported type '{}'", title, label);
            return None;
        }
    };

    Some(RawItem {
        kind,
        title,
        details,
    })
}

fn track_details(video_id: &str, runs: &[Run<'_>]) -> ItemDetails {
    let video_id = video_id.to_string();

    let mut artists: Vec<NavRef> = runs
        .iter()
        .filter(|run| run.is_channel())
        .filter_map(Run::nav_ref)
        .collect();
    let album = runs
        .iter()
        .find(|run| run.browse_id.is_some() && !run.is_channel())
        .and_then(Run::nav_ref);

    let duration_run = runs.last().filter(|run| parse_duration(run.text).is_some());
    let duration = duration_run.map(|run| run.text.to_string()).unwrap_or_default();

    // Uploads without an artist page name the uploader in plain text.
    if artists.is_empty()
        && let Some(run) = runs
            .iter()
            .find(|run| run.browse_id.is_none() && parse_duration(run.text).is_none())
    {
        artists.push(NavRef {
            name: run.text.to_string(),
            id: String::new(),
        });
    }

    ItemDetails::Track {
        video_id,
        artists,
        album,
        duration_ms: parse_duration(&duration),
        duration,
    }
}

// "1,234 songs" -> 1234
fn leading_count(text: &str) -> Option<u32> {
    let first = text.split_whitespace().next()?;
    if text.split_whitespace().count() < 2 {
        return None;
    }
    first.replace(',', "").parse().ok()
}

// ============================================================================
// Ranking
// ============================================================================

impl RawItem {
    /// Id the candidate is played or opened by.
    pub fn source_id(&self) -> &str {
        match &self.details {
            ItemDetails::Track { video_id, .. } => video_id.as_str(),
            ItemDetails::Album { browse_id, .. }
            | ItemDetails::Artist { browse_id, .. }
            | ItemDetails::Playlist { browse_id, .. } => browse_id.as_str(),
        }
    }

    pub fn artist_names(&self) -> Vec<&str> {
        match &self.details {
            ItemDetails::Track { artists, .. } | ItemDetails::Album { artists, .. } => {
                artists.iter().map(|artist| artist.name.as_str()).collect()
            }
            ItemDetails::Artist { .. } => vec![self.title.as_str()],
            ItemDetails::Playlist { author, .. } => author.iter().map(String::as_str).collect(),
        }
    }

    fn duration(&self) -> (&str, u64) {
        match &self.details {
            ItemDetails::Track {
                duration,
                duration_ms,
                ..
            } => (duration.as_str(), duration_ms.unwrap_or(0)),
            _ => ("", 0),
        }
    }
}

/// Score the top result, song and video shelves against `query`.
///
/// Items must clear the text weight threshold to be scored at all, and the
/// accuracy threshold to be kept.
pub fn rank_results(
    results: &SearchResults,
    query: &SearchQuery,
    resolver: &Arc<dyn FeedResolver>,
) -> Vec<Candidate> {
    let expected = strip_text(
        std::iter::once(query.track.as_str()).chain(query.artists.iter().map(String::as_str)),
    );

    let candidates = results
        .shelves
        .iter()
        .filter(|shelf| {
            matches!(
                shelf.kind,
                ShelfKind::TopResult | ShelfKind::Songs | ShelfKind::Videos
            )
        })
        .flat_map(|shelf| &shelf.items)
        .filter_map(|item| {
            let artists = item.artist_names();
            let actual =
                strip_text(std::iter::once(item.title.as_str()).chain(artists.iter().copied()));
            let weight = get_weight(&expected, &actual);
            if weight <= YTMUSIC_WEIGHT_THRESHOLD {
                return None;
            }

            let (duration, duration_ms) = item.duration();
            let penalty = duration_penalty(query.duration_ms, duration_ms);
            let accuracy = ytmusic_accuracy(weight, penalty, &item.kind);
            log::debug!(
                "YouTube Music '{}' ({}): weight {:.1}, accuracy {:.1}",
                item.title,
                item.kind,
                weight,
                accuracy
            );
            if accuracy <= YTMUSIC_ACCURACY_THRESHOLD {
                return None;
            }

            Some(Candidate {
                title: item.title.clone(),
                kind: item.kind.clone(),
                author: artists.join(", "),
                duration: duration.to_string(),
                duration_ms,
                source_id: item.source_id().to_string(),
                accuracy,
                feeds: FeedHandle::new(item.source_id(), resolver.clone()),
            })
        });

    dedup_and_rank(candidates)
}
