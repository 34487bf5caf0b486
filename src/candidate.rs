use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    Song,
    Video,
    Album,
    Artist,
    Playlist,
    Other(String),
}

impl CandidateKind {
    /// Classify a free-form type label such as "Song" or "Single".
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "song" => CandidateKind::Song,
            "video" => CandidateKind::Video,
            "album" | "single" | "ep" => CandidateKind::Album,
            "artist" => CandidateKind::Artist,
            "playlist" => CandidateKind::Playlist,
            other => CandidateKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateKind::Song => f.write_str("song"),
            CandidateKind::Video => f.write_str("video"),
            CandidateKind::Album => f.write_str("album"),
            CandidateKind::Artist => f.write_str("artist"),
            CandidateKind::Playlist => f.write_str("playlist"),
            CandidateKind::Other(label) => write!(f, "other({label})"),
        }
    }
}

/// Playable feed metadata for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedInfo {
    pub source_id: String,
    pub url: String,
}

/// Resolves a source identifier into playable feed metadata.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait FeedResolver: Send + Sync {
    async fn get_feeds(&self, source_id: &str) -> Result<FeedInfo, SearchError>;
}

/// Resolves every source to its canonical watch page.
pub struct WatchPageResolver {
    base_url: String,
}

impl WatchPageResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl FeedResolver for WatchPageResolver {
    async fn get_feeds(&self, source_id: &str) -> Result<FeedInfo, SearchError> {
        Ok(FeedInfo {
            source_id: source_id.to_string(),
            url: format!(
                "{}/watch?v={}",
                self.base_url,
                urlencoding::encode(source_id)
            ),
        })
    }
}

/// Lazily invokable feed lookup bound to one candidate's source.
#[derive(Clone)]
pub struct FeedHandle {
    source_id: String,
    resolver: Arc<dyn FeedResolver>,
}

impl FeedHandle {
    pub fn new(source_id: impl Into<String>, resolver: Arc<dyn FeedResolver>) -> Self {
        Self {
            source_id: source_id.into(),
            resolver,
        }
    }

    pub async fn resolve(&self) -> Result<FeedInfo, SearchError> {
        log::debug!("Resolving feeds for source '{}'", self.source_id);
        self.resolver.get_feeds(&self.source_id).await
    }
}

impl fmt::Debug for FeedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedHandle")
            .field("source_id", &self.source_id)
            .finish_non_exhaustive()
    }
}

/// A ranked, backend-independent search result.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: CandidateKind,
    pub author: String,
    /// Human readable duration as reported by the backend, e.g. `5:20`.
    pub duration: String,
    pub duration_ms: u64,
    pub source_id: String,
    /// 0–100 confidence that this candidate matches the query.
    pub accuracy: f64,
    #[serde(skip)]
    pub feeds: FeedHandle,
}

impl Candidate {
    pub async fn get_feeds(&self) -> Result<FeedInfo, SearchError> {
        self.feeds.resolve().await
    }
}

/// Parse `m:ss` / `h:mm:ss` into milliseconds.
pub fn parse_duration(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    let seconds = parts.iter().try_fold(0u64, |total, part| {
        part.trim().parse::<u64>().ok().map(|value| total * 60 + value)
    })?;
    Some(seconds * 1000)
}

/// Format milliseconds the way backends display them (`m:ss` or `h:mm:ss`).
pub fn format_duration(duration_ms: u64) -> String {
    let total = duration_ms / 1000;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
