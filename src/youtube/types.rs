use serde::{Deserialize, Serialize};

/// One video row of a keyword search results page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawVideo {
    pub video_id: String,
    pub title: String,
    pub author: String,
    /// Length as displayed, e.g. `3:45`. Empty for live streams.
    pub timestamp: String,
    pub duration_ms: Option<u64>,
    pub views: Option<u64>,
}

/// Result pages to collect, 1-based and inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    /// An empty or reversed range collapses to the single page `start`.
    pub fn new(start: u32, end: u32) -> Self {
        let start = start.max(1);
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn contains(&self, page: u32) -> bool {
        (self.start..=self.end).contains(&page)
    }
}

impl Default for PageRange {
    fn default() -> Self {
        Self::new(1, 2)
    }
}

/// The four filter variants run for every query. The empty one is the bare query.
pub const FILTER_KEYWORDS: [&str; 4] = ["Official Audio", "Audio", "Lyrics", ""];
