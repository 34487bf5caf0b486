use serde::{Deserialize, Serialize};

use crate::candidate::CandidateKind;

/// Session parameters scraped from the YouTube Music landing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub api_key: String,
    pub client_name: String,
    pub client_version: String,
}

/// The named group a search result was listed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShelfKind {
    TopResult,
    Songs,
    Videos,
    Albums,
    Artists,
    Playlists,
    Unrecognized(String),
}

/// Shelf titles as YouTube Music renders them (with `hl=en`).
const SHELF_LABELS: &[(&str, ShelfKind)] = &[
    ("Top result", ShelfKind::TopResult),
    ("Songs", ShelfKind::Songs),
    ("Videos", ShelfKind::Videos),
    ("Albums", ShelfKind::Albums),
    ("Artists", ShelfKind::Artists),
    ("Playlists", ShelfKind::Playlists),
    ("Community playlists", ShelfKind::Playlists),
    ("Featured playlists", ShelfKind::Playlists),
];

impl ShelfKind {
    pub fn from_label(label: &str) -> Self {
        SHELF_LABELS
            .iter()
            .find(|(known, _)| *known == label)
            .map(|(_, kind)| kind.clone())
            .unwrap_or_else(|| ShelfKind::Unrecognized(label.to_string()))
    }

    /// The item kind every entry of this shelf has, if the shelf is not mixed.
    pub fn item_kind(&self) -> Option<CandidateKind> {
        match self {
            ShelfKind::Songs => Some(CandidateKind::Song),
            ShelfKind::Videos => Some(CandidateKind::Video),
            ShelfKind::Albums => Some(CandidateKind::Album),
            ShelfKind::Artists => Some(CandidateKind::Artist),
            ShelfKind::Playlists => Some(CandidateKind::Playlist),
            ShelfKind::TopResult | ShelfKind::Unrecognized(_) => None,
        }
    }
}

/// A named link to another YouTube Music page (artist, album).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavRef {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemDetails {
    Track {
        video_id: String,
        artists: Vec<NavRef>,
        album: Option<NavRef>,
        duration: String,
        duration_ms: Option<u64>,
    },
    Album {
        browse_id: String,
        artists: Vec<NavRef>,
        album_type: Option<String>,
        year: Option<String>,
    },
    Artist {
        browse_id: String,
        subscribers: Option<String>,
    },
    Playlist {
        browse_id: String,
        author: Option<String>,
        track_count: Option<u32>,
    },
}

/// One raw search result, before scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    pub kind: CandidateKind,
    /// Track/album/playlist title, or the artist name for artists.
    pub title: String,
    pub details: ItemDetails,
}

/// Opaque handle to the next page of a shelf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken {
    pub shelf: ShelfKind,
    pub continuation: String,
    pub click_tracking_params: Option<String>,
}

/// Opaque handle to the full listing behind a shelf's "show all" link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionDescriptor {
    pub shelf: ShelfKind,
    pub query: String,
    pub params: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shelf {
    pub kind: ShelfKind,
    pub items: Vec<RawItem>,
    pub continuation: Option<ContinuationToken>,
    pub expansion: Option<ExpansionDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub shelves: Vec<Shelf>,
}

#[cfg(test)]
impl SearchResults {
    pub fn shelf(&self, kind: &ShelfKind) -> Option<&Shelf> {
        self.shelves.iter().find(|shelf| &shelf.kind == kind)
    }
}
