use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A loosely typed argument: callers may pass a duration where a title is expected.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Text(String),
    Number(f64),
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Text(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Text(value)
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        ArgValue::Number(value)
    }
}

impl From<u64> for ArgValue {
    fn from(value: u64) -> Self {
        ArgValue::Number(value as f64)
    }
}

impl From<u32> for ArgValue {
    fn from(value: u32) -> Self {
        ArgValue::Number(value as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArtistsArg {
    One(String),
    Many(Vec<String>),
}

/// Raw search arguments, before the shuffling rules are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchArgs {
    pub artists: Option<ArtistsArg>,
    pub track: Option<ArgValue>,
    pub album: Option<ArgValue>,
    pub duration: Option<f64>,
}

/// A validated search query. Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub artists: Vec<String>,
    pub track: String,
    pub album: String,
    pub duration_ms: Option<u64>,
}

impl SearchArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artist(mut self, artist: impl Into<String>) -> Self {
        self.artists = Some(ArtistsArg::One(artist.into()));
        self
    }

    pub fn artists<I, S>(mut self, artists: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artists = Some(ArtistsArg::Many(
            artists.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn track(mut self, track: impl Into<ArgValue>) -> Self {
        self.track = Some(track.into());
        self
    }

    pub fn album(mut self, album: impl Into<ArgValue>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn duration(mut self, duration_ms: f64) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    /// Apply the argument-shuffling rules and validate the result.
    ///
    /// 1. A numeric `track` becomes the duration and `track` is cleared.
    /// 2. A numeric `album` becomes the duration and `album` is cleared.
    /// 3. A single artist is wrapped into a list when a track is present; otherwise
    ///    it is taken as the track title and the artist list is empty.
    /// 4. The track must end up as a non-empty string.
    pub fn normalize(self) -> Result<SearchQuery, ValidationError> {
        let SearchArgs {
            artists,
            mut track,
            mut album,
            mut duration,
        } = self;

        if let Some(ArgValue::Number(value)) = track {
            duration = Some(value);
            track = None;
        }
        if let Some(ArgValue::Number(value)) = album {
            duration = Some(value);
            album = None;
        }

        let artists = match artists {
            Some(ArtistsArg::Many(artists)) => artists,
            Some(ArtistsArg::One(artist)) if track.is_some() => vec![artist],
            Some(ArtistsArg::One(artist)) => {
                track = Some(ArgValue::Text(artist));
                Vec::new()
            }
            None => Vec::new(),
        };

        let track = match track {
            Some(ArgValue::Text(track)) if !track.trim().is_empty() => track,
            _ => return Err(ValidationError::MissingTrack),
        };
        let album = match album {
            Some(ArgValue::Text(album)) => album,
            _ => String::new(),
        };
        if let Some(index) = artists.iter().position(|a| a.trim().is_empty()) {
            return Err(ValidationError::EmptyArtist { index });
        }
        let duration_ms = match duration {
            Some(value) if value.is_finite() && value >= 0.0 => Some(value.round() as u64),
            Some(value) => return Err(ValidationError::InvalidDuration { value }),
            None => None,
        };

        Ok(SearchQuery {
            artists,
            track,
            album,
            duration_ms,
        })
    }
}

impl SearchQuery {
    /// The free-text query sent to backends: track, album, then artists.
    pub fn joined(&self) -> String {
        std::iter::once(self.track.as_str())
            .chain(std::iter::once(self.album.as_str()))
            .chain(self.artists.iter().map(String::as_str))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
