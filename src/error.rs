use thiserror::Error;

use crate::task_queue::QueueClosed;

/// Bad search arguments. Raised before any request is made.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Track title must resolve to a non-empty string")]
    MissingTrack,

    #[error("Artist at position {index} is empty")]
    EmptyArtist { index: usize },

    #[error("Duration must be a finite, non-negative number of milliseconds (got {value})")]
    InvalidDuration { value: f64 },
}

/// Failed to derive the session parameters of a backend from its landing page.
#[derive(Debug, Error)]
pub enum ConfigDerivationError {
    #[error("Backend is not available in your region (redirected to {final_url})")]
    RegionUnavailable { final_url: String },

    #[error("Landing page did not contain an embedded client configuration")]
    MissingConfig,

    #[error("Embedded client configuration is missing `{field}`")]
    MissingField { field: &'static str },
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigDerivationError),

    #[error("Failed to send request to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} failed with status {status} {status_text}")]
    Status {
        url: String,
        status: u16,
        status_text: String,
        body: Option<String>,
    },

    #[error("Unexpected response from {backend}: {reason}")]
    MalformedResponse { backend: &'static str, reason: String },

    #[error(transparent)]
    QueueClosed(#[from] QueueClosed),

    #[error("{0}")]
    Other(String),
}

impl SearchError {
    pub fn malformed(backend: &'static str, reason: impl Into<String>) -> Self {
        SearchError::MalformedResponse {
            backend,
            reason: reason.into(),
        }
    }

    /// HTTP status code of the failed response, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            SearchError::Status { status, .. } => Some(*status),
            SearchError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Body of a non-success response, when one was read.
    pub fn body(&self) -> Option<&str> {
        match self {
            SearchError::Status { body, .. } => body.as_deref(),
            _ => None,
        }
    }
}
