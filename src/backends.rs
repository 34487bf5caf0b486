use std::sync::Arc;

use crate::candidate::Candidate;
use crate::error::SearchError;
use crate::query::{SearchArgs, SearchQuery};

/// A source of ranked candidates for a track query.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, SearchError>;
}

/// Validate loose arguments, then search. Nothing is sent if validation fails.
pub async fn search_with(
    backend: &dyn SearchBackend,
    args: SearchArgs,
) -> Result<Vec<Candidate>, SearchError> {
    let query = args.normalize()?;
    backend.search(&query).await
}

/// Ask each backend in turn and return the first non-empty result.
///
/// Failures are logged and skipped. The last one is returned only when no
/// backend succeeded at all.
pub async fn first_non_empty(
    backends: &[Arc<dyn SearchBackend>],
    query: &SearchQuery,
) -> Result<Vec<Candidate>, SearchError> {
    let mut last_error = None;
    let mut any_succeeded = false;

    for backend in backends {
        match backend.search(query).await {
            Ok(candidates) if !candidates.is_empty() => return Ok(candidates),
            Ok(_) => {
                log::debug!("{} found nothing for '{}'", backend.name(), query.track);
                any_succeeded = true;
            }
            Err(e) => {
                log::warn!("{} search failed: {}", backend.name(), e);
                if let Some(body) = e.body() {
                    log::debug!("{} error response: {}", backend.name(), body);
                }
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if !any_succeeded => Err(e),
        _ => Ok(Vec::new()),
    }
}

/// Several backends searched as one, see [`first_non_empty`].
pub struct Fallback {
    backends: Vec<Arc<dyn SearchBackend>>,
}

impl Fallback {
    pub fn new(backends: Vec<Arc<dyn SearchBackend>>) -> Self {
        Self { backends }
    }
}

#[async_trait::async_trait]
impl SearchBackend for Fallback {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, SearchError> {
        first_non_empty(&self.backends, query).await
    }
}
