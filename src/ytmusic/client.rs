use std::future::Future;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use crate::error::{ConfigDerivationError, SearchError};
use crate::http::{HttpTransport, JsonRequest};
use crate::ytmusic::types::BackendConfig;

static YTCFG_SET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ytcfg\.set\s*\(\s*(\{.+?\})\s*\)\s*;").expect("valid ytcfg regex")
});

// ============================================================================
// Config cell
// ============================================================================

/// Lazily derived, force-refreshable value owned by one adapter.
///
/// The lock is never held while deriving. Two callers racing on an empty cell
/// both derive, and the last one to finish wins.
pub struct ConfigCell<T> {
    value: Mutex<Option<Arc<T>>>,
}

impl<T> Default for ConfigCell<T> {
    fn default() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }
}

impl<T> ConfigCell<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn cached(&self) -> Option<Arc<T>> {
        self.value.lock().await.clone()
    }

    /// Return the cached value, deriving and storing it first if the cell is empty.
    pub async fn get_or_derive<F, Fut, E>(&self, derive: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.cached().await {
            return Ok(value);
        }
        self.force_refresh(derive).await
    }

    /// Derive a fresh value and replace whatever is cached.
    ///
    /// A failed derivation leaves the previous value in place.
    pub async fn force_refresh<F, Fut, E>(&self, derive: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let value = Arc::new(derive().await?);
        *self.value.lock().await = Some(value.clone());
        Ok(value)
    }

    pub async fn invalidate(&self) {
        *self.value.lock().await = None;
    }
}

// ============================================================================
// Config derivation
// ============================================================================

/// Pull the client configuration out of the `ytcfg.set({...});` calls of a page.
pub fn extract_client_config(html: &str) -> Result<BackendConfig, ConfigDerivationError> {
    let mut merged = Map::new();
    for captures in YTCFG_SET.captures_iter(html) {
        if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(&captures[1]) {
            merged.extend(object);
        }
    }
    if merged.is_empty() {
        return Err(ConfigDerivationError::MissingConfig);
    }

    let field = |field: &'static str| {
        merged
            .get(field)
            .and_then(|value| match value {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or(ConfigDerivationError::MissingField { field })
    };

    Ok(BackendConfig {
        api_key: field("INNERTUBE_API_KEY")?,
        client_name: field("INNERTUBE_CLIENT_NAME")?,
        client_version: field("INNERTUBE_CLIENT_VERSION")?,
    })
}

/// Fetch the landing page and derive the session parameters from it.
pub async fn derive_config(
    transport: &dyn HttpTransport,
    base_url: &str,
) -> Result<BackendConfig, SearchError> {
    log::debug!("Deriving YouTube Music client config from {}", base_url);
    let page = transport.get_page(&format!("{}/", base_url)).await?;

    if page
        .final_url
        .starts_with(&format!("{}/coming-soon", base_url))
    {
        return Err(ConfigDerivationError::RegionUnavailable {
            final_url: page.final_url,
        }
        .into());
    }

    let config = extract_client_config(&page.body)?;
    log::info!(
        "Derived YouTube Music client config ({} {})",
        config.client_name,
        config.client_version
    );
    Ok(config)
}

// ============================================================================
// Requests
// ============================================================================

/// Language and location sent with every request.
#[derive(Debug, Clone)]
pub struct ClientLocale {
    pub hl: String,
    pub gl: String,
}

/// Extra inputs for one call to the search endpoint.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// Merged into the JSON body (`query`, `params`).
    pub body: Map<String, Value>,
    /// Appended to the query string (continuation tokens).
    pub query: Vec<(String, String)>,
}

impl SearchRequest {
    pub fn for_query(query: &str) -> Self {
        let mut body = Map::new();
        body.insert("query".to_string(), Value::String(query.to_string()));
        Self {
            body,
            ..Default::default()
        }
    }
}

pub fn build_search_request(
    base_url: &str,
    config: &BackendConfig,
    locale: &ClientLocale,
    request: SearchRequest,
) -> JsonRequest {
    let mut body = Map::new();
    body.insert(
        "context".to_string(),
        json!({
            "client": {
                "clientName": config.client_name,
                "clientVersion": config.client_version,
                "hl": locale.hl,
                "gl": locale.gl,
            }
        }),
    );
    body.extend(request.body);

    let mut json_request = JsonRequest::new(
        format!("{}/youtubei/v1/search", base_url),
        Value::Object(body),
    )
    .query("alt", "json")
    .query("key", config.api_key.as_str())
    .query("prettyPrint", "false")
    .header("x-origin", base_url)
    .header("origin", base_url)
    .header("referer", format!("{}/search", base_url));
    json_request.query.extend(request.query);
    json_request
}
