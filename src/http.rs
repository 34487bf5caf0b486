use std::time::Duration;

use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde_json::Value;

use crate::error::SearchError;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A fetched HTML page together with the URL it finally resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpPage {
    pub final_url: String,
    pub body: String,
}

/// A JSON POST request.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl JsonRequest {
    pub fn new(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }
}

/// Port trait for the HTTP capabilities the backends need.
///
/// Implementations live in [`ReqwestTransport`] (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get_page(&self, url: &str) -> Result<HttpPage, SearchError>;

    async fn post_json(&self, request: JsonRequest) -> Result<Value, SearchError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> reqwest::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }
}

async fn check_status(url: &str, response: Response) -> Result<Response, SearchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.ok();
    log::debug!("Request to {} failed with status {}", url, status);
    Err(SearchError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        body,
    })
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_page(&self, url: &str) -> Result<HttpPage, SearchError> {
        log::debug!("GET {}", url);
        let transport = |source| SearchError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let response = check_status(url, response).await?;
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(transport)?;

        Ok(HttpPage { final_url, body })
    }

    async fn post_json(&self, request: JsonRequest) -> Result<Value, SearchError> {
        log::debug!("POST {} ({} query params)", request.url, request.query.len());
        let url = request.url.as_str();
        let transport = |source| SearchError::Transport {
            url: url.to_string(),
            source,
        };

        let mut builder = self
            .client
            .post(url)
            .query(&request.query)
            .json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(transport)?;
        let response = check_status(url, response).await?;
        response.json::<Value>().await.map_err(transport)
    }
}
