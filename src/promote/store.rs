//! HTTP implementation of [`ArtifactStore`].

use crate::config::PromoterConfig;
use crate::promote::search::SearchQuery;
use crate::promote::traits::SearchMatch;
use crate::traits::{ArtifactStore, StoreError, StoreResponse};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

const SEARCH_ENDPOINT: &str = "api/search/aql";

/// Talks to the store's search and copy/move endpoints with one pooled client.
///
/// The authorization header is fixed at construction and shared by every
/// request.
#[derive(Clone)]
pub struct HttpArtifactStore {
    client: Client,
    search_url: String,
}

impl HttpArtifactStore {
    pub fn new(base_url: &Url, token: &str, timeout: Duration) -> Result<Self, StoreError> {
        if token.trim().is_empty() {
            return Err(StoreError::Configuration("store token is empty".into()));
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim())).map_err(|_| {
            StoreError::Configuration("store token contains invalid characters".into())
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            search_url: format!(
                "{}/{}",
                base_url.as_str().trim_end_matches('/'),
                SEARCH_ENDPOINT
            ),
        })
    }

    pub fn from_config(config: &PromoterConfig) -> Result<Self, StoreError> {
        Self::new(&config.store.base_url, &config.store.token, config.timeout())
    }
}

#[derive(Deserialize)]
struct AqlResponse {
    #[serde(default)]
    results: Vec<AqlItem>,
}

#[derive(Deserialize)]
struct AqlItem {
    #[serde(default)]
    repo: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    properties: Vec<AqlProperty>,
}

#[derive(Deserialize)]
struct AqlProperty {
    key: String,
    #[serde(default)]
    value: String,
}

impl From<AqlItem> for SearchMatch {
    fn from(item: AqlItem) -> Self {
        Self {
            repo: item.repo,
            path: item.path,
            name: item.name,
            properties: item
                .properties
                .into_iter()
                .map(|p| (p.key, p.value))
                .collect(),
        }
    }
}

fn send_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout(err.to_string())
    } else {
        StoreError::Transport(err.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let reason = match body.trim() {
        "" => status.canonical_reason().unwrap_or("Unknown").to_string(),
        text => text.to_string(),
    };
    Err(StoreError::Status {
        status: status.as_u16(),
        reason,
    })
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchMatch>, StoreError> {
        let aql = query.to_aql();
        debug!(query = %aql, "Searching store");

        let response = self
            .client
            .post(&self.search_url)
            .header(CONTENT_TYPE, "text/plain")
            .body(aql)
            .send()
            .await
            .map_err(send_error)?;
        let response = check_status(response).await?;

        let body: AqlResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(body.results.into_iter().map(SearchMatch::from).collect())
    }

    async fn transfer(&self, url: &str) -> Result<StoreResponse, StoreError> {
        let response = self.client.post(url).send().await.map_err(send_error)?;
        let response = check_status(response).await?;
        let status = response.status();
        Ok(StoreResponse::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or("OK"),
        ))
    }
}
