//! Tavily search client: the production [`SearchProvider`].
//!
//! Uses the `/search` and `/extract` endpoints of the Tavily API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use sgr_research_core::error::SearchError;
use sgr_research_core::research::SourceData;
use sgr_research_core::search::SearchProvider;
use tracing::{debug, warn};

pub struct TavilySearch {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, SearchError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(SearchError::NotConfigured(
                "empty Tavily API key (set search.api_key or TAVILY_API_KEY)".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| SearchError::NotConfigured(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<T, SearchError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), endpoint, "Tavily returned error");
            return Err(SearchError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| SearchError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        include_raw_content: bool,
    ) -> Result<Vec<SourceData>, SearchError> {
        debug!(query, max_results, include_raw_content, "Tavily search");
        let body = json!({
            "query": query,
            "max_results": max_results,
            "include_raw_content": include_raw_content,
        });
        let resp: SearchResponse = self.post("search", body).await?;
        Ok(resp.into_sources())
    }

    async fn extract(&self, urls: &[String]) -> Result<Vec<SourceData>, SearchError> {
        debug!(count = urls.len(), "Tavily extract");
        let resp: ExtractResponse = self.post("extract", json!({ "urls": urls })).await?;
        if !resp.failed_results.is_empty() {
            warn!(failed = resp.failed_results.len(), "Some URLs could not be extracted");
        }
        Ok(resp.into_sources())
    }
}

// --- Tavily API types (internal) ---

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    raw_content: Option<String>,
}

impl SearchResponse {
    fn into_sources(self) -> Vec<SourceData> {
        self.results
            .into_iter()
            .map(|hit| {
                let source = SourceData::new(hit.url, hit.title, hit.content);
                match hit.raw_content {
                    Some(raw) if !raw.is_empty() => source.with_full_content(raw),
                    _ => source,
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    results: Vec<ExtractHit>,
    #[serde(default)]
    failed_results: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ExtractHit {
    url: String,
    #[serde(default)]
    raw_content: String,
}

impl ExtractResponse {
    fn into_sources(self) -> Vec<SourceData> {
        self.results
            .into_iter()
            .map(|hit| {
                let snippet: String = hit.raw_content.chars().take(200).collect();
                SourceData::new(hit.url, None, snippet).with_full_content(hit.raw_content)
            })
            .collect()
    }
}
