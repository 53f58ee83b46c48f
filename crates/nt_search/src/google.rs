use std::fmt;

use async_trait::async_trait;
use nt_core::{Result, SearchError, SearchResult};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::{SearchConfig, SearchProvider};

const GOOGLE_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    display_link: String,
}

/// Google Custom Search JSON API client.
pub struct GoogleSearchProvider {
    client: Client,
    api_key: String,
    engine_id: String,
    base_url: String,
    results_per_query: u8,
}

impl GoogleSearchProvider {
    pub fn new(api_key: impl Into<String>, engine_id: impl Into<String>, config: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            base_url: GOOGLE_SEARCH_URL.to_string(),
            results_per_query: config.results_per_query.clamp(1, 10),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl fmt::Debug for GoogleSearchProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleSearchProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("engine_id", &self.engine_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl SearchProvider for GoogleSearchProvider {
    fn name(&self) -> &str {
        "Google"
    }

    async fn search(&self, query: &str, country: Option<&str>) -> std::result::Result<Vec<SearchResult>, SearchError> {
        let num = self.results_per_query.to_string();
        let mut request = self.client.get(&self.base_url).query(&[
            ("key", self.api_key.as_str()),
            ("cx", self.engine_id.as_str()),
            ("q", query),
            ("num", num.as_str()),
        ]);
        if let Some(country) = country.map(str::trim).filter(|c| !c.is_empty()) {
            request = request.query(&[("gl", country)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SearchError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        parse_response(&body)
    }
}

pub(crate) fn parse_response(body: &str) -> std::result::Result<Vec<SearchResult>, SearchError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| SearchError::Decode(e.to_string()))?;
    Ok(response
        .items
        .into_iter()
        .filter(|item| !item.link.trim().is_empty())
        .map(|item| SearchResult {
            title: item.title,
            link: item.link,
            snippet: item.snippet,
            display_link: item.display_link,
        })
        .collect())
}
