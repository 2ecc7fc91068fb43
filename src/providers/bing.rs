//! Bing Web Search API provider

use super::traits::*;
use crate::config::ProviderConfig;
use crate::error::{InvalidResponse, ProviderError, ProviderResult};
use crate::network::{HttpClient, Pacer};
use crate::results::SearchResult;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://api.bing.microsoft.com/v7.0/search";

/// Subscription key header used for authentication
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// The API returns at most 50 web pages per request
pub const MAX_RESULTS_PER_REQUEST: usize = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BingResponse {
    /// Absent when the query has no web hits
    web_pages: Option<WebPages>,
}

#[derive(Debug, Deserialize)]
struct WebPages {
    #[serde(default)]
    value: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WebPage {
    name: String,
    url: String,
    #[serde(default)]
    snippet: String,
}

/// Bing Web Search provider
pub struct BingWebSearch {
    config: ProviderConfig,
    client: HttpClient,
    pacer: Pacer,
}

impl BingWebSearch {
    pub fn new(config: ProviderConfig) -> reqwest::Result<Self> {
        let client = HttpClient::for_provider(&config)?;
        let pacer = Pacer::per_minute(config.rate_limit_per_minute);
        Ok(Self {
            config,
            client,
            pacer,
        })
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    fn request(&self, query: &str, num_results: usize) -> ProviderResult<ProviderRequest> {
        let key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::unavailable(self.name(), "missing api key"))?;

        let count = num_results.min(MAX_RESULTS_PER_REQUEST);
        let mut request = ProviderRequest::get(self.endpoint())
            .header(KEY_HEADER, key)
            .header("Accept", "application/json")
            .param("q", query)
            .param("count", count.to_string())
            .param("responseFilter", "Webpages");

        if let Some(market) = self.config.param_str("market") {
            request = request.param("mkt", market);
        }

        Ok(request)
    }

    fn parse_results(
        &self,
        query: &str,
        response: &ProviderResponse,
        num_results: usize,
    ) -> ProviderResult<Vec<SearchResult>> {
        let body: BingResponse = response.json(self.name())?;
        let pages = body.web_pages.map(|p| p.value).unwrap_or_default();

        pages
            .into_iter()
            .take(num_results)
            .map(|raw| {
                let page: WebPage = serde_json::from_value(raw.clone()).map_err(|e| {
                    ProviderError::invalid(
                        self.name(),
                        InvalidResponse::Malformed(format!("web page: {e}")),
                    )
                })?;
                Ok(SearchResult::new(
                    clean_text(&page.name),
                    page.url,
                    clean_text(&page.snippet),
                    query,
                    self.name(),
                )
                .with_raw_data(raw))
            })
            .collect()
    }
}

#[async_trait]
impl SearchProvider for BingWebSearch {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn is_available(&self) -> bool {
        self.config.enabled && self.config.has_api_key()
    }

    async fn search(&self, query: &str, num_results: usize) -> ProviderResult<Vec<SearchResult>> {
        if !self.config.enabled {
            return Err(ProviderError::unavailable(self.name(), "provider is disabled"));
        }
        if !self.config.has_api_key() {
            return Err(ProviderError::unavailable(self.name(), "missing api key"));
        }
        if num_results == 0 {
            return Ok(Vec::new());
        }

        let request = self.request(query, num_results)?;
        self.pacer.wait(self.name()).await;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| ProviderError::request_failed(self.name(), e))?
            .error_for_status(self.name())?;

        let results = self.parse_results(query, &response, num_results)?;
        debug!(provider = %self.name(), "parsed {} results", results.len());
        Ok(results)
    }
}
