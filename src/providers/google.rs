//! Google Programmable Search (Custom Search JSON API) provider

use super::traits::*;
use crate::config::ProviderConfig;
use crate::error::{InvalidResponse, ProviderError, ProviderResult};
use crate::network::{HttpClient, Pacer};
use crate::results::SearchResult;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// The API returns at most 10 items per request
pub const MAX_RESULTS_PER_REQUEST: usize = 10;

#[derive(Debug, Deserialize)]
struct CseResponse {
    /// Absent when the query has no hits
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CseItem {
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Google Custom Search provider, authenticated with an API key plus a
/// search engine id (`cx`)
pub struct GoogleCustomSearch {
    config: ProviderConfig,
    client: HttpClient,
    pacer: Pacer,
}

impl GoogleCustomSearch {
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

    fn unavailable_reason(&self) -> Option<&'static str> {
        if !self.config.enabled {
            Some("provider is disabled")
        } else if !self.config.has_api_key() {
            Some("missing api key")
        } else if self.config.engine_id().is_none() {
            Some("missing search engine id")
        } else {
            None
        }
    }

    fn request(&self, query: &str, num_results: usize) -> ProviderResult<ProviderRequest> {
        let (Some(key), Some(cx)) = (self.config.api_key.as_deref(), self.config.engine_id())
        else {
            return Err(ProviderError::unavailable(
                self.name(),
                "missing api key or search engine id",
            ));
        };

        let num = num_results.min(MAX_RESULTS_PER_REQUEST);
        Ok(ProviderRequest::get(self.endpoint())
            .header("Accept", "application/json")
            .param("key", key)
            .param("cx", cx)
            .param("q", query)
            .param("num", num.to_string()))
    }

    fn parse_results(
        &self,
        query: &str,
        response: &ProviderResponse,
        num_results: usize,
    ) -> ProviderResult<Vec<SearchResult>> {
        let body: CseResponse = response.json(self.name())?;
        let mut results = Vec::with_capacity(body.items.len().min(num_results));

        for raw in body.items.into_iter().take(num_results) {
            let item: CseItem = serde_json::from_value(raw.clone()).map_err(|e| {
                ProviderError::invalid(
                    self.name(),
                    InvalidResponse::Malformed(format!("search item: {e}")),
                )
            })?;

            results.push(
                SearchResult::new(
                    clean_text(&item.title),
                    item.link,
                    clean_text(&item.snippet),
                    query,
                    self.name(),
                )
                .with_raw_data(raw),
            );
        }

        Ok(results)
    }
}

#[async_trait]
impl SearchProvider for GoogleCustomSearch {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn is_available(&self) -> bool {
        self.unavailable_reason().is_none()
    }

    async fn search(&self, query: &str, num_results: usize) -> ProviderResult<Vec<SearchResult>> {
        if let Some(reason) = self.unavailable_reason() {
            return Err(ProviderError::unavailable(self.name(), reason));
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
