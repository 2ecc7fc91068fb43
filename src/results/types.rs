//! Search hit record

use serde::{Deserialize, Serialize};
use url::Url;

/// A single search hit returned by a provider.
///
/// Fields are private: once a provider has built a result it is handed
/// around by value and never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    title: String,
    url: String,
    snippet: String,
    search_query: String,
    provider_name: String,
    /// Provider-native payload for this hit, passed through untouched
    #[serde(default)]
    raw_data: serde_json::Value,
}

impl SearchResult {
    /// Create a new result
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
        search_query: impl Into<String>,
        provider_name: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            search_query: search_query.into(),
            provider_name: provider_name.into(),
            raw_data: serde_json::Value::Null,
        }
    }

    /// Attach the provider-native payload
    pub fn with_raw_data(mut self, raw_data: serde_json::Value) -> Self {
        self.raw_data = raw_data;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn snippet(&self) -> &str {
        &self.snippet
    }

    /// The query that produced this hit
    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn raw_data(&self) -> &serde_json::Value {
        &self.raw_data
    }

    /// Get the hostname from the URL
    pub fn hostname(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}
