//! Provider trait and request/response types

use crate::config::ProviderConfig;
use crate::error::{InvalidResponse, ProviderError, ProviderResult};
use crate::results::SearchResult;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Capability every search backend implements.
///
/// Implementations pace their own requests and report any backend failure
/// as a [`ProviderError`]; they never return partial results.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Static configuration this provider was built from
    fn config(&self) -> &ProviderConfig;

    /// Unique provider name
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Lower is tried first
    fn priority(&self) -> i32 {
        self.config().priority
    }

    /// Enabled and holding every static prerequisite (credentials etc.).
    ///
    /// Circuit-breaker state is not considered here.
    fn is_available(&self) -> bool;

    /// Run one search and return at most `num_results` hits in backend order
    async fn search(&self, query: &str, num_results: usize) -> ProviderResult<Vec<SearchResult>>;
}

/// HTTP request to be made by a provider
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// URL to request
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Request headers
    pub headers: BTreeMap<String, String>,
    /// Query parameters
    pub params: BTreeMap<String, String>,
    /// Form body (POST)
    pub form: Option<BTreeMap<String, String>>,
}

impl ProviderRequest {
    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::with_method(url, HttpMethod::Get)
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self::with_method(url, HttpMethod::Post)
    }

    fn with_method(url: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            url: url.into(),
            method,
            headers: BTreeMap::new(),
            params: BTreeMap::new(),
            form: None,
        }
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add a form field (sends the body as form-urlencoded)
    pub fn form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// HTTP response from a provider request
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub text: String,
    /// Response URL (after redirects)
    pub url: String,
}

impl ProviderResponse {
    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into a `RequestFailed` error
    pub fn error_for_status(self, provider: &str) -> ProviderResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ProviderError::request_failed(
                provider,
                StatusError::new(self.status, &self.text),
            ))
        }
    }

    /// Decode the body as JSON, mapping failures to `ResponseInvalid`
    pub fn json<T: serde::de::DeserializeOwned>(&self, provider: &str) -> ProviderResult<T> {
        serde_json::from_str(&self.text).map_err(|e| {
            ProviderError::invalid(provider, InvalidResponse::Malformed(e.to_string()))
        })
    }
}

/// Collapse runs of whitespace into single spaces and trim
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Non-success HTTP status from a backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("HTTP {status}: {body}")]
pub struct StatusError {
    pub status: u16,
    /// Leading part of the response body
    pub body: String,
}

impl StatusError {
    const BODY_PREVIEW: usize = 256;

    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.chars().take(Self::BODY_PREVIEW).collect(),
        }
    }
}
