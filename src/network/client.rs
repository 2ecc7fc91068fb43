//! HTTP client for making requests to search providers

use crate::config::ProviderConfig;
use crate::providers::{HttpMethod, ProviderRequest, ProviderResponse};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

/// Identity sent to structured APIs that do not need a browser disguise
const DEFAULT_USER_AGENT: &str = concat!("search-dispatch/", env!("CARGO_PKG_VERSION"));

/// HTTP client wrapper bound to one provider's timeout
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    /// Create a client with the given request timeout
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self { client, timeout })
    }

    /// Create a client honouring the provider's `timeout_seconds`
    pub fn for_provider(config: &ProviderConfig) -> reqwest::Result<Self> {
        Self::new(config.timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute a provider request.
    ///
    /// Any status code is returned as a response; only transport failures
    /// (connect, timeout, body read) are errors here.
    pub async fn execute(&self, request: ProviderRequest) -> reqwest::Result<ProviderResponse> {
        let mut req_builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key, value);
        }

        if !request.params.is_empty() {
            req_builder = req_builder.query(&request.params);
        }

        if let Some(form) = request.form {
            req_builder = req_builder.form(&form);
        }

        debug!("{:?} {}", request.method, request.url);
        let response = req_builder.send().await?;

        Self::parse_response(response).await
    }

    /// Parse response into ProviderResponse
    async fn parse_response(response: Response) -> reqwest::Result<ProviderResponse> {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let text = response.text().await?;

        Ok(ProviderResponse { status, text, url })
    }
}
