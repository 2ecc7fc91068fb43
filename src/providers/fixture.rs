//! Deterministic in-memory provider
//!
//! Serves canned hits without touching the network so dispatch behaviour
//! can be exercised in isolation.

use super::traits::SearchProvider;
use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{InvalidResponse, ProviderError, ProviderResult};
use crate::results::SearchResult;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A canned hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl FixtureHit {
    pub fn new(title: impl Into<String>, url: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }
}

/// How the fixture answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureBehavior {
    /// Always return the canned hits
    Succeed,
    /// Always fail with a request error
    AlwaysFail,
    /// Fail the first `n` calls, then succeed
    FailFirst(usize),
    /// Always fail as a detected block page
    Blocked,
}

/// Provider returning canned results
#[derive(Debug)]
pub struct FixtureProvider {
    config: ProviderConfig,
    hits: Vec<FixtureHit>,
    behavior: FixtureBehavior,
    latency: Duration,
    calls: AtomicUsize,
}

impl FixtureProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            hits: Vec::new(),
            behavior: FixtureBehavior::Succeed,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fixture named `name` at `priority` with default settings
    pub fn named(name: impl Into<String>, priority: i32) -> Self {
        Self::new(ProviderConfig::new(name, ProviderKind::Fixture).with_priority(priority))
    }

    pub fn with_hits(mut self, hits: Vec<FixtureHit>) -> Self {
        self.hits = hits;
        self
    }

    /// Generate `count` numbered hits
    pub fn with_generated_hits(mut self, count: usize) -> Self {
        let name = self.config.name.clone();
        self.hits = (1..=count)
            .map(|i| {
                FixtureHit::new(
                    format!("{name} result {i}"),
                    format!("https://{name}.example/{i}"),
                    format!("Snippet {i} from {name}"),
                )
            })
            .collect();
        self
    }

    pub fn with_behavior(mut self, behavior: FixtureBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn failing(self) -> Self {
        self.with_behavior(FixtureBehavior::AlwaysFail)
    }

    /// Simulated response time per call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of `search` calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for FixtureProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn is_available(&self) -> bool {
        self.config.enabled
    }

    async fn search(&self, query: &str, num_results: usize) -> ProviderResult<Vec<SearchResult>> {
        if !self.config.enabled {
            return Err(ProviderError::unavailable(self.name(), "provider is disabled"));
        }

        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let fail = match self.behavior {
            FixtureBehavior::Succeed => false,
            FixtureBehavior::AlwaysFail => true,
            FixtureBehavior::FailFirst(n) => call < n,
            FixtureBehavior::Blocked => {
                return Err(ProviderError::invalid(
                    self.name(),
                    InvalidResponse::Blocked("captcha".to_string()),
                ));
            }
        };
        if fail {
            return Err(ProviderError::request_failed(
                self.name(),
                format!("simulated failure on call {}", call + 1),
            ));
        }

        Ok(self
            .hits
            .iter()
            .take(num_results)
            .enumerate()
            .map(|(i, hit)| {
                SearchResult::new(&hit.title, &hit.url, &hit.snippet, query, self.name())
                    .with_raw_data(json!({ "position": i + 1 }))
            })
            .collect())
    }
}
