//! Settings structures for search-dispatch configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// Top-level settings file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub manager: ManagerConfig,
    pub providers: Vec<ProviderConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            manager: ManagerConfig::default(),
            providers: default_providers(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        Ok(settings)
    }

    /// Merge with process environment variables
    pub fn merge_env(&mut self) {
        self.merge_env_from(|key| std::env::var(key).ok());
    }

    /// Merge with variables resolved through `lookup`.
    ///
    /// Manager options are overridden; credentials only fill values the
    /// settings file left empty.
    pub fn merge_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("SEARCH_DISPATCH_FALLBACK_ENABLED") {
            if let Ok(flag) = val.parse() {
                self.manager.fallback_enabled = flag;
            }
        }
        if let Some(val) = lookup("SEARCH_DISPATCH_COMBINE_RESULTS") {
            if let Ok(flag) = val.parse() {
                self.manager.combine_results = flag;
            }
        }
        if let Some(val) = lookup("SEARCH_DISPATCH_RETRY_ATTEMPTS") {
            if let Ok(n) = val.parse() {
                self.manager.retry_attempts = n;
            }
        }
        if let Some(val) = lookup("SEARCH_DISPATCH_MAX_CONSECUTIVE_FAILURES") {
            if let Ok(n) = val.parse() {
                self.manager.max_consecutive_failures = n;
            }
        }
        if let Some(val) = lookup("SEARCH_DISPATCH_CIRCUIT_BREAKER_DURATION") {
            if let Ok(secs) = val.parse() {
                self.manager.circuit_breaker_duration = secs;
            }
        }

        for provider in &mut self.providers {
            match provider.kind {
                ProviderKind::GoogleCse => {
                    if provider.api_key.is_none() {
                        provider.api_key = lookup("GOOGLE_API_KEY");
                    }
                    if provider.engine_id().is_none() {
                        if let Some(cx) = lookup("GOOGLE_CSE_ID") {
                            provider
                                .custom_params
                                .insert("engine_id".to_string(), cx.into());
                        }
                    }
                }
                ProviderKind::Bing => {
                    if provider.api_key.is_none() {
                        provider.api_key = lookup("BING_API_KEY");
                    }
                }
                ProviderKind::DuckduckgoHtml | ProviderKind::Fixture => {}
            }
        }
    }

    /// Reject settings the manager cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.manager.max_consecutive_failures == 0 {
            bail!("manager.max_consecutive_failures must be at least 1");
        }
        if self.manager.timeout_per_provider == 0 {
            bail!("manager.timeout_per_provider must be greater than 0");
        }
        if self.manager.circuit_breaker_duration > MAX_CIRCUIT_BREAKER_DURATION {
            bail!(
                "manager.circuit_breaker_duration must be at most {} seconds",
                MAX_CIRCUIT_BREAKER_DURATION
            );
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                bail!("provider names must not be empty");
            }
            if !seen.insert(provider.name.as_str()) {
                bail!("duplicate provider name: {}", provider.name);
            }
            if provider.timeout_seconds == 0 {
                bail!("provider {}: timeout_seconds must be greater than 0", provider.name);
            }
        }
        Ok(())
    }

    /// Get provider config by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }
}

/// Longest circuit breaker window accepted, 100 years in seconds
pub const MAX_CIRCUIT_BREAKER_DURATION: u64 = 100 * 365 * 24 * 60 * 60;

/// Dispatch manager behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Consecutive failures that open a provider's circuit breaker
    pub max_consecutive_failures: u32,
    /// How long an open circuit keeps a provider out (seconds)
    pub circuit_breaker_duration: u64,
    /// Try the next provider when one fails
    pub fallback_enabled: bool,
    /// Concatenate results from every successful provider
    pub combine_results: bool,
    /// Upper bound on a single provider attempt (seconds)
    pub timeout_per_provider: u64,
    /// Retries per provider after the first attempt
    pub retry_attempts: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
            circuit_breaker_duration: 300,
            fallback_enabled: true,
            combine_results: false,
            timeout_per_provider: 30,
            retry_attempts: 1,
        }
    }
}

impl ManagerConfig {
    /// Breaker window, clamped to [`MAX_CIRCUIT_BREAKER_DURATION`]
    pub fn circuit_breaker_window(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker_duration.min(MAX_CIRCUIT_BREAKER_DURATION))
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_per_provider)
    }
}

/// Which implementation backs a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Google Programmable Search (key + engine id)
    GoogleCse,
    /// Bing Web Search API (subscription key header)
    Bing,
    /// DuckDuckGo HTML scraping fallback
    #[default]
    DuckduckgoHtml,
    /// In-memory canned results
    Fixture,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoogleCse => "google_cse",
            Self::Bing => "bing",
            Self::DuckduckgoHtml => "duckduckgo_html",
            Self::Fixture => "fixture",
        }
    }
}

/// Static configuration of one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Unique provider name
    pub name: String,
    pub kind: ProviderKind,
    pub enabled: bool,
    pub api_key: Option<String>,
    /// Base URL override
    pub endpoint: Option<String>,
    /// Requests per minute; 0 disables pacing
    pub rate_limit_per_minute: u32,
    pub timeout_seconds: u64,
    /// Ceiling on the manager's retries for this provider
    pub max_retries: u32,
    /// Lower is tried first
    pub priority: i32,
    /// Provider-specific options (engine id, market, delays)
    pub custom_params: BTreeMap<String, serde_json::Value>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: ProviderKind::default(),
            enabled: true,
            api_key: None,
            endpoint: None,
            rate_limit_per_minute: 60,
            timeout_seconds: 30,
            max_retries: 3,
            priority: 1,
            custom_params: BTreeMap::new(),
        }
    }
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limit_per_minute = per_minute;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.custom_params.insert(key.into(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// String custom parameter
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.custom_params
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Numeric custom parameter; numeric strings are accepted too
    pub fn param_u64(&self, key: &str) -> Option<u64> {
        let value = self.custom_params.get(key)?;
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
    }

    /// Google engine id (`engine_id`, or its `cx` alias)
    pub fn engine_id(&self) -> Option<&str> {
        self.param_str("engine_id").or_else(|| self.param_str("cx"))
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// Default provider set: both APIs, then the scraper as last resort
fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new("google_cse", ProviderKind::GoogleCse)
            .with_priority(1)
            .with_rate_limit(100),
        ProviderConfig::new("bing", ProviderKind::Bing)
            .with_priority(2)
            .with_rate_limit(180),
        ProviderConfig::new("duckduckgo_html", ProviderKind::DuckduckgoHtml)
            .with_priority(10)
            .with_rate_limit(20),
    ]
}
