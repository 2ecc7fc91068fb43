//! Provider loader for initializing providers from configuration

use super::traits::SearchProvider;
use super::{bing, duckduckgo, fixture, google};
use crate::config::{ProviderConfig, ProviderKind, Settings};
use crate::dispatch::SearchManager;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Loader for initializing providers from configuration
pub struct ProviderLoader;

impl ProviderLoader {
    /// Build a manager with every configured provider registered.
    ///
    /// Disabled providers are registered too so they show up in statistics;
    /// they never become available.
    pub fn load(settings: &Settings) -> Result<SearchManager> {
        let manager = SearchManager::new(settings.manager.clone());

        for config in &settings.providers {
            let provider = Self::create(config)?;
            if provider.is_available() {
                info!(
                    "Loaded provider: {} ({}, priority {})",
                    config.name,
                    config.kind.as_str(),
                    config.priority
                );
            } else {
                info!(
                    "Loaded provider {} ({}) but it is not available (disabled or missing credentials)",
                    config.name,
                    config.kind.as_str()
                );
            }
            manager.register(provider)?;
        }

        info!("Loaded {} providers", manager.len());
        Ok(manager)
    }

    /// Create a provider instance for its configured kind
    pub fn create(config: &ProviderConfig) -> Result<Arc<dyn SearchProvider>> {
        let provider: Arc<dyn SearchProvider> = match config.kind {
            ProviderKind::GoogleCse => Arc::new(google::GoogleCustomSearch::new(config.clone())?),
            ProviderKind::Bing => Arc::new(bing::BingWebSearch::new(config.clone())?),
            ProviderKind::DuckduckgoHtml => {
                Arc::new(duckduckgo::DuckDuckGoHtml::new(config.clone())?)
            }
            ProviderKind::Fixture => {
                let count = config.param_u64("results").unwrap_or(3) as usize;
                Arc::new(fixture::FixtureProvider::new(config.clone()).with_generated_hits(count))
            }
        };
        Ok(provider)
    }

    /// Get list of supported provider kinds
    pub fn available_kinds() -> Vec<&'static str> {
        [
            ProviderKind::GoogleCse,
            ProviderKind::Bing,
            ProviderKind::DuckduckgoHtml,
            ProviderKind::Fixture,
        ]
        .iter()
        .map(ProviderKind::as_str)
        .collect()
    }
}
