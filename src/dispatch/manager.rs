//! Priority-ordered dispatch with retry, fallback and circuit breaking

use super::status::{ProviderStats, ProviderStatus};
use crate::config::ManagerConfig;
use crate::error::{ManagerError, ManagerResult, ProviderError};
use crate::providers::SearchProvider;
use crate::results::SearchResult;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// An attempt exceeded `timeout_per_provider`
#[derive(Debug, thiserror::Error)]
#[error("attempt timed out after {0:?}")]
pub struct AttemptTimeout(pub Duration);

/// Provider plus its own status lock
#[derive(Clone)]
struct Entry {
    provider: Arc<dyn SearchProvider>,
    status: Arc<Mutex<ProviderStatus>>,
}

impl Entry {
    fn status(&self) -> MutexGuard<'_, ProviderStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

enum AttemptError {
    Failed(ProviderError),
    Cancelled,
}

/// Dispatches queries to registered providers in priority order.
///
/// Shared across tasks behind an `Arc`; every provider's status has its own
/// lock, so concurrent searches never see a torn counter or breaker window.
pub struct SearchManager {
    config: ManagerConfig,
    /// Always sorted ascending by priority
    providers: RwLock<Vec<Entry>>,
}

impl SearchManager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            providers: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Register a provider; the list is re-sorted by priority.
    ///
    /// Providers with equal priority keep their registration order.
    pub fn register(&self, provider: Arc<dyn SearchProvider>) -> ManagerResult<()> {
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        if providers.iter().any(|e| e.name() == provider.name()) {
            return Err(ManagerError::DuplicateProvider(provider.name().to_string()));
        }

        debug!(
            "Registering provider {} with priority {}",
            provider.name(),
            provider.priority()
        );
        providers.push(Entry {
            provider,
            status: Arc::new(Mutex::new(ProviderStatus::new())),
        });
        providers.sort_by_key(|e| e.provider.priority());
        Ok(())
    }

    fn entries(&self) -> Vec<Entry> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_eligible(entry: &Entry, now: Instant) -> bool {
        entry.provider.config().enabled
            && entry.provider.is_available()
            && !entry.status().is_circuit_open(now)
    }

    fn available(&self) -> Vec<Entry> {
        let now = Instant::now();
        self.entries()
            .into_iter()
            .filter(|e| Self::is_eligible(e, now))
            .collect()
    }

    /// Names of all registered providers, in dispatch order
    pub fn provider_names(&self) -> Vec<String> {
        self.entries().iter().map(|e| e.name().to_string()).collect()
    }

    /// Names of the providers a search would try right now, in order
    pub fn available_providers(&self) -> Vec<String> {
        self.available()
            .iter()
            .map(|e| e.name().to_string())
            .collect()
    }

    /// Snapshot of one provider's runtime status
    pub fn provider_status(&self, name: &str) -> Option<ProviderStatus> {
        self.entries()
            .iter()
            .find(|e| e.name() == name)
            .map(|e| e.status().clone())
    }

    pub fn len(&self) -> usize {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Search without a cancellation signal
    pub async fn search(&self, query: &str, num_results: usize) -> ManagerResult<Vec<SearchResult>> {
        self.search_with_cancel(query, num_results, &CancellationToken::new())
            .await
    }

    /// Search the available providers in priority order.
    ///
    /// Returns the first success, or with `combine_results` the concatenation
    /// of every success truncated to `num_results`. Cancelling `cancel`
    /// aborts the in-flight request or backoff and yields
    /// [`ManagerError::Cancelled`].
    pub async fn search_with_cancel(
        &self,
        query: &str,
        num_results: usize,
        cancel: &CancellationToken,
    ) -> ManagerResult<Vec<SearchResult>> {
        if query.trim().is_empty() || num_results == 0 {
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(ManagerError::Cancelled);
        }

        let available = self.available();
        if available.is_empty() {
            warn!("No available providers for query");
            return Err(ManagerError::no_available_providers());
        }

        info!(
            "Searching '{}' across {} available providers",
            query,
            available.len()
        );

        let mut combined = Vec::new();
        let mut last_error = None;

        for entry in &available {
            match self.try_provider(entry, query, num_results, cancel).await {
                Ok(mut results) => {
                    results.truncate(num_results);
                    if !self.config.combine_results {
                        return Ok(results);
                    }
                    combined.extend(results);
                }
                Err(AttemptError::Cancelled) => {
                    info!("Search cancelled during provider {}", entry.name());
                    return Err(ManagerError::Cancelled);
                }
                Err(AttemptError::Failed(err)) => {
                    if !self.config.fallback_enabled {
                        return Err(ManagerError::Provider(err));
                    }
                    last_error = Some(err);
                }
            }
        }

        if !combined.is_empty() {
            combined.truncate(num_results);
            return Ok(combined);
        }

        let reason = if last_error.is_some() {
            "all available providers failed"
        } else {
            "no provider returned results"
        };
        Err(ManagerError::Exhausted {
            reason: reason.to_string(),
            last_error,
        })
    }

    /// Run up to `retries + 1` attempts against one provider
    async fn try_provider(
        &self,
        entry: &Entry,
        query: &str,
        num_results: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, AttemptError> {
        let retries = self
            .config
            .retry_attempts
            .min(entry.provider.config().max_retries);
        let mut attempt = 0u32;

        loop {
            let started = Instant::now();
            let err = match self.attempt(entry, query, num_results, cancel).await? {
                Ok(results) => {
                    self.record_success(entry, started.elapsed());
                    debug!(
                        "Provider {} returned {} results on attempt {}",
                        entry.name(),
                        results.len(),
                        attempt.saturating_add(1)
                    );
                    return Ok(results);
                }
                Err(err) => err,
            };

            warn!(
                "Provider {} attempt {}/{} failed: {}",
                entry.name(),
                attempt.saturating_add(1),
                retries.saturating_add(1),
                err
            );

            if attempt >= retries {
                self.record_failure(entry);
                return Err(AttemptError::Failed(err));
            }

            let backoff = backoff_delay(attempt);
            debug!("Backing off {:?} before retrying {}", backoff, entry.name());
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AttemptError::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
            attempt += 1;
        }
    }

    /// One bounded, cancellable provider call
    async fn attempt(
        &self,
        entry: &Entry,
        query: &str,
        num_results: usize,
        cancel: &CancellationToken,
    ) -> Result<Result<Vec<SearchResult>, ProviderError>, AttemptError> {
        let limit = self.config.attempt_timeout();
        let call = tokio::time::timeout(limit, entry.provider.search(query, num_results));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AttemptError::Cancelled),
            outcome = call => Ok(match outcome {
                Ok(result) => result,
                Err(_) => Err(ProviderError::request_failed(entry.name(), AttemptTimeout(limit))),
            }),
        }
    }

    fn record_success(&self, entry: &Entry, elapsed: Duration) {
        let mut status = entry.status();
        let was_healthy = status.is_healthy;
        status.record_success(elapsed);
        if !was_healthy {
            info!("Provider {} recovered", entry.name());
        }
    }

    fn record_failure(&self, entry: &Entry) {
        let mut status = entry.status();
        let tripped = status.record_failure(
            self.config.max_consecutive_failures,
            self.config.circuit_breaker_window(),
            Instant::now(),
        );
        if tripped {
            warn!(
                "Circuit breaker opened for {} after {} consecutive failures ({}s)",
                entry.name(),
                status.consecutive_failures,
                self.config.circuit_breaker_duration
            );
        }
    }

    /// Statistics for every registered provider, keyed by name.
    ///
    /// Reads only; calling it never changes provider state.
    pub fn get_provider_statistics(&self) -> BTreeMap<String, ProviderStats> {
        let now = Instant::now();
        self.entries()
            .iter()
            .map(|entry| {
                let config = entry.provider.config();
                let prerequisites = config.enabled && entry.provider.is_available();
                let status = entry.status();
                let stats = ProviderStats {
                    name: config.name.clone(),
                    priority: config.priority,
                    enabled: config.enabled,
                    available: prerequisites && !status.is_circuit_open(now),
                    state: status.state(now),
                    is_healthy: status.is_healthy,
                    total_requests: status.total_requests,
                    successful_requests: status.successful_requests,
                    success_rate: status.success_rate(),
                    consecutive_failures: status.consecutive_failures,
                    average_response_time: status.average_response_time,
                    circuit_breaker_remaining: status.circuit_remaining(now).as_secs_f64(),
                    last_success_time: status.last_success_time,
                    last_failure_time: status.last_failure_time,
                };
                (config.name.clone(), stats)
            })
            .collect()
    }

    /// Reset one provider's status (or all, with `None`) to its initial state
    pub fn reset_provider_status(&self, name: Option<&str>) -> ManagerResult<()> {
        let entries = self.entries();
        match name {
            Some(name) => {
                let entry = entries
                    .iter()
                    .find(|e| e.name() == name)
                    .ok_or_else(|| ManagerError::UnknownProvider(name.to_string()))?;
                entry.status().reset();
                info!("Reset status of provider {}", name);
            }
            None => {
                for entry in &entries {
                    entry.status().reset();
                }
                info!("Reset status of all {} providers", entries.len());
            }
        }
        Ok(())
    }
}

/// Wait before retry number `attempt + 1`: `2^attempt` seconds
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}
