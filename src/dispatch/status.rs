//! Per-provider health tracking and circuit breaking
//!
//! ```text
//! ┌─────────┐  max consecutive   ┌─────────────┐  window    ┌────────────┐
//! │ Healthy ├───── failures ────►│ CircuitOpen ├──elapses──►│ Recovering │
//! └───▲─────┘                    └─────────────┘            └─────┬──────┘
//!     │                                 ▲          failure        │
//!     │            success              └─────────────────────────┤
//!     └───────────────────────────────────────────────────────────┘
//! ```
//!
//! A provider in `Recovering` is eligible again but stays unhealthy until
//! its next success.

use crate::config::MAX_CIRCUIT_BREAKER_DURATION;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Smoothing factor of the response-time moving average
pub const RESPONSE_TIME_ALPHA: f64 = 0.3;

/// Health state derived from a [`ProviderStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    /// Excluded from dispatch until the breaker window elapses
    CircuitOpen,
    /// Eligible again, waiting for a success to become healthy
    Recovering,
}

/// Mutable runtime record of one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderStatus {
    pub is_healthy: bool,
    pub last_success_time: Option<DateTime<Utc>>,
    pub last_failure_time: Option<DateTime<Utc>>,
    /// Reset to 0 by any success
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub successful_requests: u64,
    /// Moving average over successful calls, in seconds
    pub average_response_time: f64,
    pub circuit_breaker_until: Option<Instant>,
}

impl Default for ProviderStatus {
    fn default() -> Self {
        Self {
            is_healthy: true,
            last_success_time: None,
            last_failure_time: None,
            consecutive_failures: 0,
            total_requests: 0,
            successful_requests: 0,
            average_response_time: 0.0,
            circuit_breaker_until: None,
        }
    }
}

impl ProviderStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful call that took `response_time`
    pub fn record_success(&mut self, response_time: Duration) {
        let sample = response_time.as_secs_f64();
        self.average_response_time = if self.successful_requests == 0 {
            sample
        } else {
            RESPONSE_TIME_ALPHA * sample + (1.0 - RESPONSE_TIME_ALPHA) * self.average_response_time
        };

        self.total_requests += 1;
        self.successful_requests += 1;
        self.consecutive_failures = 0;
        self.is_healthy = true;
        self.circuit_breaker_until = None;
        self.last_success_time = Some(Utc::now());
    }

    /// Record a failed call.
    ///
    /// Returns `true` when this failure opened the circuit breaker.
    pub fn record_failure(&mut self, max_consecutive_failures: u32, window: Duration, now: Instant) -> bool {
        self.total_requests += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_time = Some(Utc::now());

        if self.consecutive_failures < max_consecutive_failures {
            return false;
        }

        self.is_healthy = false;
        if window.is_zero() {
            return false;
        }
        let window = window.min(Duration::from_secs(MAX_CIRCUIT_BREAKER_DURATION));
        match now.checked_add(window) {
            Some(until) => {
                self.circuit_breaker_until = Some(until);
                true
            }
            None => false,
        }
    }

    /// Whether the breaker still excludes this provider at `now`
    pub fn is_circuit_open(&self, now: Instant) -> bool {
        self.circuit_breaker_until.is_some_and(|until| now < until)
    }

    /// Time left in the breaker window (zero when closed)
    pub fn circuit_remaining(&self, now: Instant) -> Duration {
        self.circuit_breaker_until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    pub fn state(&self, now: Instant) -> HealthState {
        if self.is_circuit_open(now) {
            HealthState::CircuitOpen
        } else if self.is_healthy {
            HealthState::Healthy
        } else {
            HealthState::Recovering
        }
    }

    /// Successful share of all recorded requests, 0 before the first one
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }

    /// Back to the initial healthy state
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Read-only statistics snapshot for one provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStats {
    pub name: String,
    pub priority: i32,
    pub enabled: bool,
    /// Enabled, prerequisites present and circuit closed
    pub available: bool,
    pub state: HealthState,
    pub is_healthy: bool,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub success_rate: f64,
    pub consecutive_failures: u32,
    /// Seconds
    pub average_response_time: f64,
    /// Seconds until the circuit closes, 0 when not open
    pub circuit_breaker_remaining: f64,
    pub last_success_time: Option<DateTime<Utc>>,
    pub last_failure_time: Option<DateTime<Utc>>,
}
