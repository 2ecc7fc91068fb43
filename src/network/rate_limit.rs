//! Per-provider request pacing

use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// Enforces a minimum interval of `60 / rate_limit_per_minute` seconds
/// between requests of a single provider.
///
/// The quota has a burst of one, so a request may only go out once the
/// full interval since the previous one has elapsed.
pub struct Pacer {
    limiter: Option<DefaultDirectRateLimiter>,
    interval: Duration,
}

impl Pacer {
    /// Build a pacer for `per_minute` requests; 0 disables pacing
    pub fn per_minute(per_minute: u32) -> Self {
        match NonZeroU32::new(per_minute) {
            Some(rate) => Self {
                limiter: Some(RateLimiter::direct(
                    Quota::per_minute(rate).allow_burst(NonZeroU32::MIN),
                )),
                interval: Duration::from_secs(60) / per_minute,
            },
            None => Self::unlimited(),
        }
    }

    pub fn unlimited() -> Self {
        Self {
            limiter: None,
            interval: Duration::ZERO,
        }
    }

    /// Minimum spacing between two requests
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next request is allowed, then claim the slot
    pub async fn wait(&self, provider: &str) {
        let Some(limiter) = &self.limiter else {
            return;
        };

        if let Err(not_until) = limiter.check() {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            debug!(provider = %provider, "rate limited, waiting {:?}", wait);
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer")
            .field("interval", &self.interval)
            .field("enabled", &self.limiter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_interval_from_rate() {
        assert_eq!(Pacer::per_minute(60).interval(), Duration::from_secs(1));
        assert_eq!(Pacer::per_minute(120).interval(), Duration::from_millis(500));
        assert_eq!(Pacer::per_minute(0).interval(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        let pacer = Pacer::per_minute(1);
        let start = Instant::now();
        pacer.wait("p").await;
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_second_request_waits_for_interval() {
        // 600/min => 100ms spacing
        let pacer = Pacer::per_minute(600);
        pacer.wait("p").await;
        let start = Instant::now();
        pacer.wait("p").await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let pacer = Pacer::unlimited();
        let start = Instant::now();
        for _ in 0..10 {
            pacer.wait("p").await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
