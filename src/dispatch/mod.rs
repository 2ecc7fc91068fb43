//! Provider orchestration
//!
//! [`SearchManager`] owns the registered providers and their runtime status,
//! walks them in priority order and applies retry, fallback and circuit
//! breaking around every call.

mod manager;
mod status;

pub use manager::{backoff_delay, AttemptTimeout, SearchManager};
pub use status::{HealthState, ProviderStats, ProviderStatus, RESPONSE_TIME_ALPHA};
