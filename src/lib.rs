//! search-dispatch: resilient multi-provider web search
//!
//! Queries an ordered set of search backends (structured APIs and an HTML
//! scraper) and returns normalized results, retrying with backoff, falling
//! back to lower-priority providers and benching failing ones behind a
//! circuit breaker.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod network;
pub mod providers;
pub mod results;

pub use config::Settings;
pub use dispatch::{ProviderStats, SearchManager};
pub use error::{ManagerError, ProviderError};
pub use providers::{ProviderLoader, SearchProvider};
pub use results::SearchResult;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
