//! Search provider module
//!
//! Defines the SearchProvider trait and its implementations: two structured
//! APIs, an HTML scraping fallback and an in-memory fixture.

mod loader;
mod redirect;
mod traits;

// Provider implementations
pub mod bing;
pub mod duckduckgo;
pub mod fixture;
pub mod google;

pub use bing::BingWebSearch;
pub use duckduckgo::DuckDuckGoHtml;
pub use fixture::{FixtureBehavior, FixtureHit, FixtureProvider};
pub use google::GoogleCustomSearch;
pub use loader::ProviderLoader;
pub use redirect::resolve_result_url;
pub use traits::*;
