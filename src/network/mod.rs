//! HTTP networking module
//!
//! Provides the HTTP client, client identities and request pacing used by
//! the network-backed providers.

mod client;
mod rate_limit;
mod user_agent;

pub use client::HttpClient;
pub use rate_limit::Pacer;
pub use user_agent::{accept_html, accept_language, generate_user_agent};
