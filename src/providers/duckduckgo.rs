//! DuckDuckGo HTML scraping provider
//!
//! Last-resort fallback that needs no credentials. The markup of the
//! scraped page is not a stable contract, so several extraction strategies
//! are tried in order. A detected block page is always an error, never an
//! empty result.

use super::redirect::resolve_result_url;
use super::traits::*;
use crate::config::ProviderConfig;
use crate::error::{InvalidResponse, ProviderError, ProviderResult};
use crate::network::{accept_html, accept_language, generate_user_agent, HttpClient, Pacer};
use crate::results::SearchResult;
use async_trait::async_trait;
use rand::Rng;
use scraper::{ElementRef, Html, Selector};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(3);

/// Elements only a block, CAPTCHA or anomaly page carries
const BLOCK_ELEMENTS: &[(&str, &str)] = &[
    ("anomaly-modal", "[class*='anomaly-modal']"),
    ("challenge-form", "form#challenge-form, form.challenge-form"),
    (
        "captcha",
        "div.g-recaptcha, div.h-captcha, iframe[src*='captcha'], img[src*='captcha']",
    ),
];

/// Lowercase phrases of block pages; only trusted when the page holds no
/// result markup, since queries and snippets can contain them too
const BLOCK_PHRASES: &[&str] = &[
    "bots use duckduckgo too",
    "unusual traffic",
    "automated requests",
    "captcha",
];

/// Selector present when the engine explicitly found nothing
const NO_RESULTS_SELECTOR: &str = "div.no-results, .result--no-result";

/// One way of locating result blocks in the page
struct Strategy {
    name: &'static str,
    block: &'static str,
    title: &'static str,
    snippet: &'static str,
}

const STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "results_links",
        block: "div.result.results_links, div.result.results_links_deep",
        title: "a.result__a",
        snippet: ".result__snippet",
    },
    Strategy {
        name: "result",
        block: "div.result",
        title: "h2 a, a.result__url",
        snippet: ".result__snippet, .snippet",
    },
    Strategy {
        name: "article",
        block: "article[data-testid='result'], li[data-layout='organic']",
        title: "h2 a, a[data-testid='result-title-a']",
        snippet: "[data-result='snippet'], .snippet",
    },
    Strategy {
        name: "links_main",
        block: "div.links_main",
        title: "a",
        snippet: ".result__snippet, .snippet",
    },
];

/// DuckDuckGo HTML endpoint scraper
pub struct DuckDuckGoHtml {
    config: ProviderConfig,
    client: HttpClient,
    pacer: Pacer,
    min_delay: Duration,
    max_delay: Duration,
}

impl DuckDuckGoHtml {
    /// Create a scraper; `min_delay_ms` / `max_delay_ms` custom params
    /// override the default 1-3 second jitter
    pub fn new(config: ProviderConfig) -> reqwest::Result<Self> {
        let client = HttpClient::for_provider(&config)?;
        let pacer = Pacer::per_minute(config.rate_limit_per_minute);

        let min_delay = config
            .param_u64("min_delay_ms")
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_MIN_DELAY);
        let max_delay = config
            .param_u64("max_delay_ms")
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_MAX_DELAY)
            .max(min_delay);

        Ok(Self {
            config,
            client,
            pacer,
            min_delay,
            max_delay,
        })
    }

    /// Set the jitter range explicitly
    pub fn with_delay(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max.max(min);
        self
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    fn jitter(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        rand::thread_rng().gen_range(self.min_delay..=self.max_delay)
    }

    fn request(&self, query: &str) -> ProviderRequest {
        let mut request = ProviderRequest::post(self.endpoint())
            .header("User-Agent", generate_user_agent())
            .header("Accept", accept_html())
            .header(
                "Accept-Language",
                accept_language(self.config.param_str("language").unwrap_or("")),
            )
            .form_field("q", query)
            .form_field("b", "");

        if let Some(region) = self.config.param_str("region") {
            request = request.form_field("kl", region);
        }
        request
    }

    /// Block element present in the parsed page, if any
    fn block_element(&self, document: &Html) -> ProviderResult<Option<&'static str>> {
        for &(marker, css) in BLOCK_ELEMENTS {
            let selector = self.selector(css)?;
            if document.select(&selector).next().is_some() {
                return Ok(Some(marker));
            }
        }
        Ok(None)
    }

    fn block_phrase(html: &str) -> Option<&'static str> {
        let lower = html.to_lowercase();
        BLOCK_PHRASES.iter().copied().find(|m| lower.contains(m))
    }

    /// Block marker of a page the server answered with a non-success status
    fn detect_block(&self, html: &str) -> ProviderResult<Option<&'static str>> {
        let document = Html::parse_document(html);
        Ok(self
            .block_element(&document)?
            .or_else(|| Self::block_phrase(html)))
    }

    fn blocked(&self, marker: &str) -> ProviderError {
        warn!(provider = %self.name(), marker = %marker, "block page detected");
        ProviderError::invalid(self.name(), InvalidResponse::Blocked(marker.to_string()))
    }

    fn selector(&self, css: &str) -> ProviderResult<Selector> {
        Selector::parse(css).map_err(|e| {
            ProviderError::invalid(
                self.name(),
                InvalidResponse::Malformed(format!("selector '{css}': {e:?}")),
            )
        })
    }

    fn parse_results(
        &self,
        html: &str,
        query: &str,
        num_results: usize,
    ) -> ProviderResult<Vec<SearchResult>> {
        let document = Html::parse_document(html);
        if let Some(marker) = self.block_element(&document)? {
            return Err(self.blocked(marker));
        }

        for strategy in STRATEGIES {
            let block_selector = self.selector(strategy.block)?;
            let blocks: Vec<ElementRef> = document.select(&block_selector).collect();
            if blocks.is_empty() {
                continue;
            }

            debug!(
                provider = %self.name(),
                "strategy '{}' matched {} blocks",
                strategy.name,
                blocks.len()
            );
            let title_selector = self.selector(strategy.title)?;
            let snippet_selector = self.selector(strategy.snippet)?;

            let results = blocks
                .into_iter()
                .filter_map(|block| {
                    self.extract(block, strategy, &title_selector, &snippet_selector, query)
                })
                .take(num_results)
                .collect();
            return Ok(results);
        }

        let no_results = self.selector(NO_RESULTS_SELECTOR)?;
        if document.select(&no_results).next().is_some() {
            debug!(provider = %self.name(), "page reports no results");
            return Ok(Vec::new());
        }

        if let Some(marker) = Self::block_phrase(html) {
            return Err(self.blocked(marker));
        }

        Err(ProviderError::invalid(
            self.name(),
            InvalidResponse::UnrecognizedMarkup,
        ))
    }

    fn extract(
        &self,
        block: ElementRef,
        strategy: &Strategy,
        title_selector: &Selector,
        snippet_selector: &Selector,
        query: &str,
    ) -> Option<SearchResult> {
        let link = block.select(title_selector).next()?;

        let title = clean_text(&link.text().collect::<String>());
        if title.is_empty() {
            return None;
        }

        let href = link.value().attr("href")?;
        let url = resolve_result_url(href)?;

        let snippet = block
            .select(snippet_selector)
            .next()
            .map(|s| clean_text(&s.text().collect::<String>()))
            .unwrap_or_default();

        Some(
            SearchResult::new(title, url, snippet, query, self.name())
                .with_raw_data(json!({ "strategy": strategy.name, "href": href })),
        )
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoHtml {
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
        if num_results == 0 {
            return Ok(Vec::new());
        }

        self.pacer.wait(self.name()).await;
        let delay = self.jitter();
        if !delay.is_zero() {
            debug!(provider = %self.name(), "jitter delay {:?}", delay);
            tokio::time::sleep(delay).await;
        }

        let response = self
            .client
            .execute(self.request(query))
            .await
            .map_err(|e| ProviderError::request_failed(self.name(), e))?;

        if !response.is_success() {
            if let Some(marker) = self.detect_block(&response.text)? {
                return Err(self.blocked(marker));
            }
        }

        let response = response.error_for_status(self.name())?;
        let results = self.parse_results(&response.text, query, num_results)?;
        debug!(provider = %self.name(), "parsed {} results", results.len());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RESULTS_PAGE: &str = r##"
<html><body>
<div class="serp__results">
  <div class="result results_links results_links_deep web-result">
    <h2 class="result__title">
      <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=1">Rust Programming   Language</a>
    </h2>
    <a class="result__snippet" href="#">A language empowering everyone.</a>
  </div>
  <div class="result results_links results_links_deep web-result">
    <h2 class="result__title"><a class="result__a" href="/settings"></a></h2>
  </div>
  <div class="result results_links results_links_deep web-result">
    <h2 class="result__title"><a class="result__a" href="javascript:void(0)">Broken</a></h2>
  </div>
  <div class="result results_links results_links_deep web-result">
    <h2 class="result__title"><a class="result__a" href="https://doc.rust-lang.org/book/">The Book</a></h2>
    <a class="result__snippet">Learn Rust.</a>
  </div>
  <div class="result results_links results_links_deep web-result">
    <h2 class="result__title"><a class="result__a" href="https://crates.io/">crates.io</a></h2>
  </div>
</div>
</body></html>"##;

    const CAPTCHA_QUERY_PAGE: &str = r#"
<html><body>
<form action="/html/" method="post"><input type="text" name="q" value="captcha solver"></form>
<div class="serp__results">
  <div class="result results_links web-result">
    <h2 class="result__title"><a class="result__a" href="https://example.org/captcha">Solving a CAPTCHA automatically</a></h2>
    <a class="result__snippet">Why sites show a captcha after unusual traffic or automated requests.</a>
  </div>
</div>
</body></html>"#;

    fn scraper(endpoint: &str) -> DuckDuckGoHtml {
        let config = ProviderConfig::new("ddg", ProviderKind::DuckduckgoHtml)
            .with_endpoint(endpoint)
            .with_rate_limit(0)
            .with_priority(10);
        DuckDuckGoHtml::new(config)
            .unwrap()
            .with_delay(Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn test_default_jitter_range() {
        let config = ProviderConfig::new("ddg", ProviderKind::DuckduckgoHtml);
        let ddg = DuckDuckGoHtml::new(config).unwrap();
        for _ in 0..20 {
            let d = ddg.jitter();
            assert!(d >= Duration::from_secs(1) && d <= Duration::from_secs(3));
        }
    }

    #[test]
    fn test_delay_params() {
        let config = ProviderConfig::new("ddg", ProviderKind::DuckduckgoHtml)
            .with_param("min_delay_ms", 5u64)
            .with_param("max_delay_ms", 2u64);
        let ddg = DuckDuckGoHtml::new(config).unwrap();
        assert_eq!(ddg.jitter(), Duration::from_millis(5));
    }

    #[test]
    fn test_parse_first_strategy_skips_bad_blocks() {
        let ddg = scraper("http://localhost");
        let results = ddg.parse_results(RESULTS_PAGE, "rust", 10).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].title(), "Rust Programming Language");
        assert_eq!(results[0].url(), "https://www.rust-lang.org/");
        assert_eq!(results[0].snippet(), "A language empowering everyone.");
        assert_eq!(results[0].raw_data()["strategy"], "results_links");
        assert_eq!(results[1].url(), "https://doc.rust-lang.org/book/");
        assert_eq!(results[2].snippet(), "");
    }

    #[test]
    fn test_parse_truncates() {
        let ddg = scraper("http://localhost");
        let results = ddg.parse_results(RESULTS_PAGE, "rust", 2).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_parse_falls_back_to_later_strategy() {
        let html = r#"
<html><body><ol>
  <li data-layout="organic">
    <h2><a href="https://tokio.rs/">Tokio</a></h2>
    <div data-result="snippet">Asynchronous runtime</div>
  </li>
</ol></body></html>"#;
        let ddg = scraper("http://localhost");
        let results = ddg.parse_results(html, "tokio", 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title(), "Tokio");
        assert_eq!(results[0].snippet(), "Asynchronous runtime");
        assert_eq!(results[0].raw_data()["strategy"], "article");
    }

    #[test]
    fn test_parse_explicit_no_results_is_empty() {
        let html = r#"<html><body><div class="no-results">No results.</div></body></html>"#;
        let ddg = scraper("http://localhost");
        assert!(ddg.parse_results(html, "qwzx", 5).unwrap().is_empty());
    }

    #[test]
    fn test_parse_unknown_markup_is_error() {
        let html = "<html><body><p>Something else entirely</p></body></html>";
        let ddg = scraper("http://localhost");
        let err = ddg.parse_results(html, "rust", 5).unwrap_err();
        assert!(matches!(
            err,
            ProviderError::ResponseInvalid {
                reason: InvalidResponse::UnrecognizedMarkup,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_block_element_is_blocked() {
        let html = r#"<html><body><div class="anomaly-modal__title">Unfortunately, bots use DuckDuckGo too.</div>
<form id="challenge-form"></form></body></html>"#;
        let ddg = scraper("http://localhost");
        match ddg.parse_results(html, "rust", 5).unwrap_err() {
            ProviderError::ResponseInvalid {
                reason: InvalidResponse::Blocked(marker),
                ..
            } => assert_eq!(marker, "anomaly-modal"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_block_phrase_without_results_is_blocked() {
        let html = "<html><body><p>Our systems have detected unusual traffic from your network.</p></body></html>";
        let ddg = scraper("http://localhost");
        assert!(ddg.parse_results(html, "rust", 5).unwrap_err().is_blocked());
    }

    #[test]
    fn test_parse_block_phrases_inside_results_are_ignored() {
        let ddg = scraper("http://localhost");
        let results = ddg.parse_results(CAPTCHA_QUERY_PAGE, "captcha solver", 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url(), "https://example.org/captcha");
    }

    #[test]
    fn test_detect_block_on_error_page() {
        let ddg = scraper("http://localhost");
        assert_eq!(
            ddg.detect_block("<html><body>Please solve this CAPTCHA</body></html>")
                .unwrap(),
            Some("captcha")
        );
        assert_eq!(ddg.detect_block("<html><body>oops</body></html>").unwrap(), None);
    }

    #[tokio::test]
    async fn test_search_posts_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("q=rust+lang"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
            .mount(&server)
            .await;

        let ddg = scraper(&server.uri());
        let results = ddg.search("rust lang", 5).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].search_query(), "rust lang");
        assert_eq!(results[0].provider_name(), "ddg");
    }

    #[tokio::test]
    async fn test_search_block_page_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202).set_body_string(
                "<html><body><div class=\"anomaly-modal\">Unfortunately, bots use DuckDuckGo too.</div></body></html>",
            ))
            .mount(&server)
            .await;

        let ddg = scraper(&server.uri());
        let err = ddg.search("rust", 5).await.unwrap_err();
        assert!(err.is_blocked());
    }

    #[tokio::test]
    async fn test_search_captcha_query_returns_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("q=captcha+solver"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CAPTCHA_QUERY_PAGE))
            .mount(&server)
            .await;

        let ddg = scraper(&server.uri());
        let results = ddg.search("captcha solver", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title(), "Solving a CAPTCHA automatically");
    }

    #[tokio::test]
    async fn test_search_forbidden_captcha_page_is_blocked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(403).set_body_string("<html><body>captcha required</body></html>"),
            )
            .mount(&server)
            .await;

        let ddg = scraper(&server.uri());
        assert!(ddg.search("rust", 5).await.unwrap_err().is_blocked());
    }

    #[tokio::test]
    async fn test_search_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let ddg = scraper(&server.uri());
        let err = ddg.search("rust", 5).await.unwrap_err();
        assert!(matches!(err, ProviderError::RequestFailed { .. }));
    }
}
