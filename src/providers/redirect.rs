//! Resolution of search-engine redirect wrappers to their target URLs

use base64::Engine as _;
use url::Url;

/// Base used for relative links on scraped pages
const SCRAPE_BASE: &str = "https://duckduckgo.com/";

/// Resolve a scraped `href` to the absolute http(s) URL it points at.
///
/// Understands DuckDuckGo (`/l/?uddg=`), Google (`/url?q=`) and Bing
/// (`/ck/a?u=a1<base64>`) wrappers. Returns `None` for anything that does
/// not end up as an absolute http(s) URL outside the search engine itself.
pub fn resolve_result_url(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    let base = Url::parse(SCRAPE_BASE).ok()?;
    let parsed = base.join(href).ok()?;
    let target = unwrap_redirect(&parsed).unwrap_or(parsed);

    if !matches!(target.scheme(), "http" | "https") {
        return None;
    }
    let host = target.host_str()?;
    if host == "duckduckgo.com" || host.ends_with(".duckduckgo.com") {
        return None;
    }

    Some(target.to_string())
}

fn unwrap_redirect(url: &Url) -> Option<Url> {
    let host = url.host_str()?;
    let path = url.path();

    let inner = if host.ends_with("duckduckgo.com") && path.starts_with("/l/") {
        query_value(url, "uddg")?
    } else if is_google_host(host) && path == "/url" {
        query_value(url, "q").or_else(|| query_value(url, "url"))?
    } else if host.ends_with("bing.com") && path == "/ck/a" {
        decode_bing_target(&query_value(url, "u")?)?
    } else {
        return None;
    };

    Url::parse(&inner).ok()
}

fn is_google_host(host: &str) -> bool {
    host.split('.').any(|label| label == "google")
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Bing encodes the target as `a1` followed by URL-safe base64
fn decode_bing_target(encoded: &str) -> Option<String> {
    let payload = encoded.strip_prefix("a1")?;
    let trimmed = payload.trim_end_matches('=');

    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(trimmed))
        .ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_absolute_url() {
        assert_eq!(
            resolve_result_url("https://www.rust-lang.org/learn").as_deref(),
            Some("https://www.rust-lang.org/learn")
        );
    }

    #[test]
    fn test_duckduckgo_wrapper() {
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fdoc.rust-lang.org%2Fbook%2F&rut=abc";
        assert_eq!(
            resolve_result_url(href).as_deref(),
            Some("https://doc.rust-lang.org/book/")
        );

        let relative = "/l/?uddg=https%3A%2F%2Fexample.org%2Fa%3Fb%3D1";
        assert_eq!(
            resolve_result_url(relative).as_deref(),
            Some("https://example.org/a?b=1")
        );
    }

    #[test]
    fn test_google_wrapper() {
        let href = "https://www.google.com/url?q=https://crates.io/&sa=U";
        assert_eq!(resolve_result_url(href).as_deref(), Some("https://crates.io/"));
    }

    #[test]
    fn test_bing_wrapper() {
        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode("https://tokio.rs/tokio/tutorial");
        let href = format!("https://www.bing.com/ck/a?!&&p=x&u=a1{encoded}&ntb=1");
        assert_eq!(
            resolve_result_url(&href).as_deref(),
            Some("https://tokio.rs/tokio/tutorial")
        );
    }

    #[test]
    fn test_rejects_non_results() {
        assert_eq!(resolve_result_url(""), None);
        assert_eq!(resolve_result_url("#top"), None);
        assert_eq!(resolve_result_url("javascript:void(0)"), None);
        assert_eq!(resolve_result_url("mailto:someone@example.com"), None);
        assert_eq!(resolve_result_url("/settings"), None);
        assert_eq!(
            resolve_result_url("https://duckduckgo.com/y.js?ad_domain=example.com"),
            None
        );
        // wrapper without a target
        assert_eq!(resolve_result_url("//duckduckgo.com/l/?rut=abc"), None);
    }
}
