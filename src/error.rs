//! Error types for provider calls and search dispatch
//!
//! Messages never include credentials; a provider is identified only by its
//! configured name.

use std::fmt;

/// Boxed underlying cause of a failed request.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a provider response was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidResponse {
    /// The payload could not be decoded into hits.
    Malformed(String),
    /// The page carried a known block or CAPTCHA marker.
    Blocked(String),
    /// None of the extraction strategies matched the page markup.
    UnrecognizedMarkup,
}

impl fmt::Display for InvalidResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(detail) => write!(f, "malformed payload: {detail}"),
            Self::Blocked(marker) => write!(f, "request was blocked (matched '{marker}')"),
            Self::UnrecognizedMarkup => f.write_str("no known result markup found"),
        }
    }
}

/// Failure of a single provider call.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Disabled or missing a static prerequisite; never attempted.
    #[error("provider '{provider}' is unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    /// Transport error, timeout or non-success status.
    #[error("provider '{provider}' request failed: {source}")]
    RequestFailed {
        provider: String,
        #[source]
        source: BoxError,
    },

    /// The backend answered, but not with something usable.
    #[error("provider '{provider}' returned an invalid response: {reason}")]
    ResponseInvalid {
        provider: String,
        reason: InvalidResponse,
    },
}

impl ProviderError {
    pub fn unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn request_failed(provider: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::RequestFailed {
            provider: provider.into(),
            source: source.into(),
        }
    }

    pub fn invalid(provider: impl Into<String>, reason: InvalidResponse) -> Self {
        Self::ResponseInvalid {
            provider: provider.into(),
            reason,
        }
    }

    /// Name of the provider that produced this error.
    pub fn provider_name(&self) -> &str {
        match self {
            Self::Unavailable { provider, .. }
            | Self::RequestFailed { provider, .. }
            | Self::ResponseInvalid { provider, .. } => provider,
        }
    }

    /// True when the response was a detected block page.
    pub fn is_blocked(&self) -> bool {
        matches!(
            self,
            Self::ResponseInvalid {
                reason: InvalidResponse::Blocked(_),
                ..
            }
        )
    }
}

/// Failure of a dispatched search.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// No provider was available, or every attempted provider failed.
    #[error("search exhausted: {reason}")]
    Exhausted {
        reason: String,
        #[source]
        last_error: Option<ProviderError>,
    },

    /// A provider failed while fallback is disabled.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The caller's cancellation signal fired.
    #[error("search was cancelled")]
    Cancelled,

    #[error("a provider named '{0}' is already registered")]
    DuplicateProvider(String),

    #[error("no provider named '{0}' is registered")]
    UnknownProvider(String),
}

impl ManagerError {
    pub(crate) fn no_available_providers() -> Self {
        Self::Exhausted {
            reason: "no available providers".to_string(),
            last_error: None,
        }
    }

    /// The last provider failure wrapped by this error, if any.
    pub fn last_provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Exhausted { last_error, .. } => last_error.as_ref(),
            Self::Provider(err) => Some(err),
            _ => None,
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

pub type ManagerResult<T> = std::result::Result<T, ManagerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::unavailable("google", "missing api key");
        assert_eq!(
            err.to_string(),
            "provider 'google' is unavailable: missing api key"
        );

        let err = ProviderError::invalid("ddg", InvalidResponse::Blocked("captcha".into()));
        assert_eq!(
            err.to_string(),
            "provider 'ddg' returned an invalid response: request was blocked (matched 'captcha')"
        );
        assert!(err.is_blocked());
    }

    #[test]
    fn test_request_failed_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = ProviderError::request_failed("bing", io);
        assert_eq!(err.provider_name(), "bing");
        assert!(err.source().is_some());
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_exhausted_wraps_last_error() {
        let err = ManagerError::Exhausted {
            reason: "all providers failed".into(),
            last_error: Some(ProviderError::invalid(
                "ddg",
                InvalidResponse::UnrecognizedMarkup,
            )),
        };
        assert_eq!(err.last_provider_error().map(|e| e.provider_name()), Some("ddg"));
        assert!(err.source().is_some());

        let none = ManagerError::no_available_providers();
        assert!(none.last_provider_error().is_none());
        assert_eq!(none.to_string(), "search exhausted: no available providers");
    }

    #[test]
    fn test_errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProviderError>();
        assert_send_sync::<ManagerError>();
    }
}
