//! Redirect following.
//!
//! Resolution is best-effort: every failure is a [`Resolution::Unresolved`]
//! value carrying the input URL and a reason, never an error.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Client};
use tracing::debug;

/// Timeout applied to connect and to the whole request.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(20);

/// Maximum redirect hops followed.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Why a URL could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// Only http and https URLs are followed
    UnsupportedScheme,
    /// The hop limit was exceeded
    TooManyRedirects,
    /// Connect or response timed out
    Timeout,
    /// Any other transport failure
    Network(String),
}

impl UnresolvedReason {
    /// Short label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnresolvedReason::UnsupportedScheme => "unsupported_scheme",
            UnresolvedReason::TooManyRedirects => "too_many_redirects",
            UnresolvedReason::Timeout => "timeout",
            UnresolvedReason::Network(_) => "network",
        }
    }
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::Network(msg) => write!(f, "network error: {msg}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Outcome of following redirects from one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Final URL after following redirects
    Resolved(String),
    /// The input URL, unchanged, and why resolution stopped
    Unresolved { url: String, reason: UnresolvedReason },
}

impl Resolution {
    /// Best URL known: the final one, or the input on failure.
    pub fn url(&self) -> &str {
        match self {
            Resolution::Resolved(url) => url,
            Resolution::Unresolved { url, .. } => url,
        }
    }

    /// Whether the request completed.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// Follows HTTP redirects to a final URL.
#[async_trait]
pub trait RedirectFollower: Send + Sync {
    /// Follow redirects starting at `url`.
    async fn follow(&self, url: &str) -> Resolution;
}

/// [`RedirectFollower`] issuing real GET requests.
#[derive(Debug, Clone)]
pub struct HttpRedirectFollower {
    http: Client,
}

impl HttpRedirectFollower {
    /// Create a follower with a per-request timeout and hop limit.
    pub fn new(timeout: Duration, max_redirects: usize) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .redirect(redirect::Policy::limited(max_redirects))
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl RedirectFollower for HttpRedirectFollower {
    async fn follow(&self, url: &str) -> Resolution {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Resolution::Unresolved {
                url: url.to_string(),
                reason: UnresolvedReason::UnsupportedScheme,
            };
        }

        match self.http.get(url).send().await {
            Ok(response) => {
                debug!(
                    url = %url,
                    final_url = %response.url(),
                    status = %response.status(),
                    "Followed redirects"
                );
                Resolution::Resolved(response.url().to_string())
            }
            Err(e) => {
                let reason = if e.is_timeout() {
                    UnresolvedReason::Timeout
                } else if e.is_redirect() {
                    UnresolvedReason::TooManyRedirects
                } else {
                    UnresolvedReason::Network(e.to_string())
                };
                Resolution::Unresolved {
                    url: url.to_string(),
                    reason,
                }
            }
        }
    }
}
