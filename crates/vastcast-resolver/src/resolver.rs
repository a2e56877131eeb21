//! Clickthrough resolution chain.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use vastcast_models::ResolvedDestination;

use crate::params::extract_embedded_destination;
use crate::redirect::{HttpRedirectFollower, RedirectFollower, Resolution};

/// Resolves a raw clickthrough to its landing page.
///
/// 1. Look for a destination embedded in a tracker parameter.
/// 2. If found, follow its redirects; on failure keep the embedded URL.
/// 3. If not found, follow redirects from the raw URL itself and keep the
///    result only when it differs from the input.
///
/// Never fails: the most specific URL known is always returned, and the raw
/// clickthrough is preserved alongside it.
#[derive(Clone)]
pub struct ClickthroughResolver {
    follower: Arc<dyn RedirectFollower>,
}

impl ClickthroughResolver {
    /// Create a resolver over any redirect follower.
    pub fn new(follower: Arc<dyn RedirectFollower>) -> Self {
        Self { follower }
    }

    /// Create a resolver that follows redirects over HTTP.
    pub fn http(timeout: Duration, max_redirects: usize) -> Result<Self, reqwest::Error> {
        let follower = HttpRedirectFollower::new(timeout, max_redirects)?;
        Ok(Self::new(Arc::new(follower)))
    }

    /// Resolve a raw clickthrough.
    pub async fn resolve(&self, raw: &str) -> ResolvedDestination {
        if raw.is_empty() {
            return ResolvedDestination::unresolved(raw);
        }

        match extract_embedded_destination(raw) {
            Some(embedded) => {
                debug!(embedded = %embedded, "Found embedded destination");
                let resolved = match self.follower.follow(&embedded).await {
                    Resolution::Resolved(url) => url,
                    Resolution::Unresolved { url, reason } => {
                        warn!(url = %url, reason = %reason, "Resolution degraded, using embedded destination");
                        url
                    }
                };
                info!(raw = %raw, resolved = %resolved, "Resolved clickthrough");
                ResolvedDestination {
                    raw: raw.to_string(),
                    resolved,
                    embedded: Some(embedded),
                }
            }
            None => {
                debug!(raw = %raw, "No embedded destination, following raw clickthrough");
                let resolved = match self.follower.follow(raw).await {
                    Resolution::Resolved(url) if url != raw => url,
                    Resolution::Resolved(_) => raw.to_string(),
                    Resolution::Unresolved { reason, .. } => {
                        warn!(raw = %raw, reason = %reason, "Resolution degraded, using raw clickthrough");
                        raw.to_string()
                    }
                };
                ResolvedDestination {
                    raw: raw.to_string(),
                    resolved,
                    embedded: None,
                }
            }
        }
    }
}
