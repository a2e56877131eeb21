//! Security utilities for input validation.
//!
//! This module provides:
//! - Validation of VAST URLs before they are fetched (SSRF protection),
//!   including every redirect hop taken while fetching
//! - Artifact filename validation for the delivery endpoint

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use tracing::warn;
use url::{Host, Url};
use vastcast_vast::{VastFetcher, VastResult};

/// Maximum URL length to prevent DoS attacks.
const MAX_URL_LENGTH: usize = 2048;

/// Maximum artifact filename length.
const MAX_ARTIFACT_NAME_LENGTH: usize = 256;

/// Hostnames that always point at the local machine or cloud metadata.
const BLOCKED_HOSTS: &[&str] = &["localhost", "metadata", "metadata.google.internal"];

/// Result of URL validation.
#[derive(Debug, PartialEq, Eq)]
pub enum UrlValidationResult {
    /// URL is valid and allowed.
    Valid(Url),
    /// URL is malformed or uses an unsupported protocol.
    Invalid(String),
    /// URL targets an internal or restricted endpoint.
    Blocked(String),
    /// URL exceeds maximum length.
    TooLong,
}

impl UrlValidationResult {
    /// Convert to Result for easy error handling.
    pub fn into_result(self) -> Result<Url, String> {
        match self {
            Self::Valid(url) => Ok(url),
            Self::Invalid(msg) | Self::Blocked(msg) => Err(msg),
            Self::TooLong => Err(format!("URL exceeds maximum length of {MAX_URL_LENGTH} characters")),
        }
    }
}

/// Validate a URL the server is asked to fetch a VAST document from.
///
/// Only http(s) URLs whose host is not loopback, private, link-local or a
/// metadata endpoint are allowed.
pub fn validate_vast_url(url: &Url) -> UrlValidationResult {
    if url.as_str().len() > MAX_URL_LENGTH {
        return UrlValidationResult::TooLong;
    }

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return UrlValidationResult::Invalid(format!(
                "Invalid protocol '{scheme}'. Only HTTP and HTTPS are allowed."
            ))
        }
    }

    let blocked = match url.host() {
        None => return UrlValidationResult::Invalid("URL must have a valid host".to_string()),
        Some(Host::Domain(domain)) => is_blocked_domain(domain),
        Some(Host::Ipv4(ip)) => is_restricted_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_restricted_ip(IpAddr::V6(ip)),
    };

    if blocked {
        warn!(url = %url, "Blocked VAST URL targeting a restricted host");
        return UrlValidationResult::Blocked(
            "URL appears to target an internal or restricted endpoint".to_string(),
        );
    }

    UrlValidationResult::Valid(url.clone())
}

/// Build the fetcher for remote VAST inputs. Redirect targets go through
/// [`validate_vast_url`] before they are followed.
pub fn guarded_vast_fetcher(timeout: Duration) -> VastResult<VastFetcher> {
    VastFetcher::with_url_guard(timeout, |url| validate_vast_url(url).into_result().map(drop))
}

fn is_blocked_domain(domain: &str) -> bool {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    BLOCKED_HOSTS.contains(&domain.as_str()) || domain.ends_with(".localhost") || domain.ends_with(".internal")
}

fn is_restricted_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => is_restricted_ipv4(ip),
        IpAddr::V6(ip) => match ip.to_ipv4_mapped() {
            Some(mapped) => is_restricted_ipv4(mapped),
            None => is_restricted_ipv6(ip),
        },
    }
}

fn is_restricted_ipv4(ip: Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // Carrier-grade NAT, 100.64.0.0/10
        || (ip.octets()[0] == 100 && (ip.octets()[1] & 0xc0) == 64)
}

fn is_restricted_ipv6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // Unique local, fc00::/7
        || (first & 0xfe00) == 0xfc00
        // Link local, fe80::/10
        || (first & 0xffc0) == 0xfe80
}

/// Validate an artifact filename.
///
/// Valid format: alphanumeric, hyphens, underscores, dots. No path traversal.
pub fn is_valid_artifact_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_ARTIFACT_NAME_LENGTH {
        return false;
    }
    if name.contains("..") || name.starts_with('.') {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}
