//! Embedded destination extraction from tracker query parameters.

use url::form_urlencoded;

/// Query parameters that may carry the destination, in priority order.
///
/// `click` is checked first; the rest follow the conventions of common
/// ad-server redirectors. The first parameter present wins regardless of
/// its position in the query string.
pub const DESTINATION_PARAMS: &[&str] = &["click", "u", "url", "redirect_url", "destination_url", "finalUrl"];

/// Find the destination URL embedded in a tracker clickthrough.
///
/// Query values are percent-decoded once. A value that still does not look
/// like an absolute http(s) URL but contains escapes is decoded a second
/// time, which unwraps double-encoded trackers. Empty values are ignored.
pub fn extract_embedded_destination(clickthrough: &str) -> Option<String> {
    let pairs = query_pairs(clickthrough);

    DESTINATION_PARAMS.iter().find_map(|param| {
        pairs
            .iter()
            .find(|(key, value)| key == param && !value.is_empty())
            .map(|(_, value)| decode_destination(value))
    })
}

/// Parse the query of a possibly non-conforming URL.
///
/// Tracker URLs often contain unexpanded macros or are missing a scheme, so
/// the query is split out by hand rather than through a full URL parse.
fn query_pairs(raw: &str) -> Vec<(String, String)> {
    let Some((_, query)) = raw.split_once('?') else {
        return Vec::new();
    };
    let query = query.split_once('#').map_or(query, |(q, _)| q);

    form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn decode_destination(value: &str) -> String {
    if looks_absolute(value) || !value.contains('%') {
        return value.to_string();
    }

    match urlencoding::decode(value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value.to_string(),
    }
}

fn looks_absolute(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
