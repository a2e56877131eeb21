//! Text handling for drawtext captions.

/// Longest URL shown on screen, in characters.
pub const MAX_DISPLAY_URL_CHARS: usize = 70;

const ELLIPSIS: &str = "...";

/// Characters the drawtext expansion pass consumes.
const EXPANSION_SPECIALS: &[char] = &['\\', '%'];

/// Characters that quote or end a filter option value.
const OPTION_SPECIALS: &[char] = &['\\', '\'', ':'];

/// Characters that quote or end the arguments of a filter in a graph.
const GRAPH_SPECIALS: &[char] = &['\\', '\'', '[', ']', ',', ';'];

/// Escape literal caption text for drawtext expansion, so `%` never starts
/// a `%{...}` sequence.
///
/// The result is still an option value; pass it through
/// [`escape_option_value`] before building the filter.
pub fn escape_drawtext(text: &str) -> String {
    backslash_escape(text, EXPANSION_SPECIALS, |_| false)
}

/// Escape one `key=value` option value of a filter.
///
/// Leading and trailing whitespace is escaped as well, since the option
/// parser trims it.
pub fn escape_option_value(value: &str) -> String {
    let body_start = value.len() - value.trim_start_matches(is_token_space).len();
    let body_end = value.trim_end_matches(is_token_space).len();
    backslash_escape(value, OPTION_SPECIALS, |i| i < body_start || i >= body_end)
}

/// Escape the `:`-joined arguments of one filter for use inside a filter graph.
pub fn escape_filter_args(args: &str) -> String {
    backslash_escape(args, GRAPH_SPECIALS, |_| false)
}

fn is_token_space(c: char) -> bool {
    matches!(c, ' ' | '\n' | '\t' | '\r')
}

fn backslash_escape(text: &str, specials: &[char], force: impl Fn(usize) -> bool) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for (i, c) in text.char_indices() {
        if specials.contains(&c) || force(i) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Format a destination URL for on-screen display.
///
/// The URL is percent-decoded, its leading `http://` or `https://` is
/// removed and the result is cut to [`MAX_DISPLAY_URL_CHARS`] characters,
/// ending in `...` when shortened.
pub fn display_url(url: &str) -> String {
    let decoded = urlencoding::decode(url)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| url.to_string());

    let stripped = strip_scheme(&decoded);
    truncate_chars(stripped, MAX_DISPLAY_URL_CHARS)
}

fn strip_scheme(url: &str) -> &str {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let keep = max - ELLIPSIS.len();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}
