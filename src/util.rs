//! Small shared helpers: canonical query encoding, content-URL extraction,
//! and HTML escaping for rendered markup.

use std::collections::BTreeMap;

use url::Url;
use url::form_urlencoded;

/// Encode query parameters with a stable (lexicographic) key order.
///
/// The encoded string doubles as part of the cache key, so ordering must be
/// deterministic across processes.
pub(crate) fn canonical_query(params: &BTreeMap<&str, String>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Extract the original content URL from an OEmbed request URL.
///
/// Returns the value of the `url` query parameter, or `None` when the
/// request URL doesn't parse or carries no such parameter.
pub fn extract_content_url(request_url: &str) -> Option<String> {
    let parsed = Url::parse(request_url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
}

/// Escape text for inclusion in HTML content.
pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text for inclusion in a double-quoted HTML attribute.
pub(crate) fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
