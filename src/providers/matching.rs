//! URL-scheme glob matching.
//!
//! Provider URL schemes are wildcard patterns like
//! `http://*.flickr.com/photos/*`. A `*` matches any run of characters
//! non-greedily; every other character, `.` included, is literal. Matching
//! is case-insensitive and anchored at the start of the URL.

use regex::Regex;

use crate::{MonocleError, Result};

/// Compile a scheme list into one grouped matcher.
///
/// Returns `None` for an empty list: a provider with no schemes matches
/// nothing.
pub(crate) fn compile_schemes(schemes: &[String]) -> Result<Option<Regex>> {
    if schemes.is_empty() {
        return Ok(None);
    }
    let alternatives: Vec<String> = schemes.iter().map(|s| glob_to_regex(s)).collect();
    let pattern = format!("(?i)^(?:{})", alternatives.join("|"));
    Regex::new(&pattern)
        .map(Some)
        .map_err(|e| MonocleError::Configuration(format!("unusable url scheme: {e}")))
}

/// Translate one glob into regex source: escape everything, then turn each
/// `*` into a non-greedy any-run.
fn glob_to_regex(scheme: &str) -> String {
    regex::escape(scheme).replace(r"\*", ".*?")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(schemes: &[&str]) -> Regex {
        let schemes: Vec<String> = schemes.iter().map(|s| s.to_string()).collect();
        compile_schemes(&schemes).unwrap().unwrap()
    }

    #[test]
    fn empty_scheme_list_matches_nothing() {
        assert!(compile_schemes(&[]).unwrap().is_none());
    }

    #[test]
    fn wildcards_match_any_run() {
        let re = matcher(&["http://*.flickr.com/photos/*"]);
        assert!(re.is_match("http://www.flickr.com/photos/123"));
        assert!(re.is_match("http://farm1.flickr.com/photos/"));
        assert!(!re.is_match("http://flickr.com/photos/123"));
    }

    #[test]
    fn dots_are_literal() {
        let re = matcher(&["http://vimeo.com/*"]);
        assert!(re.is_match("http://vimeo.com/123"));
        assert!(!re.is_match("http://vimeoxcom/123"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let re = matcher(&["http://youtube.com/watch*"]);
        assert!(re.is_match("HTTP://YouTube.com/watch?v=abc"));
    }

    #[test]
    fn matching_is_anchored_at_start() {
        let re = matcher(&["http://vimeo.com/*"]);
        assert!(!re.is_match("see http://vimeo.com/123"));
    }

    #[test]
    fn multiple_schemes_group() {
        let re = matcher(&["http://a.example/*", "https://b.example/*"]);
        assert!(re.is_match("http://a.example/x"));
        assert!(re.is_match("https://b.example/y"));
        assert!(!re.is_match("http://c.example/z"));
    }
}
