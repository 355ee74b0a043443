//! Content enrichment: finding URLs and substituting embedded media.
//!
//! A [`Consumer`] walks a block of content, matches each URL against the
//! provider registry, and swaps the URL for the rendered resource. The
//! text path treats content as an opaque string; the HTML path
//! ([`Consumer::devour`]) parses the content first and leaves hyperlinked
//! URLs alone.
//!
//! Per-URL failures are logged and swallowed — one misbehaving provider
//! must not poison a whole document.

mod html;

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::warn;

use crate::engine::Runtime;
use crate::events::Event;
use crate::providers::{ProviderRegistry, ResourceParams};
use crate::telemetry;

/// URLs eligible for embedding. Deliberately permissive about trailing
/// characters commonly found inside URLs, while refusing to end on
/// punctuation.
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://[-A-Za-z0-9+&@#/%?=~_()|!:,.;]*[-A-Za-z0-9+&@#/%=~_|]").unwrap()
});

/// Extract embeddable URLs in first-occurrence order, deduplicated.
pub(crate) fn extract_urls(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    URL_PATTERN
        .find_iter(content)
        .map(|m| m.as_str().to_string())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Whether any embeddable URL occurs in `text`.
pub(crate) fn contains_url(text: &str) -> bool {
    URL_PATTERN.is_match(text)
}

/// The enrichment pipeline over one registry.
pub struct Consumer {
    rt: Arc<Runtime>,
    registry: Arc<ProviderRegistry>,
    skip_internal: bool,
}

impl Consumer {
    pub(crate) fn new(
        rt: Arc<Runtime>,
        registry: Arc<ProviderRegistry>,
        skip_internal: bool,
    ) -> Self {
        Self {
            rt,
            registry,
            skip_internal,
        }
    }

    /// Replace every matched URL in plain-text content with its rendered
    /// resource.
    ///
    /// Substitutions happen in first-occurrence order and replace all
    /// occurrences of a URL at once, so later iterations operate on
    /// already-enriched content and never re-expand an embedded URL.
    pub async fn enrich(&self, content: &str, params: &ResourceParams) -> String {
        self.rt.events.emit(Event::PreConsume);
        metrics::counter!(telemetry::CONSUME_TOTAL, "mode" => "text").increment(1);
        let enriched = self.enrich_urls(content, params).await;
        self.rt.events.emit(Event::PostConsume);
        enriched
    }

    /// Enrich HTML content, leaving hyperlinked URLs untouched.
    pub async fn devour(&self, content: &str, params: &ResourceParams) -> String {
        self.rt.events.emit(Event::PreConsume);
        metrics::counter!(telemetry::CONSUME_TOTAL, "mode" => "html").increment(1);
        let enriched = html::devour(self, content, params).await;
        self.rt.events.emit(Event::PostConsume);
        enriched
    }

    pub(crate) async fn enrich_urls(&self, content: &str, params: &ResourceParams) -> String {
        self.registry.ensure_populated().await;

        let mut content = content.to_string();
        for url in extract_urls(&content) {
            let Some(provider) = self.registry.match_url(&url).await else {
                continue;
            };

            // Without internal caching an internal pass is wasted work for
            // cache-warming consumers.
            if provider.is_internal()
                && self.skip_internal
                && !self.rt.settings.cache_internal_providers
            {
                continue;
            }

            match provider.get_resource(&self.rt, &url, params).await {
                Ok(resource) => {
                    metrics::counter!(
                        telemetry::URLS_REPLACED_TOTAL,
                        "provider" => provider.name().to_string()
                    )
                    .increment(1);
                    content = content.replace(&url, &resource.render(&self.rt.settings));
                }
                Err(error) => {
                    warn!(provider = provider.name(), url = %url, %error, "leaving url unembedded");
                }
            }
        }
        content
    }
}

/// One entry in a prefetch size matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchSize {
    /// Explicit (maxwidth, maxheight) bounds; either may be absent.
    Bounds(Option<u32>, Option<u32>),
    /// A single dimension, expanded to width-only, height-only, and square
    /// passes.
    Square(u32),
}

/// Warm the cache for every URL in `content` across a size matrix.
///
/// Runs a skip-internal consumer once with no bounds, then once per
/// expanded size entry. The enriched output is discarded; the point is the
/// cache/priming side effects.
pub(crate) async fn prefetch(
    rt: Arc<Runtime>,
    registry: Arc<ProviderRegistry>,
    content: &str,
    html: bool,
    sizes: &[PrefetchSize],
) {
    let consumer = Consumer::new(rt, registry, true);

    let mut passes = vec![ResourceParams::default()];
    for size in sizes {
        match *size {
            PrefetchSize::Bounds(maxwidth, maxheight) => {
                passes.push(ResourceParams::new(maxwidth, maxheight));
            }
            PrefetchSize::Square(s) => {
                passes.push(ResourceParams::new(Some(s), None));
                passes.push(ResourceParams::new(None, Some(s)));
                passes.push(ResourceParams::new(Some(s), Some(s)));
            }
        }
    }

    for params in passes {
        if html {
            consumer.devour(content, &params).await;
        } else {
            consumer.enrich(content, &params).await;
        }
    }
}
