//! External (third-party) OEmbed providers.
//!
//! An external provider never performs network I/O in the foreground. Its
//! resource acquisition is the prime-or-return protocol: prime the cache
//! with a placeholder on a miss, re-date on a stale hit, and hand the
//! actual fetch to the refresh queue. Callers always get *something* back
//! immediately — fresh data, stale data, or the placeholder.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::debug;

use super::matching::compile_schemes;
use super::store::{ExternalProviderRecord, validate_api_endpoint, validate_url_scheme};
use super::ResourceParams;
use crate::engine::Runtime;
use crate::resource::{Resource, ResourceType};
use crate::util::canonical_query;
use crate::Result;

/// A third-party OEmbed provider reached over HTTP.
#[derive(Debug, Clone)]
pub struct ExternalProvider {
    name: String,
    api_endpoint: String,
    resource_type: ResourceType,
    expose: bool,
    url_schemes: Vec<String>,
    matcher: Option<Regex>,
}

impl ExternalProvider {
    /// Create a provider, validating the endpoint and schemes.
    pub fn new(
        name: impl Into<String>,
        api_endpoint: impl Into<String>,
        resource_type: ResourceType,
        url_schemes: Vec<String>,
        expose: bool,
    ) -> Result<Self> {
        let api_endpoint = api_endpoint.into();
        validate_api_endpoint(&api_endpoint)?;
        for scheme in &url_schemes {
            validate_url_scheme(scheme)?;
        }
        let matcher = compile_schemes(&url_schemes)?;
        Ok(Self {
            name: name.into(),
            api_endpoint,
            resource_type,
            expose,
            url_schemes,
            matcher,
        })
    }

    /// Build a provider from a persisted configuration record.
    pub fn from_record(record: &ExternalProviderRecord) -> Result<Self> {
        Self::new(
            record.name.clone(),
            record.api_endpoint.clone(),
            record.resource_type,
            record.url_schemes.clone(),
            record.expose,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn expose(&self) -> bool {
        self.expose
    }

    pub fn url_schemes(&self) -> &[String] {
        &self.url_schemes
    }

    /// Whether `url` matches one of this provider's URL schemes.
    pub fn matches(&self, url: &str) -> bool {
        self.matcher.as_ref().is_some_and(|re| re.is_match(url))
    }

    /// The upstream request URL for `url`, which doubles as the cache key.
    ///
    /// Query keys are encoded in lexicographic order so the URL is stable
    /// for identical requests. Zero/absent max dimensions are dropped.
    pub fn request_url(&self, url: &str, params: &ResourceParams) -> String {
        let params = params.normalized();
        let mut query: BTreeMap<&str, String> = BTreeMap::new();
        query.insert("format", "json".to_string());
        query.insert("url", url.to_string());
        if let Some(maxwidth) = params.maxwidth {
            query.insert("maxwidth", maxwidth.to_string());
        }
        if let Some(maxheight) = params.maxheight {
            query.insert("maxheight", maxheight.to_string());
        }
        format!("{}?{}", self.api_endpoint, canonical_query(&query))
    }

    /// Obtain the resource for `url` without blocking on the upstream API.
    ///
    /// Primes the cache with an invalid placeholder on a miss; re-dates
    /// stale entries before scheduling so concurrent observers don't pile
    /// duplicate refreshes onto the queue.
    pub(crate) async fn get_resource(
        &self,
        rt: &Runtime,
        url: &str,
        params: &ResourceParams,
    ) -> Result<Resource> {
        let request_url = self.request_url(url, params);

        let (mut cached, primed) = rt
            .cache
            .get_or_prime(&request_url, Resource::placeholder(url))
            .await?;

        let stale = !primed && cached.is_stale(&rt.settings);
        if primed || stale {
            if stale {
                // First stale observer re-dates the entry so later ones see
                // a fresh value and skip scheduling.
                cached.refresh();
                rt.cache.set(&request_url, &cached).await?;
            }
            debug!(provider = %self.name, url = %request_url, "scheduling oembed refresh");
            rt.queue.enqueue(request_url);
        }

        Ok(cached)
    }
}
