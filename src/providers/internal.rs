//! Internal (local) OEmbed providers.
//!
//! An internal provider resolves a URL to a domain object — a database row,
//! a media record — and builds the OEmbed response from it directly. No
//! network, no refresh task; caching is optional and synchronous.
//!
//! Implementers supply two pieces: the provider itself (type, schemes,
//! allowed sizes) and a [`DataSource`] per resolved object carrying the
//! OEmbed attributes. Required attributes are driven by the resource type;
//! a source that cannot supply one fails resource building with
//! [`MonocleError::NotImplemented`].
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use monocle::{DataSource, InternalProvider, ResourceType};
//!
//! struct ClipProvider;
//! struct Clip { id: u64 }
//!
//! impl DataSource for Clip {
//!     fn html(&self) -> Option<String> {
//!         Some(format!("<iframe src=\"/clips/{}\"></iframe>", self.id))
//!     }
//!     fn title(&self) -> Option<String> {
//!         Some(format!("Clip #{}", self.id))
//!     }
//! }
//!
//! #[async_trait]
//! impl InternalProvider for ClipProvider {
//!     fn name(&self) -> &str {
//!         "clips"
//!     }
//!     fn resource_type(&self) -> ResourceType {
//!         ResourceType::Video
//!     }
//!     fn url_schemes(&self) -> Vec<String> {
//!         vec!["http://media.example/clips/*".into()]
//!     }
//!     async fn get_object(&self, url: &str) -> monocle::Result<Option<Box<dyn DataSource>>> {
//!         let id = url.rsplit('/').next().and_then(|id| id.parse().ok());
//!         Ok(id.map(|id| Box::new(Clip { id }) as Box<dyn DataSource>))
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::{ResourceParams, nearest_allowed_size};
use crate::engine::Runtime;
use crate::resource::{
    OembedField, OPTIONAL_FIELDS, Resource, ResourceData, required_fields,
};
use crate::settings::Settings;
use crate::util::canonical_query;
use crate::{MonocleError, Result};

/// A provider that computes OEmbed resources locally.
#[async_trait]
pub trait InternalProvider: Send + Sync {
    /// Provider name for logging and cache keys.
    fn name(&self) -> &str;

    /// The resource type every response of this provider carries.
    fn resource_type(&self) -> crate::resource::ResourceType;

    /// Wildcard URL patterns this provider serves. An empty list matches
    /// nothing.
    fn url_schemes(&self) -> Vec<String>;

    /// Whether the public endpoint may serve this provider. `None` defers
    /// to the `expose_local_providers` setting.
    fn expose(&self) -> Option<bool> {
        None
    }

    /// Allowed output sizes, largest preferred. An empty list defers to
    /// `resource_default_dimensions`.
    fn dimensions(&self) -> Vec<(u32, u32)> {
        Vec::new()
    }

    /// Preferred width when the caller requests no bound.
    fn default_width(&self) -> Option<u32> {
        None
    }

    /// Preferred height when the caller requests no bound.
    fn default_height(&self) -> Option<u32> {
        None
    }

    /// Resolve a URL to the object bearing the OEmbed attributes.
    ///
    /// `Ok(None)` signals "no suitable object"; the registry then keeps
    /// scanning for another provider. May touch a database — the registry
    /// never holds its lock across this call.
    async fn get_object(&self, url: &str) -> Result<Option<Box<dyn DataSource>>>;
}

/// The OEmbed attributes of one resolved object.
///
/// Every accessor defaults to `None`; implementers override the ones their
/// resource type requires plus any optional extras. [`DataSource::get`]
/// dispatches by field so resource building is a table walk.
pub trait DataSource: Send + Sync {
    /// The media URL of a photo resource (the OEmbed `url` field).
    fn photo_url(&self) -> Option<String> {
        None
    }

    fn html(&self) -> Option<String> {
        None
    }

    fn width(&self) -> Option<u32> {
        None
    }

    fn height(&self) -> Option<u32> {
        None
    }

    fn title(&self) -> Option<String> {
        None
    }

    fn author_name(&self) -> Option<String> {
        None
    }

    fn author_url(&self) -> Option<String> {
        None
    }

    fn cache_age(&self) -> Option<u64> {
        None
    }

    fn provider_name(&self) -> Option<String> {
        None
    }

    fn provider_url(&self) -> Option<String> {
        None
    }

    fn thumbnail_url(&self) -> Option<String> {
        None
    }

    fn thumbnail_width(&self) -> Option<u32> {
        None
    }

    fn thumbnail_height(&self) -> Option<u32> {
        None
    }

    /// Fetch an attribute by field.
    fn get(&self, field: OembedField) -> Option<Value> {
        match field {
            OembedField::Url => self.photo_url().map(Value::from),
            OembedField::Html => self.html().map(Value::from),
            OembedField::Width => self.width().map(Value::from),
            OembedField::Height => self.height().map(Value::from),
            OembedField::Title => self.title().map(Value::from),
            OembedField::AuthorName => self.author_name().map(Value::from),
            OembedField::AuthorUrl => self.author_url().map(Value::from),
            OembedField::CacheAge => self.cache_age().map(Value::from),
            OembedField::ProviderName => self.provider_name().map(Value::from),
            OembedField::ProviderUrl => self.provider_url().map(Value::from),
            OembedField::ThumbnailUrl => self.thumbnail_url().map(Value::from),
            OembedField::ThumbnailWidth => self.thumbnail_width().map(Value::from),
            OembedField::ThumbnailHeight => self.thumbnail_height().map(Value::from),
        }
    }
}

/// Cache key for an internally built resource, shaped like an external
/// request URL so both flows share the canonical encoding.
pub(crate) fn internal_request_url(name: &str, url: &str, params: &ResourceParams) -> String {
    let params = params.normalized();
    let mut query: std::collections::BTreeMap<&str, String> = std::collections::BTreeMap::new();
    query.insert("format", "json".to_string());
    query.insert("url", url.to_string());
    if let Some(maxwidth) = params.maxwidth {
        query.insert("maxwidth", maxwidth.to_string());
    }
    if let Some(maxheight) = params.maxheight {
        query.insert("maxheight", maxheight.to_string());
    }
    format!("internal:{name}?{}", canonical_query(&query))
}

/// Obtain a resource from an internal provider.
///
/// Without internal caching this is a direct build. With it, the flow
/// mirrors the external protocol — prime, re-date on stale — except the
/// rebuild happens synchronously right here instead of on a task.
pub(crate) async fn get_resource(
    rt: &Runtime,
    provider: &dyn InternalProvider,
    source: &dyn DataSource,
    url: &str,
    params: &ResourceParams,
) -> Result<Resource> {
    let params = params.normalized();

    if !rt.settings.cache_internal_providers {
        return build_resource(provider, source, url, &params, &rt.settings);
    }

    let key = internal_request_url(provider.name(), url, &params);
    let (mut cached, primed) = rt
        .cache
        .get_or_prime(&key, Resource::placeholder(url))
        .await?;

    let stale = !primed && cached.is_stale(&rt.settings);
    if primed || stale {
        if stale {
            // Guard against concurrent rebuilds while this one runs.
            cached.refresh();
            rt.cache.set(&key, &cached).await?;
        }
        let built = build_resource(provider, source, url, &params, &rt.settings)?;
        rt.cache.set(&key, &built).await?;
        return Ok(built);
    }

    Ok(cached)
}

/// Build the OEmbed response for one resolved object.
pub(crate) fn build_resource(
    provider: &dyn InternalProvider,
    source: &dyn DataSource,
    url: &str,
    params: &ResourceParams,
    settings: &Settings,
) -> Result<Resource> {
    let resource_type = provider.resource_type();
    let dims = effective_dimensions(provider, settings);

    let mut data = ResourceData {
        resource_type: Some(resource_type.as_str().to_string()),
        version: Some("1.0".to_string()),
        ..Default::default()
    };

    for field in required_fields(resource_type) {
        let value = source
            .get(*field)
            .or_else(|| negotiated_dimension(*field, provider, params, &dims));
        match value {
            Some(value) => data.set_field(*field, value),
            None => {
                return Err(MonocleError::NotImplemented {
                    provider: provider.name().to_string(),
                    attribute: field.name(),
                });
            }
        }
    }

    for field in OPTIONAL_FIELDS {
        if let Some(value) = source.get(*field) {
            data.set_field(*field, value);
        }
    }

    if settings.resource_check_internal_size {
        if let (Some(w), Some(h)) = (data.width, data.height) {
            check_dimension(provider.name(), w, h, params, &dims, "resource");
        }
        if let (Some(w), Some(h)) = (data.thumbnail_width, data.thumbnail_height) {
            check_dimension(provider.name(), w, h, params, &dims, "thumbnail");
        }
    }

    Ok(Resource::new(url, data))
}

fn effective_dimensions(provider: &dyn InternalProvider, settings: &Settings) -> Vec<(u32, u32)> {
    let dims = provider.dimensions();
    if dims.is_empty() {
        settings.resource_default_dimensions.clone()
    } else {
        dims
    }
}

/// Default for a missing width/height: size negotiation over the allowed
/// dimensions, seeded from the provider defaults, then the caller's maxima.
/// The negotiated pair is an allowed output size, which may exceed the
/// actual content size.
fn negotiated_dimension(
    field: OembedField,
    provider: &dyn InternalProvider,
    params: &ResourceParams,
    dims: &[(u32, u32)],
) -> Option<Value> {
    if field != OembedField::Width && field != OembedField::Height {
        return None;
    }
    let largest = dims.iter().copied().max()?;
    let width = provider
        .default_width()
        .or(params.maxwidth)
        .unwrap_or(largest.0);
    let height = provider
        .default_height()
        .or(params.maxheight)
        .unwrap_or(largest.1);
    let (width, height) =
        nearest_allowed_size(width, height, params.maxwidth, params.maxheight, dims);
    Some(Value::from(if field == OembedField::Width {
        width
    } else {
        height
    }))
}

fn check_dimension(
    provider: &str,
    width: u32,
    height: u32,
    params: &ResourceParams,
    dims: &[(u32, u32)],
    what: &str,
) {
    let (allowed_w, allowed_h) =
        nearest_allowed_size(width, height, params.maxwidth, params.maxheight, dims);
    if allowed_w < width || allowed_h < height {
        warn!(
            provider,
            what,
            width,
            height,
            allowed_w,
            allowed_h,
            "size exceeds allowable dimensions"
        );
    }
}
