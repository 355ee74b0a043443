//! OEmbed endpoint glue.
//!
//! The HTTP surface itself lives in the application; this module does the
//! OEmbed-format work behind it: parameter parsing and coercion, provider
//! dispatch through the registry, exposure checks, and mapping outcomes to
//! status codes. The result is a transport-neutral [`EndpointReply`] the
//! thin view can hand to whatever web framework hosts it.

use tracing::warn;

use crate::engine::Runtime;
use crate::providers::{ProviderRegistry, ResourceParams};
use crate::{MonocleError, Result};

const CONTENT_TYPE_JSON: &str = "application/json";
const CONTENT_TYPE_TEXT: &str = "text/plain";

/// Raw query parameters of an OEmbed request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OembedQuery {
    pub url: Option<String>,
    pub format: Option<String>,
    pub maxwidth: Option<String>,
    pub maxheight: Option<String>,
    pub callback: Option<String>,
}

impl OembedQuery {
    /// Build a query from decoded key/value pairs; unknown keys are
    /// ignored, repeated keys keep the first value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "url" => &mut query.url,
                "format" => &mut query.format,
                "maxwidth" => &mut query.maxwidth,
                "maxheight" => &mut query.maxheight,
                "callback" => &mut query.callback,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }
        query
    }
}

/// A transport-neutral endpoint response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl EndpointReply {
    fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: CONTENT_TYPE_TEXT,
            body: body.into(),
        }
    }

    fn json(body: String) -> Self {
        Self {
            status: 200,
            content_type: CONTENT_TYPE_JSON,
            body,
        }
    }
}

/// Coerce a max-dimension parameter; anything that isn't a positive
/// integer is dropped.
fn coerce_dimension(value: Option<String>) -> Option<u32> {
    value?.trim().parse().ok().filter(|n: &u32| *n > 0)
}

pub(crate) async fn handle(
    rt: &Runtime,
    registry: &ProviderRegistry,
    query: OembedQuery,
) -> EndpointReply {
    let Some(url) = query.url else {
        return EndpointReply::text(400, "url parameter is missing");
    };

    let format = query.format.as_deref().unwrap_or("json").to_lowercase();
    if format != "json" {
        return EndpointReply::text(501, format!("oembed format '{format}' is not implemented"));
    }

    let params = ResourceParams::new(
        coerce_dimension(query.maxwidth),
        coerce_dimension(query.maxheight),
    );

    let Some(provider) = registry.match_url(&url).await else {
        return EndpointReply::text(404, "oembed for this url is not available");
    };
    if !provider.expose(&rt.settings) {
        return EndpointReply::text(404, "oembed for this url is not available");
    }

    let resource = match provider.get_resource(rt, &url, &params).await {
        Ok(resource) => resource,
        Err(MonocleError::CacheBackend(error)) => {
            warn!(url = %url, %error, "cache backend failure serving oembed");
            return EndpointReply::text(500, "oembed resource temporarily unavailable");
        }
        Err(error) => {
            warn!(provider = provider.name(), url = %url, %error, "no oembed resource");
            return EndpointReply::text(404, "oembed resource is invalid or unavailable");
        }
    };

    if !resource.is_valid() {
        return EndpointReply::text(404, "oembed resource is invalid or unavailable");
    }

    match payload(&resource, query.callback.as_deref()) {
        Ok(body) => EndpointReply::json(body),
        Err(error) => {
            warn!(url = %url, %error, "failed to serialize oembed payload");
            EndpointReply::text(500, "oembed resource temporarily unavailable")
        }
    }
}

fn payload(resource: &crate::resource::Resource, callback: Option<&str>) -> Result<String> {
    let json = resource.json_payload()?;
    Ok(match callback {
        Some(callback) => format!("{callback}({json})"),
        None => json,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_pairs_picks_known_keys() {
        let query = OembedQuery::from_pairs([
            ("url", "http://vid.example/x"),
            ("format", "json"),
            ("maxwidth", "640"),
            ("ignored", "yes"),
        ]);
        assert_eq!(query.url.as_deref(), Some("http://vid.example/x"));
        assert_eq!(query.format.as_deref(), Some("json"));
        assert_eq!(query.maxwidth.as_deref(), Some("640"));
        assert_eq!(query.callback, None);
    }

    #[test]
    fn repeated_keys_keep_the_first_value() {
        let query = OembedQuery::from_pairs([("url", "http://a"), ("url", "http://b")]);
        assert_eq!(query.url.as_deref(), Some("http://a"));
    }

    #[test]
    fn dimension_coercion_drops_garbage() {
        assert_eq!(coerce_dimension(Some("640".into())), Some(640));
        assert_eq!(coerce_dimension(Some(" 480 ".into())), Some(480));
        assert_eq!(coerce_dimension(Some("0".into())), None);
        assert_eq!(coerce_dimension(Some("-5".into())), None);
        assert_eq!(coerce_dimension(Some("wide".into())), None);
        assert_eq!(coerce_dimension(None), None);
    }
}
