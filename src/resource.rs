//! OEmbed response value object.
//!
//! A [`Resource`] is the JSON-shaped OEmbed response for one content URL
//! plus freshness metadata. Resources are created by providers (as empty
//! placeholders on a cache miss, fully populated on refresh), mutated only
//! by the refresh path, and destroyed by cache eviction.
//!
//! A resource may be *invalid* (placeholder, unknown type, missing required
//! fields) and still be cacheable — caching invalid placeholders is what
//! keeps a stampede of foreground requests from hammering a slow provider.
//! Rendering distinguishes the two cases.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::settings::Settings;
use crate::util::{escape_attr, escape_text};
use crate::{MonocleError, Result};

/// The four OEmbed resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Link,
    Photo,
    Rich,
    Video,
}

impl ResourceType {
    /// All valid resource types.
    pub const ALL: [ResourceType; 4] = [
        ResourceType::Link,
        ResourceType::Photo,
        ResourceType::Rich,
        ResourceType::Video,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Link => "link",
            ResourceType::Photo => "photo",
            ResourceType::Rich => "rich",
            ResourceType::Video => "video",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = MonocleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "link" => Ok(ResourceType::Link),
            "photo" => Ok(ResourceType::Photo),
            "rich" => Ok(ResourceType::Rich),
            "video" => Ok(ResourceType::Video),
            other => Err(MonocleError::Configuration(format!(
                "'{other}' is not a valid resource type"
            ))),
        }
    }
}

/// The OEmbed data attributes a provider may supply.
///
/// `type` and `version` are handled separately; everything else is resolved
/// through this enum, which makes the required-by-type contract a static
/// table lookup instead of stringly-typed attribute access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OembedField {
    /// The media URL of a photo resource (the OEmbed `url` field, distinct
    /// from the content URL).
    Url,
    Html,
    Width,
    Height,
    Title,
    AuthorName,
    AuthorUrl,
    CacheAge,
    ProviderName,
    ProviderUrl,
    ThumbnailUrl,
    ThumbnailWidth,
    ThumbnailHeight,
}

impl OembedField {
    /// The field's wire name.
    pub fn name(&self) -> &'static str {
        match self {
            OembedField::Url => "url",
            OembedField::Html => "html",
            OembedField::Width => "width",
            OembedField::Height => "height",
            OembedField::Title => "title",
            OembedField::AuthorName => "author_name",
            OembedField::AuthorUrl => "author_url",
            OembedField::CacheAge => "cache_age",
            OembedField::ProviderName => "provider_name",
            OembedField::ProviderUrl => "provider_url",
            OembedField::ThumbnailUrl => "thumbnail_url",
            OembedField::ThumbnailWidth => "thumbnail_width",
            OembedField::ThumbnailHeight => "thumbnail_height",
        }
    }
}

/// Fields a resource of the given type must carry to be valid.
pub fn required_fields(resource_type: ResourceType) -> &'static [OembedField] {
    match resource_type {
        ResourceType::Link => &[],
        ResourceType::Photo => &[OembedField::Url, OembedField::Width, OembedField::Height],
        ResourceType::Rich | ResourceType::Video => {
            &[OembedField::Html, OembedField::Width, OembedField::Height]
        }
    }
}

/// Fields that are optional for every resource type.
pub const OPTIONAL_FIELDS: &[OembedField] = &[
    OembedField::Title,
    OembedField::AuthorName,
    OembedField::AuthorUrl,
    OembedField::CacheAge,
    OembedField::ProviderName,
    OembedField::ProviderUrl,
    OembedField::ThumbnailUrl,
    OembedField::ThumbnailWidth,
    OembedField::ThumbnailHeight,
];

/// Provider-advertised cache age.
///
/// Providers disagree on the wire encoding: some send an integer, some a
/// string. Both are accepted; anything unparseable simply contributes no
/// TTL and the configured default applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheAge {
    Seconds(i64),
    Text(String),
}

impl CacheAge {
    /// The advertised age in seconds, when it parses as an integer.
    pub fn as_secs(&self) -> Option<i64> {
        match self {
            CacheAge::Seconds(secs) => Some(*secs),
            CacheAge::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl From<u64> for CacheAge {
    fn from(secs: u64) -> Self {
        CacheAge::Seconds(secs as i64)
    }
}

/// The OEmbed payload of a [`Resource`].
///
/// Absent fields are skipped on serialization, so the emitted JSON carries
/// only populated members. Unrecognised provider fields are preserved in
/// `extra` and round-trip through the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    /// The resource type as sent by the provider. Kept as a string so an
    /// unknown type yields an invalid (but cacheable) resource instead of a
    /// parse failure.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_age: Option<CacheAge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_height: Option<u32>,
    #[serde(flatten)]
    pub extra: std::collections::BTreeMap<String, Value>,
}

impl ResourceData {
    /// Whether no data at all has been supplied (a placeholder).
    pub fn is_empty(&self) -> bool {
        *self == ResourceData::default()
    }

    /// The parsed resource type, when it is one of the four valid types.
    pub fn parsed_type(&self) -> Option<ResourceType> {
        self.resource_type.as_deref().and_then(|t| t.parse().ok())
    }

    /// Whether the given attribute is populated.
    pub fn has_field(&self, field: OembedField) -> bool {
        match field {
            OembedField::Url => self.url.is_some(),
            OembedField::Html => self.html.is_some(),
            OembedField::Width => self.width.is_some(),
            OembedField::Height => self.height.is_some(),
            OembedField::Title => self.title.is_some(),
            OembedField::AuthorName => self.author_name.is_some(),
            OembedField::AuthorUrl => self.author_url.is_some(),
            OembedField::CacheAge => self.cache_age.is_some(),
            OembedField::ProviderName => self.provider_name.is_some(),
            OembedField::ProviderUrl => self.provider_url.is_some(),
            OembedField::ThumbnailUrl => self.thumbnail_url.is_some(),
            OembedField::ThumbnailWidth => self.thumbnail_width.is_some(),
            OembedField::ThumbnailHeight => self.thumbnail_height.is_some(),
        }
    }

    /// Set an attribute from a loosely typed value. Values of the wrong
    /// shape for the field are ignored.
    pub(crate) fn set_field(&mut self, field: OembedField, value: Value) {
        fn string(value: Value) -> Option<String> {
            match value {
                Value::String(s) => Some(s),
                other => Some(other.to_string()).filter(|_| !other.is_null()),
            }
        }
        fn dimension(value: &Value) -> Option<u32> {
            value.as_u64().and_then(|n| u32::try_from(n).ok())
        }

        match field {
            OembedField::Url => self.url = string(value),
            OembedField::Html => self.html = string(value),
            OembedField::Width => self.width = dimension(&value),
            OembedField::Height => self.height = dimension(&value),
            OembedField::Title => self.title = string(value),
            OembedField::AuthorName => self.author_name = string(value),
            OembedField::AuthorUrl => self.author_url = string(value),
            OembedField::CacheAge => {
                self.cache_age = value.as_i64().map(CacheAge::Seconds);
            }
            OembedField::ProviderName => self.provider_name = string(value),
            OembedField::ProviderUrl => self.provider_url = string(value),
            OembedField::ThumbnailUrl => self.thumbnail_url = string(value),
            OembedField::ThumbnailWidth => self.thumbnail_width = dimension(&value),
            OembedField::ThumbnailHeight => self.thumbnail_height = dimension(&value),
        }
    }
}

/// An OEmbed response with freshness metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// The original content URL this resource embeds.
    pub url: String,
    /// Timestamp of the last refresh (RFC 3339 in the cache format).
    pub created_at: DateTime<Utc>,
    /// The OEmbed payload.
    pub data: ResourceData,
}

impl Resource {
    /// Create a resource from provider data, dated now.
    pub fn new(url: impl Into<String>, data: ResourceData) -> Self {
        Self {
            url: url.into(),
            created_at: Utc::now(),
            data,
        }
    }

    /// Create an empty placeholder resource for priming the cache.
    ///
    /// Placeholders are invalid by construction but still cacheable.
    pub fn placeholder(url: impl Into<String>) -> Self {
        Self::new(url, ResourceData::default())
    }

    /// Effective TTL in seconds.
    ///
    /// The provider-advertised `cache_age` clamped up to the configured
    /// minimum; the configured default when absent or unparseable.
    pub fn ttl(&self, settings: &Settings) -> u64 {
        match self.data.cache_age.as_ref().and_then(CacheAge::as_secs) {
            Some(secs) => settings.resource_min_ttl.max(secs.max(0) as u64),
            None => settings.resource_default_ttl,
        }
    }

    /// Whether the resource's age exceeds its TTL.
    ///
    /// A stale resource is still usable; it just triggers a background
    /// refresh on the next lookup.
    pub fn is_stale(&self, settings: &Settings) -> bool {
        let age = Utc::now()
            .signed_duration_since(self.created_at)
            .num_seconds();
        age > self.ttl(settings) as i64
    }

    /// Re-date the resource to now, making it fresh again.
    pub fn refresh(&mut self) {
        self.created_at = Utc::now();
    }

    /// Whether this is a well-formed OEmbed response: some data, a valid
    /// type, and every field that type requires.
    pub fn is_valid(&self) -> bool {
        if self.data.is_empty() {
            return false;
        }
        let Some(resource_type) = self.data.parsed_type() else {
            return false;
        };
        required_fields(resource_type)
            .iter()
            .all(|field| self.data.has_field(*field))
    }

    /// The OEmbed JSON payload, without `created_at` or the content URL.
    pub fn json_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.data)?)
    }

    /// Render this resource to embeddable HTML.
    ///
    /// Invalid resources render as a plain hyperlink when
    /// `resource_urlize_invalid` is set, or pass the URL through untouched
    /// otherwise. Valid resources render by type: anchors for links, an
    /// `<img>` for photos, and the provider-supplied markup for rich and
    /// video resources.
    pub fn render(&self, settings: &Settings) -> String {
        if !self.is_valid() {
            if settings.resource_urlize_invalid {
                return self.render_link();
            }
            return self.url.clone();
        }
        match self.data.parsed_type() {
            Some(ResourceType::Photo) => self.render_photo(),
            Some(ResourceType::Rich) | Some(ResourceType::Video) => {
                self.data.html.clone().unwrap_or_default()
            }
            _ => self.render_link(),
        }
    }

    fn render_link(&self) -> String {
        let text = self.data.title.as_deref().unwrap_or(&self.url);
        format!(
            r#"<a href="{}">{}</a>"#,
            escape_attr(&self.url),
            escape_text(text)
        )
    }

    fn render_photo(&self) -> String {
        let src = self.data.url.as_deref().unwrap_or_default();
        let mut img = format!(r#"<img src="{}""#, escape_attr(src));
        if let Some(width) = self.data.width {
            img.push_str(&format!(r#" width="{width}""#));
        }
        if let Some(height) = self.data.height {
            img.push_str(&format!(r#" height="{height}""#));
        }
        if let Some(title) = &self.data.title {
            img.push_str(&format!(r#" alt="{}""#, escape_attr(title)));
        }
        img.push('>');
        img
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn video_data() -> ResourceData {
        ResourceData {
            resource_type: Some("video".into()),
            version: Some("1.0".into()),
            html: Some("<iframe></iframe>".into()),
            width: Some(640),
            height: Some(360),
            ..Default::default()
        }
    }

    #[test]
    fn placeholder_is_invalid_but_has_url() {
        let r = Resource::placeholder("http://vid.example/x");
        assert!(!r.is_valid());
        assert_eq!(r.url, "http://vid.example/x");
    }

    #[test]
    fn validity_requires_type_and_required_fields() {
        let mut r = Resource::new("http://vid.example/x", video_data());
        assert!(r.is_valid());

        r.data.html = None;
        assert!(!r.is_valid());

        let mut r = Resource::new("http://vid.example/x", video_data());
        r.data.resource_type = Some("carousel".into());
        assert!(!r.is_valid());
    }

    #[test]
    fn link_resources_need_no_extra_fields() {
        let data = ResourceData {
            resource_type: Some("link".into()),
            version: Some("1.0".into()),
            ..Default::default()
        };
        assert!(Resource::new("http://a.example", data).is_valid());
    }

    #[test]
    fn ttl_defaults_when_cache_age_missing_or_garbage() {
        let settings = Settings::default();
        let mut r = Resource::new("http://a.example", video_data());
        assert_eq!(r.ttl(&settings), settings.resource_default_ttl);

        r.data.cache_age = Some(CacheAge::Text("whenever".into()));
        assert_eq!(r.ttl(&settings), settings.resource_default_ttl);
    }

    #[test]
    fn ttl_clamps_to_minimum() {
        let settings = Settings::default();
        let mut r = Resource::new("http://a.example", video_data());

        r.data.cache_age = Some(CacheAge::Seconds(10));
        assert_eq!(r.ttl(&settings), settings.resource_min_ttl);

        r.data.cache_age = Some(CacheAge::Seconds(-30));
        assert_eq!(r.ttl(&settings), settings.resource_min_ttl);

        r.data.cache_age = Some(CacheAge::Text("7200".into()));
        assert_eq!(r.ttl(&settings), 7200);
    }

    #[test]
    fn staleness_follows_created_at() {
        let settings = Settings::default();
        let mut r = Resource::new("http://a.example", video_data());
        assert!(!r.is_stale(&settings));

        r.created_at = Utc.with_ymd_and_hms(1984, 1, 1, 0, 0, 0).unwrap();
        assert!(r.is_stale(&settings));

        r.refresh();
        assert!(!r.is_stale(&settings));
    }

    #[test]
    fn payload_skips_absent_fields_and_created_at() {
        let r = Resource::new("http://vid.example/x", video_data());
        let payload = r.json_payload().unwrap();
        assert!(payload.contains(r#""type":"video""#));
        assert!(payload.contains(r#""width":640"#));
        assert!(!payload.contains("created_at"));
        assert!(!payload.contains("title"));
    }

    #[test]
    fn cache_format_roundtrips_with_extra_fields() {
        let mut data = video_data();
        data.extra
            .insert("duration".into(), Value::from(42));
        let r = Resource::new("http://vid.example/x", data);

        let serialized = serde_json::to_string(&r).unwrap();
        let restored: Resource = serde_json::from_str(&serialized).unwrap();
        assert_eq!(restored, r);
        assert_eq!(restored.data.extra["duration"], Value::from(42));
    }

    #[test]
    fn string_cache_age_survives_parsing() {
        let data: ResourceData =
            serde_json::from_str(r#"{"type":"link","cache_age":"3600"}"#).unwrap();
        assert_eq!(data.cache_age.unwrap().as_secs(), Some(3600));
    }

    #[test]
    fn render_invalid_urlizes_by_default() {
        let settings = Settings::default();
        let r = Resource::placeholder("http://vid.example/x");
        assert_eq!(
            r.render(&settings),
            r#"<a href="http://vid.example/x">http://vid.example/x</a>"#
        );
    }

    #[test]
    fn render_invalid_passes_url_through_when_urlize_off() {
        let settings = Settings {
            resource_urlize_invalid: false,
            ..Default::default()
        };
        let r = Resource::placeholder("http://vid.example/x");
        assert_eq!(r.render(&settings), "http://vid.example/x");
    }

    #[test]
    fn render_video_emits_provider_markup() {
        let settings = Settings::default();
        let r = Resource::new("http://vid.example/x", video_data());
        assert_eq!(r.render(&settings), "<iframe></iframe>");
    }

    #[test]
    fn render_photo_builds_img_tag() {
        let settings = Settings::default();
        let data = ResourceData {
            resource_type: Some("photo".into()),
            version: Some("1.0".into()),
            url: Some("http://img.example/p.jpg".into()),
            width: Some(200),
            height: Some(100),
            title: Some("a \"photo\"".into()),
            ..Default::default()
        };
        let r = Resource::new("http://photo.example/p", data);
        assert_eq!(
            r.render(&settings),
            r#"<img src="http://img.example/p.jpg" width="200" height="100" alt="a &quot;photo&quot;">"#
        );
    }
}
