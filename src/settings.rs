//! Engine configuration.
//!
//! [`Settings`] is a read-only facade over every tunable the engine
//! recognises. Values come from `Default` or from a TOML document
//! ([`Settings::from_toml_str`] / [`Settings::load`]); unknown keys are a
//! configuration error rather than being silently ignored.
//!
//! The OEmbed resource types, the required-attribute table and the
//! optional-attribute list are fixed by the OEmbed format and live in
//! [`crate::resource`], not here.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::{MonocleError, Result};

/// Engine settings with their defaults.
///
/// ```rust
/// # use monocle::Settings;
/// let settings = Settings::default();
/// assert_eq!(settings.resource_min_ttl, 3600);
/// assert_eq!(settings.cache_key_prefix, "MONOCLE");
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Warn when an internal provider does not respect requested max
    /// dimensions. Default: false.
    #[serde(default)]
    pub resource_check_internal_size: bool,

    /// Allowed output sizes for internal providers that don't declare their
    /// own. These are negotiation targets, not content sizes.
    /// Default: (100,100), (200,200), … (900,900).
    #[serde(default = "default_dimensions")]
    pub resource_default_dimensions: Vec<(u32, u32)>,

    /// Minimum TTL in seconds before a resource may go stale. Provider
    /// supplied `cache_age` values are clamped up to this. Default: 1 hour.
    #[serde(default = "default_min_ttl")]
    pub resource_min_ttl: u64,

    /// TTL in seconds applied when a provider supplies no usable
    /// `cache_age`. Default: 1 week.
    #[serde(default = "default_default_ttl")]
    pub resource_default_ttl: u64,

    /// Render invalid resources as a hyperlink instead of the bare URL.
    /// Default: true.
    #[serde(default = "default_true")]
    pub resource_urlize_invalid: bool,

    /// Cache resources built by internal providers. When off, internal
    /// resources are rebuilt on every request. Default: false.
    #[serde(default)]
    pub cache_internal_providers: bool,

    /// Expose internal providers through the OEmbed endpoint unless the
    /// provider says otherwise. Default: true.
    #[serde(default = "default_true")]
    pub expose_local_providers: bool,

    /// Timeout in seconds for external provider HTTP requests. Default: 3.
    #[serde(default = "default_http_timeout")]
    pub http_timeout: u64,

    /// Queue name attached to refresh task submissions. Default: "monocle".
    #[serde(default = "default_task_queue")]
    pub task_queue: String,

    /// Delay in seconds between refresh task retries. Default: 1.
    #[serde(default = "default_retry_delay")]
    pub task_external_retry_delay: u64,

    /// Maximum number of retries for a refresh task (not counting the
    /// initial attempt). Default: 3.
    #[serde(default = "default_max_retries")]
    pub task_external_max_retries: u32,

    /// Prefix applied to every cache key. Default: "MONOCLE".
    #[serde(default = "default_cache_key_prefix")]
    pub cache_key_prefix: String,

    /// Store-level TTL in seconds for cache entries. This is a global upper
    /// bound, independent of per-resource TTLs. Default: 30 days.
    #[serde(default = "default_cache_age")]
    pub cache_age: u64,

    /// User-Agent header for external provider requests.
    /// Default: "Mozilla/5.0".
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resource_check_internal_size: false,
            resource_default_dimensions: default_dimensions(),
            resource_min_ttl: default_min_ttl(),
            resource_default_ttl: default_default_ttl(),
            resource_urlize_invalid: true,
            cache_internal_providers: false,
            expose_local_providers: true,
            http_timeout: default_http_timeout(),
            task_queue: default_task_queue(),
            task_external_retry_delay: default_retry_delay(),
            task_external_max_retries: default_max_retries(),
            cache_key_prefix: default_cache_key_prefix(),
            cache_age: default_cache_age(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_dimensions() -> Vec<(u32, u32)> {
    (1..10).map(|n| (n * 100, n * 100)).collect()
}

fn default_min_ttl() -> u64 {
    60 * 60
}

fn default_default_ttl() -> u64 {
    60 * 60 * 24 * 7
}

fn default_http_timeout() -> u64 {
    3
}

fn default_task_queue() -> String {
    "monocle".to_string()
}

fn default_retry_delay() -> u64 {
    1
}

fn default_max_retries() -> u32 {
    3
}

fn default_cache_key_prefix() -> String {
    "MONOCLE".to_string()
}

fn default_cache_age() -> u64 {
    60 * 60 * 24 * 30
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

impl Settings {
    /// Parse settings from a TOML document.
    ///
    /// Unrecognised keys fail with [`MonocleError::Configuration`].
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| MonocleError::Configuration(format!("failed to parse settings: {e}")))
    }

    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MonocleError::Configuration(format!("failed to read settings file {path:?}: {e}"))
        })?;
        Self::from_toml_str(&content)
    }
}
