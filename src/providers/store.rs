//! Persisted external-provider configuration.
//!
//! Third-party providers are configured outside the engine (database rows,
//! admin UI) and read through the [`ProviderStore`] trait. The store is
//! also expected to call [`ProviderRegistry::record_saved`] and
//! [`ProviderRegistry::record_deleted`] on configuration changes so the
//! registry tracks edits without a restart.
//!
//! [`ProviderRegistry::record_saved`]: super::ProviderRegistry::record_saved
//! [`ProviderRegistry::record_deleted`]: super::ProviderRegistry::record_deleted

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::resource::ResourceType;
use crate::{MonocleError, Result};

/// A persisted third-party provider configuration row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalProviderRecord {
    pub name: String,
    pub api_endpoint: String,
    pub resource_type: ResourceType,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub expose: bool,
    #[serde(default)]
    pub url_schemes: Vec<String>,
}

fn default_active() -> bool {
    true
}

impl ExternalProviderRecord {
    /// Validate the endpoint and every URL scheme.
    pub fn validate(&self) -> Result<()> {
        validate_api_endpoint(&self.api_endpoint)?;
        for scheme in &self.url_schemes {
            validate_url_scheme(scheme)?;
        }
        Ok(())
    }
}

/// Read-only view of the configuration store.
#[async_trait]
pub trait ProviderStore: Send + Sync {
    /// Every persisted provider record, active or not.
    async fn all(&self) -> Result<Vec<ExternalProviderRecord>>;
}

/// The OEmbed spec forbids HTTPS API endpoints.
pub(crate) fn validate_api_endpoint(endpoint: &str) -> Result<()> {
    let parsed = Url::parse(endpoint).map_err(|e| {
        MonocleError::Configuration(format!("invalid api endpoint '{endpoint}': {e}"))
    })?;
    match parsed.scheme() {
        "http" => Ok(()),
        "https" => Err(MonocleError::Configuration(format!(
            "api endpoint '{endpoint}' must not be HTTPS"
        ))),
        other => Err(MonocleError::Configuration(format!(
            "api endpoint '{endpoint}' has unsupported scheme '{other}'"
        ))),
    }
}

/// Hosts that would wildcard an entire TLD: `*`, `*.xx`, `*.xxx`, `*.xx.xx`.
static TLD_WILDCARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*(?:\.\w{2,3}|\.\w{2}\.\w{2})?$").unwrap());

/// Validate one wildcard URL scheme.
///
/// The scheme must be explicit `http`/`https`, and the host portion must
/// not be a bare wildcard over a top-level domain.
pub(crate) fn validate_url_scheme(scheme: &str) -> Result<()> {
    let lowered = scheme.trim().to_ascii_lowercase();
    let Some((proto, rest)) = lowered.split_once("://") else {
        return Err(MonocleError::Configuration(format!(
            "url scheme '{scheme}' must have an explicit http/https scheme"
        )));
    };
    if proto != "http" && proto != "https" {
        return Err(MonocleError::Configuration(format!(
            "url scheme '{scheme}' must be http or https"
        )));
    }
    let netloc = rest.split('/').next().unwrap_or_default();
    if netloc.is_empty() {
        return Err(MonocleError::Configuration(format!(
            "url scheme '{scheme}' is missing a host"
        )));
    }
    if TLD_WILDCARD.is_match(netloc) {
        return Err(MonocleError::Configuration(format!(
            "url scheme '{scheme}' is too aggressive"
        )));
    }
    Ok(())
}
