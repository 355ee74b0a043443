//! Process-wide provider registry with two-bucket precedence.
//!
//! The registry holds internal providers (registered in code at startup)
//! and external providers (loaded lazily from the configuration store and
//! kept current by change callbacks). Matching prefers internal providers,
//! then external, each in insertion order.
//!
//! Matching snapshots both buckets and releases the lock before calling
//! any user-supplied `get_object` — that hook may itself block on a
//! database.

use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use super::external::ExternalProvider;
use super::internal::{self, DataSource, InternalProvider};
use super::matching::compile_schemes;
use super::store::{ExternalProviderRecord, ProviderStore};
use super::ResourceParams;
use crate::engine::Runtime;
use crate::events::{Event, Events};
use crate::resource::{Resource, ResourceType};
use crate::settings::Settings;
use crate::Result;

struct InternalEntry {
    provider: Arc<dyn InternalProvider>,
    matcher: Option<regex::Regex>,
}

#[derive(Default)]
struct Buckets {
    internal: Vec<InternalEntry>,
    external: Vec<Arc<ExternalProvider>>,
    populated: bool,
}

/// Registry of active providers, internal before external.
pub struct ProviderRegistry {
    buckets: RwLock<Buckets>,
    store: Option<Arc<dyn ProviderStore>>,
    events: Arc<Events>,
}

impl ProviderRegistry {
    pub(crate) fn new(store: Option<Arc<dyn ProviderStore>>, events: Arc<Events>) -> Self {
        Self {
            buckets: RwLock::new(Buckets::default()),
            store,
            events,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Buckets> {
        self.buckets.read().expect("registry lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Buckets> {
        self.buckets.write().expect("registry lock poisoned")
    }

    /// Load external providers from the configuration store, once.
    ///
    /// Idempotent and cheap to call repeatedly. A store failure logs,
    /// leaves the external bucket empty, and lets a later call retry.
    pub async fn ensure_populated(&self) {
        let Some(store) = &self.store else {
            return;
        };
        {
            let buckets = self.read();
            if buckets.populated || !buckets.external.is_empty() {
                return;
            }
        }

        let records = match store.all().await {
            Ok(records) => records,
            Err(error) => {
                warn!(%error, "provider store unavailable; external providers not loaded");
                return;
            }
        };

        let mut buckets = self.write();
        if buckets.populated {
            return;
        }
        for record in records.iter().filter(|r| r.is_active) {
            match ExternalProvider::from_record(record) {
                Ok(provider) => buckets.external.push(Arc::new(provider)),
                Err(error) => {
                    warn!(name = %record.name, %error, "skipping unusable provider record");
                }
            }
        }
        buckets.populated = true;
        debug!(count = buckets.external.len(), "loaded external providers");
    }

    /// Register an internal provider. Fails when its URL schemes don't
    /// compile into a matcher.
    pub fn register_internal(&self, provider: Arc<dyn InternalProvider>) -> Result<()> {
        let matcher = compile_schemes(&provider.url_schemes())?;
        self.write().internal.push(InternalEntry { provider, matcher });
        Ok(())
    }

    /// Remove an internal provider by identity. Missing is a no-op.
    pub fn unregister_internal(&self, provider: &Arc<dyn InternalProvider>) {
        self.write()
            .internal
            .retain(|entry| !Arc::ptr_eq(&entry.provider, provider));
    }

    /// Append an external provider.
    pub fn register_external(&self, provider: ExternalProvider) {
        self.write().external.push(Arc::new(provider));
    }

    /// Replace an external provider by name, or append when absent.
    pub fn update_external(&self, provider: ExternalProvider) {
        let mut buckets = self.write();
        let provider = Arc::new(provider);
        match buckets
            .external
            .iter_mut()
            .find(|existing| existing.name() == provider.name())
        {
            Some(slot) => *slot = provider,
            None => buckets.external.push(provider),
        }
    }

    /// Remove an external provider by name. Missing is a no-op.
    pub fn unregister_external(&self, name: &str) {
        self.write().external.retain(|p| p.name() != name);
    }

    /// Configuration-store save callback: validate and upsert the record's
    /// provider, or drop it when deactivated.
    pub fn record_saved(&self, record: &ExternalProviderRecord) -> Result<()> {
        if !record.is_active {
            self.unregister_external(&record.name);
            self.events.emit(Event::ProviderRemoved {
                name: record.name.clone(),
            });
            return Ok(());
        }
        let provider = ExternalProvider::from_record(record)?;
        self.update_external(provider);
        self.events.emit(Event::ProviderUpserted {
            name: record.name.clone(),
        });
        Ok(())
    }

    /// Configuration-store delete callback.
    pub fn record_deleted(&self, name: &str) {
        self.unregister_external(name);
        self.events.emit(Event::ProviderRemoved {
            name: name.to_string(),
        });
    }

    /// Whether this exact internal provider instance is registered.
    pub fn contains_internal(&self, provider: &Arc<dyn InternalProvider>) -> bool {
        self.read()
            .internal
            .iter()
            .any(|entry| Arc::ptr_eq(&entry.provider, provider))
    }

    /// Whether an external provider with this name is registered.
    pub fn contains_external(&self, name: &str) -> bool {
        self.read().external.iter().any(|p| p.name() == name)
    }

    /// Number of registered (internal, external) providers.
    pub fn len(&self) -> (usize, usize) {
        let buckets = self.read();
        (buckets.internal.len(), buckets.external.len())
    }

    /// Whether no providers are registered at all.
    pub fn is_empty(&self) -> bool {
        let (internal, external) = self.len();
        internal == 0 && external == 0
    }

    /// Find the first provider serving `url`.
    ///
    /// Internal providers win over external ones. An internal candidate
    /// must also resolve an object; a failed or empty resolution keeps the
    /// scan going within the same bucket.
    pub async fn match_url(&self, url: &str) -> Option<ProviderMatch> {
        self.ensure_populated().await;

        let (internal, external) = {
            let buckets = self.read();
            let internal: Vec<(Arc<dyn InternalProvider>, Option<regex::Regex>)> = buckets
                .internal
                .iter()
                .map(|entry| (entry.provider.clone(), entry.matcher.clone()))
                .collect();
            (internal, buckets.external.clone())
        };

        for (provider, matcher) in internal {
            if !matcher.as_ref().is_some_and(|re| re.is_match(url)) {
                continue;
            }
            match provider.get_object(url).await {
                Ok(Some(source)) => {
                    return Some(ProviderMatch::Internal(InternalMatch { provider, source }));
                }
                Ok(None) => continue,
                Err(error) => {
                    warn!(provider = provider.name(), url, %error, "get_object failed; skipping provider");
                    continue;
                }
            }
        }

        external
            .into_iter()
            .find(|provider| provider.matches(url))
            .map(ProviderMatch::External)
    }
}

/// An internal provider together with the object it resolved for the URL.
pub struct InternalMatch {
    pub(crate) provider: Arc<dyn InternalProvider>,
    pub(crate) source: Box<dyn DataSource>,
}

/// The winning provider for a URL.
pub enum ProviderMatch {
    External(Arc<ExternalProvider>),
    Internal(InternalMatch),
}

impl ProviderMatch {
    pub fn is_internal(&self) -> bool {
        matches!(self, ProviderMatch::Internal(_))
    }

    pub fn name(&self) -> &str {
        match self {
            ProviderMatch::External(provider) => provider.name(),
            ProviderMatch::Internal(m) => m.provider.name(),
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        match self {
            ProviderMatch::External(provider) => provider.resource_type(),
            ProviderMatch::Internal(m) => m.provider.resource_type(),
        }
    }

    /// Whether the public endpoint may serve this provider.
    pub fn expose(&self, settings: &Settings) -> bool {
        match self {
            ProviderMatch::External(provider) => provider.expose(),
            ProviderMatch::Internal(m) => m
                .provider
                .expose()
                .unwrap_or(settings.expose_local_providers),
        }
    }

    /// Obtain the resource through whichever acquisition protocol the
    /// provider kind uses.
    pub(crate) async fn get_resource(
        &self,
        rt: &Runtime,
        url: &str,
        params: &ResourceParams,
    ) -> Result<Resource> {
        match self {
            ProviderMatch::External(provider) => provider.get_resource(rt, url, params).await,
            ProviderMatch::Internal(m) => {
                internal::get_resource(rt, m.provider.as_ref(), m.source.as_ref(), url, params)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NeverResolves;

    #[async_trait]
    impl InternalProvider for NeverResolves {
        fn name(&self) -> &str {
            "never"
        }
        fn resource_type(&self) -> ResourceType {
            ResourceType::Video
        }
        fn url_schemes(&self) -> Vec<String> {
            vec!["http://shared.example/*".into()]
        }
        async fn get_object(&self, _url: &str) -> Result<Option<Box<dyn DataSource>>> {
            Ok(None)
        }
    }

    struct AlwaysResolves;
    struct Empty;
    impl DataSource for Empty {}

    #[async_trait]
    impl InternalProvider for AlwaysResolves {
        fn name(&self) -> &str {
            "always"
        }
        fn resource_type(&self) -> ResourceType {
            ResourceType::Link
        }
        fn url_schemes(&self) -> Vec<String> {
            vec!["http://shared.example/*".into()]
        }
        async fn get_object(&self, _url: &str) -> Result<Option<Box<dyn DataSource>>> {
            Ok(Some(Box::new(Empty)))
        }
    }

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new(None, Arc::new(Events::new()))
    }

    fn external(name: &str, scheme: &str) -> ExternalProvider {
        ExternalProvider::new(
            name,
            "http://api.example/oembed",
            ResourceType::Video,
            vec![scheme.to_string()],
            false,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn internal_bucket_wins_over_external() {
        let registry = registry();
        registry.register_external(external("ext", "http://shared.example/*"));
        registry
            .register_internal(Arc::new(AlwaysResolves))
            .unwrap();

        let matched = registry.match_url("http://shared.example/x").await.unwrap();
        assert!(matched.is_internal());
        assert_eq!(matched.name(), "always");
    }

    #[tokio::test]
    async fn unresolved_internal_falls_through_within_and_across_buckets() {
        let registry = registry();
        registry.register_internal(Arc::new(NeverResolves)).unwrap();
        registry.register_external(external("ext", "http://shared.example/*"));

        let matched = registry.match_url("http://shared.example/x").await.unwrap();
        assert!(!matched.is_internal());
        assert_eq!(matched.name(), "ext");

        registry
            .register_internal(Arc::new(AlwaysResolves))
            .unwrap();
        let matched = registry.match_url("http://shared.example/x").await.unwrap();
        assert_eq!(matched.name(), "always");
    }

    #[tokio::test]
    async fn first_matching_external_wins_in_insertion_order() {
        let registry = registry();
        registry.register_external(external("first", "http://vid.example/*"));
        registry.register_external(external("second", "http://vid.example/*"));

        let matched = registry.match_url("http://vid.example/x").await.unwrap();
        assert_eq!(matched.name(), "first");
    }

    #[tokio::test]
    async fn no_match_returns_none() {
        let registry = registry();
        registry.register_external(external("ext", "http://vid.example/*"));
        assert!(registry.match_url("http://other.example/x").await.is_none());
    }

    #[tokio::test]
    async fn update_replaces_by_name_and_unregister_removes() {
        let registry = registry();
        registry.register_external(external("ext", "http://vid.example/*"));

        registry.update_external(external("ext", "http://clip.example/*"));
        assert_eq!(registry.len(), (0, 1));
        assert!(registry.match_url("http://vid.example/x").await.is_none());
        assert!(registry.match_url("http://clip.example/x").await.is_some());

        registry.unregister_external("ext");
        assert!(registry.is_empty());
        registry.unregister_external("ext"); // missing is a no-op
    }

    #[tokio::test]
    async fn record_saved_inactive_unregisters() {
        let registry = registry();
        registry.register_external(external("ext", "http://vid.example/*"));

        let record = ExternalProviderRecord {
            name: "ext".into(),
            api_endpoint: "http://api.example/oembed".into(),
            resource_type: ResourceType::Video,
            is_active: false,
            expose: false,
            url_schemes: vec!["http://vid.example/*".into()],
        };
        registry.record_saved(&record).unwrap();
        assert!(registry.is_empty());
    }
}
