//! Engine assembly.
//!
//! [`Monocle`] wires the pieces together — settings, cache, registry,
//! refresh queue, events — and is the API most applications use. Build one
//! per process with [`Monocle::builder()`] and share it; every component
//! behind it is already `Arc`-shared and safe for concurrent request
//! handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cache, CacheBackend, MemoryBackend};
use crate::consumers::{self, Consumer, PrefetchSize};
use crate::endpoint::{self, EndpointReply, OembedQuery};
use crate::events::{Events, EventSink};
use crate::providers::{
    ExternalProvider, InternalProvider, ProviderRegistry, ProviderStore, ResourceParams,
};
use crate::resource::Resource;
use crate::settings::Settings;
use crate::tasks::{RefreshQueue, Refresher, SpawnQueue};
use crate::{MonocleError, Result};

/// Default entry bound for the bundled in-process cache backend.
const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// Shared state handed to providers, consumers, and the endpoint.
pub struct Runtime {
    pub(crate) settings: Arc<Settings>,
    pub(crate) cache: Cache,
    pub(crate) queue: Arc<dyn RefreshQueue>,
    pub(crate) events: Arc<Events>,
}

/// The assembled OEmbed engine.
pub struct Monocle {
    rt: Arc<Runtime>,
    registry: Arc<ProviderRegistry>,
    refresher: Arc<Refresher>,
}

impl Monocle {
    /// Start building an engine.
    pub fn builder() -> MonocleBuilder {
        MonocleBuilder::default()
    }

    pub fn settings(&self) -> &Settings {
        &self.rt.settings
    }

    pub fn cache(&self) -> &Cache {
        &self.rt.cache
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// The refresh worker, for applications that drive refreshes from
    /// their own task-queue runtime instead of [`SpawnQueue`].
    pub fn refresher(&self) -> &Arc<Refresher> {
        &self.refresher
    }

    pub fn events(&self) -> &Arc<Events> {
        &self.rt.events
    }

    /// A consumer that enriches internal matches too.
    pub fn consumer(&self) -> Consumer {
        Consumer::new(self.rt.clone(), self.registry.clone(), false)
    }

    /// Enrich plain-text content.
    pub async fn enrich(
        &self,
        content: &str,
        maxwidth: Option<u32>,
        maxheight: Option<u32>,
    ) -> String {
        self.consumer()
            .enrich(content, &ResourceParams::new(maxwidth, maxheight))
            .await
    }

    /// Enrich HTML content, respecting hyperlinks.
    pub async fn devour(
        &self,
        content: &str,
        maxwidth: Option<u32>,
        maxheight: Option<u32>,
    ) -> String {
        self.consumer()
            .devour(content, &ResourceParams::new(maxwidth, maxheight))
            .await
    }

    /// Warm the cache for every URL in `content` over a size matrix.
    pub async fn prefetch(&self, content: &str, html: bool, sizes: &[PrefetchSize]) {
        consumers::prefetch(self.rt.clone(), self.registry.clone(), content, html, sizes).await;
    }

    /// Serve one OEmbed endpoint request.
    pub async fn oembed(&self, query: OembedQuery) -> EndpointReply {
        endpoint::handle(&self.rt, &self.registry, query).await
    }

    /// Resolve a URL to its resource through the full match/acquire path.
    ///
    /// `None` when no provider serves the URL.
    pub async fn resource_for(
        &self,
        url: &str,
        params: &ResourceParams,
    ) -> Result<Option<Resource>> {
        match self.registry.match_url(url).await {
            Some(provider) => Ok(Some(provider.get_resource(&self.rt, url, params).await?)),
            None => Ok(None),
        }
    }
}

/// Builder for [`Monocle`].
#[derive(Default)]
pub struct MonocleBuilder {
    settings: Option<Settings>,
    backend: Option<Arc<dyn CacheBackend>>,
    store: Option<Arc<dyn ProviderStore>>,
    queue: Option<Arc<dyn RefreshQueue>>,
    sinks: Vec<Arc<dyn EventSink>>,
    internal: Vec<Arc<dyn InternalProvider>>,
    external: Vec<ExternalProvider>,
}

impl MonocleBuilder {
    /// Use these settings instead of the defaults.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Use a custom cache backend (e.g. a distributed store). Defaults to
    /// the bundled in-process backend.
    pub fn cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Read external provider configuration from this store.
    pub fn provider_store(mut self, store: Arc<dyn ProviderStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Submit refresh work through a custom queue instead of detached
    /// tokio tasks.
    pub fn refresh_queue(mut self, queue: Arc<dyn RefreshQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Subscribe an event sink.
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Register an internal provider.
    pub fn register(mut self, provider: Arc<dyn InternalProvider>) -> Self {
        self.internal.push(provider);
        self
    }

    /// Register an external provider directly, bypassing the store.
    pub fn register_external(mut self, provider: ExternalProvider) -> Self {
        self.external.push(provider);
        self
    }

    /// Assemble the engine.
    pub fn build(self) -> Result<Monocle> {
        let settings = Arc::new(self.settings.unwrap_or_default());

        let events = Arc::new(Events::new());
        for sink in self.sinks {
            events.subscribe(sink);
        }

        let backend = self.backend.unwrap_or_else(|| {
            Arc::new(MemoryBackend::new(
                DEFAULT_CACHE_CAPACITY,
                Duration::from_secs(settings.cache_age),
            ))
        });
        let cache = Cache::new(backend, settings.clone(), events.clone());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http_timeout))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| MonocleError::Configuration(format!("failed to build http client: {e}")))?;
        let refresher = Arc::new(Refresher::new(settings.clone(), cache.clone(), http));

        let queue = self
            .queue
            .unwrap_or_else(|| Arc::new(SpawnQueue::new(refresher.clone(), settings.task_queue.clone())));

        let registry = Arc::new(ProviderRegistry::new(self.store, events.clone()));
        for provider in self.internal {
            registry.register_internal(provider)?;
        }
        for provider in self.external {
            registry.register_external(provider);
        }

        let rt = Arc::new(Runtime {
            settings,
            cache,
            queue,
            events,
        });

        Ok(Monocle {
            rt,
            registry,
            refresher,
        })
    }
}
