//! Keyed, prefixed, TTL-bounded view onto a shared KV store.
//!
//! [`Cache`] wraps an injected [`CacheBackend`] so every entry is written
//! under a `<prefix>:` key with the configured store-level TTL, values are
//! (de)serialized [`Resource`]s, and hit/miss events flow to subscribers.
//!
//! The interesting operation is [`Cache::get_or_prime`]: an atomic
//! add-if-absent that lets exactly one caller per TTL window claim
//! responsibility for producing the real value. Everyone else gets whatever
//! is stored — possibly the placeholder the winner primed.

mod backend;

pub use backend::{CacheBackend, MemoryBackend};

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::Result;
use crate::events::{Event, Events};
use crate::resource::Resource;
use crate::settings::Settings;
use crate::telemetry;

/// Prefixed, event-emitting cache for serialized resources.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
    settings: Arc<Settings>,
    events: Arc<Events>,
}

impl Cache {
    pub(crate) fn new(
        backend: Arc<dyn CacheBackend>,
        settings: Arc<Settings>,
        events: Arc<Events>,
    ) -> Self {
        Self {
            backend,
            settings,
            events,
        }
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}:{}", self.settings.cache_key_prefix, key)
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.settings.cache_age)
    }

    fn hit(&self, key: &str) {
        metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
        self.events.emit(Event::CacheHit {
            key: key.to_string(),
        });
    }

    fn miss(&self, key: &str) {
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
        self.events.emit(Event::CacheMiss {
            key: key.to_string(),
        });
    }

    /// Prime the cache with `primer` if the key is absent.
    ///
    /// Returns the stored resource and whether the cache was primed. The
    /// atomic add guarantees that at most one caller per TTL window
    /// observes `true`; that caller owns scheduling the real fetch. If the
    /// stored value vanished between the failed add and the read (eviction
    /// race), the primer is returned as a fresh prime.
    pub async fn get_or_prime(&self, key: &str, primer: Resource) -> Result<(Resource, bool)> {
        let key = self.make_key(key);
        let serialized = serde_json::to_string(&primer)?;

        if self.backend.add(&key, &serialized, self.ttl()).await? {
            debug!(key = %key, "primed cache entry");
            self.miss(&key);
            return Ok((primer, true));
        }

        match self.read(&key).await? {
            Some(cached) => {
                self.hit(&key);
                Ok((cached, false))
            }
            None => {
                self.backend.set(&key, &serialized, self.ttl()).await?;
                self.miss(&key);
                Ok((primer, true))
            }
        }
    }

    /// Fetch the resource stored under `key`, or `None`.
    pub async fn get(&self, key: &str) -> Result<Option<Resource>> {
        let key = self.make_key(key);
        let value = self.read(&key).await?;
        if value.is_none() {
            self.miss(&key);
        }
        Ok(value)
    }

    /// Unconditionally store `resource` under `key`.
    pub async fn set(&self, key: &str, resource: &Resource) -> Result<()> {
        let key = self.make_key(key);
        let serialized = serde_json::to_string(resource)?;
        self.backend.set(&key, &serialized, self.ttl()).await
    }

    /// Remove the entry under `key`.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.backend.delete(&self.make_key(key)).await
    }

    /// Read and deserialize; a corrupt entry reads as absent.
    async fn read(&self, full_key: &str) -> Result<Option<Resource>> {
        let Some(raw) = self.backend.get(full_key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(resource) => Ok(Some(resource)),
            Err(error) => {
                warn!(key = %full_key, %error, "discarding undecodable cache entry");
                Ok(None)
            }
        }
    }
}
