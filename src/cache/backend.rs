//! Pluggable KV store behind the cache wrapper.
//!
//! The engine talks to a [`CacheBackend`]: a string-keyed, string-valued
//! store with an *atomic* add. Production deployments inject a distributed
//! backend (memcached, redis); [`MemoryBackend`] is the bundled in-process
//! implementation on moka, suitable for single-process deployments and
//! tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// KV store operations the cache wrapper requires.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Store `value` under `key` only if the key is absent, returning
    /// whether the write happened. MUST be atomic in the underlying store;
    /// this is the stampede-prevention primitive.
    async fn add(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Fetch the value under `key`, or `None`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Unconditionally store `value` under `key`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// In-process cache backend on `moka`.
///
/// Entries expire after the TTL the backend was built with; the engine
/// always passes the configured `cache_age` for every write, so the
/// per-call `ttl` argument and the cache-wide policy coincide.
pub struct MemoryBackend {
    entries: moka::future::Cache<String, String>,
}

impl MemoryBackend {
    /// Create a backend bounded to `max_entries` with the given TTL.
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        Self {
            entries: moka::future::Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Whether the backend holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn add(&self, key: &str, value: &str, _ttl: Duration) -> Result<bool> {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert(value.to_string())
            .await;
        Ok(entry.is_fresh())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).await)
    }

    async fn set(&self, key: &str, value: &str, _ttl: Duration) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string()).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.invalidate(key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> MemoryBackend {
        MemoryBackend::new(100, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn add_is_first_writer_wins() {
        let backend = backend();
        assert!(backend.add("k", "first", Duration::from_secs(60)).await.unwrap());
        assert!(!backend.add("k", "second", Duration::from_secs(60)).await.unwrap());
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn set_overwrites() {
        let backend = backend();
        backend.set("k", "one", Duration::from_secs(60)).await.unwrap();
        backend.set("k", "two", Duration::from_secs(60)).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn delete_removes_and_tolerates_missing() {
        let backend = backend();
        backend.set("k", "v", Duration::from_secs(60)).await.unwrap();
        backend.delete("k").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
        backend.delete("k").await.unwrap();
    }
}
