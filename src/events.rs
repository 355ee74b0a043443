//! Observability hook points.
//!
//! The engine emits typed [`Event`]s at well-known moments: cache traffic,
//! consume passes, and provider registry changes. Applications subscribe an
//! [`EventSink`] to observe them; sinks are called synchronously on the
//! emitting task and MUST NOT block (hand off to a channel for anything
//! slow). Without subscribers, emission is a no-op.
//!
//! Metric counters are emitted separately through the [`crate::telemetry`]
//! constants and do not require a sink.

use std::sync::{Arc, RwLock};

/// A typed observability event.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Event {
    /// A cache lookup found a stored value.
    CacheHit { key: String },
    /// A cache lookup found nothing (the entry may have been primed).
    CacheMiss { key: String },
    /// A consumer is about to process content.
    PreConsume,
    /// A consumer finished processing content.
    PostConsume,
    /// A provider was registered or replaced from configuration.
    ProviderUpserted { name: String },
    /// A provider was removed from the registry.
    ProviderRemoved { name: String },
}

/// Receiver for engine events.
pub trait EventSink: Send + Sync {
    /// Called for every emitted event. Must not block.
    fn notify(&self, event: &Event);
}

/// Dispatcher holding the subscribed sinks.
#[derive(Default)]
pub struct Events {
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl Events {
    /// Create a dispatcher with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a sink to all future events.
    pub fn subscribe(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().expect("event sink lock poisoned").push(sink);
    }

    /// Emit an event to every subscriber.
    pub fn emit(&self, event: Event) {
        let sinks = self.sinks.read().expect("event sink lock poisoned");
        for sink in sinks.iter() {
            sink.notify(&event);
        }
    }
}
