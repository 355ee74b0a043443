//! Registry population from the configuration store, change callbacks,
//! and the events they emit.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use monocle::{
    Event, EventSink, ExternalProviderRecord, Monocle, MonocleError, ProviderStore, RefreshQueue,
    ResourceType,
};

#[derive(Default)]
struct NullQueue;

impl RefreshQueue for NullQueue {
    fn enqueue(&self, _request_url: String) {}
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl EventSink for RecordingSink {
    fn notify(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }
}

struct StubStore {
    records: Vec<ExternalProviderRecord>,
    calls: Mutex<usize>,
}

impl StubStore {
    fn new(records: Vec<ExternalProviderRecord>) -> Self {
        Self {
            records,
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ProviderStore for StubStore {
    async fn all(&self) -> monocle::Result<Vec<ExternalProviderRecord>> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.records.clone())
    }
}

struct BrokenStore;

#[async_trait]
impl ProviderStore for BrokenStore {
    async fn all(&self) -> monocle::Result<Vec<ExternalProviderRecord>> {
        Err(MonocleError::Configuration("store offline".into()))
    }
}

fn record(name: &str, scheme: &str, is_active: bool) -> ExternalProviderRecord {
    ExternalProviderRecord {
        name: name.into(),
        api_endpoint: "http://api.example/oembed".into(),
        resource_type: ResourceType::Video,
        is_active,
        expose: true,
        url_schemes: vec![scheme.to_string()],
    }
}

#[tokio::test]
async fn population_is_lazy_idempotent_and_skips_inactive_records() {
    let store = Arc::new(StubStore::new(vec![
        record("active", "http://vid.example/*", true),
        record("inactive", "http://old.example/*", false),
    ]));
    let engine = Monocle::builder()
        .provider_store(store.clone())
        .refresh_queue(Arc::new(NullQueue))
        .build()
        .unwrap();

    assert!(engine.registry().match_url("http://vid.example/x").await.is_some());
    assert!(engine.registry().match_url("http://old.example/x").await.is_none());
    assert_eq!(engine.registry().len(), (0, 1));

    // Further matching never re-reads the store.
    engine.registry().match_url("http://vid.example/y").await;
    assert_eq!(*store.calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn store_failure_leaves_the_registry_empty_and_serving() {
    let engine = Monocle::builder()
        .provider_store(Arc::new(BrokenStore))
        .refresh_queue(Arc::new(NullQueue))
        .build()
        .unwrap();

    assert!(engine.registry().match_url("http://vid.example/x").await.is_none());
    assert!(engine.registry().is_empty());
}

#[tokio::test]
async fn save_and_delete_callbacks_drive_the_registry_and_events() {
    let sink = Arc::new(RecordingSink::default());
    let engine = Monocle::builder()
        .event_sink(sink.clone())
        .refresh_queue(Arc::new(NullQueue))
        .build()
        .unwrap();
    let registry = engine.registry();

    registry
        .record_saved(&record("vid", "http://vid.example/*", true))
        .unwrap();
    assert!(registry.match_url("http://vid.example/x").await.is_some());

    // Saving again with a new scheme replaces, not appends.
    registry
        .record_saved(&record("vid", "http://clip.example/*", true))
        .unwrap();
    assert_eq!(registry.len(), (0, 1));
    assert!(registry.match_url("http://vid.example/x").await.is_none());

    // Deactivating removes.
    registry
        .record_saved(&record("vid", "http://clip.example/*", false))
        .unwrap();
    assert!(registry.is_empty());

    registry.record_deleted("gone");

    let events = sink.events.lock().unwrap();
    let upserts = events
        .iter()
        .filter(|e| matches!(e, Event::ProviderUpserted { .. }))
        .count();
    let removals = events
        .iter()
        .filter(|e| matches!(e, Event::ProviderRemoved { .. }))
        .count();
    assert_eq!(upserts, 2);
    assert_eq!(removals, 2);
}

#[tokio::test]
async fn invalid_record_is_rejected_by_the_save_callback() {
    let engine = Monocle::builder()
        .refresh_queue(Arc::new(NullQueue))
        .build()
        .unwrap();

    let mut bad = record("bad", "http://*.com/*", true);
    assert!(engine.registry().record_saved(&bad).is_err());

    bad.url_schemes = vec!["http://vid.example/*".into()];
    bad.api_endpoint = "https://api.example/oembed".into();
    assert!(engine.registry().record_saved(&bad).is_err());

    assert!(engine.registry().is_empty());
}
