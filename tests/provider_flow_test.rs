//! End-to-end tests of the external provider acquisition protocol:
//! cold-miss priming, stale re-dating, and refresh scheduling.

use std::sync::{Arc, Mutex};

use chrono::TimeZone;
use monocle::{
    ExternalProvider, Monocle, RefreshQueue, Resource, ResourceParams, ResourceType,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingQueue {
    urls: Mutex<Vec<String>>,
}

impl RecordingQueue {
    fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl RefreshQueue for RecordingQueue {
    fn enqueue(&self, request_url: String) {
        self.urls.lock().unwrap().push(request_url);
    }
}

fn provider(api_endpoint: &str) -> ExternalProvider {
    ExternalProvider::new(
        "vid",
        api_endpoint,
        ResourceType::Video,
        vec!["http://vid.example/*".into()],
        true,
    )
    .unwrap()
}

fn engine(api_endpoint: &str, queue: Arc<RecordingQueue>) -> Monocle {
    Monocle::builder()
        .register_external(provider(api_endpoint))
        .refresh_queue(queue)
        .build()
        .unwrap()
}

#[tokio::test]
async fn cold_miss_returns_placeholder_and_schedules_one_refresh() {
    let queue = Arc::new(RecordingQueue::default());
    let engine = engine("http://api.example/oembed", queue.clone());

    let resource = engine
        .resource_for("http://vid.example/x", &ResourceParams::default())
        .await
        .unwrap()
        .expect("provider should match");

    assert!(!resource.is_valid());
    assert_eq!(resource.url, "http://vid.example/x");
    assert_eq!(
        queue.urls(),
        vec!["http://api.example/oembed?format=json&url=http%3A%2F%2Fvid.example%2Fx"]
    );

    // A second call sees the primed placeholder and schedules nothing new.
    let again = engine
        .resource_for("http://vid.example/x", &ResourceParams::default())
        .await
        .unwrap()
        .unwrap();
    assert!(!again.is_valid());
    assert_eq!(queue.urls().len(), 1);
}

#[tokio::test]
async fn refresh_populates_the_cache_for_subsequent_calls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oembed"))
        .and(query_param("url", "http://vid.example/x"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"type":"video","version":"1.0","html":"<iframe></iframe>","width":640,"height":360}"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let api_endpoint = format!("{}/oembed", server.uri());
    let queue = Arc::new(RecordingQueue::default());
    let engine = engine(&api_endpoint, queue.clone());

    let placeholder = engine
        .resource_for("http://vid.example/x", &ResourceParams::default())
        .await
        .unwrap()
        .unwrap();
    assert!(!placeholder.is_valid());

    // Run the scheduled refresh the way a queue worker would.
    let request_url = queue.urls().remove(0);
    engine.refresher().refresh(&request_url).await.unwrap();

    let refreshed = engine
        .resource_for("http://vid.example/x", &ResourceParams::default())
        .await
        .unwrap()
        .unwrap();
    assert!(refreshed.is_valid());
    assert_eq!(refreshed.data.html.as_deref(), Some("<iframe></iframe>"));
    assert_eq!(refreshed.data.width, Some(640));
    // No second refresh was scheduled.
    assert_eq!(queue.urls().len(), 1);
}

#[tokio::test]
async fn stale_hit_redates_the_entry_and_schedules_exactly_one_refresh() {
    let queue = Arc::new(RecordingQueue::default());
    let engine = engine("http://api.example/oembed", queue.clone());

    let request_url = provider("http://api.example/oembed")
        .request_url("http://vid.example/x", &ResourceParams::default());

    let mut seeded = Resource::new(
        "http://vid.example/x",
        serde_json::from_str(
            r#"{"type":"video","version":"1.0","html":"<iframe></iframe>","width":640,"height":360}"#,
        )
        .unwrap(),
    );
    seeded.created_at = chrono::Utc.with_ymd_and_hms(1984, 1, 1, 0, 0, 0).unwrap();
    engine.cache().set(&request_url, &seeded).await.unwrap();

    // The stale value itself is returned...
    let resource = engine
        .resource_for("http://vid.example/x", &ResourceParams::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resource.data, seeded.data);

    // ...one refresh is scheduled, and the cached entry is re-dated.
    assert_eq!(queue.urls(), vec![request_url.clone()]);
    let redated = engine.cache().get(&request_url).await.unwrap().unwrap();
    assert!(redated.created_at > seeded.created_at);

    // A second caller sees the fresh date and schedules nothing.
    engine
        .resource_for("http://vid.example/x", &ResourceParams::default())
        .await
        .unwrap();
    assert_eq!(queue.urls().len(), 1);
}

#[tokio::test]
async fn max_dimensions_become_part_of_the_cache_identity() {
    let queue = Arc::new(RecordingQueue::default());
    let engine = engine("http://api.example/oembed", queue.clone());

    engine
        .resource_for(
            "http://vid.example/x",
            &ResourceParams::new(Some(640), None),
        )
        .await
        .unwrap();
    engine
        .resource_for(
            "http://vid.example/x",
            &ResourceParams::new(None, Some(480)),
        )
        .await
        .unwrap();

    let urls = queue.urls();
    assert_eq!(urls.len(), 2);
    assert!(urls[0].contains("maxwidth=640"));
    assert!(urls[1].contains("maxheight=480"));
}
