//! Asynchronous refresh of externally provided resources.
//!
//! All network I/O toward third-party OEmbed APIs happens here, off the
//! foreground path. A refresh is a single GET of the request URL; the
//! parsed response replaces the cache entry. Every failure mode leaves the
//! previously cached value (usually the placeholder) in place, so
//! foreground callers keep getting a renderable resource instead of
//! errors.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::cache::Cache;
use crate::resource::{Resource, ResourceData};
use crate::settings::Settings;
use crate::telemetry;
use crate::util::extract_content_url;
use crate::{MonocleError, Result};

/// Fire-and-forget submission of refresh work.
///
/// The engine enqueues the upstream request URL; the queue runtime decides
/// where and when the fetch runs. [`SpawnQueue`] is the bundled
/// tokio-task implementation; applications with a real task-queue runtime
/// implement this trait and drive [`Refresher::refresh`] themselves.
pub trait RefreshQueue: Send + Sync {
    fn enqueue(&self, request_url: String);
}

/// Performs the upstream fetch and cache write for one request URL.
pub struct Refresher {
    settings: Arc<Settings>,
    cache: Cache,
    http: reqwest::Client,
}

impl Refresher {
    pub(crate) fn new(settings: Arc<Settings>, cache: Cache, http: reqwest::Client) -> Self {
        Self {
            settings,
            cache,
            http,
        }
    }

    /// Fetch `request_url` and rewrite its cache entry.
    ///
    /// Timeouts are retried after `task_external_retry_delay`, at most
    /// `task_external_max_retries` times. Upstream error statuses and
    /// malformed JSON stop the task without touching the cache.
    pub async fn refresh(&self, request_url: &str) -> Result<()> {
        info!(url = %request_url, queue = %self.settings.task_queue, "requesting oembed resource");

        let response = self.fetch_with_retry(request_url).await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            error!(url = %request_url, status = status.as_u16(), "unexpected upstream status");
            metrics::counter!(telemetry::REFRESH_TOTAL, "status" => "error").increment(1);
            return Err(MonocleError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let data: ResourceData = match serde_json::from_str(&body) {
            Ok(data) => data,
            Err(parse_error) => {
                error!(url = %request_url, error = %parse_error, "upstream response is not valid JSON");
                metrics::counter!(telemetry::REFRESH_TOTAL, "status" => "error").increment(1);
                return Err(MonocleError::Json(parse_error.to_string()));
            }
        };

        let Some(content_url) = extract_content_url(request_url) else {
            return Err(MonocleError::Configuration(format!(
                "request url '{request_url}' carries no content url"
            )));
        };

        self.cache
            .set(request_url, &Resource::new(content_url, data))
            .await?;
        metrics::counter!(telemetry::REFRESH_TOTAL, "status" => "ok").increment(1);
        Ok(())
    }

    async fn fetch_with_retry(&self, request_url: &str) -> Result<reqwest::Response> {
        let max_retries = self.settings.task_external_max_retries;
        let delay = Duration::from_secs(self.settings.task_external_retry_delay);
        let mut attempt = 0;

        loop {
            match self.http.get(request_url).send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_timeout() && attempt < max_retries => {
                    attempt += 1;
                    metrics::counter!(telemetry::REFRESH_RETRIES_TOTAL).increment(1);
                    warn!(
                        url = %request_url,
                        attempt,
                        max_retries,
                        "timed out fetching oembed resource; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Queue implementation that runs each refresh on a detached tokio task.
///
/// Requires a running tokio runtime at enqueue time. Failures are logged;
/// the cache entry stays as it was.
pub struct SpawnQueue {
    refresher: Arc<Refresher>,
    queue_name: String,
}

impl SpawnQueue {
    pub fn new(refresher: Arc<Refresher>, queue_name: impl Into<String>) -> Self {
        Self {
            refresher,
            queue_name: queue_name.into(),
        }
    }
}

impl RefreshQueue for SpawnQueue {
    fn enqueue(&self, request_url: String) {
        let refresher = self.refresher.clone();
        let queue = self.queue_name.clone();
        tokio::spawn(async move {
            if let Err(error) = refresher.refresh(&request_url).await {
                error!(queue = %queue, url = %request_url, %error, "oembed refresh failed");
            }
        });
    }
}
