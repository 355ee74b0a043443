//! Telemetry metric name constants.
//!
//! Centralised metric names for monocle operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `monocle_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `provider` — provider name
//! - `mode` — consumer mode: "text" or "html"
//! - `status` — outcome: "ok" or "error"

/// Total cache hits seen by the cache wrapper.
pub const CACHE_HITS_TOTAL: &str = "monocle_cache_hits_total";

/// Total cache misses (including entries primed on miss).
pub const CACHE_MISSES_TOTAL: &str = "monocle_cache_misses_total";

/// Total refresh tasks that ran to completion.
///
/// Labels: `status` ("ok" | "error").
pub const REFRESH_TOTAL: &str = "monocle_refresh_total";

/// Total refresh retry attempts (not counting the initial request).
pub const REFRESH_RETRIES_TOTAL: &str = "monocle_refresh_retries_total";

/// Total consume passes over content.
///
/// Labels: `mode` ("text" | "html").
pub const CONSUME_TOTAL: &str = "monocle_consume_total";

/// Total URL substitutions performed by consumers.
///
/// Labels: `provider`.
pub const URLS_REPLACED_TOTAL: &str = "monocle_urls_replaced_total";
