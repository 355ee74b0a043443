//! Monocle - OEmbed provider/consumer engine
//!
//! Given blocks of free-form text or HTML, monocle locates URLs for which
//! rich media can be embedded, obtains OEmbed resources for them from
//! local (internal) or third-party (external) providers, caches them with
//! freshness guarantees, and refreshes stale entries asynchronously so
//! foreground requests never block on slow provider APIs.
//!
//! # Example
//!
//! ```rust,no_run
//! use monocle::{ExternalProvider, Monocle, ResourceType};
//!
//! #[tokio::main]
//! async fn main() -> monocle::Result<()> {
//!     let engine = Monocle::builder()
//!         .register_external(ExternalProvider::new(
//!             "vimeo",
//!             "http://vimeo.com/api/oembed.json",
//!             ResourceType::Video,
//!             vec!["http://vimeo.com/*".into()],
//!             true,
//!         )?)
//!         .build()?;
//!
//!     let enriched = engine
//!         .enrich("watch this: http://vimeo.com/12345", None, None)
//!         .await;
//!
//!     println!("{enriched}");
//!     Ok(())
//! }
//! ```
//!
//! The first pass renders a plain hyperlink (the cache was cold) and
//! schedules a background refresh; once the refresh lands, the same call
//! substitutes the provider's embed markup.

pub mod cache;
pub mod consumers;
pub mod endpoint;
mod engine;
pub mod error;
pub mod events;
pub mod providers;
pub mod resource;
pub mod settings;
pub mod tasks;
pub mod telemetry;
mod util;

// Re-export main types at crate root
pub use cache::{Cache, CacheBackend, MemoryBackend};
pub use consumers::{Consumer, PrefetchSize};
pub use endpoint::{EndpointReply, OembedQuery};
pub use engine::{Monocle, MonocleBuilder};
pub use error::{MonocleError, Result};
pub use events::{Event, EventSink, Events};
pub use providers::{
    DataSource, ExternalProvider, ExternalProviderRecord, InternalProvider, ProviderMatch,
    ProviderRegistry, ProviderStore, ResourceParams, nearest_allowed_size,
};
pub use resource::{
    CacheAge, OembedField, OPTIONAL_FIELDS, Resource, ResourceData, ResourceType, required_fields,
};
pub use settings::Settings;
pub use tasks::{RefreshQueue, Refresher, SpawnQueue};
pub use util::extract_content_url;
