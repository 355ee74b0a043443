//! Providers: sources of OEmbed resources for matching URLs.
//!
//! Two kinds exist. [`ExternalProvider`]s describe a third-party OEmbed API
//! endpoint and acquire resources through the cache/refresh-task protocol.
//! [`InternalProvider`]s compute resources locally from domain objects and
//! never touch the network. The [`ProviderRegistry`] holds both, matching
//! internal providers first.

mod external;
mod internal;
pub(crate) mod matching;
mod registry;
mod store;

pub use external::ExternalProvider;
pub use internal::{DataSource, InternalProvider};
pub use registry::{InternalMatch, ProviderMatch, ProviderRegistry};
pub use store::{ExternalProviderRecord, ProviderStore};

/// Optional maximum dimensions accompanying a resource request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceParams {
    pub maxwidth: Option<u32>,
    pub maxheight: Option<u32>,
}

impl ResourceParams {
    pub fn new(maxwidth: Option<u32>, maxheight: Option<u32>) -> Self {
        Self {
            maxwidth,
            maxheight,
        }
    }

    /// Drop zero dimensions; a zero bound means "no bound".
    pub fn normalized(self) -> Self {
        Self {
            maxwidth: self.maxwidth.filter(|w| *w > 0),
            maxheight: self.maxheight.filter(|h| *h > 0),
        }
    }
}

/// Pick the largest allowed size under a cap.
///
/// The cap is `(w, h)` bounded by the requested maxima. Of the `dims`
/// entries fitting inside the cap, the lexicographically largest wins
/// (widest, then tallest); when none fit, the cap itself is returned
/// unchanged. `dims` are allowed *output* sizes, not content sizes.
pub fn nearest_allowed_size(
    width: u32,
    height: u32,
    maxwidth: Option<u32>,
    maxheight: Option<u32>,
    dims: &[(u32, u32)],
) -> (u32, u32) {
    let cap = (
        width.min(maxwidth.unwrap_or(width)),
        height.min(maxheight.unwrap_or(height)),
    );
    dims.iter()
        .copied()
        .filter(|(w, h)| *w <= cap.0 && *h <= cap.1)
        .max()
        .unwrap_or(cap)
}
