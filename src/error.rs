//! Monocle error types

/// Monocle error types
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum MonocleError {
    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid provider: {0}")]
    InvalidProvider(String),

    /// An internal provider did not supply an attribute required by its
    /// resource type. Surfaced from resource building and logged; consumers
    /// treat it as "no resource" and leave the URL untouched.
    #[error("provider '{provider}' does not implement required attribute '{attribute}'")]
    NotImplemented {
        provider: String,
        attribute: &'static str,
    },

    // Upstream/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("upstream returned status {status}")]
    UpstreamStatus { status: u16 },

    // Data errors
    #[error("JSON error: {0}")]
    Json(String),

    // Cache store errors
    #[error("cache backend error: {0}")]
    CacheBackend(String),
}

impl MonocleError {
    /// Whether this error is transient and the request may succeed on retry.
    ///
    /// Used by the refresh task to decide whether a failed upstream fetch
    /// should be attempted again. Permanent errors (configuration, parse,
    /// missing attributes) return `false`.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,

            // Server errors are transient; client errors are not
            Self::UpstreamStatus { status } => *status >= 500,

            Self::Configuration(_)
            | Self::InvalidProvider(_)
            | Self::NotImplemented { .. }
            | Self::Json(_)
            | Self::CacheBackend(_) => false,
        }
    }
}

impl From<serde_json::Error> for MonocleError {
    fn from(err: serde_json::Error) -> Self {
        MonocleError::Json(err.to_string())
    }
}

impl From<reqwest::Error> for MonocleError {
    fn from(err: reqwest::Error) -> Self {
        MonocleError::Http(err.to_string())
    }
}

/// Result type alias for monocle operations
pub type Result<T> = std::result::Result<T, MonocleError>;
