//! Error types for cache storage, network and configuration operations

use thiserror::Error;

/// Errors that can occur while reading or writing cache storage
#[derive(Debug, Error)]
pub enum CacheError {
    /// Namespace name contains characters the backend cannot store
    #[error("Invalid namespace name: {0}")]
    InvalidNamespace(String),

    /// Namespace was deleted while a handle to it was still in use
    #[error("Namespace closed: {0}")]
    NamespaceClosed(String),

    /// Storage quota exceeded
    #[error("Storage quota exceeded")]
    QuotaExceeded,

    /// IO error during cache operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Index serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored entry could not be turned back into a response
    #[error("Cache corruption detected: {0}")]
    Corruption(String),

    /// Cache backend-specific error
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Errors produced by a network fetch
#[derive(Debug, Error)]
pub enum FetchError {
    /// No network connectivity
    #[error("Network unavailable while fetching {url}")]
    Offline {
        /// URL that was being fetched
        url: String,
    },

    /// Request URL could not be parsed
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    /// Request did not complete in time
    #[error("Request to {url} timed out")]
    Timeout {
        /// URL that was being fetched
        url: String,
    },

    /// Any other transport-level failure
    #[error("Request to {url} failed: {reason}")]
    Transport {
        /// URL that was being fetched
        url: String,
        /// Transport error description
        reason: String,
    },

    /// HTTP client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),
}

impl FetchError {
    /// Build a transport error for `url`
    pub fn transport(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds a value outside its allowed range
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// External-library pattern failed to compile
    #[error("Invalid external library pattern '{pattern}': {source}")]
    InvalidPattern {
        /// Pattern source text
        pattern: String,
        /// Regex compile error
        #[source]
        source: regex::Error,
    },

    /// Page origin is not an absolute http(s) URL
    #[error("Invalid page origin '{0}'")]
    InvalidOrigin(String),
}

/// Result type alias for cache storage operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type alias for network fetches
pub type FetchResult<T> = Result<T, FetchError>;
