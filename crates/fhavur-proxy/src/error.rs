//! Error types for the caching proxy.
//!
//! All errors use thiserror for consistent error handling across the codebase.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Upstream origin is not an absolute http(s) URL
    #[error("Invalid upstream origin '{0}'")]
    InvalidUpstream(String),

    /// Failed to read the offline layer config file
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        /// Path to the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for the offline layer
    #[error("Invalid JSON in config file {path}: {source}")]
    InvalidJson {
        /// Path to the config file
        path: PathBuf,
        /// Parse error
        #[source]
        source: serde_json::Error,
    },

    /// Offline layer rejected the merged configuration
    #[error(transparent)]
    Offline(#[from] fhavur_offline::ConfigError),

    /// Cache directory exists but is not a directory
    #[error("Cache directory is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Request timeout must be positive
    #[error("Request timeout must be greater than zero")]
    ZeroTimeout,

    /// Initial log filter does not parse
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidLogFilter {
        /// Filter directive text
        filter: String,
        /// Parser message
        reason: String,
    },
}

/// Proxy runtime errors.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Failed to bind HTTP server
    #[error("Failed to bind HTTP server to {addr}: {source}")]
    BindFailed {
        /// Address that failed to bind
        addr: std::net::SocketAddr,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Cache storage could not be prepared
    #[error("Cache storage error: {0}")]
    Storage(#[from] fhavur_offline::CacheError),

    /// Upstream client could not be built
    #[error("Upstream client error: {0}")]
    Network(#[from] fhavur_offline::FetchError),

    /// Logging could not be installed or reloaded
    #[error("Logging error: {0}")]
    Logging(String),

    /// Server shutdown error
    #[error("Server shutdown error: {0}")]
    Shutdown(String),
}
