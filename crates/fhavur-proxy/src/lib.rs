//! Offline-first caching proxy.
//!
//! This crate puts the `fhavur-offline` controller in front of the site's
//! origin. Every browser request is treated as an intercepted fetch: cached
//! assets keep loading, navigations fall back to cached or generated pages,
//! and only passthrough requests can fail (with `502 Bad Gateway`).
//!
//! # Architecture
//!
//! The proxy uses a library-first design with the following components:
//! - `server`: State construction, cache warm-up and the serve loop
//! - `config`: CLI/environment configuration and validation
//! - `http`: axum router, control endpoints and the fetch handler
//! - `logging`: Subscriber with a filter pages can adjust at runtime
//!
//! # Example
//!
//! ```no_run
//! use fhavur_proxy::{LogControl, ProxyConfig, Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ProxyConfig::from_args();
//!     config.validate()?;
//!
//!     let log = LogControl::init(&config.log)?;
//!     let server = Server::new(config, Some(log))?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Control endpoints
//!
//! - `POST /_worker/message`: JSON control message (`SKIP_WAITING`,
//!   `SET_LOG_LEVEL`, `GET_VERSION`)
//! - `POST /_worker/sync/{tag}`: background sync event
//! - `GET /_worker/stats`: version, lifecycle state and fetch counters

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

// Module declarations
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod server;

// Re-exports for public API
pub use config::ProxyConfig;
pub use error::{ConfigError, ProxyError};
pub use logging::LogControl;
pub use server::{AppState, Server};
