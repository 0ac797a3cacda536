//! Fhavur caching proxy binary entry point.
//!
//! This is a thin wrapper around the fhavur-proxy library that:
//! 1. Parses command-line arguments
//! 2. Validates configuration
//! 3. Initializes logging
//! 4. Starts the proxy
//!
//! For library usage, see the fhavur-proxy crate documentation.

use anyhow::Result;
use fhavur_proxy::{LogControl, ProxyConfig, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from CLI args
    let config = ProxyConfig::from_args();
    config.validate()?;

    // Initialize tracing subscriber with a reloadable filter
    let log = LogControl::init(&config.log)?;

    tracing::info!(
        "Configuration loaded: bind={}, upstream={}, cache_dir={:?}",
        config.bind,
        config.upstream,
        config.cache_dir
    );

    // Create and run proxy
    let server = Server::new(config, Some(log))?;
    server.run().await?;

    Ok(())
}
