//! Offline-first request caching for a static site
//!
//! This crate answers intercepted page requests the way a service worker
//! would: every request is classified, routed to exactly one caching strategy
//! and answered from the network, from a versioned cache namespace, or with a
//! synthesized offline fallback. Only passthrough requests can fail.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │              CacheController               │
//! │   install · activate · fetch · message     │
//! └────────────────────────────────────────────┘
//!          │                       │
//! ┌──────────────────┐   ┌────────────────────┐
//! │  UrlClassifier   │──▶│       router       │
//! └──────────────────┘   └────────────────────┘
//!                                  │
//! ┌────────────────────────────────────────────┐
//! │                 strategies                 │
//! │ static asset │ stylesheet │ document │ SWR │
//! └────────────────────────────────────────────┘
//!          │                       │
//! ┌──────────────────┐   ┌────────────────────┐
//! │ NamespaceManager │   │      Network       │
//! │  static/dynamic  │   │   (reqwest/fake)   │
//! └──────────────────┘   └────────────────────┘
//!          │
//! ┌────────────────────────────────────────────┐
//! │   CacheStorage: memory │ disk              │
//! └────────────────────────────────────────────┘
//! ```
//!
//! # Cache namespaces
//!
//! Responses live in two namespaces named `<prefix>-static-<version>` and
//! `<prefix>-dynamic-<version>`. Bumping the version and re-activating deletes
//! every namespace the new version does not own.
//!
//! # Usage
//!
//! ```rust,no_run
//! use fhavur_offline::prelude::*;
//! use std::{sync::Arc, time::Duration};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OfflineConfig::new()
//!     .with_page_origin("http://localhost:8080")
//!     .with_cache_version("v3");
//! let network = HttpNetwork::new(&config.origin_url()?, Duration::from_secs(10))?;
//!
//! let controller = CacheController::new(
//!     config,
//!     Arc::new(MemoryCacheStorage::new()),
//!     Arc::new(network),
//!     Arc::new(BroadcastClients::default()),
//! )?;
//! controller.install().await;
//! controller.activate().await;
//!
//! let response = controller
//!     .handle_fetch(FetchRequest::navigate("http://localhost:8080/gallery"))
//!     .await?;
//! println!("{} {}", response.status, response.url);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::doc_markdown)] // Cache terms don't need backticks
#![allow(clippy::use_self)] // Sometimes explicit types are clearer
#![allow(clippy::redundant_closure_for_method_calls)] // Sometimes clearer
#![allow(clippy::module_name_repetitions)] // CacheStorage in storage, etc.

pub mod background;
pub mod classify;
pub mod clients;
pub mod config;
pub mod controller;
pub mod error;
pub mod fallback;
pub mod message;
pub mod namespace;
pub mod network;
pub mod request;
pub mod response;
pub mod router;
pub mod stats;
pub mod storage;
pub mod strategy;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use classify::{Classification, ResourceClass, UrlClassifier};
pub use clients::{BroadcastClients, ClientHub};
pub use config::OfflineConfig;
pub use controller::{
    ActivateReport, CacheController, InstallReport, MessageOutcome, SyncOutcome, WorkerState,
};
pub use error::{CacheError, CacheResult, ConfigError, FetchError, FetchResult};
pub use fallback::{FallbackKind, OFFLINE_FALLBACK_HEADER, fallback_kind};
pub use message::{ClientMessage, ControlMessage, LogLevel};
pub use namespace::{CacheRole, NamespaceManager};
pub use network::{HttpNetwork, Network};
pub use request::{FetchRequest, RequestDestination, RequestKey, RequestMode};
pub use response::{FetchResponse, ResponseKind};
pub use router::{Dispatch, Route};
pub use stats::{FetchMetrics, MetricsSnapshot};
pub use storage::{CacheStorage, DiskCacheStorage, MemoryCacheStorage, ResponseCache};

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits

    pub use crate::{
        CacheController,
        clients::{BroadcastClients, ClientHub},
        config::OfflineConfig,
        error::{CacheError, ConfigError, FetchError, FetchResult},
        message::{ClientMessage, ControlMessage, LogLevel},
        network::{HttpNetwork, Network},
        request::{FetchRequest, RequestDestination, RequestMode},
        response::FetchResponse,
        storage::{CacheStorage, DiskCacheStorage, MemoryCacheStorage, ResponseCache},
    };
}
