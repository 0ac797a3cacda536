//! Log subscriber with a runtime-adjustable filter.
//!
//! Pages can change verbosity with a `SET_LOG_LEVEL` control message. The
//! controller broadcasts the new level to its clients; [`watch_log_level`]
//! listens on that channel and swaps the active filter.

use crate::error::ProxyError;
use fhavur_offline::{ClientMessage, LogLevel};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

/// Handle for swapping the active log filter.
#[derive(Debug, Clone)]
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogControl {
    /// Wrap an existing reload handle.
    #[must_use]
    pub const fn new(handle: reload::Handle<EnvFilter, Registry>) -> Self {
        Self { handle }
    }

    /// Install the global subscriber with `filter` as the initial directive.
    pub fn init(filter: &str) -> Result<Self, ProxyError> {
        let filter = EnvFilter::try_new(filter).map_err(|e| ProxyError::Logging(e.to_string()))?;
        let (filter_layer, handle) = reload::Layer::new(filter);

        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer())
            .try_init()
            .map_err(|e| ProxyError::Logging(e.to_string()))?;

        Ok(Self::new(handle))
    }

    /// Replace the active filter with one for `level`.
    pub fn apply(&self, level: LogLevel) -> Result<(), ProxyError> {
        self.handle
            .reload(EnvFilter::new(level.as_str()))
            .map_err(|e| ProxyError::Logging(e.to_string()))
    }

    /// Current filter rendered as directives.
    pub fn current(&self) -> Option<String> {
        self.handle.with_current(ToString::to_string).ok()
    }
}

/// Apply every `LogLevelChanged` broadcast until the channel closes.
pub async fn watch_log_level(mut messages: broadcast::Receiver<ClientMessage>, control: LogControl) {
    loop {
        match messages.recv().await {
            Ok(ClientMessage::LogLevelChanged { level }) => {
                if let Err(e) = control.apply(level) {
                    tracing::warn!(error = %e, "Failed to reload log filter");
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Log level watcher lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use fhavur_offline::{BroadcastClients, ClientHub};
    use tracing_subscriber::filter::LevelFilter;

    fn control() -> (reload::Layer<EnvFilter, Registry>, LogControl) {
        let (layer, handle) = reload::Layer::new(EnvFilter::new("info"));
        (layer, LogControl::new(handle))
    }

    fn max_level(control: &LogControl) -> Option<LevelFilter> {
        control.handle.with_current(EnvFilter::max_level_hint).unwrap()
    }

    #[test]
    fn test_apply_swaps_filter() {
        let (_layer, control) = control();
        assert_eq!(max_level(&control), Some(LevelFilter::INFO));

        control.apply(LogLevel::Debug).unwrap();
        assert_eq!(max_level(&control), Some(LevelFilter::DEBUG));

        control.apply(LogLevel::Off).unwrap();
        assert_eq!(max_level(&control), Some(LevelFilter::OFF));
    }

    #[test]
    fn test_apply_fails_once_subscriber_is_gone() {
        let (layer, control) = control();
        drop(layer);
        assert!(control.apply(LogLevel::Warn).is_err());
    }

    #[tokio::test]
    async fn test_watcher_follows_broadcasts() {
        let (_layer, control) = control();
        let clients = BroadcastClients::default();
        let watcher = tokio::spawn(watch_log_level(clients.subscribe(), control.clone()));

        clients.broadcast(ClientMessage::Version {
            version: "v2".to_string(),
        });
        clients.broadcast(ClientMessage::LogLevelChanged {
            level: LogLevel::Trace,
        });
        drop(clients);
        watcher.await.unwrap();

        assert_eq!(max_level(&control), Some(LevelFilter::TRACE));
    }
}
