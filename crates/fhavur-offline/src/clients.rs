//! Open pages controlled by the worker

use crate::message::ClientMessage;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

/// Channel to the pages the worker controls
pub trait ClientHub: Send + Sync {
    /// Take control of every open page; returns how many were claimed
    fn claim(&self) -> usize;

    /// Deliver `message` to every open page; returns how many received it
    fn broadcast(&self, message: ClientMessage) -> usize;
}

/// Hub backed by a `tokio` broadcast channel; each subscriber is one page
#[derive(Debug)]
pub struct BroadcastClients {
    sender: broadcast::Sender<ClientMessage>,
    claimed: AtomicBool,
}

impl Default for BroadcastClients {
    fn default() -> Self {
        Self::new(64)
    }
}

impl BroadcastClients {
    /// `capacity` bounds how many messages a slow page may lag behind
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            claimed: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientMessage> {
        self.sender.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}

impl ClientHub for BroadcastClients {
    fn claim(&self) -> usize {
        self.claimed.store(true, Ordering::Release);
        let count = self.client_count();
        debug!(clients = count, "Claimed clients");
        count
    }

    fn broadcast(&self, message: ClientMessage) -> usize {
        // No subscribers is not an error: there is simply nobody to tell
        self.sender.send(message).unwrap_or(0)
    }
}
