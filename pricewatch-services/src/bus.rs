//! Pub/sub bus between the polling worker and the session layer
//!
//! The worker never talks to clients directly: it publishes serialized
//! events on named channels and the bridge on the session side subscribes
//! to them. Delivery is fire-and-forget; a slow subscriber loses messages
//! instead of slowing the publisher down.

use async_trait::async_trait;
use parking_lot::RwLock;
use pricewatch_core::{BusMessage, Channel};
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Messages buffered per subscriber before the oldest are dropped
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Bus errors
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Failed to subscribe to {channels}: {reason}")]
    SubscribeFailed { channels: String, reason: String },

    #[error("Failed to publish on {channel}: {reason}")]
    PublishFailed { channel: Channel, reason: String },

    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Bus is closed")]
    Closed,
}

/// Abstract pub/sub bus
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish `payload` on `channel`; returns how many subscribers saw it.
    ///
    /// Zero subscribers is not an error: the message is simply dropped.
    async fn publish(&self, channel: Channel, payload: String) -> Result<usize, BusError>;

    /// Subscribe to `channels`. Resolves once the subscription is in place.
    async fn subscribe(&self, channels: &[Channel]) -> Result<BusSubscription, BusError>;
}

/// A live subscription to one or more channels
#[derive(Debug)]
pub struct BusSubscription {
    rx: broadcast::Receiver<BusMessage>,
    channels: HashSet<Channel>,
}

impl BusSubscription {
    pub fn new(rx: broadcast::Receiver<BusMessage>, channels: &[Channel]) -> Self {
        Self {
            rx,
            channels: channels.iter().copied().collect(),
        }
    }

    pub fn channels(&self) -> &HashSet<Channel> {
        &self.channels
    }

    /// Next message on a subscribed channel, or `None` once the bus closes.
    ///
    /// Messages lost to lag are logged and skipped.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.rx.recv().await {
                Ok(message) => {
                    if self.channels.contains(&message.channel) {
                        return Some(message);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Bus subscriber lagged, dropped {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// In-process bus backed by a tokio broadcast channel
#[derive(Debug)]
pub struct InMemoryBus {
    /// `None` once closed; dropping the sender ends every subscription
    tx: RwLock<Option<broadcast::Sender<BusMessage>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx: RwLock::new(Some(tx)),
        }
    }

    /// Refuse further publishes and subscriptions and end live subscriptions
    pub fn close(&self) {
        self.tx.write().take();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.read().is_none()
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, channel: Channel, payload: String) -> Result<usize, BusError> {
        let guard = self.tx.read();
        let Some(tx) = guard.as_ref() else {
            return Err(BusError::Closed);
        };

        match tx.send(BusMessage::new(channel, payload)) {
            Ok(receivers) => Ok(receivers),
            Err(_) => {
                debug!("No subscribers on {}, message dropped", channel);
                Ok(0)
            }
        }
    }

    async fn subscribe(&self, channels: &[Channel]) -> Result<BusSubscription, BusError> {
        let guard = self.tx.read();
        let Some(tx) = guard.as_ref() else {
            return Err(BusError::SubscribeFailed {
                channels: channel_list(channels),
                reason: "bus is closed".to_string(),
            });
        };
        if channels.is_empty() {
            return Err(BusError::SubscribeFailed {
                channels: String::new(),
                reason: "no channels requested".to_string(),
            });
        }

        Ok(BusSubscription::new(tx.subscribe(), channels))
    }
}

fn channel_list(channels: &[Channel]) -> String {
    channels
        .iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join(",")
}
