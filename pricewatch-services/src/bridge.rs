//! Bus-to-session bridge
//!
//! Subscribes to both bus channels and turns each message into a delivery:
//! price ticks go to every live session, alert notifications go to the one
//! session they name. Nothing is acknowledged or retried.

use parking_lot::RwLock;
use pricewatch_core::{AlertEvent, BroadcastEvent, BusMessage, Channel, ServerMessage};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::{BusError, MessageBus};
use crate::transport::SessionTransport;

/// Subscription state of the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeState {
    /// Waiting for the bus to confirm the subscription
    Subscribing,
    /// Subscribed and forwarding messages
    Active,
    /// The bus closed the subscription; nothing is forwarded any more
    Stopped,
}

/// What the bridge did with one bus message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Price tick handed to this many sessions
    Broadcast { sessions: usize },
    /// Alert handed to its session (`delivered == false` when it was not live)
    Targeted { delivered: bool },
    /// Payload could not be decoded
    Dropped,
}

/// Forwards bus traffic to client sessions
pub struct Bridge {
    bus: Arc<dyn MessageBus>,
    transport: Arc<dyn SessionTransport>,
    state: RwLock<BridgeState>,
}

impl Bridge {
    pub fn new(bus: Arc<dyn MessageBus>, transport: Arc<dyn SessionTransport>) -> Self {
        Self {
            bus,
            transport,
            state: RwLock::new(BridgeState::Subscribing),
        }
    }

    pub fn state(&self) -> BridgeState {
        *self.state.read()
    }

    /// Subscribe to both channels and start forwarding.
    ///
    /// A subscription failure is returned to the caller: the session layer
    /// must not start serving without it.
    pub async fn start(self: Arc<Self>) -> Result<JoinHandle<()>, BusError> {
        let mut subscription = self.bus.subscribe(&Channel::ALL).await?;
        *self.state.write() = BridgeState::Active;
        info!("Subscribed to {} channels", subscription.channels().len());

        let handle = tokio::spawn(async move {
            while let Some(message) = subscription.recv().await {
                self.dispatch(message);
            }
            *self.state.write() = BridgeState::Stopped;
            warn!("Bus closed, bridge stopped forwarding");
        });

        Ok(handle)
    }

    /// Deliver one bus message to the session layer
    pub fn dispatch(&self, message: BusMessage) -> Delivery {
        match message.channel {
            Channel::PriceUpdates => {
                match serde_json::from_str::<BroadcastEvent>(&message.payload) {
                    Ok(event) => {
                        let sessions = self
                            .transport
                            .broadcast_to_all(&ServerMessage::from(event));
                        debug!("Price tick delivered to {} session(s)", sessions);
                        Delivery::Broadcast { sessions }
                    }
                    Err(e) => {
                        warn!("Dropping malformed price update: {}", e);
                        Delivery::Dropped
                    }
                }
            }
            Channel::AlertNotifications => {
                match serde_json::from_str::<AlertEvent>(&message.payload) {
                    Ok(event) => {
                        let session_id = event.session_id.clone();
                        info!("Alert triggered for session: {}", session_id);
                        let delivered = self
                            .transport
                            .send_to_session(&session_id, ServerMessage::from(event));
                        if !delivered {
                            debug!("Session {} not live, alert dropped", session_id);
                        }
                        Delivery::Targeted { delivered }
                    }
                    Err(e) => {
                        warn!("Dropping malformed alert notification: {}", e);
                        Delivery::Dropped
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("state", &self.state())
            .field("sessions", &self.transport.session_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBus;
    use crate::websocket::SessionManager;
    use pricewatch_core::{AlertEntry, Asset, PriceSnapshot, SessionId};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn bridge() -> (Bridge, Arc<SessionManager>) {
        let sessions = Arc::new(SessionManager::new());
        let bridge = Bridge::new(Arc::new(InMemoryBus::new()), sessions.clone());
        (bridge, sessions)
    }

    fn tick() -> BusMessage {
        let mut prices = BTreeMap::new();
        prices.insert(Asset::new("bitcoin"), dec!(96000));
        let event = BroadcastEvent::from(&PriceSnapshot::now(prices));
        BusMessage::new(Channel::PriceUpdates, serde_json::to_string(&event).unwrap())
    }

    fn alert_for(session_id: &SessionId) -> BusMessage {
        let entry = AlertEntry::new(session_id.clone(), Asset::new("bitcoin"), dec!(95000));
        let event = AlertEvent::triggered(&entry, dec!(96000));
        BusMessage::new(Channel::AlertNotifications, serde_json::to_string(&event).unwrap())
    }

    #[test]
    fn test_starts_subscribing() {
        let (bridge, _) = bridge();
        assert_eq!(bridge.state(), BridgeState::Subscribing);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_live_sessions_only() {
        let (bridge, sessions) = bridge();
        let (_a, mut rx_a) = sessions.connect();
        let (_b, mut rx_b) = sessions.connect();

        assert_eq!(bridge.dispatch(tick()), Delivery::Broadcast { sessions: 2 });

        // Connected after the tick: gets nothing
        let (_c, mut rx_c) = sessions.connect();
        assert!(matches!(rx_a.recv().await, Some(ServerMessage::PriceTick { .. })));
        assert!(matches!(rx_b.recv().await, Some(ServerMessage::PriceTick { .. })));
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_alert_goes_to_named_session_only() {
        let (bridge, sessions) = bridge();
        let (a, mut rx_a) = sessions.connect();
        let (_b, mut rx_b) = sessions.connect();

        assert_eq!(bridge.dispatch(alert_for(&a)), Delivery::Targeted { delivered: true });

        match rx_a.recv().await {
            Some(ServerMessage::AlertPopup { message, .. }) => {
                assert_eq!(message, "bitcoin has reached $96000!");
            }
            other => panic!("expected alert popup, got {:?}", other),
        }
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_alert_for_absent_session_is_dropped() {
        let (bridge, _) = bridge();
        assert_eq!(
            bridge.dispatch(alert_for(&SessionId::from("gone"))),
            Delivery::Targeted { delivered: false }
        );
    }

    #[test]
    fn test_malformed_payload_is_dropped() {
        let (bridge, sessions) = bridge();
        let (_a, _rx) = sessions.connect();
        assert_eq!(
            bridge.dispatch(BusMessage::new(Channel::PriceUpdates, "not json")),
            Delivery::Dropped
        );
    }

    #[tokio::test]
    async fn test_start_fails_on_closed_bus() {
        let bus = Arc::new(InMemoryBus::new());
        bus.close();
        let bridge = Arc::new(Bridge::new(bus, Arc::new(SessionManager::new())));

        assert!(Arc::clone(&bridge).start().await.is_err());
        assert_eq!(bridge.state(), BridgeState::Subscribing);
    }

    #[tokio::test]
    async fn test_start_forwards_bus_traffic() {
        let bus = Arc::new(InMemoryBus::new());
        let sessions = Arc::new(SessionManager::new());
        let bridge = Arc::new(Bridge::new(bus.clone(), sessions.clone()));
        let (_a, mut rx_a) = sessions.connect();

        let _handle = Arc::clone(&bridge).start().await.unwrap();
        assert_eq!(bridge.state(), BridgeState::Active);

        let message = tick();
        bus.publish(message.channel, message.payload).await.unwrap();
        assert!(matches!(rx_a.recv().await, Some(ServerMessage::PriceTick { .. })));
    }

    #[tokio::test]
    async fn test_state_is_stopped_once_bus_closes() {
        let bus = Arc::new(InMemoryBus::new());
        let bridge = Arc::new(Bridge::new(bus.clone(), Arc::new(SessionManager::new())));

        let handle = Arc::clone(&bridge).start().await.unwrap();
        assert_eq!(bridge.state(), BridgeState::Active);

        bus.close();
        handle.await.unwrap();
        assert_eq!(bridge.state(), BridgeState::Stopped);
    }
}
