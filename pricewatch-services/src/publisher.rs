//! Publishes worker output onto the bus

use pricewatch_core::{AlertEvent, BroadcastEvent, Channel};
use std::sync::Arc;
use tracing::debug;

use crate::bus::{BusError, MessageBus};

/// Serializes events and writes them to their channel
#[derive(Clone)]
pub struct Publisher {
    bus: Arc<dyn MessageBus>,
}

impl Publisher {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }

    /// Publish one price tick on `price_updates`
    pub async fn publish_prices(&self, event: &BroadcastEvent) -> Result<usize, BusError> {
        let payload = serde_json::to_string(event)?;
        let receivers = self.bus.publish(Channel::PriceUpdates, payload).await?;
        debug!("Published price tick to {} subscriber(s)", receivers);
        Ok(receivers)
    }

    /// Publish one alert notification on `alert_notifications`
    pub async fn publish_alert(&self, event: &AlertEvent) -> Result<usize, BusError> {
        let payload = serde_json::to_string(event)?;
        let receivers = self.bus.publish(Channel::AlertNotifications, payload).await?;
        debug!(
            "Published alert for {} on {} to {} subscriber(s)",
            event.session_id, event.asset, receivers
        );
        Ok(receivers)
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher").finish_non_exhaustive()
    }
}
