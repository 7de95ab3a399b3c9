//! Alert matching
//!
//! Runs once per fetch cycle against the freshest snapshot: every entry
//! whose target the price now satisfies gets exactly one notification and
//! is then removed from the registry so it cannot fire again.

use pricewatch_core::{AlertEntry, AlertEvent, PriceSnapshot, TriggerDirection};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::alert_registry::AlertRegistry;
use crate::publisher::Publisher;

/// Outcome of one matching pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    /// Entries notified and removed
    pub fired: usize,
    /// Entries whose notification could not be published (kept for the next cycle)
    pub failed: usize,
    /// Entries that were superseded by a new registration before removal
    pub superseded: usize,
}

/// Finds met alerts and fires them
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertMatcher {
    direction: TriggerDirection,
}

impl AlertMatcher {
    pub fn new(direction: TriggerDirection) -> Self {
        Self { direction }
    }

    pub fn direction(&self) -> TriggerDirection {
        self.direction
    }

    /// Every entry met by `snapshot`, across all of its assets
    pub fn find_matches(
        &self,
        registry: &AlertRegistry,
        snapshot: &PriceSnapshot,
    ) -> Vec<(AlertEntry, Decimal)> {
        snapshot
            .prices
            .iter()
            .flat_map(|(asset, price)| {
                registry
                    .matching(asset, *price, self.direction)
                    .into_iter()
                    .map(move |entry| (entry, *price))
            })
            .collect()
    }

    /// Fire every met entry: publish its notification, then remove it.
    ///
    /// Removal only happens once the notification is queued on the bus, and
    /// only if the entry still carries the matched target.
    pub async fn run(
        &self,
        registry: &AlertRegistry,
        publisher: &Publisher,
        snapshot: &PriceSnapshot,
    ) -> MatchReport {
        let matches = self.find_matches(registry, snapshot);
        let mut report = MatchReport::default();

        if !matches.is_empty() {
            info!("Triggering {} alert(s)", matches.len());
        }

        for (entry, price) in matches {
            let event = AlertEvent::triggered(&entry, price);

            if let Err(e) = publisher.publish_alert(&event).await {
                warn!(
                    "Failed to publish alert for {} on {}: {}",
                    entry.session_id, entry.asset, e
                );
                report.failed += 1;
                continue;
            }

            if registry.remove_if_target(&entry.asset, &entry.session_id, entry.target_price) {
                report.fired += 1;
            } else {
                report.superseded += 1;
            }
        }

        report
    }
}
