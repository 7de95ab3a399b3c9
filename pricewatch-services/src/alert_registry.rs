//! Per-asset alert registry
//!
//! Each asset has an ordered book of `(session, target price)` pairs,
//! addressed by the key `alerts:<asset>`. The book is indexed both by
//! session (for overwrite and removal) and by price (for range queries).
//! Every operation takes the asset's shard lock once, so a register racing
//! a matching cycle sees either the old or the new target, never a mix.

use dashmap::DashMap;
use pricewatch_core::{AlertEntry, Asset, SessionId, TriggerDirection};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::RangeBounds;
use tracing::debug;

/// Alerts registered on a single asset
#[derive(Debug, Default)]
struct AssetAlerts {
    by_session: HashMap<SessionId, Decimal>,
    by_price: BTreeMap<Decimal, BTreeSet<SessionId>>,
}

impl AssetAlerts {
    fn insert(&mut self, session_id: &SessionId, target: Decimal) -> Option<Decimal> {
        let previous = self.by_session.insert(session_id.clone(), target);
        if let Some(old) = previous {
            self.unindex(session_id, old);
        }
        self.by_price
            .entry(target)
            .or_default()
            .insert(session_id.clone());
        previous
    }

    fn remove(&mut self, session_id: &SessionId) -> Option<Decimal> {
        let target = self.by_session.remove(session_id)?;
        self.unindex(session_id, target);
        Some(target)
    }

    fn unindex(&mut self, session_id: &SessionId, target: Decimal) {
        if let Some(sessions) = self.by_price.get_mut(&target) {
            sessions.remove(session_id);
            if sessions.is_empty() {
                self.by_price.remove(&target);
            }
        }
    }

    fn entries_in<R>(&self, asset: &Asset, range: R) -> Vec<AlertEntry>
    where
        R: RangeBounds<Decimal>,
    {
        self.by_price
            .range(range)
            .flat_map(|(target, sessions)| {
                sessions
                    .iter()
                    .map(move |s| AlertEntry::new(s.clone(), asset.clone(), *target))
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.by_session.len()
    }
}

/// Registry of pending alerts, one ordered book per asset
#[derive(Debug, Default)]
pub struct AlertRegistry {
    books: DashMap<Asset, AssetAlerts>,
}

impl AlertRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or overwrite) the alert of `session_id` on `asset`.
    ///
    /// Returns the target it replaced, if the session already had one.
    /// Any numeric target is accepted.
    pub fn register(&self, asset: &Asset, session_id: &SessionId, target: Decimal) -> Option<Decimal> {
        let previous = self
            .books
            .entry(asset.clone())
            .or_default()
            .insert(session_id, target);

        debug!(
            "Registered {} on {} at {} (replaced: {:?})",
            session_id,
            asset.registry_key(),
            target,
            previous
        );
        previous
    }

    /// All entries on `asset` with `target <= max_price`
    pub fn query(&self, asset: &Asset, max_price: Decimal) -> Vec<AlertEntry> {
        self.books
            .get(asset)
            .map(|book| book.entries_in(asset, ..=max_price))
            .unwrap_or_default()
    }

    /// All entries on `asset` with `target >= min_price`
    pub fn query_at_least(&self, asset: &Asset, min_price: Decimal) -> Vec<AlertEntry> {
        self.books
            .get(asset)
            .map(|book| book.entries_in(asset, min_price..))
            .unwrap_or_default()
    }

    /// Entries on `asset` that `price` satisfies under `direction`
    pub fn matching(&self, asset: &Asset, price: Decimal, direction: TriggerDirection) -> Vec<AlertEntry> {
        match direction {
            TriggerDirection::Rising => self.query(asset, price),
            TriggerDirection::Falling => self.query_at_least(asset, price),
        }
    }

    /// Delete the alert of `session_id` on `asset`. No-op when absent.
    pub fn remove(&self, asset: &Asset, session_id: &SessionId) -> bool {
        self.books
            .get_mut(asset)
            .and_then(|mut book| book.remove(session_id))
            .is_some()
    }

    /// Delete the alert only if it still has target `target`.
    ///
    /// Used after a trigger: if the session re-registered with a new target
    /// between the query and this call, the new registration is kept.
    pub fn remove_if_target(&self, asset: &Asset, session_id: &SessionId, target: Decimal) -> bool {
        let Some(mut book) = self.books.get_mut(asset) else {
            return false;
        };
        if book.by_session.get(session_id) != Some(&target) {
            return false;
        }
        book.remove(session_id).is_some()
    }

    /// Delete every alert held by `session_id`; returns how many were removed
    pub fn remove_session(&self, session_id: &SessionId) -> usize {
        let mut removed = 0;
        for mut book in self.books.iter_mut() {
            if book.remove(session_id).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("Removed {} alert(s) for {}", removed, session_id);
        }
        removed
    }

    /// Current target of `session_id` on `asset`
    pub fn target_of(&self, asset: &Asset, session_id: &SessionId) -> Option<Decimal> {
        self.books
            .get(asset)
            .and_then(|book| book.by_session.get(session_id).copied())
    }

    /// Number of pending alerts on `asset`
    pub fn len(&self, asset: &Asset) -> usize {
        self.books.get(asset).map(|book| book.len()).unwrap_or(0)
    }

    /// Number of pending alerts across all assets
    pub fn total(&self) -> usize {
        self.books.iter().map(|book| book.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Pending alert count per asset (assets with no alerts are omitted)
    pub fn counts(&self) -> BTreeMap<Asset, usize> {
        self.books
            .iter()
            .filter(|book| book.len() > 0)
            .map(|book| (book.key().clone(), book.len()))
            .collect()
    }
}
