//! Bounded price history
//!
//! Keeps the most recent snapshots, newest first, so clients that connect
//! late can be shown the recent trend.

use parking_lot::RwLock;
use pricewatch_core::PriceSnapshot;
use std::collections::VecDeque;

/// Snapshots retained when no capacity is configured
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Capped, most-recent-first sequence of price snapshots.
///
/// Truncation is unconditional: once more than `capacity` snapshots have
/// been appended the oldest are gone for good.
#[derive(Debug)]
pub struct HistoryStore {
    entries: RwLock<VecDeque<PriceSnapshot>>,
    capacity: usize,
}

impl HistoryStore {
    /// Create a store holding at most `capacity` snapshots (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Insert at the head and drop anything beyond capacity
    pub fn append(&self, snapshot: PriceSnapshot) {
        let mut entries = self.entries.write();
        entries.push_front(snapshot);
        entries.truncate(self.capacity);
    }

    /// Most recent snapshot, if any
    pub fn latest(&self) -> Option<PriceSnapshot> {
        self.entries.read().front().cloned()
    }

    /// Up to `limit` snapshots, newest first
    pub fn recent(&self, limit: usize) -> Vec<PriceSnapshot> {
        self.entries.read().iter().take(limit).cloned().collect()
    }

    /// Every retained snapshot, newest first
    pub fn all(&self) -> Vec<PriceSnapshot> {
        self.entries.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pricewatch_core::Asset;
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;

    fn snapshot(seq: i64) -> PriceSnapshot {
        let mut prices = BTreeMap::new();
        prices.insert(Asset::new("bitcoin"), Decimal::from(seq));
        PriceSnapshot::new(prices, Utc.timestamp_opt(1_700_000_000 + seq, 0).unwrap())
    }

    #[test]
    fn test_append_keeps_newest_first() {
        let store = HistoryStore::new(5);
        for seq in 0..3 {
            store.append(snapshot(seq));
        }

        let all = store.all();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], snapshot(2));
        assert_eq!(all[2], snapshot(0));
        assert_eq!(store.latest(), Some(snapshot(2)));
    }

    #[test]
    fn test_overflow_keeps_last_n_in_reverse_order() {
        let capacity = DEFAULT_HISTORY_CAPACITY;
        let store = HistoryStore::new(capacity);
        let extra = 17;

        for seq in 0..(capacity + extra) as i64 {
            store.append(snapshot(seq));
        }

        assert_eq!(store.len(), capacity);
        let expected: Vec<PriceSnapshot> = (extra as i64..(capacity + extra) as i64)
            .rev()
            .map(snapshot)
            .collect();
        assert_eq!(store.all(), expected);
    }

    #[test]
    fn test_under_capacity_keeps_everything() {
        let store = HistoryStore::new(10);
        for seq in 0..4 {
            store.append(snapshot(seq));
        }
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_recent_limit() {
        let store = HistoryStore::new(10);
        for seq in 0..6 {
            store.append(snapshot(seq));
        }

        let recent = store.recent(2);
        assert_eq!(recent, vec![snapshot(5), snapshot(4)]);
        assert_eq!(store.recent(100).len(), 6);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let store = HistoryStore::new(0);
        store.append(snapshot(1));
        store.append(snapshot(2));
        assert_eq!(store.capacity(), 1);
        assert_eq!(store.all(), vec![snapshot(2)]);
    }
}
