//! Price polling worker
//!
//! The producer side of the pipeline. On every tick it fetches prices,
//! records them in the history, fires met alerts and broadcasts the tick.
//! It never talks to clients; everything leaves through the bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use pricewatch_core::{Asset, BroadcastEvent};
use pricewatch_feed::{FeedError, PriceFeed};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::alert_registry::AlertRegistry;
use crate::history::HistoryStore;
use crate::matcher::{AlertMatcher, MatchReport};
use crate::publisher::Publisher;

/// Default polling interval, chosen to stay under public API rate limits
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Missed successful cycles before the worker reports itself stale
const STALE_AFTER_INTERVALS: u32 = 6;

/// What happened in one fetch cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Prices fetched, recorded, matched and broadcast
    Completed { alerts: MatchReport },
    /// Upstream rate limited us; nothing was touched
    RateLimited,
    /// Fetch failed; nothing was touched
    Failed(String),
    /// Another cycle was still running
    Skipped,
}

/// Configuration for the PriceWorker
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub assets: Vec<Asset>,
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            assets: vec![Asset::new("bitcoin"), Asset::new("ethereum")],
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Worker health, as reported by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct WorkerHealth {
    pub cycles_completed: u64,
    pub cycles_rate_limited: u64,
    pub cycles_failed: u64,
    pub alerts_fired: u64,
    pub last_success_time: Option<DateTime<Utc>>,
    pub is_stale: bool,
}

/// Cycle counters (atomic for thread-safe access)
#[derive(Debug, Default)]
struct WorkerMetrics {
    cycles_completed: AtomicU64,
    cycles_rate_limited: AtomicU64,
    cycles_failed: AtomicU64,
    alerts_fired: AtomicU64,
    last_success_epoch_ms: AtomicU64,
}

impl WorkerMetrics {
    fn record_success(&self, alerts_fired: usize) {
        self.cycles_completed.fetch_add(1, Ordering::SeqCst);
        self.alerts_fired
            .fetch_add(alerts_fired as u64, Ordering::SeqCst);
        self.last_success_epoch_ms
            .store(now_epoch_ms(), Ordering::SeqCst);
    }

    fn health(&self, poll_interval: Duration) -> WorkerHealth {
        let last_ms = self.last_success_epoch_ms.load(Ordering::SeqCst);
        let last_success_time = if last_ms > 0 {
            DateTime::from_timestamp_millis(last_ms as i64)
        } else {
            None
        };

        let stale_after = poll_interval
            .checked_mul(STALE_AFTER_INTERVALS)
            .unwrap_or(Duration::MAX);
        let stale_after_ms = u64::try_from(stale_after.as_millis()).unwrap_or(u64::MAX);
        let is_stale = last_ms == 0 || now_epoch_ms().saturating_sub(last_ms) > stale_after_ms;

        WorkerHealth {
            cycles_completed: self.cycles_completed.load(Ordering::SeqCst),
            cycles_rate_limited: self.cycles_rate_limited.load(Ordering::SeqCst),
            cycles_failed: self.cycles_failed.load(Ordering::SeqCst),
            alerts_fired: self.alerts_fired.load(Ordering::SeqCst),
            last_success_time,
            is_stale,
        }
    }
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Polls the price feed and drives history, matching and publishing
pub struct PriceWorker {
    config: WorkerConfig,
    feed: Arc<dyn PriceFeed>,
    history: Arc<HistoryStore>,
    registry: Arc<AlertRegistry>,
    matcher: AlertMatcher,
    publisher: Publisher,
    metrics: WorkerMetrics,
    /// Held for the duration of a cycle so cycles never overlap
    cycle_guard: Mutex<()>,
}

impl PriceWorker {
    pub fn new(
        config: WorkerConfig,
        feed: Arc<dyn PriceFeed>,
        history: Arc<HistoryStore>,
        registry: Arc<AlertRegistry>,
        matcher: AlertMatcher,
        publisher: Publisher,
    ) -> Self {
        Self {
            config,
            feed,
            history,
            registry,
            matcher,
            publisher,
            metrics: WorkerMetrics::default(),
            cycle_guard: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run one fetch cycle.
    ///
    /// On success the snapshot is appended to the history, met alerts are
    /// fired and the tick is broadcast, in that order. Rate limiting and
    /// fetch failures skip the cycle without touching any state.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            warn!("Previous fetch cycle still running, skipping this tick");
            return CycleOutcome::Skipped;
        };

        debug!("Fetching prices for {} asset(s)", self.config.assets.len());

        let snapshot = match self.feed.fetch_prices(&self.config.assets).await {
            Ok(snapshot) => snapshot,
            Err(FeedError::RateLimited) => {
                warn!("Upstream rate limited, skipping this cycle to cool down");
                self.metrics
                    .cycles_rate_limited
                    .fetch_add(1, Ordering::SeqCst);
                return CycleOutcome::RateLimited;
            }
            Err(e) => {
                error!("Price fetch failed: {}", e);
                self.metrics.cycles_failed.fetch_add(1, Ordering::SeqCst);
                return CycleOutcome::Failed(e.to_string());
            }
        };

        info!(
            "Prices: {}",
            snapshot
                .prices
                .iter()
                .map(|(asset, price)| format!("{}=${}", asset, price))
                .collect::<Vec<_>>()
                .join(" | ")
        );

        self.history.append(snapshot.clone());

        let alerts = self
            .matcher
            .run(&self.registry, &self.publisher, &snapshot)
            .await;

        if let Err(e) = self
            .publisher
            .publish_prices(&BroadcastEvent::from(&snapshot))
            .await
        {
            warn!("Failed to publish price tick: {}", e);
        }

        self.metrics.record_success(alerts.fired);
        CycleOutcome::Completed { alerts }
    }

    /// Poll forever at the configured interval.
    ///
    /// Ticks that fall due while a cycle is still running are skipped
    /// rather than queued.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Worker started. Polling every {:?} for {}",
            self.config.poll_interval,
            self.config
                .assets
                .iter()
                .map(|a| a.as_str())
                .collect::<Vec<_>>()
                .join(",")
        );

        loop {
            interval.tick().await;
            self.run_cycle().await;
        }
    }

    /// Spawn [`run`](Self::run) on the runtime
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub fn health(&self) -> WorkerHealth {
        self.metrics.health(self.config.poll_interval)
    }
}

impl std::fmt::Debug for PriceWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceWorker")
            .field("config", &self.config)
            .field("matcher", &self.matcher)
            .finish()
    }
}
