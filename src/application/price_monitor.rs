//! Scheduled observation cycles: fetch, detect, notify, persist

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

use crate::application::retry::RetryPolicy;
use crate::domain::notify::{format_alert, Notifier};
use crate::domain::price::{ChangeDetector, PriceDiff, PriceSnapshot, PriceSource, PriceStore};
use crate::shared::config::MonitorConfig;
use crate::shared::errors::CycleError;

/// What the monitor needs to know to run cycles
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub resource_id: String,
    pub destination: String,
    pub check_interval: Duration,
    pub source_retry: RetryPolicy,
    pub notify_retry: RetryPolicy,
}

impl MonitorSettings {
    pub fn from_config(config: &MonitorConfig, destination: impl Into<String>) -> Self {
        let max_delay = Duration::from_secs(config.retry.max_retry_delay_secs);
        Self {
            resource_id: config.resource_id.clone(),
            destination: destination.into(),
            check_interval: config.check_interval(),
            source_retry: RetryPolicy::new(
                config.retry.source_max_attempts,
                Duration::from_secs(config.retry.source_retry_delay_secs),
            )
            .with_max_delay(max_delay),
            notify_retry: RetryPolicy::new(
                config.retry.notify_max_attempts,
                Duration::from_secs(config.retry.notify_retry_delay_secs),
            )
            .with_max_delay(max_delay),
        }
    }
}

/// Cycle stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Detecting,
    Notifying,
    Persisting,
    Failed,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Idle => "idle",
            CycleState::Fetching => "fetching",
            CycleState::Detecting => "detecting",
            CycleState::Notifying => "notifying",
            CycleState::Persisting => "persisting",
            CycleState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a completed cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// First observation recorded, nothing sent
    Baseline(PriceSnapshot),
    /// Prices match the stored state, nothing sent or written
    Unchanged,
    /// Alert delivered and new state stored
    Notified(PriceDiff),
}

/// Counters over the lifetime of a monitor
#[derive(Debug, Clone)]
pub struct MonitorStats {
    pub start_time: Instant,
    pub cycles: u64,
    pub baselines: u64,
    pub unchanged: u64,
    pub alerts_sent: u64,
    pub failed: u64,
}

impl MonitorStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            baselines: 0,
            unchanged: 0,
            alerts_sent: 0,
            failed: 0,
        }
    }

    pub fn get_uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    fn record(&mut self, result: &Result<CycleOutcome, CycleError>) {
        match result {
            Ok(CycleOutcome::Baseline(_)) => self.baselines += 1,
            Ok(CycleOutcome::Unchanged) => self.unchanged += 1,
            Ok(CycleOutcome::Notified(_)) => self.alerts_sent += 1,
            Err(_) => self.failed += 1,
        }
    }
}

impl Default for MonitorStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives one resource through fixed-rate cycles. Cycles never overlap and a
/// failed cycle never stops the loop.
pub struct PriceMonitor {
    settings: MonitorSettings,
    source: Arc<dyn PriceSource>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn PriceStore>,
    detector: ChangeDetector,
    stats: MonitorStats,
}

impl PriceMonitor {
    pub fn new(
        settings: MonitorSettings,
        source: Arc<dyn PriceSource>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn PriceStore>,
    ) -> Self {
        Self {
            settings,
            source,
            notifier,
            store,
            detector: ChangeDetector::new(),
            stats: MonitorStats::new(),
        }
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Run cycles until `shutdown` turns true or its sender is dropped.
    /// The signal is only honoured between cycles.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting price monitor for {}", self.settings.resource_id);
        info!("Check interval: {} seconds", self.settings.check_interval.as_secs());
        match self.store.load(&self.settings.resource_id).await {
            Ok(Some(snapshot)) => info!("Last known prices: {}", snapshot),
            Ok(None) => info!("No stored prices yet, first check records the baseline"),
            Err(e) => warn!("Stored prices unreadable: {}", e),
        }

        let period = self.settings.check_interval;
        let mut next_tick = Instant::now();

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = tokio::time::sleep_until(next_tick) => {}
            }

            let _ = self.run_cycle().await;

            let scheduled = next_tick + period;
            next_tick = next_tick_after(next_tick, period, Instant::now());
            if next_tick > scheduled {
                warn!(
                    "Cycle overran the {}s interval, next check at the following tick",
                    period.as_secs()
                );
            }
        }

        info!(
            "Price monitor stopped after {} cycles ({} alerts, {} failed, uptime {:?})",
            self.stats.cycles,
            self.stats.alerts_sent,
            self.stats.failed,
            self.stats.get_uptime()
        );
    }

    /// One fetch → detect → notify → persist pass. Errors are logged here;
    /// the result is returned for callers that want the outcome.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, CycleError> {
        self.stats.cycles += 1;
        let span = info_span!(
            "cycle",
            cycle = self.stats.cycles,
            resource = %self.settings.resource_id
        );

        let result = self.cycle_inner().instrument(span.clone()).await;

        span.in_scope(|| {
            match &result {
                Ok(CycleOutcome::Baseline(snapshot)) => info!("Baseline recorded: {}", snapshot),
                Ok(CycleOutcome::Unchanged) => info!("No price changes detected"),
                Ok(CycleOutcome::Notified(diff)) => {
                    info!("Notification sent, {} field(s) changed", diff.changed_fields().count())
                }
                Err(e) => {
                    error!(stage = e.stage(), attempts = e.attempts(), "Cycle failed: {}", e);
                    info!("→ {}", CycleState::Failed);
                }
            }
            info!("→ {}", CycleState::Idle);
        });
        self.stats.record(&result);

        result
    }

    async fn cycle_inner(&self) -> Result<CycleOutcome, CycleError> {
        let resource_id = self.settings.resource_id.as_str();

        info!("→ {}", CycleState::Fetching);
        let source: &dyn PriceSource = self.source.as_ref();
        let current = self
            .settings
            .source_retry
            .execute("price fetch", move || source.fetch(resource_id))
            .await?;

        info!("→ {}", CycleState::Detecting);
        let previous = self.store.load(resource_id).await.map_err(CycleError::Load)?;

        let Some(previous) = previous else {
            self.persist(&current).await?;
            return Ok(CycleOutcome::Baseline(current));
        };

        let Some(diff) = self.detector.compare(Some(&previous), &current) else {
            return Ok(CycleOutcome::Unchanged);
        };

        info!("Price change detected! Old: {} | New: {}", previous, current);

        // State only advances after delivery so an undelivered change is
        // detected again next cycle.
        info!("→ {}", CycleState::Notifying);
        let message = format_alert(&diff);
        let notifier: &dyn Notifier = self.notifier.as_ref();
        let destination = self.settings.destination.as_str();
        let message_ref = message.as_str();
        self.settings
            .notify_retry
            .execute("notification", move || notifier.send(destination, message_ref))
            .await?;

        self.persist(&current).await?;
        Ok(CycleOutcome::Notified(diff))
    }

    async fn persist(&self, snapshot: &PriceSnapshot) -> Result<(), CycleError> {
        info!("→ {}", CycleState::Persisting);
        self.store.save(snapshot).await.map_err(CycleError::Persist)
    }
}

/// First tick of the fixed-rate schedule `scheduled + k * period` that lies
/// at or after `now`. Ticks that passed while a cycle ran are dropped.
pub fn next_tick_after(scheduled: Instant, period: Duration, now: Instant) -> Instant {
    let next = scheduled + period;
    if next >= now || period.is_zero() {
        return next;
    }
    let behind = (now - next).as_nanos() / period.as_nanos();
    let skipped = u32::try_from(behind + 1).unwrap_or(u32::MAX);
    next + period.saturating_mul(skipped)
}
