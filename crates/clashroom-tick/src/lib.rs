//! Fixed-interval tick scheduler for Clashroom simulations.
//!
//! A room owns at most one [`TickScheduler`], created when its simulation
//! starts and dropped when the simulation stops. Dropping the scheduler is
//! the cancellation: nothing else holds its deadline, so no tick can fire
//! afterwards.
//!
//! The scheduler sits in the room actor's `tokio::select!` loop as an
//! optional branch:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         info = next_tick(&mut ticker), if ticker.is_some() => {
//!             session.tick();
//!             if let Some(t) = ticker.as_mut() { t.record_tick_end(); }
//!         }
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the loop wakes up later than its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickPolicy {
    /// Count the missed ticks as skipped and schedule the next one a full
    /// interval from now.
    #[default]
    Skip,
    /// Keep the original cadence. The next tick fires at its planned time,
    /// which may already have passed.
    Drop,
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. Default: 20 ms.
    pub interval: Duration,
    /// Overrun handling.
    pub policy: TickPolicy,
    /// Fraction of the interval (0.0–1.0) above which a slow tick is logged.
    pub budget_warn_threshold: f64,
    /// Upper bound of the random delay added before the first tick, so rooms
    /// started together don't tick in lockstep.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.80,
            initial_jitter: Duration::ZERO,
        }
    }
}

impl TickConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(20);

    /// Shortest interval the scheduler will run at.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// Config ticking every `interval`, other fields default.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values. Called by [`TickScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_us = self.interval.as_micros() as u64,
                "tick interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        if !self.budget_warn_threshold.is_finite() {
            self.budget_warn_threshold = 0.80;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// The configured interval. Simulations step by a fixed amount and
    /// don't scale with it, but it is reported for logging.
    pub dt: Duration,
    /// The tick fired more than 10% of an interval late.
    pub overrun: bool,
    /// Whole intervals missed before this tick (Skip policy only).
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters kept by the scheduler.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Slowest tick reported through [`TickScheduler::record_tick_end`].
    pub max_tick_time: Duration,
    /// Work time of the last recorded tick divided by the interval.
    pub budget_utilization: f64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Produces one tick per interval for a single running simulation.
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    next_tick: TokioInstant,
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Create a scheduler whose first tick is one interval (plus jitter)
    /// from now.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();

        let jitter = if config.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max_us = config.initial_jitter.as_micros() as u64;
            Duration::from_micros(rand::rng().random_range(0..=max_us))
        };
        let next_tick = TokioInstant::now() + config.interval + jitter;

        debug!(
            interval_ms = config.interval.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "tick scheduler created"
        );

        Self {
            config,
            tick_count: 0,
            next_tick,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    /// Scheduler ticking every `interval` with default settings.
    pub fn every(interval: Duration) -> Self {
        Self::new(TickConfig::every(interval))
    }

    /// Wait until the next tick is due.
    ///
    /// Cancel-safe: if the future is dropped inside `select!` before the
    /// deadline, the same deadline is awaited on the next call.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let deadline = self.next_tick;
        let interval = self.config.interval;

        time::sleep_until(deadline).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(deadline);
        let overrun = late_by > interval / 10;
        let mut ticks_skipped = 0u64;

        self.next_tick = match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    ticks_skipped = (late_by.as_nanos() / interval.as_nanos()) as u64;
                    if ticks_skipped > 0 {
                        warn!(
                            tick = self.tick_count,
                            skipped = ticks_skipped,
                            late_ms = late_by.as_secs_f64() * 1000.0,
                            "tick overrun, skipping ahead"
                        );
                    }
                }
                now + interval
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun, keeping cadence"
                    );
                }
                deadline + interval
            }
        };

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: interval,
            overrun,
            ticks_skipped,
        }
    }

    /// Mark the end of the work done for the current tick.
    ///
    /// Without a preceding [`wait_for_tick`](Self::wait_for_tick) this does
    /// nothing.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let utilization = elapsed.as_secs_f64() / self.config.interval.as_secs_f64();
        self.metrics.budget_utilization = utilization;
        if elapsed > self.metrics.max_tick_time {
            self.metrics.max_tick_time = elapsed;
        }

        if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.config.interval.as_secs_f64() * 1000.0,
                "tick approaching budget limit"
            );
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn policy(&self) -> TickPolicy {
        self.config.policy
    }
}
