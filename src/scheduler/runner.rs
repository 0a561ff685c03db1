//! Birthday sweep background loop.
//!
//! Spawns a tokio task that runs [`run_sweep`] once per configured interval.
//! The same sweeper serves the manual trigger. At most one sweep is ever in
//! flight: the ledger mutex doubles as the in-flight guard, so a periodic
//! tick that finds it held is skipped, while a manual trigger waits for it.

use crate::birthday::BirthdayStore;
use crate::celebration::CelebrationNotifier;
use crate::config::SweepConfig;
use crate::error::Result;
use crate::scheduler::sweep::{RunLedger, SweepReport, run_sweep};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Lifecycle of the sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    /// Not scheduled and not scanning.
    Idle,
    /// Waiting for the next tick.
    Waiting,
    /// A sweep is running.
    Scanning,
}

/// Periodic and on-demand birthday sweeps.
pub struct BirthdaySweeper {
    store: Arc<BirthdayStore>,
    notifier: CelebrationNotifier,
    ledger: tokio::sync::Mutex<RunLedger>,
    state: Mutex<SweepState>,
    clock: Clock,
    interval: Duration,
    run_on_start: bool,
}

impl BirthdaySweeper {
    pub fn new(
        store: Arc<BirthdayStore>,
        notifier: CelebrationNotifier,
        config: &SweepConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            ledger: tokio::sync::Mutex::new(RunLedger::new()),
            state: Mutex::new(SweepState::Idle),
            clock: Arc::new(Utc::now),
            interval: config.interval(),
            run_on_start: config.run_on_start,
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> SweepState {
        self.state.lock().map(|s| *s).unwrap_or(SweepState::Idle)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a sweep now, waiting for any sweep already in flight to finish
    /// first. Returns the report to the caller.
    ///
    /// # Errors
    /// Returns an error when the store cannot be read.
    pub async fn trigger_now(&self) -> Result<SweepReport> {
        let mut ledger = self.ledger.lock().await;
        self.scan(&mut ledger).await
    }

    /// Run a sweep unless one is already in flight.
    ///
    /// Returns `None` when the tick was skipped.
    pub async fn try_tick(&self) -> Option<Result<SweepReport>> {
        let Ok(mut ledger) = self.ledger.try_lock() else {
            debug!("birthday sweep still running, skipping tick");
            return None;
        };
        Some(self.scan(&mut ledger).await)
    }

    /// Start the periodic loop.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                "birthday sweeper started"
            );
            let start = if self.run_on_start {
                tokio::time::Instant::now()
            } else {
                tokio::time::Instant::now() + self.interval
            };
            let mut interval = tokio::time::interval_at(start, self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                self.set_state(SweepState::Waiting);
                interval.tick().await;
                if let Some(Err(e)) = self.try_tick().await {
                    error!("birthday sweep failed: {e}");
                }
            }
        })
    }

    async fn scan(&self, ledger: &mut RunLedger) -> Result<SweepReport> {
        let _scanning = StateGuard::enter(self);
        let now = (self.clock)();
        run_sweep(&self.store, &self.notifier, ledger, now.date_naive(), now).await
    }

    fn set_state(&self, state: SweepState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }
}

/// Marks the sweeper as scanning until dropped, then puts back the state it
/// replaced. A manual trigger between ticks leaves the loop `Waiting`.
struct StateGuard<'a> {
    sweeper: &'a BirthdaySweeper,
    previous: SweepState,
}

impl<'a> StateGuard<'a> {
    fn enter(sweeper: &'a BirthdaySweeper) -> Self {
        let previous = match sweeper.state() {
            // Scans are serialized by the ledger lock.
            SweepState::Scanning => SweepState::Idle,
            state => state,
        };
        sweeper.set_state(SweepState::Scanning);
        Self { sweeper, previous }
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.sweeper.set_state(self.previous);
    }
}
