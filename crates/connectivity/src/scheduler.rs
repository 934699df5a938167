//! Drift-corrected probe scheduling loop.
//!
//! The loop keeps a nominal "next launch" instant and advances it by exactly
//! one cadence from the previous target after every launch, so late wake-ups
//! never push back later launches. While far from the target it sleeps in
//! bounded slices (keeping stop requests responsive); within the precision
//! threshold it spins until the target is reached.
//!
//! Launches are fire-and-forget. With no in-flight cap, probes slower than
//! the cadence pile up and run concurrently without bound.

use async_trait::async_trait;
use common::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default spin threshold before a launch.
pub const DEFAULT_PRECISION: Duration = Duration::from_millis(10);

/// Default longest single sleep.
pub const DEFAULT_MAX_SLEEP: Duration = Duration::from_millis(50);

/// Time source used by the scheduler.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// Suspend for roughly `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// One scheduled probe launch.
#[derive(Debug)]
pub struct Launch {
    /// Zero-based launch index
    pub tick: u64,
    /// Nominal launch instant, `start + tick * cadence`
    pub target: Instant,
    /// How far past the target the launch actually happened
    pub lateness: Duration,
    /// In-flight slot, held until the probe finishes when a cap is configured
    pub permit: Option<OwnedSemaphorePermit>,
}

/// Starts a probe for each launch without blocking the loop.
pub trait Launcher: Send + Sync {
    fn launch(&self, launch: Launch);

    /// Called instead of `launch` when the in-flight cap is reached.
    fn skipped(&self, _tick: u64) {}
}

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Scheduler timing configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Nominal spacing between launches
    pub cadence: Duration,

    /// Remaining time below which the loop spins instead of sleeping
    pub precision: Duration,

    /// Longest single sleep, bounding stop latency
    pub max_sleep: Duration,

    /// Optional cap on concurrently running probes
    pub max_in_flight: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cadence: crate::types::DEFAULT_CADENCE,
            precision: DEFAULT_PRECISION,
            max_sleep: DEFAULT_MAX_SLEEP,
            max_in_flight: None,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cadence.is_zero() {
            return Err(Error::config("cadence must be strictly positive"));
        }
        if self.max_sleep.is_zero() {
            return Err(Error::config("maximum sleep slice must be strictly positive"));
        }
        if self.max_in_flight == Some(0) {
            return Err(Error::config("max_in_flight must be at least 1"));
        }
        Ok(())
    }
}

/// Counts for one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub launched: u64,
    pub skipped: u64,
}

/// Drift-corrected launch loop
pub struct Scheduler {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    state: Arc<RwLock<SchedulerState>>,
    in_flight: Option<Arc<Semaphore>>,
}

impl Scheduler {
    /// Create a scheduler on the system clock.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a scheduler on a custom clock.
    pub fn with_clock(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let in_flight = config.max_in_flight.map(|cap| Arc::new(Semaphore::new(cap)));

        Ok(Self {
            config,
            clock,
            state: Arc::new(RwLock::new(SchedulerState::Idle)),
            in_flight,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Current lifecycle state
    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    async fn set_state(&self, state: SchedulerState) {
        *self.state.write().await = state;
    }

    /// Run until `cancel` fires. Returns without waiting for in-flight probes.
    pub async fn run(&self, launcher: &dyn Launcher, cancel: CancellationToken) -> RunSummary {
        self.set_state(SchedulerState::Running).await;
        info!(
            cadence_ms = self.config.cadence.as_millis() as u64,
            max_in_flight = ?self.config.max_in_flight,
            "Scheduler running"
        );

        let mut summary = RunSummary::default();
        let mut next_launch = self.clock.now();
        let mut tick: u64 = 0;

        while !cancel.is_cancelled() {
            let remaining = next_launch.saturating_duration_since(self.clock.now());

            if remaining > self.config.precision {
                let slice = (remaining - self.config.precision).min(self.config.max_sleep);
                self.clock.sleep(slice).await;
                continue;
            }

            // Holds this worker for at most `precision`. `block_in_place` would
            // panic on a current-thread runtime, so the spin stays inline.
            while self.clock.now() < next_launch {
                std::hint::spin_loop();
            }

            let lateness = self.clock.now().saturating_duration_since(next_launch);
            if lateness > self.config.cadence {
                warn!(tick, lateness_ms = lateness.as_millis() as u64, "Launch is more than one cadence late");
            }

            if self.dispatch(launcher, tick, next_launch, lateness) {
                summary.launched += 1;
            } else {
                summary.skipped += 1;
            }

            tick += 1;
            next_launch += self.config.cadence;
        }

        self.set_state(SchedulerState::Stopping).await;
        info!(
            launched = summary.launched,
            skipped = summary.skipped,
            "Scheduler stopping, in-flight probes finish in the background"
        );
        self.set_state(SchedulerState::Stopped).await;

        summary
    }

    fn dispatch(&self, launcher: &dyn Launcher, tick: u64, target: Instant, lateness: Duration) -> bool {
        let permit = match &self.in_flight {
            Some(semaphore) => match semaphore.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    warn!(tick, "In-flight probe limit reached, skipping launch");
                    launcher.skipped(tick);
                    return false;
                }
            },
            None => None,
        };

        debug!(tick, lateness_us = lateness.as_micros() as u64, "Launching probe");
        launcher.launch(Launch {
            tick,
            target,
            lateness,
            permit,
        });
        true
    }
}
