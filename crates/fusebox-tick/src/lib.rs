//! Fixed-rate step scheduler and deadline timers for Fusebox.
//!
//! The authority does not react to time through callbacks. Instead it is
//! polled on a fixed-rate simulation step, and every timer (bomb fuse,
//! stun) is a [`Deadline`] that is checked on each step. Detection latency
//! is therefore bounded by the step interval, never zero.
//!
//! # Integration
//!
//! The scheduler sits inside the match actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* queue proposals */ }
//!         step = scheduler.wait_for_step() => {
//!             let out = controller.step(step.now);
//!         }
//!     }
//! }
//! ```

mod deadline;

pub use deadline::Deadline;

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the actor wakes up later than a step was due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Drop the missed steps and schedule the next one from now.
    #[default]
    Skip,
    /// Keep the original cadence for up to `max_catchup` missed steps,
    /// then fall back to `Skip`.
    CatchUp { max_catchup: u32 },
}

/// Configuration for the step scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Steps per second. Must be at least 1; the authority is always polled.
    pub step_rate_hz: u32,
    /// Overrun handling.
    pub policy: TickPolicy,
    /// Random jitter (0..max µs) added to the first step so that matches
    /// spawned together do not step in lockstep.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            step_rate_hz: 30,
            policy: TickPolicy::default(),
            initial_jitter_us: 2_000,
        }
    }
}

impl TickConfig {
    /// Maximum supported step rate.
    pub const MAX_STEP_RATE_HZ: u32 = 128;

    pub fn with_rate(step_rate_hz: u32) -> Self {
        Self {
            step_rate_hz,
            ..Default::default()
        }
    }

    /// Clamps `step_rate_hz` into `1..=MAX_STEP_RATE_HZ`.
    pub fn validated(mut self) -> Self {
        let clamped = self.step_rate_hz.clamp(1, Self::MAX_STEP_RATE_HZ);
        if clamped != self.step_rate_hz {
            warn!(
                rate = self.step_rate_hz,
                clamped,
                "step_rate_hz out of range, clamping"
            );
            self.step_rate_hz = clamped;
        }
        self
    }

    /// Duration of a single step.
    pub fn step_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.step_rate_hz.max(1) as f64)
    }
}

// ---------------------------------------------------------------------------
// Step info
// ---------------------------------------------------------------------------

/// Information about a step that just became due.
#[derive(Debug, Clone)]
pub struct StepInfo {
    /// Monotonically increasing step number, starting at 1.
    pub step: u64,
    /// Fixed step length.
    pub dt: Duration,
    /// The instant the step fired. Pass this to the controller as `now`.
    ///
    /// Derived from Tokio's clock, so it follows `tokio::time::pause()`
    /// and `advance()` in tests.
    pub now: Instant,
    /// `true` if the step fired more than 10% of `dt` late.
    pub overrun: bool,
    /// Steps dropped because of the overrun.
    pub steps_skipped: u64,
}

/// Counters kept across the scheduler's lifetime.
#[derive(Debug, Clone, Default)]
pub struct StepStats {
    pub total_steps: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-rate step scheduler. One per match actor.
pub struct TickScheduler {
    config: TickConfig,
    step_duration: Duration,
    step_count: u64,
    next_step: TokioInstant,
    paused: bool,
    stats: StepStats,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let step_duration = config.step_duration();

        let jitter = if config.initial_jitter_us > 0 {
            Duration::from_micros(
                rand::rng().random_range(0..config.initial_jitter_us),
            )
        } else {
            Duration::ZERO
        };

        debug!(
            rate_hz = config.step_rate_hz,
            step_ms = step_duration.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "step scheduler created"
        );

        Self {
            next_step: TokioInstant::now() + step_duration + jitter,
            config,
            step_duration,
            step_count: 0,
            paused: false,
            stats: StepStats::default(),
        }
    }

    pub fn with_rate(step_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(step_rate_hz))
    }

    /// Waits until the next step is due.
    ///
    /// While paused this future pends forever, so a surrounding
    /// `tokio::select!` keeps servicing its other branches.
    pub async fn wait_for_step(&mut self) -> StepInfo {
        if self.paused {
            std::future::pending::<()>().await;
        }

        let due = self.next_step;
        let dt = self.step_duration;
        time::sleep_until(due).await;

        let now = TokioInstant::now();
        self.step_count += 1;

        let late_by = now.saturating_duration_since(due);
        let overrun = late_by > dt / 10;
        let behind = (late_by.as_nanos() / dt.as_nanos()) as u64;
        let mut steps_skipped = 0;

        self.next_step = match self.config.policy {
            TickPolicy::Skip => {
                steps_skipped = behind;
                now + dt
            }
            TickPolicy::CatchUp { max_catchup } => {
                if behind <= u64::from(max_catchup) {
                    due + dt
                } else {
                    steps_skipped = behind - u64::from(max_catchup);
                    now + dt
                }
            }
        };

        if steps_skipped > 0 {
            warn!(
                step = self.step_count,
                skipped = steps_skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "step overrun, skipping ahead"
            );
        }
        if overrun {
            self.stats.total_overruns += 1;
        }
        self.stats.total_skipped += steps_skipped;
        self.stats.total_steps += 1;

        trace!(step = self.step_count, overrun, "step fired");

        StepInfo {
            step: self.step_count,
            dt,
            now: now.into_std(),
            overrun,
            steps_skipped,
        }
    }

    /// Stops stepping. Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(step = self.step_count, "step scheduler paused");
        }
    }

    /// Resumes stepping one full step from now, so no burst of catch-up
    /// steps follows a pause.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.next_step = TokioInstant::now() + self.step_duration;
            debug!(step = self.step_count, "step scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn step_rate_hz(&self) -> u32 {
        self.config.step_rate_hz
    }

    pub fn step_duration(&self) -> Duration {
        self.step_duration
    }

    pub fn stats(&self) -> &StepStats {
        &self.stats
    }
}
