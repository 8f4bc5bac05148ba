//! Bomb lifecycle state machine.
//!
//! ```text
//!            activate()                 tick() past expiry
//!   Idle ───────────────▶ Active ─────────────────────────▶ Exploding
//!    ▲                    │  ▲  pass() keeps the fuse          │
//!    │                    │  └──────── reassign() ─────────────┤
//!    └──── disarm() ──────┴──────────── disarm() ──────────────┘
//! ```
//!
//! Two invariants hold after every public call:
//!
//! 1. If the bomb is `Active`, its owner was alive in the roster when the
//!    owner was last set. Owner removal must go through [`BombState::disarm`].
//! 2. At most one [`Explosion`] is reported per activation cycle. The fuse
//!    is a [`Deadline`] whose poll is edge-triggered, and once the phase is
//!    `Exploding` further ticks are no-ops until the next activation.

use std::time::{Duration, Instant};

use fusebox_protocol::{BombPhase, BombView, ParticipantId};
use fusebox_roster::SessionRoster;
use fusebox_tick::Deadline;
use rand::Rng;

use crate::{BombError, FuseConfig};

/// Reported once when a fuse runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Explosion {
    /// Who was holding the bomb.
    pub owner: ParticipantId,
    /// The activation cycle that ended.
    pub cycle: u64,
}

#[derive(Debug, Clone)]
pub struct BombState {
    owner: Option<ParticipantId>,
    phase: BombPhase,
    fuse: Option<Deadline>,
    /// Set on the explosion edge, cleared by the next activation.
    exploded: bool,
    cycle: u64,
    config: FuseConfig,
}

impl BombState {
    pub fn new(config: FuseConfig) -> Self {
        Self {
            owner: None,
            phase: BombPhase::Idle,
            fuse: None,
            exploded: false,
            cycle: 0,
            config: config.validated(),
        }
    }

    /// Hands an idle (or just-exploded) bomb to `owner` and lights a fresh
    /// fuse drawn from the configured range.
    ///
    /// Returns the drawn fuse length.
    ///
    /// # Errors
    /// - [`BombError::InvalidPhase`] if the bomb is already `Active`
    /// - [`BombError::InvalidTarget`] if `owner` is not alive
    pub fn activate<R: Rng + ?Sized>(
        &mut self,
        owner: ParticipantId,
        roster: &SessionRoster,
        now: Instant,
        rng: &mut R,
    ) -> Result<Duration, BombError> {
        if self.phase == BombPhase::Active {
            return Err(self.invalid("activate"));
        }
        self.arm(owner, roster, now, rng)
    }

    /// Moves the bomb from its holder to `target`. The fuse keeps running.
    ///
    /// # Errors
    /// - [`BombError::InvalidPhase`] unless `Active`
    /// - [`BombError::NotOwner`] if `requester` is not the holder
    /// - [`BombError::InvalidTarget`] if `target` is the holder or not alive
    pub fn pass(
        &mut self,
        requester: ParticipantId,
        target: ParticipantId,
        roster: &SessionRoster,
    ) -> Result<(), BombError> {
        if self.phase != BombPhase::Active {
            return Err(self.invalid("pass"));
        }
        if self.owner != Some(requester) {
            return Err(BombError::NotOwner { requester });
        }
        if target == requester || !roster.is_alive(target) {
            return Err(BombError::InvalidTarget(target));
        }

        self.owner = Some(target);
        tracing::debug!(from = %requester, to = %target, cycle = self.cycle, "bomb passed");
        Ok(())
    }

    /// Polls the fuse. Returns the explosion on the one step where it
    /// first becomes due, `None` on every other call.
    pub fn tick(&mut self, now: Instant) -> Option<Explosion> {
        match self.phase {
            BombPhase::Active => {}
            BombPhase::Exploding => {
                tracing::trace!(cycle = self.cycle, "explosion already processed");
                return None;
            }
            BombPhase::Idle => return None,
        }

        let fired = self.fuse.as_mut().is_some_and(|fuse| fuse.poll(now));
        if !fired {
            return None;
        }

        // Active always has an owner; `arm` is the only way in.
        let owner = self.owner?;
        self.phase = BombPhase::Exploding;
        self.exploded = true;
        tracing::info!(%owner, cycle = self.cycle, "bomb exploded");
        Some(Explosion {
            owner,
            cycle: self.cycle,
        })
    }

    /// Gives the bomb to `new_owner` with a fresh fuse, cancelling whatever
    /// countdown was running. Valid while `Active` or `Exploding`.
    ///
    /// # Errors
    /// - [`BombError::InvalidPhase`] if `Idle` (use [`activate`](Self::activate))
    /// - [`BombError::InvalidTarget`] if `new_owner` is not alive
    pub fn reassign<R: Rng + ?Sized>(
        &mut self,
        new_owner: ParticipantId,
        roster: &SessionRoster,
        now: Instant,
        rng: &mut R,
    ) -> Result<Duration, BombError> {
        if self.phase == BombPhase::Idle {
            return Err(self.invalid("reassign"));
        }
        self.arm(new_owner, roster, now, rng)
    }

    /// Drops the bomb back to `Idle` with no owner and no fuse. Used when
    /// the holder leaves mid-countdown and when the match ends.
    ///
    /// Returns the previous holder, if any. The `exploded` flag is left
    /// as-is so a final snapshot still shows the last explosion.
    pub fn disarm(&mut self) -> Option<ParticipantId> {
        let previous = self.owner.take();
        self.phase = BombPhase::Idle;
        self.fuse = None;
        if let Some(owner) = previous {
            tracing::debug!(%owner, cycle = self.cycle, "bomb disarmed");
        }
        previous
    }

    fn arm<R: Rng + ?Sized>(
        &mut self,
        owner: ParticipantId,
        roster: &SessionRoster,
        now: Instant,
        rng: &mut R,
    ) -> Result<Duration, BombError> {
        if !roster.is_alive(owner) {
            return Err(BombError::InvalidTarget(owner));
        }

        let duration = self.config.draw(rng);
        self.owner = Some(owner);
        self.phase = BombPhase::Active;
        self.fuse = Some(Deadline::after(now, duration));
        self.exploded = false;
        self.cycle += 1;

        tracing::info!(
            %owner,
            cycle = self.cycle,
            fuse_ms = duration.as_millis() as u64,
            "bomb armed"
        );
        Ok(duration)
    }

    fn invalid(&self, action: &'static str) -> BombError {
        BombError::InvalidPhase {
            action,
            phase: self.phase,
        }
    }

    pub fn owner(&self) -> Option<ParticipantId> {
        self.owner
    }

    pub fn phase(&self) -> BombPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == BombPhase::Active
    }

    pub fn has_exploded(&self) -> bool {
        self.exploded
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Absolute expiry of the running fuse.
    pub fn expiry(&self) -> Option<Instant> {
        self.fuse.map(|f| f.at())
    }

    pub fn config(&self) -> &FuseConfig {
        &self.config
    }

    pub fn view(&self, now: Instant) -> BombView {
        BombView {
            owner: self.owner,
            phase: self.phase,
            remaining: if self.is_active() {
                self.fuse.map(|f| f.remaining(now))
            } else {
                None
            },
            cycle: self.cycle,
            exploded: self.exploded,
        }
    }
}

impl Default for BombState {
    fn default() -> Self {
        Self::new(FuseConfig::default())
    }
}
