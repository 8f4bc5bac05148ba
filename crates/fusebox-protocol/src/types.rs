//! Core types that cross the boundary between the authority and its
//! observers.
//!
//! Two directions travel "on the wire":
//!
//! - **Proposals** (participant → authority): a [`Command`] plus who sent it.
//!   Proposals are advisory; only the authority decides whether they commit.
//! - **Commits** (authority → observers): a [`Commit`] frame carrying the
//!   [`Event`] that happened and a full [`MatchSnapshot`] of the state after
//!   it happened.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a participant.
///
/// Newtype over `u64` so a `MatchId` can never be passed where a participant
/// is expected. `#[serde(transparent)]` keeps the JSON form a bare number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a match (one lobby → game-over lifetime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub u64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who a commit frame is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every participant and every read-only observer.
    All,

    /// One participant only (e.g. their own defeat notice).
    Participant(ParticipantId),

    /// Everyone except the given participant.
    AllExcept(ParticipantId),
}

impl Recipient {
    /// Returns `true` if a frame with this address should reach `id`.
    ///
    /// Observers that are not participants pass `None` and only receive
    /// broadcast frames.
    pub fn includes(&self, id: Option<ParticipantId>) -> bool {
        match (self, id) {
            (Self::All, _) => true,
            (Self::Participant(target), Some(id)) => *target == id,
            (Self::Participant(_), None) => false,
            (Self::AllExcept(excluded), Some(id)) => *excluded != id,
            (Self::AllExcept(_), None) => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Whether a participant is still in the running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Liveness {
    Alive,
    Eliminated,
}

/// Top-level match lifecycle.
///
/// ```text
/// Lobby → InProgress → GameOver
/// ```
///
/// `GameOver` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchPhase {
    #[default]
    Lobby,
    InProgress,
    GameOver,
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => write!(f, "Lobby"),
            Self::InProgress => write!(f, "InProgress"),
            Self::GameOver => write!(f, "GameOver"),
        }
    }
}

/// Bomb lifecycle.
///
/// ```text
/// Idle → Active → Exploding → Active (reassigned)
///                          ↘ Idle    (match over)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BombPhase {
    #[default]
    Idle,
    Active,
    Exploding,
}

impl fmt::Display for BombPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Active => write!(f, "Active"),
            Self::Exploding => write!(f, "Exploding"),
        }
    }
}

// ---------------------------------------------------------------------------
// Proposals (participant → authority)
// ---------------------------------------------------------------------------

/// A state change a participant asks the authority to commit.
///
/// `#[serde(tag = "type")]` produces `{ "type": "Pass", "target": 3 }`
/// rather than the externally tagged `{ "Pass": { "target": 3 } }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Start the match. Only the host's start is honored.
    Start,

    /// Hand the bomb to `target`. Only the current owner may pass.
    Pass { target: ParticipantId },

    /// Melee hit: stun `target` for the configured duration.
    Stun { target: ParticipantId },

    /// Remove `target` from the running. Accepted from the host (kick)
    /// or from the target itself (forfeit).
    Eliminate { target: ParticipantId },

    /// Leave the match entirely.
    Leave,
}

/// A command together with the participant who proposed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub from: ParticipantId,
    pub command: Command,
}

impl Proposal {
    pub fn new(from: ParticipantId, command: Command) -> Self {
        Self { from, command }
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Read-only view of one roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub id: ParticipantId,
    pub liveness: Liveness,
    /// `false` while inside the reconnection grace period.
    pub connected: bool,
    pub stunned: bool,
}

/// Read-only view of the bomb.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BombView {
    pub owner: Option<ParticipantId>,
    pub phase: BombPhase,
    /// Time left on the fuse when the snapshot was taken.
    /// `None` unless the bomb is active.
    pub remaining: Option<Duration>,
    /// Activation cycle counter. Increments on every activate/reassign.
    pub cycle: u64,
    /// `true` between an explosion and the next activation.
    pub exploded: bool,
}

impl BombView {
    pub fn is_active(&self) -> bool {
        self.phase == BombPhase::Active
    }
}

/// Full state of a match as seen by observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub match_id: MatchId,
    pub phase: MatchPhase,
    pub winner: Option<ParticipantId>,
    /// Roster in join order.
    pub roster: Vec<ParticipantView>,
    pub bomb: BombView,
}

impl MatchSnapshot {
    /// An empty lobby snapshot, used by mirrors before the first commit.
    pub fn empty(match_id: MatchId) -> Self {
        Self {
            match_id,
            phase: MatchPhase::Lobby,
            winner: None,
            roster: Vec::new(),
            bomb: BombView::default(),
        }
    }

    /// Alive participants in join order.
    pub fn alive(&self) -> Vec<ParticipantId> {
        self.roster
            .iter()
            .filter(|p| p.liveness == Liveness::Alive)
            .map(|p| p.id)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Commits (authority → observers)
// ---------------------------------------------------------------------------

/// What happened in a committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- Roster --
    Joined { participant: ParticipantId },
    Left { participant: ParticipantId },
    Disconnected { participant: ParticipantId },
    Reconnected { participant: ParticipantId },
    Eliminated { participant: ParticipantId },
    Stunned { participant: ParticipantId, duration: Duration },

    // -- Bomb --
    MatchStarted { first_owner: ParticipantId },
    BombPassed { from: ParticipantId, to: ParticipantId },
    BombReassigned { owner: ParticipantId },
    BombReleased { previous_owner: ParticipantId },
    Exploded { owner: ParticipantId },

    // -- Outcome --
    /// Addressed only to the eliminated participant.
    Defeat { participant: ParticipantId },
    /// Addressed only to the winner.
    Victory { winner: ParticipantId },
    GameOver { winner: Option<ParticipantId> },

    /// Full-state resync with no transition (sent to new observers).
    Sync,
}

impl Event {
    /// Notices restate the state under the current sequence number instead
    /// of taking a new one. Private outcome notices are notices, so
    /// receivers that are not addressed see no gap.
    pub fn is_notice(&self) -> bool {
        matches!(self, Self::Defeat { .. } | Self::Victory { .. } | Self::Sync)
    }
}

/// One committed transition.
///
/// `seq` increases by one for every transition, so an observer that sees a
/// gap knows it missed something. Because every frame carries the full
/// snapshot, the next frame it does receive heals the gap. Notices (see
/// [`Event::is_notice`]) repeat the `seq` of the transition they follow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub seq: u64,
    pub event: Event,
    pub snapshot: MatchSnapshot,
}

/// A commit paired with its address, as produced by one authority step.
pub type Outbound = (Recipient, Commit);
