//! The session roster: who is in the match and who is still alive.
//!
//! # Ordering
//!
//! Participants are kept in a `Vec` in join order, so
//! [`SessionRoster::alive_participants`] is deterministic. Uniform random
//! draws over that sequence are then reproducible with a seeded RNG.
//!
//! # Eliminated participants
//!
//! Elimination flips liveness but keeps the entry, so an eliminated
//! participant can keep spectating and receive their defeat notice. Only
//! `leave` removes an entry.
//!
//! # Concurrency note
//!
//! Plain `Vec` + `HashMap`, no locking. The roster is only ever written by
//! the authority coordinator inside the match actor.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use fusebox_protocol::{Liveness, ParticipantId, ParticipantView};
use fusebox_tick::Deadline;
use rand::Rng;

use crate::{Connection, Participant, RosterError};

// ---------------------------------------------------------------------------
// RosterConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RosterConfig {
    /// Maximum entries, eliminated ones included.
    pub max_participants: usize,

    /// How long a disconnected participant may take to reconnect.
    /// Zero disables reconnection.
    pub reconnect_grace: Duration,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            max_participants: 8,
            reconnect_grace: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// RosterEvent
// ---------------------------------------------------------------------------

/// A membership or liveness change, queued for the match controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterEvent {
    Joined(ParticipantId),
    Left(ParticipantId),
    Eliminated(ParticipantId),
    Disconnected(ParticipantId),
    Reconnected(ParticipantId),
    Stunned(ParticipantId, Duration),
}

// ---------------------------------------------------------------------------
// SessionRoster
// ---------------------------------------------------------------------------

/// Tracks participant identities, liveness, and connection state.
///
/// ## Lifecycle
///
/// ```text
/// join() ──→ [Alive] ──eliminate()──→ [Eliminated]
///    │          │                          │
///    │    disconnect()/reconnect()         │
///    ▼          ▼                          ▼
///  leave() removes the entry in any state (until sealed)
/// ```
pub struct SessionRoster {
    participants: Vec<Participant>,

    /// Reconnect token → participant. Kept in sync with `participants`.
    tokens: HashMap<String, ParticipantId>,

    config: RosterConfig,

    /// Set once the match is over. Membership is frozen afterwards.
    sealed: bool,

    /// Changes not yet drained by the controller.
    events: Vec<RosterEvent>,
}

impl SessionRoster {
    pub fn new(config: RosterConfig) -> Self {
        Self {
            participants: Vec::new(),
            tokens: HashMap::new(),
            config,
            sealed: false,
            events: Vec::new(),
        }
    }

    /// Adds a participant and issues their reconnect token.
    ///
    /// # Errors
    /// [`RosterError::Sealed`], [`RosterError::AlreadyJoined`], or
    /// [`RosterError::Full`].
    pub fn join(
        &mut self,
        id: ParticipantId,
    ) -> Result<&Participant, RosterError> {
        self.ensure_open()?;
        if self.index_of(id).is_some() {
            return Err(RosterError::AlreadyJoined(id));
        }
        if self.participants.len() >= self.config.max_participants {
            return Err(RosterError::Full(self.config.max_participants));
        }

        let token = generate_token();
        self.tokens.insert(token.clone(), id);
        self.participants.push(Participant::new(id, token));
        self.events.push(RosterEvent::Joined(id));

        tracing::info!(participant = %id, size = self.participants.len(), "participant joined");

        Ok(&self.participants[self.participants.len() - 1])
    }

    /// Removes a participant entirely.
    pub fn leave(&mut self, id: ParticipantId) -> Result<(), RosterError> {
        self.ensure_open()?;
        let idx = self.index_of(id).ok_or(RosterError::NotFound(id))?;

        let removed = self.participants.remove(idx);
        self.tokens.remove(&removed.reconnect_token);
        self.events.push(RosterEvent::Left(id));

        tracing::info!(participant = %id, size = self.participants.len(), "participant left");
        Ok(())
    }

    /// Marks a participant as eliminated. Not idempotent on purpose: a
    /// second call reports [`RosterError::AlreadyEliminated`] so callers
    /// can tell a duplicate apart from a real transition.
    pub fn eliminate(
        &mut self,
        id: ParticipantId,
    ) -> Result<(), RosterError> {
        self.ensure_open()?;
        let participant = self.get_mut(id)?;
        if !participant.is_alive() {
            return Err(RosterError::AlreadyEliminated(id));
        }

        participant.liveness = Liveness::Eliminated;
        participant.stun = None;
        self.events.push(RosterEvent::Eliminated(id));

        tracing::info!(participant = %id, alive = self.alive_count(), "participant eliminated");
        Ok(())
    }

    /// Marks a participant's connection as lost. Liveness is unchanged.
    ///
    /// Disconnecting twice keeps the original `since`, so the grace period
    /// cannot be extended by repeated disconnects.
    pub fn disconnect(
        &mut self,
        id: ParticipantId,
        now: Instant,
    ) -> Result<(), RosterError> {
        let participant = self.get_mut(id)?;
        if participant.is_connected() {
            participant.connection = Connection::Disconnected { since: now };
            self.events.push(RosterEvent::Disconnected(id));
            tracing::info!(participant = %id, "participant disconnected, grace period started");
        }
        Ok(())
    }

    /// Restores a disconnected participant by token.
    ///
    /// Allowed after the roster is sealed so a participant can come back
    /// to see the final result.
    pub fn reconnect(
        &mut self,
        token: &str,
        now: Instant,
    ) -> Result<ParticipantId, RosterError> {
        let id = self
            .tokens
            .get(token)
            .copied()
            .ok_or(RosterError::InvalidToken)?;
        let grace = self.config.reconnect_grace;
        let participant = self.get_mut(id)?;

        match participant.connection {
            Connection::Connected => Err(RosterError::AlreadyConnected(id)),
            Connection::Disconnected { since } => {
                if now.saturating_duration_since(since) > grace {
                    return Err(RosterError::ReconnectExpired(id));
                }
                participant.connection = Connection::Connected;
                self.events.push(RosterEvent::Reconnected(id));
                tracing::info!(participant = %id, "participant reconnected");
                Ok(id)
            }
        }
    }

    /// Participants whose reconnection window has elapsed at `now`.
    ///
    /// Does not remove them; the controller decides what a lapsed
    /// participant means for the match and then calls [`leave`](Self::leave).
    pub fn expire_stale(&self, now: Instant) -> Vec<ParticipantId> {
        let grace = self.config.reconnect_grace;
        self.participants
            .iter()
            .filter(|p| match p.connection {
                Connection::Disconnected { since } => {
                    now.saturating_duration_since(since) > grace
                }
                Connection::Connected => false,
            })
            .map(|p| p.id)
            .collect()
    }

    /// Stuns an alive participant until `now + duration`. Re-stunning
    /// replaces the previous deadline.
    pub fn stun(
        &mut self,
        id: ParticipantId,
        now: Instant,
        duration: Duration,
    ) -> Result<(), RosterError> {
        let participant = self.get_mut(id)?;
        if !participant.is_alive() {
            return Err(RosterError::AlreadyEliminated(id));
        }
        participant.stun = Some(Deadline::after(now, duration));
        self.events.push(RosterEvent::Stunned(id, duration));
        Ok(())
    }

    /// Freezes membership. Idempotent.
    pub fn seal(&mut self) {
        if !self.sealed {
            self.sealed = true;
            tracing::debug!(size = self.participants.len(), "roster sealed");
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Alive participants in join order.
    pub fn alive_participants(&self) -> Vec<ParticipantId> {
        self.participants
            .iter()
            .filter(|p| p.is_alive())
            .map(|p| p.id)
            .collect()
    }

    pub fn alive_count(&self) -> usize {
        self.participants.iter().filter(|p| p.is_alive()).count()
    }

    pub fn is_alive(&self, id: ParticipantId) -> bool {
        self.get(id).is_some_and(Participant::is_alive)
    }

    pub fn is_stunned(&self, id: ParticipantId, now: Instant) -> bool {
        self.get(id).is_some_and(|p| p.is_stunned(now))
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.index_of(id).is_some()
    }

    /// Takes all queued events, oldest first.
    pub fn drain_events(&mut self) -> Vec<RosterEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn views(&self, now: Instant) -> Vec<ParticipantView> {
        self.participants.iter().map(|p| p.view(now)).collect()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    fn ensure_open(&self) -> Result<(), RosterError> {
        if self.sealed {
            Err(RosterError::Sealed)
        } else {
            Ok(())
        }
    }

    fn index_of(&self, id: ParticipantId) -> Option<usize> {
        self.participants.iter().position(|p| p.id == id)
    }

    fn get_mut(
        &mut self,
        id: ParticipantId,
    ) -> Result<&mut Participant, RosterError> {
        self.participants
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RosterError::NotFound(id))
    }
}

impl Default for SessionRoster {
    fn default() -> Self {
        Self::new(RosterConfig::default())
    }
}

/// 16 random bytes as 32 lowercase hex characters.
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
