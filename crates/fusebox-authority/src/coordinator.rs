//! The authority coordinator: the only writer of roster and bomb state.
//!
//! Participants never mutate shared state directly. They *propose*
//! commands, which queue here in arrival order. The match controller drains
//! the queue once per step and calls the matching `commit_*` method for
//! each proposal; every `commit_*` re-checks the rules and either mutates
//! or returns a [`Rejection`] with nothing changed. Committed transitions
//! are published as sequenced [`Commit`] frames for observers.
//!
//! Two rules are enforced here rather than in the game rules:
//!
//! - **Single writer.** An instance in [`Role::Observer`] refuses every
//!   commit with [`Rejection::NotAuthority`].
//! - **One ownership change per step.** Activation, pass, and reassignment
//!   share a per-step budget. The second one in the same step is rejected
//!   with [`Rejection::StepBudget`].

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use fusebox_bomb::{BombState, Explosion, FuseConfig};
use fusebox_protocol::{
    Commit, Event, MatchId, MatchPhase, MatchSnapshot, Outbound,
    ParticipantId, Proposal, Recipient,
};
use fusebox_roster::{RosterConfig, RosterEvent, SessionRoster};
use rand::Rng;

use crate::Rejection;

/// Whether this instance may commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The host: commits and broadcasts.
    Authority,
    /// Everyone else: may only propose.
    Observer,
}

pub struct AuthorityCoordinator {
    role: Role,
    /// The participant whose instance is the authority.
    host: ParticipantId,
    roster: SessionRoster,
    bomb: BombState,
    /// Proposals waiting for the next step, oldest first.
    inbox: VecDeque<Proposal>,
    /// Committed frames waiting to be delivered.
    outbox: Vec<Outbound>,
    /// Sequence number of the last published commit.
    last_seq: u64,
    step: u64,
    ownership_changed: bool,
}

impl AuthorityCoordinator {
    pub fn new(
        role: Role,
        host: ParticipantId,
        roster_config: RosterConfig,
        fuse: FuseConfig,
    ) -> Self {
        Self {
            role,
            host,
            roster: SessionRoster::new(roster_config),
            bomb: BombState::new(fuse),
            inbox: VecDeque::new(),
            outbox: Vec::new(),
            last_seq: 0,
            step: 0,
            ownership_changed: false,
        }
    }

    // -- Proposals -------------------------------------------------------

    /// Queues a proposal. Any participant may propose; nothing is decided
    /// until the next step drains the queue.
    pub fn propose(&mut self, proposal: Proposal) {
        tracing::trace!(from = %proposal.from, command = ?proposal.command, "proposal queued");
        self.inbox.push_back(proposal);
    }

    /// Takes every queued proposal in arrival order.
    pub fn take_proposals(&mut self) -> Vec<Proposal> {
        self.inbox.drain(..).collect()
    }

    pub fn pending_proposals(&self) -> usize {
        self.inbox.len()
    }

    // -- Step bookkeeping ------------------------------------------------

    /// Starts a new step and refills the ownership-change budget.
    pub fn begin_step(&mut self) {
        self.step += 1;
        self.ownership_changed = false;
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// `true` once the bomb has changed hands in the current step.
    pub fn ownership_changed_this_step(&self) -> bool {
        self.ownership_changed
    }

    // -- Roster commits --------------------------------------------------

    pub fn commit_join(&mut self, id: ParticipantId) -> Result<String, Rejection> {
        self.ensure_authority()?;
        let participant = self.roster.join(id)?;
        Ok(participant.reconnect_token.clone())
    }

    /// Removes a participant. If they were holding a live bomb it is
    /// disarmed first, so the bomb is never active in a departed hand.
    ///
    /// Returns `true` if the bomb was released.
    pub fn commit_leave(&mut self, id: ParticipantId) -> Result<bool, Rejection> {
        self.ensure_authority()?;
        self.roster.leave(id)?;
        Ok(self.release_if_held(id))
    }

    /// Eliminates a participant. Like [`commit_leave`](Self::commit_leave),
    /// a live bomb in their hands is released.
    ///
    /// An exploding bomb is *not* released: its owner is being eliminated
    /// because of it, and the controller reassigns it next.
    pub fn commit_eliminate(&mut self, id: ParticipantId) -> Result<bool, Rejection> {
        self.ensure_authority()?;
        self.roster.eliminate(id)?;
        Ok(self.release_if_held(id))
    }

    pub fn commit_disconnect(
        &mut self,
        id: ParticipantId,
        now: Instant,
    ) -> Result<(), Rejection> {
        self.ensure_authority()?;
        self.roster.disconnect(id, now)?;
        Ok(())
    }

    pub fn commit_reconnect(
        &mut self,
        token: &str,
        now: Instant,
    ) -> Result<ParticipantId, Rejection> {
        self.ensure_authority()?;
        Ok(self.roster.reconnect(token, now)?)
    }

    pub fn commit_stun(
        &mut self,
        from: ParticipantId,
        target: ParticipantId,
        now: Instant,
        duration: Duration,
    ) -> Result<(), Rejection> {
        self.ensure_authority()?;
        if from == target {
            return Err(Rejection::SelfTarget(from));
        }
        if !self.roster.is_alive(from) {
            return Err(Rejection::Roster(
                fusebox_roster::RosterError::AlreadyEliminated(from),
            ));
        }
        self.roster.stun(target, now, duration)?;
        Ok(())
    }

    pub fn seal_roster(&mut self) {
        self.roster.seal();
    }

    pub fn drain_roster_events(&mut self) -> Vec<RosterEvent> {
        self.roster.drain_events()
    }

    // -- Bomb commits ----------------------------------------------------

    pub fn commit_activate<R: Rng + ?Sized>(
        &mut self,
        owner: ParticipantId,
        now: Instant,
        rng: &mut R,
    ) -> Result<Duration, Rejection> {
        self.ensure_authority()?;
        self.ensure_budget()?;
        let fuse = self.bomb.activate(owner, &self.roster, now, rng)?;
        self.ownership_changed = true;
        Ok(fuse)
    }

    /// Hands the bomb from `requester` to `target`.
    ///
    /// Checked in this order: role, stun, step budget, then the bomb's own
    /// rules (owner, phase, target liveness).
    pub fn commit_pass(
        &mut self,
        requester: ParticipantId,
        target: ParticipantId,
        now: Instant,
    ) -> Result<(), Rejection> {
        self.ensure_authority()?;
        if self.roster.is_stunned(requester, now) {
            return Err(Rejection::Stunned(requester));
        }
        self.ensure_budget()?;
        self.bomb.pass(requester, target, &self.roster)?;
        self.ownership_changed = true;
        Ok(())
    }

    pub fn commit_reassign<R: Rng + ?Sized>(
        &mut self,
        new_owner: ParticipantId,
        now: Instant,
        rng: &mut R,
    ) -> Result<Duration, Rejection> {
        self.ensure_authority()?;
        self.ensure_budget()?;
        let fuse = self.bomb.reassign(new_owner, &self.roster, now, rng)?;
        self.ownership_changed = true;
        Ok(fuse)
    }

    /// Polls the fuse. Observers never see an explosion; they learn about
    /// it from the authority's broadcast.
    pub fn poll_bomb(&mut self, now: Instant) -> Option<Explosion> {
        if self.role != Role::Authority {
            return None;
        }
        self.bomb.tick(now)
    }

    /// Puts the bomb away for good (match over).
    pub fn disarm_bomb(&mut self) -> Option<ParticipantId> {
        self.bomb.disarm()
    }

    fn release_if_held(&mut self, id: ParticipantId) -> bool {
        if self.bomb.is_active() && self.bomb.owner() == Some(id) {
            self.bomb.disarm();
            tracing::info!(participant = %id, "bomb released by departing owner");
            true
        } else {
            false
        }
    }

    // -- Broadcast -------------------------------------------------------

    /// Builds the full observer-facing snapshot.
    pub fn snapshot(
        &self,
        match_id: MatchId,
        phase: MatchPhase,
        winner: Option<ParticipantId>,
        now: Instant,
    ) -> MatchSnapshot {
        MatchSnapshot {
            match_id,
            phase,
            winner,
            roster: self.roster.views(now),
            bomb: self.bomb.view(now),
        }
    }

    /// Stamps the next sequence number on a committed transition and queues
    /// it for delivery. Notices keep the current number.
    pub fn publish(
        &mut self,
        recipient: Recipient,
        event: Event,
        snapshot: MatchSnapshot,
    ) -> u64 {
        if !event.is_notice() {
            self.last_seq += 1;
        }
        tracing::debug!(seq = self.last_seq, ?recipient, ?event, "commit published");
        self.outbox.push((
            recipient,
            Commit {
                seq: self.last_seq,
                event,
                snapshot,
            },
        ));
        self.last_seq
    }

    /// Takes every frame published since the last drain, in order.
    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    // -- Accessors -------------------------------------------------------

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_authority(&self) -> bool {
        self.role == Role::Authority
    }

    pub fn host(&self) -> ParticipantId {
        self.host
    }

    pub fn roster(&self) -> &SessionRoster {
        &self.roster
    }

    pub fn bomb(&self) -> &BombState {
        &self.bomb
    }

    fn ensure_authority(&self) -> Result<(), Rejection> {
        match self.role {
            Role::Authority => Ok(()),
            Role::Observer => Err(Rejection::NotAuthority),
        }
    }

    fn ensure_budget(&self) -> Result<(), Rejection> {
        if self.ownership_changed {
            Err(Rejection::StepBudget)
        } else {
            Ok(())
        }
    }
}
