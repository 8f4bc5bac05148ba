//! The match controller: lobby, in progress, game over.
//!
//! ```text
//!            Start (host, >= min_players alive)
//!   Lobby ─────────────────────────────────────▶ InProgress
//!                                                   │
//!                          alive count drops to 1 ──┤
//!                                                   ▼
//!                                               GameOver (terminal)
//! ```
//!
//! The controller owns the [`AuthorityCoordinator`] (and through it the
//! roster and the bomb). It decides *what* happens; the coordinator decides
//! whether each individual commit is allowed.
//!
//! # Step order
//!
//! [`MatchController::step`] is called once per fixed-rate step and always
//! runs in the same order:
//!
//! 1. refill the ownership-change budget
//! 2. treat participants whose reconnect grace lapsed as having left
//! 3. poll the fuse and process at most one explosion
//! 4. re-arm a bomb released by a departed or eliminated holder
//! 5. apply queued proposals in arrival order
//! 6. hand back every commit produced since the previous call

use std::time::Instant;

use fusebox_authority::{AuthorityCoordinator, Rejection, Role};
use fusebox_bomb::Explosion;
use fusebox_protocol::{
    Command, Commit, Event, MatchId, MatchPhase, MatchSnapshot, Outbound,
    ParticipantId, Proposal, Recipient,
};
use fusebox_roster::RosterEvent;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;

use crate::{MatchConfig, MatchError};

pub struct MatchController {
    match_id: MatchId,
    config: MatchConfig,
    phase: MatchPhase,
    winner: Option<ParticipantId>,
    coordinator: AuthorityCoordinator,
    rng: StdRng,
    /// The holder left or was eliminated outside an explosion; arm the
    /// bomb on someone else next step.
    rearm_pending: bool,
}

impl MatchController {
    /// Creates the authoritative controller for a new match hosted by
    /// `host`. The host still has to [`join`](Self::join) like everyone else.
    pub fn new(match_id: MatchId, host: ParticipantId, config: MatchConfig) -> Self {
        let config = config.validated();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let coordinator = AuthorityCoordinator::new(
            Role::Authority,
            host,
            config.roster_config(),
            config.fuse,
        );

        tracing::info!(match_id = %match_id, %host, "match created");

        Self {
            match_id,
            config,
            phase: MatchPhase::Lobby,
            winner: None,
            coordinator,
            rng,
            rearm_pending: false,
        }
    }

    // -- Membership ------------------------------------------------------

    /// Adds a participant and returns their reconnect token.
    ///
    /// Open during the lobby, during play only with `allow_late_join`, and
    /// never after game over.
    pub fn join(&mut self, id: ParticipantId, now: Instant) -> Result<String, MatchError> {
        if self.phase == MatchPhase::InProgress && !self.config.allow_late_join {
            return Err(MatchError::LateJoinClosed(self.match_id, self.phase));
        }
        let token = self.coordinator.commit_join(id)?;
        self.publish_roster_events(now);
        Ok(token)
    }

    /// Removes a participant for good.
    pub fn leave(&mut self, id: ParticipantId, now: Instant) -> Result<(), MatchError> {
        let released = self.coordinator.commit_leave(id)?;
        self.publish_roster_events(now);
        self.after_departure(id, released, now);
        Ok(())
    }

    /// Marks a participant's connection as lost. They stay alive, and keep
    /// the bomb if they hold it, until the grace period runs out.
    pub fn disconnect(&mut self, id: ParticipantId, now: Instant) -> Result<(), MatchError> {
        self.coordinator.commit_disconnect(id, now)?;
        self.publish_roster_events(now);
        Ok(())
    }

    pub fn reconnect(&mut self, token: &str, now: Instant) -> Result<ParticipantId, MatchError> {
        let id = self.coordinator.commit_reconnect(token, now)?;
        self.publish_roster_events(now);
        Ok(id)
    }

    // -- Proposals -------------------------------------------------------

    /// Queues a proposal for the next step.
    pub fn propose(&mut self, proposal: Proposal) {
        self.coordinator.propose(proposal);
    }

    /// Starts the match on the host's behalf: picks the first holder
    /// uniformly among alive participants and lights the fuse.
    pub fn start(&mut self, requester: ParticipantId, now: Instant) -> Result<(), Rejection> {
        if requester != self.coordinator.host() {
            return Err(Rejection::NotHost("start the match"));
        }
        if self.phase != MatchPhase::Lobby {
            return Err(Rejection::WrongPhase(self.phase));
        }
        let alive = self.coordinator.roster().alive_participants();
        if alive.len() < self.config.min_players {
            return Err(Rejection::NotEnoughPlayers {
                required: self.config.min_players,
                alive: alive.len(),
            });
        }

        let Some(&first) = alive.choose(&mut self.rng) else {
            return Err(Rejection::NotEnoughPlayers {
                required: self.config.min_players,
                alive: 0,
            });
        };
        self.coordinator.commit_activate(first, now, &mut self.rng)?;
        self.phase = MatchPhase::InProgress;

        tracing::info!(
            match_id = %self.match_id,
            players = alive.len(),
            first_owner = %first,
            "match started"
        );
        self.publish(Recipient::All, Event::MatchStarted { first_owner: first }, now);
        Ok(())
    }

    // -- Stepping --------------------------------------------------------

    /// Runs one authority step and returns every commit produced since the
    /// last call, in sequence order.
    pub fn step(&mut self, now: Instant) -> Vec<Outbound> {
        self.coordinator.begin_step();

        if self.phase != MatchPhase::GameOver {
            self.expire_stale(now);
        }

        if self.phase == MatchPhase::InProgress {
            if let Some(explosion) = self.coordinator.poll_bomb(now) {
                self.handle_explosion(explosion, now);
            }
        }

        if self.phase == MatchPhase::InProgress && self.rearm_pending {
            self.rearm(now);
        }

        for proposal in self.coordinator.take_proposals() {
            if let Err(rejection) = self.apply_proposal(proposal, now) {
                tracing::debug!(
                    match_id = %self.match_id,
                    from = %proposal.from,
                    command = ?proposal.command,
                    kind = ?rejection.kind(),
                    %rejection,
                    "proposal rejected"
                );
            }
        }

        tracing::trace!(match_id = %self.match_id, step = self.coordinator.step(), "step done");
        self.coordinator.drain_outbox()
    }

    /// Commits produced by direct calls (join, leave, ...) since the last
    /// drain, without running a step.
    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        self.coordinator.drain_outbox()
    }

    fn apply_proposal(&mut self, proposal: Proposal, now: Instant) -> Result<(), Rejection> {
        let from = proposal.from;
        match proposal.command {
            Command::Start => self.start(from, now),
            Command::Pass { target } => {
                self.ensure_in_progress()?;
                self.coordinator.commit_pass(from, target, now)?;
                self.publish(Recipient::All, Event::BombPassed { from, to: target }, now);
                Ok(())
            }
            Command::Stun { target } => {
                self.ensure_in_progress()?;
                let duration = self.config.stun_duration;
                self.coordinator.commit_stun(from, target, now, duration)?;
                self.publish_roster_events(now);
                Ok(())
            }
            Command::Eliminate { target } => {
                self.ensure_in_progress()?;
                if from != target && from != self.coordinator.host() {
                    return Err(Rejection::NotHost("eliminate another participant"));
                }
                let released = self.coordinator.commit_eliminate(target)?;
                self.publish_roster_events(now);
                self.after_departure(target, released, now);
                Ok(())
            }
            Command::Leave => {
                let released = self.coordinator.commit_leave(from)?;
                self.publish_roster_events(now);
                self.after_departure(from, released, now);
                Ok(())
            }
        }
    }

    /// Eliminates the holder, then either ends the match or hands the bomb
    /// to a random survivor with a fresh fuse.
    fn handle_explosion(&mut self, explosion: Explosion, now: Instant) {
        let owner = explosion.owner;
        self.publish(Recipient::All, Event::Exploded { owner }, now);

        match self.coordinator.commit_eliminate(owner) {
            Ok(_) => self.publish_roster_events(now),
            Err(rejection) => {
                tracing::warn!(
                    match_id = %self.match_id,
                    %owner,
                    cycle = explosion.cycle,
                    %rejection,
                    "exploded holder could not be eliminated"
                );
            }
        }

        if self.check_game_over(now) {
            return;
        }

        let alive = self.coordinator.roster().alive_participants();
        let Some(&next) = alive.choose(&mut self.rng) else {
            return;
        };
        match self.coordinator.commit_reassign(next, now, &mut self.rng) {
            Ok(_) => self.publish(Recipient::All, Event::BombReassigned { owner: next }, now),
            Err(rejection) => {
                tracing::warn!(match_id = %self.match_id, %next, %rejection, "reassign failed");
            }
        }
    }

    /// Common tail of leave and non-explosion elimination.
    fn after_departure(&mut self, id: ParticipantId, released: bool, now: Instant) {
        if released {
            self.publish(Recipient::All, Event::BombReleased { previous_owner: id }, now);
            self.rearm_pending = true;
        }
        self.check_game_over(now);
    }

    fn rearm(&mut self, now: Instant) {
        let alive = self.coordinator.roster().alive_participants();
        let Some(&next) = alive.choose(&mut self.rng) else {
            return;
        };
        match self.coordinator.commit_activate(next, now, &mut self.rng) {
            Ok(_) => {
                self.rearm_pending = false;
                self.publish(Recipient::All, Event::BombReassigned { owner: next }, now);
            }
            Err(rejection) => {
                tracing::debug!(match_id = %self.match_id, %next, %rejection, "re-arm deferred");
            }
        }
    }

    fn expire_stale(&mut self, now: Instant) {
        let lapsed = self.coordinator.roster().expire_stale(now);
        for id in lapsed {
            tracing::info!(match_id = %self.match_id, participant = %id, "reconnect grace lapsed");
            if let Err(err) = self.leave(id, now) {
                tracing::warn!(
                    match_id = %self.match_id,
                    participant = %id,
                    %err,
                    "could not drop lapsed participant"
                );
            }
            if self.phase == MatchPhase::GameOver {
                break;
            }
        }
    }

    /// Ends the match once at most one participant is alive. Returns `true`
    /// if the match is (now) over.
    fn check_game_over(&mut self, now: Instant) -> bool {
        match self.phase {
            MatchPhase::GameOver => return true,
            MatchPhase::Lobby => return false,
            MatchPhase::InProgress => {}
        }
        let alive = self.coordinator.roster().alive_participants();
        if alive.len() > 1 {
            return false;
        }

        let winner = alive.first().copied();
        self.phase = MatchPhase::GameOver;
        self.winner = winner;
        self.rearm_pending = false;
        self.coordinator.disarm_bomb();
        self.coordinator.seal_roster();

        match winner {
            Some(w) => tracing::info!(match_id = %self.match_id, winner = %w, "game over"),
            None => tracing::info!(match_id = %self.match_id, "game over with no survivors"),
        }
        self.publish(Recipient::All, Event::GameOver { winner }, now);
        if let Some(w) = winner {
            self.publish(Recipient::Participant(w), Event::Victory { winner: w }, now);
        }
        true
    }

    // -- Broadcast -------------------------------------------------------

    /// Publishes the roster's pending changes as commits.
    fn publish_roster_events(&mut self, now: Instant) {
        for event in self.coordinator.drain_roster_events() {
            match event {
                RosterEvent::Joined(participant) => {
                    self.publish(Recipient::All, Event::Joined { participant }, now);
                }
                RosterEvent::Left(participant) => {
                    self.publish(Recipient::All, Event::Left { participant }, now);
                }
                RosterEvent::Eliminated(participant) => {
                    self.publish(Recipient::All, Event::Eliminated { participant }, now);
                    self.publish(
                        Recipient::Participant(participant),
                        Event::Defeat { participant },
                        now,
                    );
                }
                RosterEvent::Disconnected(participant) => {
                    self.publish(
                        Recipient::AllExcept(participant),
                        Event::Disconnected { participant },
                        now,
                    );
                }
                RosterEvent::Reconnected(participant) => {
                    self.publish(Recipient::All, Event::Reconnected { participant }, now);
                }
                RosterEvent::Stunned(participant, duration) => {
                    self.publish(Recipient::All, Event::Stunned { participant, duration }, now);
                }
            }
        }
    }

    /// A [`Event::Sync`] frame carrying the current state under the last
    /// published sequence number. For late subscribers; nothing is
    /// published and the sequence does not advance.
    pub fn sync_frame(&self, now: Instant) -> Commit {
        Commit {
            seq: self.coordinator.last_seq(),
            event: Event::Sync,
            snapshot: self.snapshot(now),
        }
    }

    fn publish(&mut self, recipient: Recipient, event: Event, now: Instant) {
        let snapshot = self.snapshot(now);
        self.coordinator.publish(recipient, event, snapshot);
    }

    fn ensure_in_progress(&self) -> Result<(), Rejection> {
        if self.phase == MatchPhase::InProgress {
            Ok(())
        } else {
            Err(Rejection::WrongPhase(self.phase))
        }
    }

    // -- Accessors -------------------------------------------------------

    /// Full observer-facing state at `now`.
    pub fn snapshot(&self, now: Instant) -> MatchSnapshot {
        self.coordinator
            .snapshot(self.match_id, self.phase, self.winner, now)
    }

    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn winner(&self) -> Option<ParticipantId> {
        self.winner
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn host(&self) -> ParticipantId {
        self.coordinator.host()
    }

    pub fn coordinator(&self) -> &AuthorityCoordinator {
        &self.coordinator
    }

    pub fn last_seq(&self) -> u64 {
        self.coordinator.last_seq()
    }
}
