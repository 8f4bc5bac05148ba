//! Match server actor: one Tokio task per match.
//!
//! The task owns the [`MatchController`] outright. The outside world talks
//! to it through a bounded mpsc channel (via [`MatchHandle`]) and receives
//! commit frames on per-subscriber unbounded channels. No locks, no shared
//! mutable state: the actor is the single writer.
//!
//! ```text
//!   MatchHandle ──cmd──▶ ┌──────────── MatchActor ────────────┐
//!                        │ select! {                          │
//!                        │   cmd  = receiver.recv()           │
//!                        │   step = scheduler.wait_for_step() │
//!                        │ }                                  │ ──Commit──▶ FrameSender (per participant)
//!                        │ MatchController (authority)        │ ──Commit──▶ FrameSender (observers)
//!                        └────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::time::Instant;

use fusebox_match::{MatchConfig, MatchController, MatchError};
use fusebox_protocol::{
    Commit, MatchId, MatchPhase, MatchSnapshot, Outbound, ParticipantId,
    Proposal,
};
use fusebox_tick::TickScheduler;
use tokio::sync::{mpsc, oneshot};

use crate::FuseboxError;

/// Default capacity of a match's command channel.
pub const DEFAULT_CHANNEL_SIZE: usize = 256;

/// Outbound commit frames for one subscriber.
pub type FrameSender = mpsc::UnboundedSender<Commit>;

/// The receiving end of a [`FrameSender`].
pub type FrameReceiver = mpsc::UnboundedReceiver<Commit>;

/// Returned by a successful join.
#[derive(Debug, Clone)]
pub struct Joined {
    /// Present this to [`MatchHandle::reconnect`] after a dropped connection.
    pub token: String,
    /// State right after the join.
    pub snapshot: MatchSnapshot,
}

/// Commands sent to the match actor. Variants with a `reply` are
/// request/response; the rest are fire-and-forget.
enum MatchCommand {
    Join {
        id: ParticipantId,
        frames: FrameSender,
        reply: oneshot::Sender<Result<Joined, MatchError>>,
    },
    Leave {
        id: ParticipantId,
        reply: oneshot::Sender<Result<(), MatchError>>,
    },
    Disconnect {
        id: ParticipantId,
        reply: oneshot::Sender<Result<(), MatchError>>,
    },
    Reconnect {
        token: String,
        frames: FrameSender,
        reply: oneshot::Sender<Result<ParticipantId, MatchError>>,
    },
    Propose(Proposal),
    Observe {
        frames: FrameSender,
    },
    Snapshot {
        reply: oneshot::Sender<MatchSnapshot>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// MatchServer
// ---------------------------------------------------------------------------

/// Spawns match actors.
pub struct MatchServer;

impl MatchServer {
    /// Spawns a match actor on the current Tokio runtime and returns a
    /// handle to it. The match starts in the lobby with nobody joined.
    pub fn spawn(
        match_id: MatchId,
        host: ParticipantId,
        config: MatchConfig,
    ) -> MatchHandle {
        Self::spawn_with_capacity(match_id, host, config, DEFAULT_CHANNEL_SIZE)
    }

    /// Like [`spawn`](Self::spawn) with an explicit command channel size.
    /// Callers wait when the channel is full.
    pub fn spawn_with_capacity(
        match_id: MatchId,
        host: ParticipantId,
        config: MatchConfig,
        channel_size: usize,
    ) -> MatchHandle {
        let (tx, rx) = mpsc::channel(channel_size.max(1));
        let controller = MatchController::new(match_id, host, config);
        let scheduler = TickScheduler::new(controller.config().tick_config());

        let actor = MatchActor {
            controller,
            scheduler,
            participants: HashMap::new(),
            observers: Vec::new(),
            receiver: rx,
        };
        tokio::spawn(actor.run());

        MatchHandle {
            match_id,
            sender: tx,
        }
    }
}

// ---------------------------------------------------------------------------
// MatchHandle
// ---------------------------------------------------------------------------

/// Handle to a running match actor. Cheap to clone.
#[derive(Clone)]
pub struct MatchHandle {
    match_id: MatchId,
    sender: mpsc::Sender<MatchCommand>,
}

impl MatchHandle {
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Joins the match. Commit frames addressed to `id` arrive on `frames`,
    /// starting with the `Joined` frame for this join.
    pub async fn join(
        &self,
        id: ParticipantId,
        frames: FrameSender,
    ) -> Result<Joined, FuseboxError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Join { id, frames, reply }).await?;
        Ok(self.recv(rx).await??)
    }

    pub async fn leave(&self, id: ParticipantId) -> Result<(), FuseboxError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Leave { id, reply }).await?;
        Ok(self.recv(rx).await??)
    }

    /// Reports a dropped connection. The participant keeps their seat for
    /// the configured grace period.
    pub async fn disconnect(&self, id: ParticipantId) -> Result<(), FuseboxError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Disconnect { id, reply }).await?;
        Ok(self.recv(rx).await??)
    }

    /// Reclaims a seat with the token issued on join. Frames resume on
    /// `frames`, starting with the `Reconnected` frame.
    pub async fn reconnect(
        &self,
        token: impl Into<String>,
        frames: FrameSender,
    ) -> Result<ParticipantId, FuseboxError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Reconnect {
            token: token.into(),
            frames,
            reply,
        })
        .await?;
        Ok(self.recv(rx).await??)
    }

    /// Queues a proposal for the next authority step (fire-and-forget).
    /// Whether it commits shows up in the frame stream.
    pub async fn propose(&self, proposal: Proposal) -> Result<(), FuseboxError> {
        self.send(MatchCommand::Propose(proposal)).await
    }

    /// Subscribes a read-only observer. It receives a `Sync` frame with the
    /// current state, then every broadcast frame.
    pub async fn observe(&self, frames: FrameSender) -> Result<(), FuseboxError> {
        self.send(MatchCommand::Observe { frames }).await
    }

    pub async fn snapshot(&self) -> Result<MatchSnapshot, FuseboxError> {
        let (reply, rx) = oneshot::channel();
        self.send(MatchCommand::Snapshot { reply }).await?;
        self.recv(rx).await
    }

    /// Stops the actor. Pending commands are dropped.
    pub async fn shutdown(&self) -> Result<(), FuseboxError> {
        self.send(MatchCommand::Shutdown).await
    }

    async fn send(&self, cmd: MatchCommand) -> Result<(), FuseboxError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| FuseboxError::Unavailable(self.match_id))
    }

    async fn recv<T>(&self, rx: oneshot::Receiver<T>) -> Result<T, FuseboxError> {
        rx.await.map_err(|_| FuseboxError::Unavailable(self.match_id))
    }
}

// ---------------------------------------------------------------------------
// MatchActor
// ---------------------------------------------------------------------------

struct MatchActor {
    controller: MatchController,
    scheduler: TickScheduler,
    /// Frame channels of connected participants.
    participants: HashMap<ParticipantId, FrameSender>,
    /// Frame channels of read-only observers.
    observers: Vec<FrameSender>,
    receiver: mpsc::Receiver<MatchCommand>,
}

impl MatchActor {
    async fn run(mut self) {
        let match_id = self.controller.match_id();
        tracing::info!(
            match_id = %match_id,
            rate_hz = self.scheduler.step_rate_hz(),
            "match actor started"
        );

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    match cmd {
                        Some(MatchCommand::Shutdown) | None => {
                            tracing::info!(match_id = %match_id, "match shutting down");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd),
                    }
                }
                step = self.scheduler.wait_for_step() => {
                    if step.overrun {
                        tracing::warn!(match_id = %match_id, step = step.step, "authority step overran");
                    }
                    let out = self.controller.step(step.now);
                    self.dispatch(out);
                    self.drop_departed();

                    if self.controller.phase() == MatchPhase::GameOver {
                        self.scheduler.pause();
                    }
                }
            }
        }

        tracing::info!(
            match_id = %match_id,
            steps = self.scheduler.stats().total_steps,
            overruns = self.scheduler.stats().total_overruns,
            "match actor stopped"
        );
    }

    fn handle_command(&mut self, cmd: MatchCommand) {
        let now = now();
        match cmd {
            MatchCommand::Join { id, frames, reply } => {
                // Registered first so the joiner receives their own Joined frame.
                let previous = self.participants.insert(id, frames);
                let result = self.controller.join(id, now);
                if result.is_err() {
                    match previous {
                        Some(tx) => self.participants.insert(id, tx),
                        None => self.participants.remove(&id),
                    };
                }
                let out = self.controller.drain_outbound();
                self.dispatch(out);
                let _ = reply.send(result.map(|token| Joined {
                    token,
                    snapshot: self.controller.snapshot(now),
                }));
            }
            MatchCommand::Leave { id, reply } => {
                let result = self.controller.leave(id, now);
                let out = self.controller.drain_outbound();
                self.dispatch(out);
                if result.is_ok() {
                    self.participants.remove(&id);
                }
                let _ = reply.send(result);
            }
            MatchCommand::Disconnect { id, reply } => {
                let result = self.controller.disconnect(id, now);
                if result.is_ok() {
                    self.participants.remove(&id);
                }
                let out = self.controller.drain_outbound();
                self.dispatch(out);
                let _ = reply.send(result);
            }
            MatchCommand::Reconnect {
                token,
                frames,
                reply,
            } => {
                let result = self.controller.reconnect(&token, now);
                if let Ok(id) = &result {
                    self.participants.insert(*id, frames);
                }
                let out = self.controller.drain_outbound();
                self.dispatch(out);
                let _ = reply.send(result);
            }
            MatchCommand::Propose(proposal) => {
                if self.participants.contains_key(&proposal.from) {
                    self.controller.propose(proposal);
                } else {
                    tracing::warn!(
                        match_id = %self.controller.match_id(),
                        from = %proposal.from,
                        "proposal from unconnected participant, ignoring"
                    );
                }
            }
            MatchCommand::Observe { frames } => {
                if frames.send(self.controller.sync_frame(now)).is_ok() {
                    self.observers.push(frames);
                }
            }
            MatchCommand::Snapshot { reply } => {
                let _ = reply.send(self.controller.snapshot(now));
            }
            // Handled by the run loop.
            MatchCommand::Shutdown => {}
        }
    }

    /// Delivers frames by recipient. Channels whose receiver is gone are
    /// skipped for participants (they may reconnect) and dropped for
    /// observers.
    fn dispatch(&mut self, out: Vec<Outbound>) {
        for (recipient, commit) in out {
            for (id, tx) in &self.participants {
                if recipient.includes(Some(*id)) {
                    let _ = tx.send(commit.clone());
                }
            }
            if recipient.includes(None) {
                self.observers.retain(|tx| tx.send(commit.clone()).is_ok());
            }
        }
    }

    /// Forgets the frame channels of participants who left during a step.
    /// They still received their own `Left` frame.
    fn drop_departed(&mut self) {
        let roster = self.controller.coordinator().roster();
        self.participants.retain(|id, _| {
            let kept = roster.contains(*id);
            if !kept {
                tracing::debug!(participant = %id, "departed participant unsubscribed");
            }
            kept
        });
    }
}

/// Current time on Tokio's clock, so paused test time applies to direct
/// commands as well as steps.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
