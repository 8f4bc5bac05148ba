//! One roster entry.
//!
//! A participant carries:
//! - WHO they are (`ParticipantId`, stable across reconnects)
//! - WHETHER they are still in the running (`Liveness`)
//! - WHETHER their connection is up (`Connection`)
//! - HOW they reconnect (a secret token)
//! - WHEN their stun wears off, if stunned

use std::time::Instant;

use fusebox_protocol::{Liveness, ParticipantId, ParticipantView};
use fusebox_tick::Deadline;

/// Connection state of a participant.
///
/// ```text
///   Connected ──(disconnect)──→ Disconnected ──(grace elapsed)──→ removed
///       ↑                            │
///       └────────(reconnect)─────────┘
/// ```
///
/// Connection is independent of liveness: a disconnected participant is
/// still alive and may still be holding the bomb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    Connected,
    /// Lost connection at `since`; may reconnect until `since + grace`.
    Disconnected { since: Instant },
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub id: ParticipantId,
    pub liveness: Liveness,
    pub connection: Connection,
    /// 32 hex characters (128 bits) issued on join.
    pub reconnect_token: String,
    pub(crate) stun: Option<Deadline>,
}

impl Participant {
    pub(crate) fn new(id: ParticipantId, reconnect_token: String) -> Self {
        Self {
            id,
            liveness: Liveness::Alive,
            connection: Connection::Connected,
            reconnect_token,
            stun: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.liveness == Liveness::Alive
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.connection, Connection::Connected)
    }

    /// `true` while a stun deadline is set and not yet due.
    pub fn is_stunned(&self, now: Instant) -> bool {
        self.stun.is_some_and(|d| !d.is_due(now))
    }

    pub fn view(&self, now: Instant) -> ParticipantView {
        ParticipantView {
            id: self.id,
            liveness: self.liveness,
            connected: self.is_connected(),
            stunned: self.is_stunned(now),
        }
    }
}
