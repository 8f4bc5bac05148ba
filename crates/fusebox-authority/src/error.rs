//! Rejections: why the authority declined to commit a proposal.
//!
//! A rejection is not a failure. It is logged at `debug` and dropped; the
//! state is exactly what it was before the proposal arrived.

use fusebox_bomb::BombError;
use fusebox_protocol::{MatchPhase, ParticipantId};
use fusebox_roster::RosterError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// This instance is an observer and may not commit anything.
    #[error("only the authority may commit state changes")]
    NotAuthority,

    /// A host-only command came from someone else.
    #[error("only the host may {0}")]
    NotHost(&'static str),

    /// The command makes no sense in the current match phase.
    #[error("not allowed while match is {0}")]
    WrongPhase(MatchPhase),

    #[error("need {required} alive participants to start, have {alive}")]
    NotEnoughPlayers { required: usize, alive: usize },

    /// The requester is stunned and cannot act yet.
    #[error("participant {0} is stunned")]
    Stunned(ParticipantId),

    /// The bomb already changed hands during this step.
    #[error("bomb ownership already changed this step")]
    StepBudget,

    /// Acting on oneself where that is meaningless (stunning yourself).
    #[error("participant {0} cannot target themselves")]
    SelfTarget(ParticipantId),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Bomb(#[from] BombError),
}

/// Coarse classification used as a structured log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// Wrong role, wrong requester, wrong phase, or throttled.
    Policy,
    /// The target is unknown or no longer alive.
    InvalidTarget,
    /// The transition already happened.
    Duplicate,
}

impl Rejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Self::Roster(RosterError::NotFound(_))
            | Self::Bomb(BombError::InvalidTarget(_))
            | Self::SelfTarget(_) => RejectionKind::InvalidTarget,
            Self::Roster(
                RosterError::AlreadyEliminated(_)
                | RosterError::AlreadyJoined(_)
                | RosterError::AlreadyConnected(_),
            ) => RejectionKind::Duplicate,
            _ => RejectionKind::Policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classifies_bomb_errors() {
        let not_owner = Rejection::from(BombError::NotOwner {
            requester: ParticipantId(1),
        });
        let bad_target = Rejection::from(BombError::InvalidTarget(ParticipantId(2)));

        assert_eq!(not_owner.kind(), RejectionKind::Policy);
        assert_eq!(bad_target.kind(), RejectionKind::InvalidTarget);
    }

    #[test]
    fn test_kind_classifies_duplicate_elimination() {
        let dup = Rejection::from(RosterError::AlreadyEliminated(ParticipantId(3)));
        assert_eq!(dup.kind(), RejectionKind::Duplicate);
    }

    #[test]
    fn test_display_is_transparent_for_wrapped_errors() {
        let r = Rejection::from(RosterError::Sealed);
        assert_eq!(r.to_string(), "roster is sealed");
    }
}
