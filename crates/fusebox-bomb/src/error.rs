//! Error types for the bomb.

use fusebox_protocol::{BombPhase, ParticipantId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BombError {
    /// The requested transition is not valid from the current phase.
    #[error("cannot {action} while bomb is {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: BombPhase,
    },

    /// Someone other than the holder tried to pass.
    #[error("participant {requester} does not hold the bomb")]
    NotOwner { requester: ParticipantId },

    /// The proposed holder is unknown or already eliminated.
    #[error("participant {0} cannot hold the bomb")]
    InvalidTarget(ParticipantId),
}
