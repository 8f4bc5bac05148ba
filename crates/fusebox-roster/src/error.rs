//! Error types for the roster.

use fusebox_protocol::ParticipantId;

/// Why a roster operation was refused.
///
/// None of these are fatal. The authority turns them into rejections and
/// carries on with no state change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    /// The match is over and membership is frozen.
    #[error("roster is sealed")]
    Sealed,

    #[error("participant {0} already joined")]
    AlreadyJoined(ParticipantId),

    #[error("participant {0} not in roster")]
    NotFound(ParticipantId),

    #[error("participant {0} is already eliminated")]
    AlreadyEliminated(ParticipantId),

    /// No free slots.
    #[error("roster is full ({0} participants)")]
    Full(usize),

    /// The reconnect token does not belong to anyone in this roster.
    #[error("invalid reconnect token")]
    InvalidToken,

    /// The reconnection grace period elapsed.
    #[error("reconnect window expired for participant {0}")]
    ReconnectExpired(ParticipantId),

    #[error("participant {0} is already connected")]
    AlreadyConnected(ParticipantId),
}
