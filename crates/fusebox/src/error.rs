//! Unified error type for Fusebox.

use fusebox_authority::Rejection;
use fusebox_bomb::BombError;
use fusebox_match::MatchError;
use fusebox_protocol::{MatchId, ProtocolError};
use fusebox_roster::RosterError;

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` conversions let `?` lift a layer error into this one, so
/// callers of the facade only ever match on a single type.
#[derive(Debug, thiserror::Error)]
pub enum FuseboxError {
    /// Encoding, decoding, or a frame that does not belong here.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Bomb(#[from] BombError),

    /// The authority declined the request. Nothing changed.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Match(#[from] MatchError),

    /// The match actor has stopped. A full command channel makes callers
    /// wait instead.
    #[error("match {0} is unavailable")]
    Unavailable(MatchId),
}
