//! Error types for the match layer.

use fusebox_authority::Rejection;
use fusebox_protocol::{MatchId, MatchPhase};

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// The authority declined the operation. Nothing changed.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// A join arrived after the lobby closed and late joins are off.
    #[error("match {0} is {1} and does not accept late joins")]
    LateJoinClosed(MatchId, MatchPhase),

    /// The configuration could not be parsed.
    #[error("invalid match config: {0}")]
    Config(#[from] serde_json::Error),
}
