//! Wire types for Fusebox.
//!
//! This crate defines what participants send to the authority
//! ([`Proposal`]) and what the authority broadcasts back ([`Commit`]),
//! plus the [`Codec`] used to turn either into bytes.
//!
//! ```text
//! participant ──Proposal──▶ authority ──Commit{seq, event, snapshot}──▶ observers
//! ```
//!
//! It knows nothing about timers, rosters, or bombs as *behavior*; it only
//! carries their read-only views.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    BombPhase, BombView, Command, Commit, Event, Liveness, MatchId,
    MatchPhase, MatchSnapshot, Outbound, ParticipantId, ParticipantView,
    Proposal, Recipient,
};
