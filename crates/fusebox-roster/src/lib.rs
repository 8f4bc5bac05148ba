//! Session roster for Fusebox.
//!
//! The roster is the leaf of the authority stack: it knows who is in the
//! match, who is still alive, who is temporarily disconnected, and who is
//! stunned. It does not know about the bomb or the match phase; those layers
//! sit above it and drain its [`RosterEvent`]s.
//!
//! ```text
//! MatchController ── drains RosterEvent ──┐
//!     │                                   │
//! AuthorityCoordinator (single writer) ── SessionRoster (this crate)
//! ```

mod error;
mod participant;
mod roster;

pub use error::RosterError;
pub use participant::{Connection, Participant};
pub use roster::{RosterConfig, RosterEvent, SessionRoster};
