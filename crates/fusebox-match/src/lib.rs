//! Match lifecycle for Fusebox.
//!
//! A [`MatchController`] drives one match from lobby to game over. It owns
//! the authority coordinator, turns roster and bomb transitions into
//! sequenced commit frames, and resolves explosions: the holder is
//! eliminated, then the bomb either moves to a random survivor or the last
//! one standing wins.
//!
//! ```
//! use std::time::Instant;
//!
//! use fusebox_match::{MatchConfig, MatchController};
//! use fusebox_protocol::{Command, MatchId, MatchPhase, ParticipantId, Proposal};
//!
//! let host = ParticipantId(1);
//! let config = MatchConfig { seed: Some(7), ..Default::default() };
//! let mut game = MatchController::new(MatchId(1), host, config);
//!
//! let now = Instant::now();
//! game.join(host, now).unwrap();
//! game.join(ParticipantId(2), now).unwrap();
//! game.propose(Proposal::new(host, Command::Start));
//! let frames = game.step(now);
//!
//! assert_eq!(game.phase(), MatchPhase::InProgress);
//! assert!(!frames.is_empty());
//! ```

mod config;
mod controller;
mod error;

pub use config::MatchConfig;
pub use controller::MatchController;
pub use error::MatchError;
