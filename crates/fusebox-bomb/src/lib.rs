//! The bomb: a single shared object that moves between participants and
//! counts down to an explosion.
//!
//! [`BombState`] is a pure state machine. It never reads the clock or a
//! global RNG; callers pass `now` and an `Rng`, which keeps every
//! transition reproducible in tests. It consults the
//! [`SessionRoster`](fusebox_roster::SessionRoster) only to check that an
//! owner candidate is alive.

mod bomb;
mod config;
mod error;

pub use bomb::{BombState, Explosion};
pub use config::FuseConfig;
pub use error::BombError;
