//! Authority layer for Fusebox.
//!
//! One instance per match holds [`Role::Authority`] and is the only one
//! allowed to mutate the roster and the bomb. Everyone else proposes
//! commands and follows along through a [`Mirror`] fed by the authority's
//! sequenced commit frames.
//!
//! # Key types
//!
//! - [`AuthorityCoordinator`] - single writer; proposal queue; commit outbox
//! - [`Rejection`] - why a proposal was declined (never fatal)
//! - [`Mirror`] - an observer's read-only copy with gap healing

mod coordinator;
mod error;
mod mirror;

pub use coordinator::{AuthorityCoordinator, Role};
pub use error::{Rejection, RejectionKind};
pub use mirror::{Applied, Mirror};
