//! # Fusebox
//!
//! Host-authoritative bomb-passing match service.
//!
//! One participant's instance is the authority: it alone mutates the
//! roster and the bomb. Everyone else proposes commands and follows along
//! through sequenced commit frames carrying full snapshots. The bomb's
//! fuse and every stun are deadlines polled on a fixed-rate step, so
//! nothing here is callback-driven.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fusebox::prelude::*;
//! use tokio::sync::mpsc;
//!
//! # async fn demo() -> Result<(), FuseboxError> {
//! let host = ParticipantId(1);
//! let handle = MatchServer::spawn(MatchId(1), host, MatchConfig::default());
//!
//! let (tx, mut frames) = mpsc::unbounded_channel();
//! let joined = handle.join(host, tx).await?;
//! let mut mirror = Mirror::new(handle.match_id(), Some(host));
//!
//! while let Some(commit) = frames.recv().await {
//!     mirror.apply(commit)?;
//!     if mirror.phase() == MatchPhase::GameOver {
//!         break;
//!     }
//! }
//! # let _ = joined;
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! | Crate | Role |
//! |---|---|
//! | `fusebox-protocol` | commands, events, snapshots, commit frames, codec |
//! | `fusebox-tick` | fixed-rate step scheduler, deadlines |
//! | `fusebox-roster` | who is in, who is alive, reconnection, stun |
//! | `fusebox-bomb` | bomb ownership and fuse |
//! | `fusebox-authority` | single-writer arbitration, observer mirrors |
//! | `fusebox-match` | lobby → in progress → game over |

mod error;
mod server;

pub use error::FuseboxError;
pub use server::{
    DEFAULT_CHANNEL_SIZE, FrameReceiver, FrameSender, Joined, MatchHandle,
    MatchServer,
};

pub use fusebox_authority as authority;
pub use fusebox_bomb as bomb;
pub use fusebox_match as game;
pub use fusebox_protocol as protocol;
pub use fusebox_roster as roster;
pub use fusebox_tick as tick;

/// Everything a typical caller needs.
pub mod prelude {
    pub use crate::{
        FrameReceiver, FrameSender, FuseboxError, Joined, MatchHandle,
        MatchServer,
    };
    pub use fusebox_authority::{Applied, Mirror, Rejection};
    pub use fusebox_bomb::FuseConfig;
    pub use fusebox_match::{MatchConfig, MatchError};
    pub use fusebox_protocol::{
        Codec, Command, Commit, Event, JsonCodec, Liveness, MatchId,
        MatchPhase, MatchSnapshot, ParticipantId, Proposal, Recipient,
    };
}
