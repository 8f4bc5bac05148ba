//! Read-only mirror of the authority's state, held by every observer.

use fusebox_protocol::{
    Commit, Liveness, MatchId, MatchPhase, MatchSnapshot, ParticipantId,
    ProtocolError,
};

/// What applying a frame did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The next frame in sequence.
    InOrder,
    /// Frames were missed; the newer full snapshot replaced the stale one.
    Resynced { missed: u64 },
    /// Older than (or equal to) what the mirror already has. Ignored.
    /// Notices at the current sequence number are not stale.
    Stale,
}

/// An observer's copy of a match.
///
/// Frames carry full snapshots, so the mirror never has to replay events:
/// it just keeps the snapshot with the highest sequence number. A dropped
/// frame is therefore healed by whichever frame arrives next.
#[derive(Debug, Clone)]
pub struct Mirror {
    viewer: Option<ParticipantId>,
    snapshot: MatchSnapshot,
    last_seq: u64,
    gaps: u64,
}

impl Mirror {
    /// A mirror for `viewer`, or for a non-participant spectator if `None`.
    pub fn new(match_id: MatchId, viewer: Option<ParticipantId>) -> Self {
        Self {
            viewer,
            snapshot: MatchSnapshot::empty(match_id),
            last_seq: 0,
            gaps: 0,
        }
    }

    /// Applies a commit frame.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidFrame`] if the frame belongs to a different
    /// match.
    pub fn apply(&mut self, commit: Commit) -> Result<Applied, ProtocolError> {
        if commit.snapshot.match_id != self.snapshot.match_id {
            return Err(ProtocolError::InvalidFrame(format!(
                "frame for {} applied to mirror of {}",
                commit.snapshot.match_id, self.snapshot.match_id
            )));
        }

        // A notice restates the frame it follows. Nothing was skipped.
        if commit.seq == self.last_seq && commit.event.is_notice() {
            self.snapshot = commit.snapshot;
            return Ok(Applied::InOrder);
        }

        if commit.seq <= self.last_seq {
            tracing::trace!(seq = commit.seq, last = self.last_seq, "stale frame ignored");
            return Ok(Applied::Stale);
        }

        // A fresh mirror adopts whatever frame it sees first.
        let missed = if self.last_seq == 0 {
            0
        } else {
            commit.seq - self.last_seq - 1
        };
        self.last_seq = commit.seq;
        self.snapshot = commit.snapshot;

        if missed > 0 {
            self.gaps += 1;
            tracing::warn!(
                viewer = ?self.viewer,
                seq = commit.seq,
                missed,
                "sequence gap, resynced from full snapshot"
            );
            Ok(Applied::Resynced { missed })
        } else {
            Ok(Applied::InOrder)
        }
    }

    pub fn viewer(&self) -> Option<ParticipantId> {
        self.viewer
    }

    pub fn snapshot(&self) -> &MatchSnapshot {
        &self.snapshot
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Number of gaps healed so far.
    pub fn gaps(&self) -> u64 {
        self.gaps
    }

    pub fn phase(&self) -> MatchPhase {
        self.snapshot.phase
    }

    pub fn winner(&self) -> Option<ParticipantId> {
        self.snapshot.winner
    }

    /// `true` if the viewer is holding a live bomb.
    pub fn holds_bomb(&self) -> bool {
        self.viewer.is_some()
            && self.snapshot.bomb.is_active()
            && self.snapshot.bomb.owner == self.viewer
    }

    /// `true` if the viewer is a participant who has not been eliminated.
    pub fn is_alive(&self) -> bool {
        self.viewer.is_some_and(|id| {
            self.snapshot
                .roster
                .iter()
                .any(|p| p.id == id && p.liveness == Liveness::Alive)
        })
    }

    /// Alive participants other than the viewer, in join order.
    pub fn pass_candidates(&self) -> Vec<ParticipantId> {
        self.snapshot
            .alive()
            .into_iter()
            .filter(|id| Some(*id) != self.viewer)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use fusebox_protocol::{BombPhase, BombView, Event, ParticipantView};

    use super::*;

    fn pid(id: u64) -> ParticipantId {
        ParticipantId(id)
    }

    fn frame(seq: u64, owner: u64) -> Commit {
        let mut snapshot = MatchSnapshot::empty(MatchId(1));
        snapshot.phase = MatchPhase::InProgress;
        for id in 1..=3 {
            snapshot.roster.push(ParticipantView {
                id: pid(id),
                liveness: Liveness::Alive,
                connected: true,
                stunned: false,
            });
        }
        snapshot.bomb = BombView {
            owner: Some(pid(owner)),
            phase: BombPhase::Active,
            remaining: None,
            cycle: 1,
            exploded: false,
        };
        Commit {
            seq,
            event: Event::BombReassigned { owner: pid(owner) },
            snapshot,
        }
    }

    #[test]
    fn test_apply_in_order_frames() {
        let mut m = Mirror::new(MatchId(1), Some(pid(2)));

        assert_eq!(m.apply(frame(1, 1)).unwrap(), Applied::InOrder);
        assert_eq!(m.apply(frame(2, 2)).unwrap(), Applied::InOrder);

        assert_eq!(m.last_seq(), 2);
        assert!(m.holds_bomb());
        assert_eq!(m.pass_candidates(), vec![pid(1), pid(3)]);
    }

    #[test]
    fn test_apply_gap_resyncs_from_snapshot() {
        let mut m = Mirror::new(MatchId(1), Some(pid(3)));
        m.apply(frame(1, 1)).unwrap();

        let applied = m.apply(frame(5, 3)).unwrap();

        assert_eq!(applied, Applied::Resynced { missed: 3 });
        assert_eq!(m.gaps(), 1);
        assert!(m.holds_bomb());
    }

    #[test]
    fn test_fresh_mirror_adopts_first_frame_without_gap() {
        let mut m = Mirror::new(MatchId(1), Some(pid(1)));

        assert_eq!(m.apply(frame(9, 1)).unwrap(), Applied::InOrder);
        assert_eq!(m.gaps(), 0);
        assert_eq!(m.last_seq(), 9);
    }

    #[test]
    fn test_apply_stale_frame_is_ignored() {
        let mut m = Mirror::new(MatchId(1), Some(pid(1)));
        m.apply(frame(4, 2)).unwrap();

        assert_eq!(m.apply(frame(3, 1)).unwrap(), Applied::Stale);
        assert_eq!(m.apply(frame(4, 1)).unwrap(), Applied::Stale);
        assert_eq!(m.snapshot().bomb.owner, Some(pid(2)));
    }

    #[test]
    fn test_apply_notice_at_current_seq_is_in_order() {
        let mut m = Mirror::new(MatchId(1), Some(pid(2)));
        m.apply(frame(3, 1)).unwrap();

        let mut defeat = frame(3, 1);
        defeat.event = Event::Defeat { participant: pid(2) };
        let applied = m.apply(defeat).unwrap();

        assert_eq!(applied, Applied::InOrder);
        assert_eq!(m.apply(frame(4, 3)).unwrap(), Applied::InOrder);
        assert_eq!(m.gaps(), 0);
    }

    #[test]
    fn test_fresh_mirror_adopts_sync_before_any_commit() {
        let mut m = Mirror::new(MatchId(1), None);
        let mut sync = frame(0, 1);
        sync.event = Event::Sync;
        sync.snapshot.phase = MatchPhase::Lobby;

        assert_eq!(m.apply(sync).unwrap(), Applied::InOrder);
        assert_eq!(m.snapshot().roster.len(), 3);
        assert_eq!(m.apply(frame(1, 1)).unwrap(), Applied::InOrder);
        assert_eq!(m.gaps(), 0);
    }

    #[test]
    fn test_apply_foreign_match_is_invalid() {
        let mut m = Mirror::new(MatchId(2), None);

        let result = m.apply(frame(1, 1));

        assert!(matches!(result, Err(ProtocolError::InvalidFrame(_))));
        assert_eq!(m.last_seq(), 0);
    }

    #[test]
    fn test_spectator_never_holds_bomb() {
        let mut m = Mirror::new(MatchId(1), None);
        m.apply(frame(1, 1)).unwrap();

        assert!(!m.holds_bomb());
        assert!(!m.is_alive());
        assert_eq!(m.pass_candidates().len(), 3);
    }
}
