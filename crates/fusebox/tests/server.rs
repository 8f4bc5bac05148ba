//! Integration tests for the match server actor.
//!
//! All tests run on paused Tokio time, so fuses burn down as fast as the
//! runtime can auto-advance the clock.

use std::time::Duration;

use fusebox::prelude::*;
use fusebox::roster::RosterError;
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

const MATCH: MatchId = MatchId(7);
const HOST: ParticipantId = ParticipantId(1);

fn pid(id: u64) -> ParticipantId {
    ParticipantId(id)
}

fn config() -> MatchConfig {
    MatchConfig {
        fuse: FuseConfig::new(Duration::from_secs(1), Duration::from_secs(1)),
        reconnect_grace: Duration::from_secs(5),
        seed: Some(5),
        ..Default::default()
    }
}

struct Player {
    id: ParticipantId,
    frames: FrameReceiver,
    mirror: Mirror,
}

async fn join(handle: &MatchHandle, id: u64) -> (Player, Joined) {
    let (tx, rx) = mpsc::unbounded_channel();
    let joined = handle.join(pid(id), tx).await.expect("join should succeed");
    let player = Player {
        id: pid(id),
        frames: rx,
        mirror: Mirror::new(MATCH, Some(pid(id))),
    };
    (player, joined)
}

async fn next_frame(rx: &mut FrameReceiver) -> Commit {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("frame should arrive")
        .expect("channel should stay open")
}

/// Feeds frames into the player's mirror until the match is over.
async fn follow_to_game_over(player: &mut Player) -> Vec<Commit> {
    let mut seen = Vec::new();
    while player.mirror.phase() != MatchPhase::GameOver {
        let commit = next_frame(&mut player.frames).await;
        player.mirror.apply(commit.clone()).expect("frame should apply");
        seen.push(commit);
    }
    seen
}

fn drain(rx: &mut FrameReceiver) -> Vec<Commit> {
    let mut out = Vec::new();
    while let Ok(commit) = rx.try_recv() {
        out.push(commit);
    }
    out
}

// =========================================================================
// Membership
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_join_returns_token_and_snapshot() {
    let handle = MatchServer::spawn(MATCH, HOST, config());

    let (mut host, joined) = join(&handle, 1).await;

    assert_eq!(joined.token.len(), 32);
    assert_eq!(joined.snapshot.roster.len(), 1);
    assert_eq!(joined.snapshot.phase, MatchPhase::Lobby);

    let first = next_frame(&mut host.frames).await;
    assert_eq!(first.event, Event::Joined { participant: HOST });
    assert_eq!(first.seq, 1);
}

#[tokio::test(start_paused = true)]
async fn test_join_is_broadcast_to_existing_participants() {
    let handle = MatchServer::spawn(MATCH, HOST, config());
    let (mut host, _) = join(&handle, 1).await;
    next_frame(&mut host.frames).await;

    join(&handle, 2).await;

    let frame = next_frame(&mut host.frames).await;
    assert_eq!(frame.event, Event::Joined { participant: pid(2) });
    assert_eq!(frame.snapshot.roster.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_join_twice_is_rejected() {
    let handle = MatchServer::spawn(MATCH, HOST, config());
    join(&handle, 1).await;

    let (tx, _rx) = mpsc::unbounded_channel();
    let result = handle.join(HOST, tx).await;

    assert!(matches!(
        result,
        Err(FuseboxError::Match(MatchError::Rejected(Rejection::Roster(
            RosterError::AlreadyJoined(_)
        ))))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_leave_unknown_participant_fails() {
    let handle = MatchServer::spawn(MATCH, HOST, config());

    let result = handle.leave(pid(9)).await;

    assert!(matches!(result, Err(FuseboxError::Match(_))));
}

#[tokio::test(start_paused = true)]
async fn test_late_join_is_refused() {
    let handle = MatchServer::spawn(MATCH, HOST, config());
    let (mut host, _) = join(&handle, 1).await;
    join(&handle, 2).await;
    handle
        .propose(Proposal::new(HOST, Command::Start))
        .await
        .unwrap();
    loop {
        let frame = next_frame(&mut host.frames).await;
        if matches!(frame.event, Event::MatchStarted { .. }) {
            break;
        }
    }

    let (tx, _rx) = mpsc::unbounded_channel();
    let result = handle.join(pid(3), tx).await;

    assert!(matches!(
        result,
        Err(FuseboxError::Match(MatchError::LateJoinClosed(..)))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_then_reconnect_resumes_frames() {
    let handle = MatchServer::spawn(MATCH, HOST, config());
    join(&handle, 1).await;
    let (_p2, joined) = join(&handle, 2).await;

    handle.disconnect(pid(2)).await.unwrap();
    let snap = handle.snapshot().await.unwrap();
    assert!(!snap.roster[1].connected);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = handle.reconnect(joined.token, tx).await.unwrap();

    assert_eq!(id, pid(2));
    let frame = next_frame(&mut rx).await;
    assert_eq!(frame.event, Event::Reconnected { participant: pid(2) });
    assert!(frame.snapshot.roster[1].connected);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_with_bad_token_fails() {
    let handle = MatchServer::spawn(MATCH, HOST, config());
    join(&handle, 1).await;

    let (tx, _rx) = mpsc::unbounded_channel();
    let result = handle.reconnect("not-a-token", tx).await;

    assert!(matches!(
        result,
        Err(FuseboxError::Match(MatchError::Rejected(Rejection::Roster(
            RosterError::InvalidToken
        ))))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_disconnected_participant_is_dropped_after_grace() {
    let handle = MatchServer::spawn(MATCH, HOST, config());
    join(&handle, 1).await;
    join(&handle, 2).await;
    join(&handle, 3).await;

    handle.disconnect(pid(3)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.roster.len(), 2);
    assert!(snap.roster.iter().all(|p| p.id != pid(3)));
}

#[tokio::test(start_paused = true)]
async fn test_leave_by_proposal_stops_frames_and_proposals() {
    let handle = MatchServer::spawn(MATCH, HOST, config());
    join(&handle, 1).await;
    join(&handle, 2).await;
    let (mut quitter, _) = join(&handle, 3).await;

    handle
        .propose(Proposal::new(pid(3), Command::Leave))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let snap = handle.snapshot().await.unwrap();
    assert!(snap.roster.iter().all(|p| p.id != pid(3)));

    let before = drain(&mut quitter.frames);
    assert!(
        before
            .iter()
            .any(|c| c.event == Event::Left { participant: pid(3) })
    );

    // A departed participant can no longer act or listen.
    handle
        .propose(Proposal::new(pid(3), Command::Eliminate { target: pid(3) }))
        .await
        .unwrap();
    handle
        .propose(Proposal::new(HOST, Command::Start))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(handle.snapshot().await.unwrap().phase, MatchPhase::InProgress);
    assert!(drain(&mut quitter.frames).is_empty());
    assert!(quitter.frames.recv().await.is_none(), "channel should be closed");
}

// =========================================================================
// Full matches
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_full_match_ends_with_single_winner() {
    let handle = MatchServer::spawn(MATCH, HOST, config());
    let mut players = Vec::new();
    for id in 1..=3 {
        players.push(join(&handle, id).await.0);
    }

    handle
        .propose(Proposal::new(HOST, Command::Start))
        .await
        .unwrap();
    let host_frames = follow_to_game_over(&mut players[0]).await;

    let winner = players[0].mirror.winner().expect("someone should win");
    assert!(
        host_frames
            .iter()
            .any(|c| matches!(c.event, Event::MatchStarted { .. }))
    );
    let explosions = host_frames
        .iter()
        .filter(|c| matches!(c.event, Event::Exploded { .. }))
        .count();
    assert_eq!(explosions, 2);

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, MatchPhase::GameOver);
    assert_eq!(snap.winner, Some(winner));
    assert_eq!(snap.alive(), vec![winner]);

    // Victory reaches the winner only; each loser gets exactly one Defeat.
    let mut per_player = vec![host_frames];
    for player in &mut players[1..] {
        per_player.push(follow_to_game_over(player).await);
    }
    for (player, frames) in players.iter_mut().zip(per_player.iter_mut()) {
        frames.extend(drain(&mut player.frames));
        let victories = frames
            .iter()
            .filter(|c| matches!(c.event, Event::Victory { .. }))
            .count();
        let defeats = frames
            .iter()
            .filter(|c| matches!(c.event, Event::Defeat { .. }))
            .count();
        if player.id == winner {
            assert_eq!((victories, defeats), (1, 0));
        } else {
            assert_eq!((victories, defeats), (0, 1));
        }
        // Private notices never show up as gaps for anyone else.
        assert_eq!(player.mirror.gaps(), 0, "{} saw a gap", player.id);
    }
}

#[tokio::test(start_paused = true)]
async fn test_observer_follows_without_private_frames() {
    let handle = MatchServer::spawn(MATCH, HOST, config());
    join(&handle, 1).await;
    join(&handle, 2).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    handle.observe(tx).await.unwrap();
    let sync = next_frame(&mut rx).await;
    assert_eq!(sync.event, Event::Sync);
    assert_eq!(sync.snapshot.roster.len(), 2);

    handle
        .propose(Proposal::new(HOST, Command::Start))
        .await
        .unwrap();

    let mut spectator = Mirror::new(MATCH, None);
    spectator.apply(sync).unwrap();
    let mut private = 0;
    while spectator.phase() != MatchPhase::GameOver {
        let commit = next_frame(&mut rx).await;
        if matches!(commit.event, Event::Defeat { .. } | Event::Victory { .. }) {
            private += 1;
        }
        assert_ne!(spectator.apply(commit).unwrap(), Applied::Stale);
    }

    assert_eq!(private, 0);
    assert_eq!(spectator.gaps(), 0);
    assert!(spectator.winner().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_observer_before_first_commit_adopts_sync() {
    let handle = MatchServer::spawn(MATCH, HOST, config());
    let (tx, mut rx) = mpsc::unbounded_channel();
    handle.observe(tx).await.unwrap();

    let mut spectator = Mirror::new(MATCH, None);
    let sync = next_frame(&mut rx).await;
    assert_eq!((sync.seq, &sync.event), (0, &Event::Sync));
    assert_eq!(spectator.apply(sync).unwrap(), Applied::InOrder);

    join(&handle, 1).await;
    join(&handle, 2).await;
    for _ in 0..2 {
        let commit = next_frame(&mut rx).await;
        assert_eq!(spectator.apply(commit).unwrap(), Applied::InOrder);
    }

    assert_eq!(spectator.snapshot().roster.len(), 2);
    assert_eq!(spectator.gaps(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_passes_move_the_bomb() {
    let handle = MatchServer::spawn(
        MATCH,
        HOST,
        MatchConfig {
            fuse: FuseConfig::new(Duration::from_secs(30), Duration::from_secs(30)),
            ..config()
        },
    );
    let (mut host, _) = join(&handle, 1).await;
    join(&handle, 2).await;
    handle
        .propose(Proposal::new(HOST, Command::Start))
        .await
        .unwrap();

    while !host.mirror.snapshot().bomb.is_active() {
        let commit = next_frame(&mut host.frames).await;
        host.mirror.apply(commit).unwrap();
    }
    let holder = host.mirror.snapshot().bomb.owner.unwrap();
    let target = if holder == HOST { pid(2) } else { HOST };

    handle
        .propose(Proposal::new(holder, Command::Pass { target }))
        .await
        .unwrap();
    let frame = next_frame(&mut host.frames).await;

    assert_eq!(frame.event, Event::BombPassed { from: holder, to: target });
    assert_eq!(frame.snapshot.bomb.owner, Some(target));
}

#[tokio::test(start_paused = true)]
async fn test_proposal_from_stranger_is_ignored() {
    let handle = MatchServer::spawn(MATCH, HOST, config());
    join(&handle, 1).await;
    join(&handle, 2).await;

    handle
        .propose(Proposal::new(pid(99), Command::Start))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, MatchPhase::Lobby);
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_makes_handle_unavailable() {
    let handle = MatchServer::spawn(MATCH, HOST, config());
    handle.shutdown().await.unwrap();

    let result = handle.snapshot().await;

    assert!(matches!(result, Err(FuseboxError::Unavailable(MatchId(7)))));
}
