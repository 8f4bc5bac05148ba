//! Party bomb: a full Fusebox match played by bots.
//!
//! Usage:
//!   cargo run -p party-bomb -- [--players 5] [--seed 42] [--config match.json]
//!
//! Every frame and proposal makes a round trip through `JsonCodec`, the way
//! it would on a real connection. Set `RUST_LOG=debug` to watch rejected
//! proposals go by.

use std::env;
use std::error::Error;
use std::time::Duration;

use fusebox::prelude::*;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tracing::info;

const HOST: ParticipantId = ParticipantId(1);

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

struct Options {
    players: u64,
    config: MatchConfig,
}

fn parse_args() -> Result<Options, Box<dyn Error>> {
    let mut opts = Options {
        players: 5,
        config: MatchConfig::default(),
    };
    let mut seed = None;
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--players" if i + 1 < args.len() => {
                opts.players = args[i + 1].parse()?;
                i += 2;
            }
            "--seed" if i + 1 < args.len() => {
                seed = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--config" if i + 1 < args.len() => {
                let json = std::fs::read_to_string(&args[i + 1])?;
                opts.config = MatchConfig::from_json_str(&json)?;
                i += 2;
            }
            _ => i += 1,
        }
    }
    if seed.is_some() {
        opts.config.seed = seed;
    }
    Ok(opts)
}

// ---------------------------------------------------------------------------
// Bots
// ---------------------------------------------------------------------------

/// Picks what a bot wants to do right now, if anything.
fn decide<R: Rng + ?Sized>(mirror: &Mirror, rng: &mut R) -> Option<Command> {
    if mirror.phase() != MatchPhase::InProgress || !mirror.is_alive() {
        return None;
    }
    let candidates = mirror.pass_candidates();
    let &target = candidates.choose(rng)?;

    if mirror.holds_bomb() && rng.random_bool(0.6) {
        Some(Command::Pass { target })
    } else if rng.random_bool(0.03) {
        Some(Command::Stun { target })
    } else {
        None
    }
}

/// Plays until game over and returns the winner as this bot saw it.
async fn bot(
    id: ParticipantId,
    handle: MatchHandle,
    mut frames: FrameReceiver,
    mut rng: StdRng,
) -> Result<Option<ParticipantId>, FuseboxError> {
    let codec = JsonCodec;
    let mut mirror = Mirror::new(handle.match_id(), Some(id));
    let mut think = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(commit) = frame else { break };
                let bytes = codec.encode(&commit)?;
                let commit: Commit = codec.decode(&bytes)?;

                match commit.event {
                    Event::Defeat { .. } => info!(bot = %id, "boom, out of the game"),
                    Event::BombPassed { from, to } if to == id => {
                        info!(bot = %id, %from, "caught the bomb");
                    }
                    _ => {}
                }
                mirror.apply(commit)?;
                if mirror.phase() == MatchPhase::GameOver {
                    break;
                }
            }
            _ = think.tick() => {
                if let Some(command) = decide(&mirror, &mut rng) {
                    let bytes = codec.encode(&Proposal::new(id, command))?;
                    handle.propose(codec.decode(&bytes)?).await?;
                }
            }
        }
    }
    Ok(mirror.winner())
}

/// Runs one match with `players` bots and returns the winner.
async fn run_match(
    players: u64,
    config: MatchConfig,
) -> Result<Option<ParticipantId>, Box<dyn Error>> {
    let seed = config.seed;
    let handle = MatchServer::spawn(MatchId(1), HOST, config);

    let mut bots = Vec::new();
    for n in 1..=players {
        let id = ParticipantId(n);
        let (tx, rx) = mpsc::unbounded_channel();
        handle.join(id, tx).await?;
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s ^ n),
            None => StdRng::from_os_rng(),
        };
        bots.push(tokio::spawn(bot(id, handle.clone(), rx, rng)));
    }
    info!(players, "all bots joined, host starting the match");
    handle.propose(Proposal::new(HOST, Command::Start)).await?;

    let mut winner = None;
    for task in bots {
        winner = task.await??.or(winner);
    }

    let snapshot = handle.snapshot().await?;
    handle.shutdown().await?;
    Ok(winner.or(snapshot.winner))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let opts = parse_args()?;
    info!(
        players = opts.players,
        fuse_min = ?opts.config.fuse.min,
        fuse_max = ?opts.config.fuse.max,
        seed = ?opts.config.seed,
        "starting party bomb"
    );

    match run_match(opts.players, opts.config).await? {
        Some(winner) => println!("{winner} is the last one standing"),
        None => println!("nobody survived"),
    }
    Ok(())
}
