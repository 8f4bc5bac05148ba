//! Match configuration.

use std::time::Duration;

use fusebox_bomb::FuseConfig;
use fusebox_roster::RosterConfig;
use fusebox_tick::TickConfig;
use serde::{Deserialize, Serialize};

use crate::MatchError;

/// Everything a match needs to know before the first participant joins.
///
/// Missing JSON fields fall back to [`MatchConfig::default`], so a config
/// file only has to mention what it changes:
///
/// ```
/// use fusebox_match::MatchConfig;
///
/// let config = MatchConfig::from_json_str(r#"{ "min_players": 3, "seed": 42 }"#).unwrap();
/// assert_eq!(config.min_players, 3);
/// assert_eq!(config.max_players, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Alive participants required before the host may start. At least 2.
    pub min_players: usize,

    /// Roster capacity, eliminated participants included.
    pub max_players: usize,

    /// Range each fuse is drawn from.
    pub fuse: FuseConfig,

    /// Authority steps per second.
    pub step_rate_hz: u32,

    /// How long a disconnected participant keeps their seat.
    pub reconnect_grace: Duration,

    /// How long a melee hit keeps its target from passing.
    pub stun_duration: Duration,

    /// Whether participants may join once the match is in progress.
    pub allow_late_join: bool,

    /// Fixed RNG seed. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 8,
            fuse: FuseConfig::default(),
            step_rate_hz: 30,
            reconnect_grace: Duration::from_secs(30),
            stun_duration: Duration::from_secs(2),
            allow_late_join: false,
            seed: None,
        }
    }
}

impl MatchConfig {
    /// Parses a config from JSON and validates it.
    pub fn from_json_str(s: &str) -> Result<Self, MatchError> {
        let config: Self = serde_json::from_str(s)?;
        Ok(config.validated())
    }

    /// Brings every field into its supported range.
    pub fn validated(mut self) -> Self {
        if self.min_players < 2 {
            tracing::warn!(min_players = self.min_players, "min_players below 2, raising");
            self.min_players = 2;
        }
        if self.max_players < self.min_players {
            tracing::warn!(
                max_players = self.max_players,
                min_players = self.min_players,
                "max_players below min_players, raising"
            );
            self.max_players = self.min_players;
        }
        self.fuse = self.fuse.validated();
        self.step_rate_hz = self.tick_config().step_rate_hz;
        self
    }

    pub fn roster_config(&self) -> RosterConfig {
        RosterConfig {
            max_participants: self.max_players,
            reconnect_grace: self.reconnect_grace,
        }
    }

    pub fn tick_config(&self) -> TickConfig {
        TickConfig::with_rate(self.step_rate_hz).validated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_uses_short_fuse() {
        let config = MatchConfig::default();
        assert_eq!(config.fuse, FuseConfig::SHORT);
        assert!(!config.allow_late_join);
    }

    #[test]
    fn test_validated_raises_min_players() {
        let config = MatchConfig {
            min_players: 1,
            max_players: 1,
            ..Default::default()
        }
        .validated();

        assert_eq!(config.min_players, 2);
        assert_eq!(config.max_players, 2);
    }

    #[test]
    fn test_validated_clamps_step_rate() {
        let fast = MatchConfig {
            step_rate_hz: 1_000,
            ..Default::default()
        }
        .validated();
        let zero = MatchConfig {
            step_rate_hz: 0,
            ..Default::default()
        }
        .validated();

        assert_eq!(fast.step_rate_hz, TickConfig::MAX_STEP_RATE_HZ);
        assert_eq!(zero.step_rate_hz, 1);
    }

    #[test]
    fn test_from_json_str_reads_long_fuse() {
        let json = r#"{
            "fuse": { "min": { "secs": 15, "nanos": 0 }, "max": { "secs": 25, "nanos": 0 } },
            "allow_late_join": true
        }"#;

        let config = MatchConfig::from_json_str(json).unwrap();

        assert_eq!(config.fuse, FuseConfig::LONG);
        assert!(config.allow_late_join);
        assert_eq!(config.step_rate_hz, 30);
    }

    #[test]
    fn test_from_json_str_rejects_garbage() {
        let result = MatchConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(MatchError::Config(_))));
    }

    #[test]
    fn test_roster_config_carries_capacity_and_grace() {
        let config = MatchConfig {
            max_players: 4,
            reconnect_grace: Duration::from_secs(5),
            ..Default::default()
        };

        let roster = config.roster_config();

        assert_eq!(roster.max_participants, 4);
        assert_eq!(roster.reconnect_grace, Duration::from_secs(5));
    }
}
