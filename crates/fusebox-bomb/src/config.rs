//! Fuse configuration.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Inclusive range the fuse length is drawn from on every activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuseConfig {
    pub min: Duration,
    pub max: Duration,
}

impl FuseConfig {
    /// 8 to 12 seconds. The default.
    pub const SHORT: Self = Self {
        min: Duration::from_secs(8),
        max: Duration::from_secs(12),
    };

    /// 15 to 25 seconds, for larger lobbies.
    pub const LONG: Self = Self {
        min: Duration::from_secs(15),
        max: Duration::from_secs(25),
    };

    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Swaps an inverted range and raises a zero lower bound to 1 ms.
    pub fn validated(mut self) -> Self {
        if self.min > self.max {
            tracing::warn!(min = ?self.min, max = ?self.max, "fuse range inverted, swapping");
            std::mem::swap(&mut self.min, &mut self.max);
        }
        if self.min.is_zero() {
            self.min = Duration::from_millis(1);
            self.max = self.max.max(self.min);
        }
        self
    }

    /// Uniform draw in `min..=max` at nanosecond resolution. Bounds past
    /// `u64::MAX` nanoseconds (about 584 years) are clamped.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let lo = u64::try_from(self.min.as_nanos()).unwrap_or(u64::MAX);
        let hi = u64::try_from(self.max.as_nanos()).unwrap_or(u64::MAX);
        if lo >= hi {
            return self.min;
        }
        Duration::from_nanos(rng.random_range(lo..=hi))
    }
}

impl Default for FuseConfig {
    fn default() -> Self {
        Self::SHORT
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_draw_stays_inside_inclusive_range() {
        let cfg = FuseConfig::SHORT;
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..1_000 {
            let d = cfg.draw(&mut rng);
            assert!(d >= cfg.min && d <= cfg.max, "{d:?} out of range");
        }
    }

    #[test]
    fn test_draw_sub_millisecond_bounds_stay_inclusive() {
        let cfg = FuseConfig::new(Duration::from_micros(1_500), Duration::from_micros(1_700));
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..1_000 {
            let d = cfg.draw(&mut rng);
            assert!(d >= cfg.min && d <= cfg.max, "{d:?} out of range");
        }
    }

    #[test]
    fn test_draw_degenerate_range_returns_min() {
        let cfg = FuseConfig::new(Duration::from_secs(3), Duration::from_secs(3));
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(cfg.draw(&mut rng), Duration::from_secs(3));
    }

    #[test]
    fn test_validated_swaps_inverted_range() {
        let cfg = FuseConfig::new(Duration::from_secs(12), Duration::from_secs(8))
            .validated();
        assert_eq!(cfg, FuseConfig::SHORT);
    }

    #[test]
    fn test_fuse_config_deserializes_from_json() {
        let cfg: FuseConfig = serde_json::from_str(
            r#"{ "min": { "secs": 15, "nanos": 0 }, "max": { "secs": 25, "nanos": 0 } }"#,
        )
        .unwrap();
        assert_eq!(cfg, FuseConfig::LONG);
    }
}
