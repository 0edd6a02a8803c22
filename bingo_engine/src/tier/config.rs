//! Bet tier configuration.

use std::time::Duration;

use crate::game::BingoNumber;

/// Timing and limits shared by every bet tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierConfig {
    /// Countdown from the first reservation to round start (default: 30s)
    pub countdown: Duration,

    /// Pause between called numbers (default: 4s)
    pub call_interval: Duration,

    /// Window for further winners after the first accepted claim (default: 5s)
    pub grace_period: Duration,

    /// Fewest distinct cards needed to start a round (default: 3)
    pub min_players: usize,

    /// Most cards one user may hold in one tier (default: 2)
    pub max_selections_per_user: usize,

    /// Actor tick period (default: 250ms)
    pub tick_interval: Duration,

    /// Finished rounds kept per tier (default: 20)
    pub history_len: usize,

    /// Seed for the number caller; random when unset
    pub rng_seed: Option<u64>,

    /// Numbers called first every round, for replaying recorded rounds
    pub scripted_calls: Vec<BingoNumber>,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs(30),
            call_interval: Duration::from_millis(4000),
            grace_period: Duration::from_secs(5),
            min_players: 3,
            max_selections_per_user: 2,
            tick_interval: Duration::from_millis(250),
            history_len: 20,
            rng_seed: None,
            scripted_calls: Vec::new(),
        }
    }
}

impl TierConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.countdown.is_zero() {
            return Err("Countdown must be positive".to_string());
        }

        if self.call_interval.is_zero() {
            return Err("Call interval must be positive".to_string());
        }

        if self.tick_interval.is_zero() || self.tick_interval > self.call_interval {
            return Err("Tick interval must be positive and no longer than the call interval".to_string());
        }

        if self.min_players == 0 {
            return Err("Minimum players must be at least 1".to_string());
        }

        if self.max_selections_per_user == 0 {
            return Err("Selection limit must be at least 1".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = TierConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_players, 3);
        assert_eq!(config.max_selections_per_user, 2);
    }

    #[test]
    fn test_tick_longer_than_call_interval_rejected() {
        let config = TierConfig {
            tick_interval: Duration::from_secs(10),
            ..TierConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_min_players_rejected() {
        let config = TierConfig {
            min_players: 0,
            ..TierConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
