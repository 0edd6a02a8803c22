//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use bingo_engine::{db::DatabaseConfig, session::BetAmount, tier::TierConfig};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// PostgreSQL ledger; the in-memory ledger is used when absent
    pub database: Option<DatabaseConfig>,
    /// Card table JSON file
    pub card_table_path: PathBuf,
    /// Stakes spawned at startup and accepted by the API; empty accepts any positive stake
    pub bet_tiers: Vec<BetAmount>,
    /// Round timing and limits shared by every tier
    pub tier: TierConfig,
    /// Opening balance for unknown users of the in-memory ledger
    pub default_wallet_balance: Option<i64>,
    /// Prometheus listener
    pub metrics_bind: Option<SocketAddr>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `cards_override` - Optional card table path override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if a variable is present but cannot be parsed
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        cards_override: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_env("SERVER_BIND")?.unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 6969))),
        };

        let database = database_url_override
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .filter(|url| !url.is_empty())
            .map(|url| -> Result<DatabaseConfig, ConfigError> {
                let defaults = DatabaseConfig::new(url);
                Ok(DatabaseConfig {
                    max_connections: parse_env_or("DB_MAX_CONNECTIONS", defaults.max_connections)?,
                    min_connections: parse_env_or("DB_MIN_CONNECTIONS", defaults.min_connections)?,
                    connection_timeout_secs: parse_env_or(
                        "DB_CONNECTION_TIMEOUT_SECS",
                        defaults.connection_timeout_secs,
                    )?,
                    idle_timeout_secs: parse_env_or("DB_IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs)?,
                    max_lifetime_secs: parse_env_or("DB_MAX_LIFETIME_SECS", defaults.max_lifetime_secs)?,
                    ..defaults
                })
            })
            .transpose()?;

        let card_table_path = match cards_override {
            Some(path) => path,
            None => std::env::var("CARD_TABLE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/cards.json")),
        };

        let bet_tiers = match std::env::var("BET_TIERS") {
            Ok(list) => parse_bet_list(&list)?,
            Err(_) => vec![10, 20, 50, 100],
        };

        let defaults = TierConfig::default();
        let tier = TierConfig {
            countdown: Duration::from_secs(parse_env_or("COUNTDOWN_SECS", defaults.countdown.as_secs())?),
            call_interval: Duration::from_millis(parse_env_or(
                "CALL_INTERVAL_MILLIS",
                defaults.call_interval.as_millis() as u64,
            )?),
            grace_period: Duration::from_secs(parse_env_or(
                "GRACE_PERIOD_SECS",
                defaults.grace_period.as_secs(),
            )?),
            min_players: parse_env_or("MIN_PLAYERS", defaults.min_players)?,
            max_selections_per_user: parse_env_or(
                "MAX_SELECTIONS_PER_USER",
                defaults.max_selections_per_user,
            )?,
            tick_interval: Duration::from_millis(parse_env_or(
                "TICK_MILLIS",
                defaults.tick_interval.as_millis() as u64,
            )?),
            history_len: parse_env_or("ROUND_HISTORY_LEN", defaults.history_len)?,
            ..defaults
        };

        Ok(ServerConfig {
            bind,
            database,
            card_table_path,
            bet_tiers,
            tier,
            default_wallet_balance: parse_env("DEFAULT_WALLET_BALANCE")?,
            metrics_bind: parse_env("METRICS_BIND")?,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(bet) = self.bet_tiers.iter().find(|&&bet| bet <= 0) {
            return Err(ConfigError::Invalid {
                var: "BET_TIERS".to_string(),
                reason: format!("Stake {} must be greater than 0", bet),
            });
        }

        self.tier.validate().map_err(|reason| ConfigError::Invalid {
            var: "tier settings".to_string(),
            reason,
        })?;

        if let Some(database) = &self.database {
            database.validate().map_err(|reason| ConfigError::Invalid {
                var: "DATABASE_URL".to_string(),
                reason,
            })?;
        }

        if self.default_wallet_balance.is_some_and(|balance| balance < 0) {
            return Err(ConfigError::Invalid {
                var: "DEFAULT_WALLET_BALANCE".to_string(),
                reason: "Must not be negative".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn parse_bet_list(list: &str) -> Result<Vec<BetAmount>, ConfigError> {
    let mut bets = list
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<BetAmount>().map_err(|e| ConfigError::Invalid {
                var: "BET_TIERS".to_string(),
                reason: format!("{:?}: {}", item, e),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    bets.sort_unstable();
    bets.dedup();
    Ok(bets)
}

/// Parse an optional environment variable; set but unparsable is an error.
fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError::Invalid {
                    var: key.to_string(),
                    reason: e.to_string(),
                })
        }
        _ => Ok(None),
    }
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_env(key)?.unwrap_or(default))
}
