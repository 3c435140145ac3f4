//! Admin tool configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use rust_decimal::Decimal;
use swiss_pairing::db::DatabaseConfig;
use swiss_pairing::ranking::RankingConfig;

/// Most decimal places a percentage may be stored with
const MAX_DECIMAL_PLACES: u32 = 8;

/// Complete configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Tie-break tunables
    pub ranking: RankingConfig,
    /// Fixed seed for random pairing, OS entropy when unset
    pub pairing_seed: Option<u64>,
}

impl AdminConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `seed_override` - Optional pairing seed override (from CLI args)
    ///
    /// # Returns
    ///
    /// * `Result<AdminConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if a ranking variable is set but cannot be parsed
    pub fn from_env(
        database_url_override: Option<String>,
        seed_override: Option<u64>,
    ) -> Result<Self, ConfigError> {
        // Database configuration, URL from the command line wins
        let mut database = DatabaseConfig::from_env();
        if let Some(url) = database_url_override {
            database = database.with_url(url);
        }

        // Ranking tunables must parse when given
        let defaults = RankingConfig::default();
        let ranking = RankingConfig {
            match_win_floor: parse_env_strict("RANKING_MATCH_WIN_FLOOR")?
                .unwrap_or(defaults.match_win_floor),
            decimal_places: parse_env_strict("RANKING_DECIMAL_PLACES")?
                .unwrap_or(defaults.decimal_places),
        };

        let pairing_seed = match seed_override {
            Some(seed) => Some(seed),
            None => parse_env_strict("PAIRING_SEED")?,
        };

        Ok(AdminConfig {
            database,
            ranking,
            pairing_seed,
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        let floor = self.ranking.match_win_floor;
        if floor < Decimal::ZERO || floor > Decimal::ONE {
            return Err(ConfigError::Invalid {
                var: "RANKING_MATCH_WIN_FLOOR".to_string(),
                reason: format!("Must be between 0 and 1, got {floor}"),
            });
        }

        if self.ranking.decimal_places > MAX_DECIMAL_PLACES {
            return Err(ConfigError::Invalid {
                var: "RANKING_DECIMAL_PLACES".to_string(),
                reason: format!("Must be at most {MAX_DECIMAL_PLACES}"),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
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

/// Helper to parse an optional environment variable, rejecting bad values
fn parse_env_strict<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                var: key.to_string(),
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
