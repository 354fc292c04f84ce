//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use prediction_market::db::{DatabaseConfig, DatabaseConfigError};
use prediction_market::settlement::{SettlementConfig, SettlementConfigError};
use std::net::SocketAddr;
use std::str::FromStr;

/// Default HTTP bind address
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Prometheus exporter bind address; metrics are off when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Settlement lock and commit timeouts
    pub settlement: SettlementConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(addr) => addr,
            None => parse_env("SERVER_BIND")?.unwrap_or_else(default_bind),
        };
        let metrics_bind = parse_env("METRICS_BIND")?;

        let mut database = match DatabaseConfig::from_env() {
            Ok(config) => config,
            Err(DatabaseConfigError::MissingUrl) if database_url_override.is_some() => {
                DatabaseConfig::default()
            }
            Err(DatabaseConfigError::MissingUrl) => {
                return Err(ConfigError::MissingRequired {
                    var: "DATABASE_URL".to_string(),
                    hint: "Set DATABASE_URL or pass --db-url".to_string(),
                });
            }
            Err(DatabaseConfigError::InvalidValue { var, value }) => {
                return Err(ConfigError::Invalid {
                    var: var.to_string(),
                    reason: format!("'{value}' is not a valid number"),
                });
            }
        };
        if let Some(url) = database_url_override {
            database.database_url = url;
        }

        let settlement = SettlementConfig::from_env().map_err(
            |SettlementConfigError::InvalidValue { var, value }| ConfigError::Invalid {
                var: var.to_string(),
                reason: format!("'{value}' is not a whole number"),
            },
        )?;

        Ok(ServerConfig {
            bind,
            metrics_bind,
            database,
            settlement,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settlement.lock_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "SETTLEMENT_LOCK_TIMEOUT_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.settlement.commit_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "SETTLEMENT_COMMIT_TIMEOUT_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Must differ from the server bind address ({})", self.bind),
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
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Parse an optional environment variable, rejecting malformed values
fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(value) => value.parse().map(Some).map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("'{value}' could not be parsed"),
        }),
        Err(_) => Ok(None),
    }
}
