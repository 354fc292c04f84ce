//! Settlement timing configuration.

use crate::db::timeouts::DEFAULT_TRANSACTION_TIMEOUT;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default wait for a tournament's settlement lock (5 seconds)
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Settlement configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettlementConfigError {
    #[error("{var} has invalid value '{value}'")]
    InvalidValue { var: &'static str, value: String },
}

/// Settlement configuration
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// How long a caller waits for another settlement of the same tournament
    pub lock_timeout: Duration,

    /// Upper bound on the atomic commit; exceeding it leaves the outcome unknown
    pub commit_timeout: Duration,
}

impl SettlementConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `SETTLEMENT_LOCK_TIMEOUT_MS`: Lock wait in whole milliseconds (default: 5000)
    /// - `SETTLEMENT_COMMIT_TIMEOUT_SECS`: Commit timeout in whole seconds (default: 10)
    ///
    /// # Errors
    ///
    /// * `SettlementConfigError::InvalidValue` - A variable is set but isn't a whole number
    pub fn from_env() -> Result<Self, SettlementConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, SettlementConfigError> {
        let duration = |var: &'static str, unit: fn(u64) -> Duration, default: Duration| {
            match lookup(var) {
                Some(value) => value
                    .trim()
                    .parse()
                    .map(unit)
                    .map_err(|_| SettlementConfigError::InvalidValue { var, value }),
                None => Ok(default),
            }
        };

        Ok(Self {
            lock_timeout: duration(
                "SETTLEMENT_LOCK_TIMEOUT_MS",
                Duration::from_millis,
                DEFAULT_LOCK_TIMEOUT,
            )?,
            commit_timeout: duration(
                "SETTLEMENT_COMMIT_TIMEOUT_SECS",
                Duration::from_secs,
                DEFAULT_TRANSACTION_TIMEOUT,
            )?,
        })
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            commit_timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }
}
