//! Wallet error types.

use thiserror::Error;

/// Wallet errors
#[derive(Debug, Error)]
pub enum WalletError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Wallet not found
    #[error("Wallet not found for user {0}")]
    WalletNotFound(i64),

    /// Duplicate transaction (idempotency key already used)
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Credit would overflow the balance
    #[error("Balance overflow for user {0}")]
    BalanceOverflow(i64),

    /// Ledger row holds a value this build doesn't know
    #[error("Wallet entry {entry_id} has unknown {column} '{value}'")]
    CorruptEntry {
        entry_id: i64,
        column: &'static str,
        value: String,
    },
}

impl WalletError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database errors are sanitized to prevent information disclosure about
    /// the internal system structure, and user IDs are redacted.
    pub fn client_message(&self) -> String {
        match self {
            WalletError::Database(_) => "Internal server error".to_string(),
            WalletError::WalletNotFound(_) => "Wallet not found".to_string(),
            WalletError::BalanceOverflow(_) => "Balance overflow".to_string(),
            WalletError::CorruptEntry { .. } => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_redacts_user() {
        let err = WalletError::WalletNotFound(1234);
        assert!(err.to_string().contains("1234"));
        assert_eq!(err.client_message(), "Wallet not found");

        let err = WalletError::InvalidAmount(-5);
        assert_eq!(err.client_message(), "Invalid amount: -5");
    }

    #[test]
    fn test_corrupt_entry_names_the_row() {
        let err = WalletError::CorruptEntry {
            entry_id: 17,
            column: "direction",
            value: "sideways".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Wallet entry 17 has unknown direction 'sideways'"
        );
        assert_eq!(err.client_message(), "Internal server error");
    }
}
