//! Payout configuration and calculation errors.

use thiserror::Error;

/// Payout errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayoutError {
    /// Pot below zero
    #[error("Invalid pot: {0} cents")]
    NegativePot(i64),

    /// Fee percentages out of range or overshooting 100 combined
    #[error("Invalid fee configuration: platform {platform}%, creator {creator}%")]
    InvalidFeeConfig { platform: i64, creator: i64 },

    /// Fees consumed more than the pot
    #[error("Fees exceed pot: pot {pot}, fees {fees}")]
    NegativeNetPool { pot: i64, fees: i64 },

    /// Rank key is not a positive integer
    #[error("Invalid payout rank: {0:?}")]
    InvalidRank(String),

    /// Percentage outside 0..=100
    #[error("Invalid payout percentage for rank {rank}: {percent}")]
    InvalidPercent { rank: u32, percent: i64 },

    /// Percentages do not sum to exactly 100
    #[error("Payout percentages must sum to 100, got {0}")]
    InvalidPayoutTotal(i64),

    /// No ranks configured
    #[error("Payout structure has no ranks")]
    EmptyPayoutStructure,

    /// A creator fee is configured but nobody receives it
    #[error("Creator fee of {0}% configured without a creator")]
    MissingCreator(u8),
}

/// Result type for payout operations
pub type PayoutResult<T> = Result<T, PayoutError>;
