//! Settlement error types.

use super::store::StoreError;
use crate::payout::PayoutError;
use crate::ranking::RankingError;
use crate::tournament::{TournamentId, TournamentStatus};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// How far a settlement attempt got before it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStage {
    Locking,
    Precondition,
    Ranking,
    Calculating,
    Committing,
    Recovery,
}

impl fmt::Display for SettlementStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SettlementStage::Locking => "locking",
            SettlementStage::Precondition => "precondition",
            SettlementStage::Ranking => "ranking",
            SettlementStage::Calculating => "calculating",
            SettlementStage::Committing => "committing",
            SettlementStage::Recovery => "recovery",
        };
        f.write_str(s)
    }
}

/// Settlement errors
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Tournament not found: {0}")]
    NotFound(TournamentId),

    #[error("Tournament {tournament_id} cannot be settled from state {actual}")]
    InvalidState {
        tournament_id: TournamentId,
        actual: TournamentStatus,
    },

    #[error("Tournament {tournament_id} has an invalid fee configuration: {source}")]
    InvalidFeeConfig {
        tournament_id: TournamentId,
        source: PayoutError,
    },

    #[error("Tournament {tournament_id} has insufficient data: {source}")]
    InsufficientData {
        tournament_id: TournamentId,
        source: RankingError,
    },

    #[error("Timed out after {waited:?} waiting for the settlement lock on tournament {tournament_id}")]
    LockTimeout {
        tournament_id: TournamentId,
        waited: Duration,
    },

    /// Status is settling but no settlement runs in this process. If the
    /// process that flipped it died, `mark_stuck_failed` is the way out.
    #[error(
        "Tournament {tournament_id} is being settled elsewhere; if no settlement is running, mark it failed"
    )]
    InProgress { tournament_id: TournamentId },

    #[error("Tournament {tournament_id} failed while applying payouts (ambiguous: {ambiguous}): {source}")]
    PartialCommit {
        tournament_id: TournamentId,
        /// True when the commit may have gone through; tournament is left in settlement_failed
        ambiguous: bool,
        source: StoreError,
    },

    #[error("Tournament {tournament_id} store error during {stage}: {source}")]
    Store {
        tournament_id: TournamentId,
        stage: SettlementStage,
        source: StoreError,
    },
}

impl SettlementError {
    pub fn tournament_id(&self) -> TournamentId {
        match self {
            SettlementError::NotFound(id) => *id,
            SettlementError::InvalidState { tournament_id, .. }
            | SettlementError::InvalidFeeConfig { tournament_id, .. }
            | SettlementError::InsufficientData { tournament_id, .. }
            | SettlementError::LockTimeout { tournament_id, .. }
            | SettlementError::InProgress { tournament_id }
            | SettlementError::PartialCommit { tournament_id, .. }
            | SettlementError::Store { tournament_id, .. } => *tournament_id,
        }
    }

    /// Stage reached when the error surfaced
    pub fn stage(&self) -> SettlementStage {
        match self {
            SettlementError::NotFound(_)
            | SettlementError::InvalidState { .. }
            | SettlementError::InProgress { .. } => SettlementStage::Precondition,
            SettlementError::LockTimeout { .. } => SettlementStage::Locking,
            SettlementError::InsufficientData { .. } => SettlementStage::Ranking,
            SettlementError::InvalidFeeConfig { .. } => SettlementStage::Calculating,
            SettlementError::PartialCommit { .. } => SettlementStage::Committing,
            SettlementError::Store { stage, .. } => *stage,
        }
    }

    /// Safe to call `settle` again once the other settlement finishes
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SettlementError::LockTimeout { .. } | SettlementError::InProgress { .. }
        )
    }

    /// False means nothing was written; true means an operator must inspect
    pub fn mutation_possible(&self) -> bool {
        matches!(
            self,
            SettlementError::PartialCommit {
                ambiguous: true,
                ..
            }
        ) || matches!(
            self,
            SettlementError::Store { source, .. } if source.is_ambiguous()
        )
    }

    /// Get a client-safe error message that doesn't leak storage details
    pub fn client_message(&self) -> String {
        match self {
            SettlementError::PartialCommit {
                tournament_id,
                ambiguous: true,
                ..
            } => format!(
                "Settlement of tournament {tournament_id} may be partially applied; operator review required"
            ),
            SettlementError::PartialCommit {
                tournament_id,
                ambiguous: false,
                source: StoreError::Wallet(wallet),
            } => format!(
                "Settlement of tournament {tournament_id} rolled back: {}",
                wallet.client_message()
            ),
            SettlementError::PartialCommit { tournament_id, .. } => {
                format!("Settlement of tournament {tournament_id} rolled back")
            }
            SettlementError::Store { tournament_id, stage, .. } => {
                format!("Internal error during {stage} of tournament {tournament_id}")
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for settlement operations
pub type SettlementResult<T> = Result<T, SettlementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_and_retryability() {
        let err = SettlementError::LockTimeout {
            tournament_id: 3,
            waited: Duration::from_secs(5),
        };
        assert_eq!(err.stage(), SettlementStage::Locking);
        assert!(err.is_retryable());
        assert!(!err.mutation_possible());
        assert_eq!(err.tournament_id(), 3);

        let err = SettlementError::InsufficientData {
            tournament_id: 4,
            source: RankingError::NoEntries,
        };
        assert_eq!(err.stage(), SettlementStage::Ranking);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_ambiguous_commit_flags_possible_mutation() {
        let err = SettlementError::PartialCommit {
            tournament_id: 8,
            ambiguous: true,
            source: StoreError::CommitOutcomeUnknown("connection reset".to_string()),
        };
        assert!(err.mutation_possible());
        assert!(!err.is_retryable());
        assert!(err.client_message().contains("operator review"));
        assert!(!err.client_message().contains("connection reset"));
    }

    #[test]
    fn test_rolled_back_commit_is_not_a_mutation() {
        let err = SettlementError::PartialCommit {
            tournament_id: 8,
            ambiguous: false,
            source: StoreError::Wallet(crate::wallet::WalletError::WalletNotFound(55)),
        };
        assert!(!err.mutation_possible());
        assert_eq!(
            err.client_message(),
            "Settlement of tournament 8 rolled back: Wallet not found"
        );
    }
}
