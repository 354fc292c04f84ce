//! Tournament data models.

use crate::payout::{FeeConfig, PayoutError, PayoutStructure};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tournament ID type
pub type TournamentId = i64;

/// User ID type
pub type UserId = i64;

/// Tournament lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    /// Accepting entries and stack updates
    Open,
    /// Stacks frozen, awaiting settlement
    Closed,
    /// Settlement in progress
    Settling,
    /// Payouts committed (terminal)
    Settled,
    /// Settlement outcome unknown, needs an operator
    SettlementFailed,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Open => "open",
            TournamentStatus::Closed => "closed",
            TournamentStatus::Settling => "settling",
            TournamentStatus::Settled => "settled",
            TournamentStatus::SettlementFailed => "settlement_failed",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: TournamentStatus) -> bool {
        use TournamentStatus::*;
        matches!(
            (self, next),
            (Open, Closed)
                | (Closed, Settling)
                | (Settling, Settled)
                | (Settling, Closed)
                | (Settling, SettlementFailed)
                | (SettlementFailed, Closed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        *self == TournamentStatus::Settled
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TournamentStatus::Open),
            "closed" => Ok(TournamentStatus::Closed),
            "settling" => Ok(TournamentStatus::Settling),
            "settled" => Ok(TournamentStatus::Settled),
            "settlement_failed" => Ok(TournamentStatus::SettlementFailed),
            other => Err(format!("unknown tournament status: {other}")),
        }
    }
}

/// Tournament configuration supplied at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentConfig {
    /// Tournament name
    pub name: String,
    /// Platform and creator fees
    pub fees: FeeConfig,
    /// Payout curve
    pub payout_structure: PayoutStructure,
    /// User receiving the creator fee
    pub creator_id: Option<UserId>,
}

impl TournamentConfig {
    /// Winner-takes-all tournament with no fees
    pub fn winner_takes_all(name: String) -> Self {
        Self {
            name,
            fees: FeeConfig::zero(),
            payout_structure: PayoutStructure::winner_takes_all(),
            creator_id: None,
        }
    }

    /// Podium tournament (50/30/20) run by a creator
    pub fn podium(name: String, fees: FeeConfig, creator_id: Option<UserId>) -> Self {
        Self {
            name,
            fees,
            payout_structure: PayoutStructure::standard(10),
            creator_id,
        }
    }

    /// Check cross-field rules the individual types can't see
    ///
    /// # Errors
    ///
    /// * `PayoutError::MissingCreator` - Creator fee set without a creator
    pub fn validate(&self) -> Result<(), PayoutError> {
        validate_creator(&self.fees, self.creator_id)
    }
}

pub(crate) fn validate_creator(fees: &FeeConfig, creator_id: Option<UserId>) -> Result<(), PayoutError> {
    if fees.creator_fee_percent() > 0 && creator_id.is_none() {
        return Err(PayoutError::MissingCreator(fees.creator_fee_percent()));
    }
    Ok(())
}

/// Tournament record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub status: TournamentStatus,
    /// Total staked into the tournament
    pub pot_cents: i64,
    pub fees: FeeConfig,
    pub payout_structure: PayoutStructure,
    pub creator_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Tournament {
    /// Build an in-memory record from a config
    pub fn from_config(id: TournamentId, config: TournamentConfig, pot_cents: i64) -> Self {
        Self {
            id,
            name: config.name,
            status: TournamentStatus::Open,
            pot_cents,
            fees: config.fees,
            payout_structure: config.payout_structure,
            creator_id: config.creator_id,
            created_at: Utc::now(),
            closed_at: None,
            settled_at: None,
        }
    }

    /// Same record moved to `status`
    pub fn with_status(mut self, status: TournamentStatus) -> Self {
        self.status = status;
        self
    }
}

/// A participant's entry in one tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub tournament_id: TournamentId,
    pub user_id: UserId,
    /// Final chip count in cents
    pub current_stack: i64,
}

impl Entry {
    pub fn new(tournament_id: TournamentId, user_id: UserId, current_stack: i64) -> Self {
        Self {
            tournament_id,
            user_id,
            current_stack,
        }
    }
}
