//! Wallet data models.

use crate::tournament::models::{TournamentId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wallet model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    /// Balance in cents
    pub balance: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wallet entry model (double-entry ledger)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEntry {
    pub id: i64,
    pub user_id: UserId,
    pub tournament_id: Option<TournamentId>,
    pub amount: i64,
    pub balance_after: i64,
    pub direction: EntryDirection,
    pub entry_type: EntryType,
    pub idempotency_key: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Entry direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryDirection {
    Debit,
    Credit,
}

impl std::fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryDirection::Debit => write!(f, "debit"),
            EntryDirection::Credit => write!(f, "credit"),
        }
    }
}

impl EntryDirection {
    /// `None` for anything the ledger never writes
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "debit" => Some(EntryDirection::Debit),
            "credit" => Some(EntryDirection::Credit),
            _ => None,
        }
    }
}

/// Entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Tournament winnings
    Payout,
    /// Creator's cut of a tournament pot
    CreatorFee,
    Deposit,
    Withdrawal,
    AdminAdjust,
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryType::Payout => write!(f, "payout"),
            EntryType::CreatorFee => write!(f, "creator_fee"),
            EntryType::Deposit => write!(f, "deposit"),
            EntryType::Withdrawal => write!(f, "withdrawal"),
            EntryType::AdminAdjust => write!(f, "admin_adjust"),
        }
    }
}

impl EntryType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "payout" => Some(EntryType::Payout),
            "creator_fee" => Some(EntryType::CreatorFee),
            "deposit" => Some(EntryType::Deposit),
            "withdrawal" => Some(EntryType::Withdrawal),
            "admin_adjust" => Some(EntryType::AdminAdjust),
            _ => None,
        }
    }
}

/// Request to increase a user's balance.
///
/// The ledger applies each instruction at most once per idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditInstruction {
    pub user_id: UserId,
    pub amount_cents: i64,
    pub entry_type: EntryType,
    pub idempotency_key: String,
    pub tournament_id: Option<TournamentId>,
    pub description: Option<String>,
}

impl CreditInstruction {
    /// Winnings credit for a settled tournament
    pub fn payout(tournament_id: TournamentId, user_id: UserId, amount_cents: i64) -> Self {
        Self {
            user_id,
            amount_cents,
            entry_type: EntryType::Payout,
            idempotency_key: format!("settlement:{tournament_id}:payout:{user_id}"),
            tournament_id: Some(tournament_id),
            description: Some(format!("Payout from tournament {tournament_id}")),
        }
    }

    /// Creator fee credit for a settled tournament
    pub fn creator_fee(tournament_id: TournamentId, user_id: UserId, amount_cents: i64) -> Self {
        Self {
            user_id,
            amount_cents,
            entry_type: EntryType::CreatorFee,
            idempotency_key: format!("settlement:{tournament_id}:creator_fee:{user_id}"),
            tournament_id: Some(tournament_id),
            description: Some(format!("Creator fee from tournament {tournament_id}")),
        }
    }
}
