//! Storage seam between the settlement coordinator and the rest of the system.
//!
//! The coordinator only reads tournaments and entries, flips statuses with
//! compare-and-set semantics, and hands over a payout plan plus credit
//! instructions to be committed atomically. Everything else about storage
//! stays behind [`SettlementStore`].

use crate::db::timeouts::TimeoutError;
use crate::payout::PayoutPlan;
use crate::tournament::{
    Entry, Tournament, TournamentError, TournamentId, TournamentStatus,
};
use crate::wallet::{CreditInstruction, WalletError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Tournament not found: {0}")]
    NotFound(TournamentId),

    #[error("Tournament {tournament_id} expected {expected}, found {actual}")]
    InvalidTransition {
        tournament_id: TournamentId,
        expected: TournamentStatus,
        actual: TournamentStatus,
    },

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    /// The commit was sent but its outcome was never confirmed
    #[error("Commit outcome unknown: {0}")]
    CommitOutcomeUnknown(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether the failed operation may nevertheless have been applied
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            StoreError::CommitOutcomeUnknown(_) | StoreError::Timeout(_)
        )
    }
}

impl From<TournamentError> for StoreError {
    fn from(err: TournamentError) -> Self {
        match err {
            TournamentError::NotFound(id) => StoreError::NotFound(id),
            TournamentError::Database(e) => StoreError::Database(e),
            TournamentError::Serialization(e) => StoreError::Serialization(e),
            other => StoreError::Corrupt(other.to_string()),
        }
    }
}

impl From<TimeoutError> for StoreError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Timeout(d) => StoreError::Timeout(d),
            TimeoutError::Database(e) => StoreError::Database(e),
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Kind of settlement audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    Started,
    Settled,
    Replayed,
    Failed,
    Reset,
}

impl std::fmt::Display for AuditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditKind::Started => "started",
            AuditKind::Settled => "settled",
            AuditKind::Replayed => "replayed",
            AuditKind::Failed => "failed",
            AuditKind::Reset => "reset",
        };
        f.write_str(s)
    }
}

impl AuditKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "started" => Some(AuditKind::Started),
            "settled" => Some(AuditKind::Settled),
            "replayed" => Some(AuditKind::Replayed),
            "failed" => Some(AuditKind::Failed),
            "reset" => Some(AuditKind::Reset),
            _ => None,
        }
    }
}

/// Audit trail record for an irreversible settlement action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub tournament_id: TournamentId,
    pub kind: AuditKind,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(tournament_id: TournamentId, kind: AuditKind, detail: impl Into<String>) -> Self {
        Self {
            tournament_id,
            kind,
            detail: detail.into(),
            at: Utc::now(),
        }
    }
}

/// Tournament, entry, and ledger access needed by settlement
#[async_trait]
pub trait SettlementStore: Send + Sync {
    /// Load a tournament record
    async fn fetch_tournament(&self, tournament_id: TournamentId) -> StoreResult<Tournament>;

    /// Load all entries of a tournament
    async fn fetch_entries(&self, tournament_id: TournamentId) -> StoreResult<Vec<Entry>>;

    /// Move `from -> to`, failing with `InvalidTransition` if the status isn't `from`
    async fn transition(
        &self,
        tournament_id: TournamentId,
        from: TournamentStatus,
        to: TournamentStatus,
    ) -> StoreResult<()>;

    /// Apply every credit, persist the plan, and move `settling -> settled`.
    ///
    /// All or nothing: on error none of the credits may be visible, unless the
    /// error reports itself as ambiguous.
    async fn commit_settlement(
        &self,
        tournament_id: TournamentId,
        plan: &PayoutPlan,
        credits: &[CreditInstruction],
    ) -> StoreResult<()>;

    /// Plan persisted by a completed settlement, if any
    async fn fetch_settled_plan(&self, tournament_id: TournamentId)
    -> StoreResult<Option<PayoutPlan>>;

    /// Append to the settlement audit trail
    async fn record_audit(&self, event: &AuditEvent) -> StoreResult<()>;

    /// Cheap liveness probe
    async fn health_check(&self) -> StoreResult<()>;
}
