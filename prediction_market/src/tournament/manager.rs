//! Tournament manager for creating tournaments, tracking entries, and moving
//! them through their lifecycle.

use super::models::{
    Entry, Tournament, TournamentConfig, TournamentId, TournamentStatus, UserId,
};
use crate::payout::{FeeConfig, PayoutError, PayoutPlan, PayoutStructure};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::sync::Arc;
use thiserror::Error;

/// Tournament errors
#[derive(Debug, Error)]
pub enum TournamentError {
    #[error("Tournament not found: {0}")]
    NotFound(TournamentId),

    #[error("Tournament not in correct state: expected {expected}, got {actual}")]
    InvalidState {
        expected: TournamentStatus,
        actual: TournamentStatus,
    },

    #[error("Transition {from} -> {to} is not allowed")]
    InvalidTransition {
        from: TournamentStatus,
        to: TournamentStatus,
    },

    #[error("User {0} already entered")]
    AlreadyEntered(UserId),

    #[error("No entry for user {0}")]
    EntryNotFound(UserId),

    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] PayoutError),

    #[error("Corrupt tournament record: {0}")]
    CorruptRecord(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type TournamentResult<T> = Result<T, TournamentError>;

const TOURNAMENT_COLUMNS: &str = "id, name, status, pot_cents, platform_fee_percent, \
     creator_fee_percent, payout_structure, creator_id, created_at, closed_at, settled_at";

/// Tournament manager
#[derive(Clone)]
pub struct TournamentManager {
    pool: Arc<PgPool>,
}

impl TournamentManager {
    /// Create a new tournament manager
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create a new tournament in the open state
    pub async fn create_tournament(
        &self,
        config: TournamentConfig,
    ) -> TournamentResult<TournamentId> {
        config.validate()?;
        let structure_json = serde_json::to_value(&config.payout_structure)?;

        let row = sqlx::query(
            r#"
            INSERT INTO tournaments (name, status, pot_cents, platform_fee_percent, creator_fee_percent, payout_structure, creator_id)
            VALUES ($1, $2, 0, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&config.name)
        .bind(TournamentStatus::Open.as_str())
        .bind(config.fees.platform_fee_percent() as i16)
        .bind(config.fees.creator_fee_percent() as i16)
        .bind(structure_json)
        .bind(config.creator_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        let id: TournamentId = row.get("id");
        log::info!("Created tournament {} '{}'", id, config.name);
        Ok(id)
    }

    /// Enter a user into an open tournament with an empty stack
    pub async fn add_entry(
        &self,
        tournament_id: TournamentId,
        user_id: UserId,
    ) -> TournamentResult<()> {
        self.require_status(tournament_id, TournamentStatus::Open)
            .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO tournament_entries (tournament_id, user_id, current_stack)
            VALUES ($1, $2, 0)
            ON CONFLICT (tournament_id, user_id) DO NOTHING
            "#,
        )
        .bind(tournament_id)
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(TournamentError::AlreadyEntered(user_id));
        }

        Ok(())
    }

    /// Update a participant's stack while the tournament is open
    pub async fn record_stack(
        &self,
        tournament_id: TournamentId,
        user_id: UserId,
        stack: i64,
    ) -> TournamentResult<()> {
        if stack < 0 {
            return Err(TournamentError::InvalidAmount(stack));
        }

        // The status check and the write happen in one statement so a
        // concurrent close can't slip between them
        let result = sqlx::query(
            r#"
            UPDATE tournament_entries e
            SET current_stack = $1, updated_at = NOW()
            FROM tournaments t
            WHERE t.id = e.tournament_id
              AND e.tournament_id = $2
              AND e.user_id = $3
              AND t.status = 'open'
            "#,
        )
        .bind(stack)
        .bind(tournament_id)
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            self.require_status(tournament_id, TournamentStatus::Open)
                .await?;
            return Err(TournamentError::EntryNotFound(user_id));
        }

        Ok(())
    }

    /// Set the total staked into an open tournament
    pub async fn set_pot(&self, tournament_id: TournamentId, pot_cents: i64) -> TournamentResult<()> {
        if pot_cents < 0 {
            return Err(TournamentError::InvalidAmount(pot_cents));
        }

        let result = sqlx::query("UPDATE tournaments SET pot_cents = $1 WHERE id = $2 AND status = 'open'")
            .bind(pot_cents)
            .bind(tournament_id)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            self.require_status(tournament_id, TournamentStatus::Open)
                .await?;
        }

        Ok(())
    }

    /// Close a tournament; stacks are frozen from here on
    pub async fn close_tournament(&self, tournament_id: TournamentId) -> TournamentResult<()> {
        self.transition(tournament_id, TournamentStatus::Open, TournamentStatus::Closed)
            .await?;
        log::info!("Closed tournament {}", tournament_id);
        Ok(())
    }

    /// Operator recovery: return a failed settlement to closed for retry
    pub async fn reset_failed(&self, tournament_id: TournamentId) -> TournamentResult<()> {
        self.transition(
            tournament_id,
            TournamentStatus::SettlementFailed,
            TournamentStatus::Closed,
        )
        .await?;
        log::warn!(
            "Tournament {} reset from settlement_failed to closed by operator",
            tournament_id
        );
        Ok(())
    }

    /// Compare-and-set the tournament status
    ///
    /// # Errors
    ///
    /// * `TournamentError::InvalidTransition` - State machine forbids `from -> to`
    /// * `TournamentError::InvalidState` - Current status is not `from`
    /// * `TournamentError::NotFound` - No such tournament
    pub async fn transition(
        &self,
        tournament_id: TournamentId,
        from: TournamentStatus,
        to: TournamentStatus,
    ) -> TournamentResult<()> {
        if !from.can_transition_to(to) {
            return Err(TournamentError::InvalidTransition { from, to });
        }

        let result = sqlx::query(
            r#"
            UPDATE tournaments
            SET status = $1,
                closed_at = CASE WHEN $1 = 'closed' THEN COALESCE(closed_at, NOW()) ELSE closed_at END
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(to.as_str())
        .bind(tournament_id)
        .bind(from.as_str())
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            self.require_status(tournament_id, from).await?;
        }

        Ok(())
    }

    /// Get tournament information
    pub async fn get_tournament(&self, tournament_id: TournamentId) -> TournamentResult<Tournament> {
        let row = sqlx::query(&format!(
            "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1"
        ))
        .bind(tournament_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(TournamentError::NotFound(tournament_id))?;

        tournament_from_row(&row)
    }

    /// List tournaments, newest first
    pub async fn list_tournaments(
        &self,
        status_filter: Option<TournamentStatus>,
    ) -> TournamentResult<Vec<Tournament>> {
        let rows = match status_filter {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE status = $1 ORDER BY created_at DESC"
                ))
                .bind(status.as_str())
                .fetch_all(self.pool.as_ref())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {TOURNAMENT_COLUMNS} FROM tournaments ORDER BY created_at DESC"
                ))
                .fetch_all(self.pool.as_ref())
                .await?
            }
        };

        rows.iter().map(tournament_from_row).collect()
    }

    /// Get tournament entries
    pub async fn get_entries(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Entry>> {
        let rows = sqlx::query(
            r#"
            SELECT tournament_id, user_id, current_stack
            FROM tournament_entries
            WHERE tournament_id = $1
            ORDER BY user_id
            "#,
        )
        .bind(tournament_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Entry {
                tournament_id: row.get("tournament_id"),
                user_id: row.get("user_id"),
                current_stack: row.get("current_stack"),
            })
            .collect())
    }

    /// Persisted payout plan of a settled tournament
    pub async fn settled_plan(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Option<PayoutPlan>> {
        let row = sqlx::query("SELECT status, payout_plan FROM tournaments WHERE id = $1")
            .bind(tournament_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(TournamentError::NotFound(tournament_id))?;

        let status = parse_status(row.get("status"))?;
        if status != TournamentStatus::Settled {
            return Ok(None);
        }

        let plan_json: Option<serde_json::Value> = row.get("payout_plan");
        let plan_json = plan_json.ok_or_else(|| {
            TournamentError::CorruptRecord(format!(
                "tournament {tournament_id} settled without a payout plan"
            ))
        })?;

        Ok(Some(serde_json::from_value(plan_json)?))
    }

    async fn require_status(
        &self,
        tournament_id: TournamentId,
        expected: TournamentStatus,
    ) -> TournamentResult<()> {
        let row = sqlx::query("SELECT status FROM tournaments WHERE id = $1")
            .bind(tournament_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(TournamentError::NotFound(tournament_id))?;

        let actual = parse_status(row.get("status"))?;
        if actual != expected {
            return Err(TournamentError::InvalidState { expected, actual });
        }
        Ok(())
    }
}

fn parse_status(raw: String) -> TournamentResult<TournamentStatus> {
    raw.parse().map_err(TournamentError::CorruptRecord)
}

fn tournament_from_row(row: &PgRow) -> TournamentResult<Tournament> {
    let fees = FeeConfig::new(
        row.get::<i16, _>("platform_fee_percent") as i64,
        row.get::<i16, _>("creator_fee_percent") as i64,
    )?;
    let payout_structure: PayoutStructure = serde_json::from_value(row.get("payout_structure"))?;

    Ok(Tournament {
        id: row.get("id"),
        name: row.get("name"),
        status: parse_status(row.get("status"))?,
        pot_cents: row.get("pot_cents"),
        fees,
        payout_structure,
        creator_id: row.get("creator_id"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        closed_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("closed_at")
            .map(|dt| dt.and_utc()),
        settled_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("settled_at")
            .map(|dt| dt.and_utc()),
    })
}
