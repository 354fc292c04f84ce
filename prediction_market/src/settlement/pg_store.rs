//! Postgres-backed settlement store.
#![allow(clippy::needless_raw_string_hashes)]

use super::store::{AuditEvent, AuditKind, SettlementStore, StoreError, StoreResult};
use crate::db::timeouts::{DEFAULT_QUERY_TIMEOUT, with_deadline, with_default_timeout};
use crate::payout::PayoutPlan;
use crate::tournament::{
    Entry, Tournament, TournamentError, TournamentId, TournamentManager, TournamentStatus,
};
use crate::wallet::{CreditInstruction, WalletManager};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::future::Future;
use std::sync::Arc;

/// Settlement store over the tournament tables and the wallet ledger.
///
/// The commit runs in a single transaction: the tournament row is locked with
/// `FOR UPDATE`, every credit goes through [`WalletManager::credit_in_tx`],
/// and the status flips to settled together with the persisted plan.
#[derive(Clone)]
pub struct PgSettlementStore {
    pool: Arc<PgPool>,
    tournaments: TournamentManager,
    wallet: WalletManager,
}

impl PgSettlementStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            tournaments: TournamentManager::new(pool.clone()),
            wallet: WalletManager::new(pool.clone()),
            pool,
        }
    }

    /// Audit trail of a tournament, oldest first
    pub async fn audit_events(&self, tournament_id: TournamentId) -> StoreResult<Vec<AuditEvent>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT tournament_id, kind, detail, created_at
                FROM settlement_audit
                WHERE tournament_id = $1
                ORDER BY id
                "#,
            )
            .bind(tournament_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        rows.into_iter()
            .map(|row| {
                let kind: String = row.get("kind");
                Ok(AuditEvent {
                    tournament_id: row.get("tournament_id"),
                    kind: AuditKind::parse(&kind)
                        .ok_or_else(|| StoreError::Corrupt(format!("unknown audit kind {kind}")))?,
                    detail: row.get("detail"),
                    at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
                })
            })
            .collect()
    }
}

/// Bound a tournament query by the default query timeout
async fn bounded<T>(future: impl Future<Output = Result<T, TournamentError>>) -> StoreResult<T> {
    with_deadline(
        DEFAULT_QUERY_TIMEOUT,
        async { future.await.map_err(StoreError::from) },
        StoreError::Timeout,
    )
    .await
}

#[async_trait]
impl SettlementStore for PgSettlementStore {
    async fn fetch_tournament(&self, tournament_id: TournamentId) -> StoreResult<Tournament> {
        bounded(self.tournaments.get_tournament(tournament_id)).await
    }

    async fn fetch_entries(&self, tournament_id: TournamentId) -> StoreResult<Vec<Entry>> {
        // Entries alone can't tell an empty tournament from a missing one
        self.fetch_tournament(tournament_id).await?;
        bounded(self.tournaments.get_entries(tournament_id)).await
    }

    async fn transition(
        &self,
        tournament_id: TournamentId,
        from: TournamentStatus,
        to: TournamentStatus,
    ) -> StoreResult<()> {
        let result = with_deadline(
            DEFAULT_QUERY_TIMEOUT,
            async { Ok(self.tournaments.transition(tournament_id, from, to).await) },
            StoreError::Timeout,
        )
        .await?;

        match result {
            Err(TournamentError::InvalidState { expected, actual }) => {
                Err(StoreError::InvalidTransition {
                    tournament_id,
                    expected,
                    actual,
                })
            }
            other => other.map_err(StoreError::from),
        }
    }

    async fn commit_settlement(
        &self,
        tournament_id: TournamentId,
        plan: &PayoutPlan,
        credits: &[CreditInstruction],
    ) -> StoreResult<()> {
        let plan_json = serde_json::to_value(plan)?;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT status FROM tournaments WHERE id = $1 FOR UPDATE")
            .bind(tournament_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound(tournament_id))?;

        let actual: TournamentStatus = row
            .get::<String, _>("status")
            .parse()
            .map_err(StoreError::Corrupt)?;
        if actual != TournamentStatus::Settling {
            return Err(StoreError::InvalidTransition {
                tournament_id,
                expected: TournamentStatus::Settling,
                actual,
            });
        }

        // Any error below drops `tx`, which rolls every credit back
        for credit in credits {
            self.wallet.credit_in_tx(&mut tx, credit).await?;
        }

        sqlx::query(
            r#"
            UPDATE tournaments
            SET status = $1, settled_at = NOW(), payout_plan = $2
            WHERE id = $3
            "#,
        )
        .bind(TournamentStatus::Settled.as_str())
        .bind(plan_json)
        .bind(tournament_id)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::CommitOutcomeUnknown(e.to_string()))?;

        log::info!(
            "Committed settlement of tournament {} with {} credits",
            tournament_id,
            credits.len()
        );
        Ok(())
    }

    async fn fetch_settled_plan(
        &self,
        tournament_id: TournamentId,
    ) -> StoreResult<Option<PayoutPlan>> {
        bounded(self.tournaments.settled_plan(tournament_id)).await
    }

    async fn record_audit(&self, event: &AuditEvent) -> StoreResult<()> {
        with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO settlement_audit (tournament_id, kind, detail, created_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(event.tournament_id)
            .bind(event.kind.to_string())
            .bind(&event.detail)
            .bind(event.at.naive_utc())
            .execute(self.pool.as_ref()),
        )
        .await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        with_default_timeout(sqlx::query("SELECT 1").execute(self.pool.as_ref())).await?;
        Ok(())
    }
}
