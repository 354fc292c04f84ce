//! Wallet manager implementation with double-entry ledger.
#![allow(clippy::needless_raw_string_hashes)]

use super::{
    errors::{WalletError, WalletResult},
    models::{CreditInstruction, EntryDirection, EntryType, Wallet, WalletEntry},
};
use crate::tournament::models::UserId;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;

/// Wallet manager
#[derive(Clone)]
pub struct WalletManager {
    pool: Arc<PgPool>,
}

impl WalletManager {
    /// Create a new wallet manager
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get wallet balance for a user
    ///
    /// # Arguments
    ///
    /// * `user_id` - User ID
    ///
    /// # Returns
    ///
    /// * `WalletResult<Wallet>` - Wallet information or error
    pub async fn get_wallet(&self, user_id: UserId) -> WalletResult<Wallet> {
        let row = sqlx::query(
            r#"
            SELECT user_id, balance, currency, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(WalletError::WalletNotFound(user_id))?;

        Ok(Wallet {
            user_id: row.get("user_id"),
            balance: row.get("balance"),
            currency: row.get("currency"),
            created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
        })
    }

    /// Credit a wallet in its own transaction
    ///
    /// # Returns
    ///
    /// * `WalletResult<i64>` - New wallet balance or error
    pub async fn credit(&self, instruction: &CreditInstruction) -> WalletResult<i64> {
        let mut tx = self.pool.begin().await?;
        let new_balance = self.credit_in_tx(&mut tx, instruction).await?;
        tx.commit().await?;
        Ok(new_balance)
    }

    /// Credit a wallet inside a caller-owned transaction
    ///
    /// The balance change is a relative increment so it composes with
    /// concurrent debits and credits on the same wallet. Nothing is visible
    /// until the caller commits; dropping the transaction discards the credit.
    ///
    /// # Errors
    ///
    /// * `WalletError::InvalidAmount` - Amount is zero or negative
    /// * `WalletError::DuplicateTransaction` - Idempotency key already used
    /// * `WalletError::WalletNotFound` - User has no wallet
    pub async fn credit_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        instruction: &CreditInstruction,
    ) -> WalletResult<i64> {
        if instruction.amount_cents <= 0 {
            return Err(WalletError::InvalidAmount(instruction.amount_cents));
        }

        // Check for duplicate transaction (idempotency)
        let existing = sqlx::query("SELECT id FROM wallet_entries WHERE idempotency_key = $1")
            .bind(&instruction.idempotency_key)
            .fetch_optional(&mut **tx)
            .await?;

        if existing.is_some() {
            return Err(WalletError::DuplicateTransaction(
                instruction.idempotency_key.clone(),
            ));
        }

        let row = sqlx::query(
            "UPDATE wallets
             SET balance = balance + $1, updated_at = NOW()
             WHERE user_id = $2
             RETURNING balance",
        )
        .bind(instruction.amount_cents)
        .bind(instruction.user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(WalletError::WalletNotFound(instruction.user_id))?;

        let new_balance: i64 = row.get("balance");

        self.create_entry(
            tx,
            instruction,
            new_balance,
            EntryDirection::Credit,
        )
        .await?;

        Ok(new_balance)
    }

    /// Whether a ledger entry exists for an idempotency key
    pub async fn entry_exists(&self, idempotency_key: &str) -> WalletResult<bool> {
        let row = sqlx::query("SELECT 1 FROM wallet_entries WHERE idempotency_key = $1")
            .bind(idempotency_key)
            .fetch_optional(self.pool.as_ref())
            .await?;
        Ok(row.is_some())
    }

    /// Create a wallet entry (double-entry ledger)
    async fn create_entry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        instruction: &CreditInstruction,
        balance_after: i64,
        direction: EntryDirection,
    ) -> WalletResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO wallet_entries (user_id, tournament_id, amount, balance_after, direction, entry_type, idempotency_key, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(instruction.user_id)
        .bind(instruction.tournament_id)
        .bind(instruction.amount_cents)
        .bind(balance_after)
        .bind(direction.to_string())
        .bind(instruction.entry_type.to_string())
        .bind(&instruction.idempotency_key)
        .bind(&instruction.description)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.get("id"))
    }

    /// Get wallet entries for a user
    ///
    /// # Arguments
    ///
    /// * `user_id` - User ID
    /// * `limit` - Maximum number of entries to return
    ///
    /// # Returns
    ///
    /// * `WalletResult<Vec<WalletEntry>>` - List of wallet entries
    pub async fn get_entries(&self, user_id: UserId, limit: i64) -> WalletResult<Vec<WalletEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, tournament_id, amount, balance_after, direction, entry_type, idempotency_key, description, created_at
            FROM wallet_entries
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        let entries = rows
            .into_iter()
            .map(|row| -> WalletResult<WalletEntry> {
                let id: i64 = row.get("id");
                let direction: String = row.get("direction");
                let entry_type: String = row.get("entry_type");
                Ok(WalletEntry {
                    id,
                    user_id: row.get("user_id"),
                    tournament_id: row.get("tournament_id"),
                    amount: row.get("amount"),
                    balance_after: row.get("balance_after"),
                    direction: EntryDirection::parse(&direction).ok_or_else(|| {
                        WalletError::CorruptEntry {
                            entry_id: id,
                            column: "direction",
                            value: direction.clone(),
                        }
                    })?,
                    entry_type: EntryType::parse(&entry_type).ok_or_else(|| {
                        WalletError::CorruptEntry {
                            entry_id: id,
                            column: "entry_type",
                            value: entry_type.clone(),
                        }
                    })?,
                    idempotency_key: row.get("idempotency_key"),
                    description: row.get("description"),
                    created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
                })
            })
            .collect::<WalletResult<Vec<_>>>()?;

        Ok(entries)
    }
}
