//! In-memory settlement store.
//!
//! Keeps tournaments, entries, wallets, and the ledger behind a single mutex,
//! so a commit is trivially atomic: credits are staged on a copy of the
//! balances and swapped in only when every one of them succeeds. Useful for
//! embedding the engine without Postgres and for exercising failure paths
//! via [`CommitFault`].

use super::store::{AuditEvent, SettlementStore, StoreError, StoreResult};
use crate::payout::PayoutPlan;
use crate::tournament::{Entry, Tournament, TournamentId, TournamentStatus, UserId};
use crate::wallet::{CreditInstruction, EntryDirection, WalletEntry, WalletError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Simulated failure of the next commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitFault {
    /// Connection lost before anything was applied
    LostBeforeApply,
    /// Everything applied, but the acknowledgement never arrived
    LostAfterApply,
}

#[derive(Default)]
struct MemoryState {
    tournaments: HashMap<TournamentId, Tournament>,
    entries: HashMap<TournamentId, Vec<Entry>>,
    plans: HashMap<TournamentId, PayoutPlan>,
    wallets: HashMap<UserId, i64>,
    ledger: Vec<WalletEntry>,
    used_keys: HashSet<String>,
    audit: Vec<AuditEvent>,
    next_fault: Option<CommitFault>,
    commit_delay: Option<Duration>,
}

/// Settlement store held entirely in process memory
#[derive(Default)]
pub struct InMemorySettlementStore {
    state: Mutex<MemoryState>,
}

impl InMemorySettlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a tournament record
    pub fn insert_tournament(&self, tournament: Tournament) {
        self.state().tournaments.insert(tournament.id, tournament);
    }

    /// Insert or replace a user's entry
    pub fn insert_entry(&self, entry: Entry) {
        let mut state = self.state();
        let entries = state.entries.entry(entry.tournament_id).or_default();
        entries.retain(|e| e.user_id != entry.user_id);
        entries.push(entry);
    }

    /// Open a wallet with a starting balance
    pub fn open_wallet(&self, user_id: UserId, balance: i64) {
        self.state().wallets.insert(user_id, balance);
    }

    pub fn remove_wallet(&self, user_id: UserId) {
        self.state().wallets.remove(&user_id);
    }

    pub fn balance(&self, user_id: UserId) -> Option<i64> {
        self.state().wallets.get(&user_id).copied()
    }

    pub fn status(&self, tournament_id: TournamentId) -> Option<TournamentStatus> {
        self.state()
            .tournaments
            .get(&tournament_id)
            .map(|t| t.status)
    }

    /// Every ledger entry, oldest first
    pub fn ledger(&self) -> Vec<WalletEntry> {
        self.state().ledger.clone()
    }

    pub fn audit_events(&self, tournament_id: TournamentId) -> Vec<AuditEvent> {
        self.state()
            .audit
            .iter()
            .filter(|e| e.tournament_id == tournament_id)
            .cloned()
            .collect()
    }

    /// Make the next commit fail the given way
    pub fn fail_next_commit(&self, fault: CommitFault) {
        self.state().next_fault = Some(fault);
    }

    /// Delay every commit, simulating a slow database
    pub fn set_commit_delay(&self, delay: Option<Duration>) {
        self.state().commit_delay = delay;
    }
}

#[async_trait]
impl SettlementStore for InMemorySettlementStore {
    async fn fetch_tournament(&self, tournament_id: TournamentId) -> StoreResult<Tournament> {
        self.state()
            .tournaments
            .get(&tournament_id)
            .cloned()
            .ok_or(StoreError::NotFound(tournament_id))
    }

    async fn fetch_entries(&self, tournament_id: TournamentId) -> StoreResult<Vec<Entry>> {
        let state = self.state();
        if !state.tournaments.contains_key(&tournament_id) {
            return Err(StoreError::NotFound(tournament_id));
        }
        Ok(state
            .entries
            .get(&tournament_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn transition(
        &self,
        tournament_id: TournamentId,
        from: TournamentStatus,
        to: TournamentStatus,
    ) -> StoreResult<()> {
        let mut state = self.state();
        let tournament = state
            .tournaments
            .get_mut(&tournament_id)
            .ok_or(StoreError::NotFound(tournament_id))?;

        if tournament.status != from || !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                tournament_id,
                expected: from,
                actual: tournament.status,
            });
        }

        tournament.status = to;
        if to == TournamentStatus::Closed && tournament.closed_at.is_none() {
            tournament.closed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn commit_settlement(
        &self,
        tournament_id: TournamentId,
        plan: &PayoutPlan,
        credits: &[CreditInstruction],
    ) -> StoreResult<()> {
        let delay = self.state().commit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        let fault = state.next_fault.take();

        let status = state
            .tournaments
            .get(&tournament_id)
            .map(|t| t.status)
            .ok_or(StoreError::NotFound(tournament_id))?;
        if status != TournamentStatus::Settling {
            return Err(StoreError::InvalidTransition {
                tournament_id,
                expected: TournamentStatus::Settling,
                actual: status,
            });
        }

        if fault == Some(CommitFault::LostBeforeApply) {
            return Err(StoreError::CommitOutcomeUnknown(
                "connection lost before commit".to_string(),
            ));
        }

        // Stage every credit; nothing touches `state` until all succeed
        let mut wallets = state.wallets.clone();
        let mut staged_keys = HashSet::new();
        let mut staged_entries = Vec::with_capacity(credits.len());
        let mut next_id = state.ledger.len() as i64 + 1;

        for credit in credits {
            if credit.amount_cents <= 0 {
                return Err(WalletError::InvalidAmount(credit.amount_cents).into());
            }
            if state.used_keys.contains(&credit.idempotency_key)
                || !staged_keys.insert(credit.idempotency_key.clone())
            {
                return Err(WalletError::DuplicateTransaction(credit.idempotency_key.clone()).into());
            }

            let balance = wallets
                .get_mut(&credit.user_id)
                .ok_or(WalletError::WalletNotFound(credit.user_id))?;
            *balance = balance
                .checked_add(credit.amount_cents)
                .ok_or(WalletError::BalanceOverflow(credit.user_id))?;

            staged_entries.push(WalletEntry {
                id: next_id,
                user_id: credit.user_id,
                tournament_id: credit.tournament_id,
                amount: credit.amount_cents,
                balance_after: *balance,
                direction: EntryDirection::Credit,
                entry_type: credit.entry_type,
                idempotency_key: credit.idempotency_key.clone(),
                description: credit.description.clone(),
                created_at: Utc::now(),
            });
            next_id += 1;
        }

        state.wallets = wallets;
        state.used_keys.extend(staged_keys);
        state.ledger.extend(staged_entries);
        state.plans.insert(tournament_id, plan.clone());
        if let Some(tournament) = state.tournaments.get_mut(&tournament_id) {
            tournament.status = TournamentStatus::Settled;
            tournament.settled_at = Some(Utc::now());
        }

        if fault == Some(CommitFault::LostAfterApply) {
            return Err(StoreError::CommitOutcomeUnknown(
                "acknowledgement lost after commit".to_string(),
            ));
        }

        Ok(())
    }

    async fn fetch_settled_plan(
        &self,
        tournament_id: TournamentId,
    ) -> StoreResult<Option<PayoutPlan>> {
        let state = self.state();
        let tournament = state
            .tournaments
            .get(&tournament_id)
            .ok_or(StoreError::NotFound(tournament_id))?;

        if tournament.status != TournamentStatus::Settled {
            return Ok(None);
        }

        state
            .plans
            .get(&tournament_id)
            .cloned()
            .map(Some)
            .ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "tournament {tournament_id} settled without a payout plan"
                ))
            })
    }

    async fn record_audit(&self, event: &AuditEvent) -> StoreResult<()> {
        self.state().audit.push(event.clone());
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
