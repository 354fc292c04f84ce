//! Settlement transaction coordinator.

use super::{
    config::SettlementConfig,
    errors::{SettlementError, SettlementResult, SettlementStage},
    lock::SettlementLocks,
    store::{AuditEvent, AuditKind, SettlementStore, StoreError},
};
use crate::db::timeouts::with_deadline;
use crate::payout::{PayoutPlan, compute_payouts};
use crate::ranking::resolve_ranking;
use crate::tournament::models::validate_creator;
use crate::tournament::{Tournament, TournamentId, TournamentStatus};
use crate::wallet::CreditInstruction;
use std::sync::Arc;
use std::time::Instant;

/// Credits that pay out a plan: one per paid winner, plus the creator fee
pub fn credit_instructions(tournament: &Tournament, plan: &PayoutPlan) -> Vec<CreditInstruction> {
    let mut credits: Vec<CreditInstruction> = plan
        .winners
        .iter()
        .filter(|w| w.amount_cents > 0)
        .map(|w| CreditInstruction::payout(tournament.id, w.user_id, w.amount_cents))
        .collect();

    if let Some(creator_id) = tournament.creator_id.filter(|_| plan.creator_cents > 0) {
        credits.push(CreditInstruction::creator_fee(
            tournament.id,
            creator_id,
            plan.creator_cents,
        ));
    }

    credits
}

/// Runs settlements: one at a time per tournament, each committed exactly once.
///
/// The pipeline is lock, load, rank, calculate, flip `closed -> settling`,
/// then one atomic commit of every credit plus the flip to `settled`. Ranking
/// and calculation happen before the flip, so a bad configuration or an empty
/// tournament leaves no trace besides the error.
pub struct SettlementCoordinator {
    store: Arc<dyn SettlementStore>,
    locks: SettlementLocks,
    config: SettlementConfig,
}

impl SettlementCoordinator {
    pub fn new(store: Arc<dyn SettlementStore>, config: SettlementConfig) -> Self {
        Self {
            store,
            locks: SettlementLocks::new(),
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn SettlementStore> {
        &self.store
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Settle a closed tournament.
    ///
    /// Settling an already settled tournament returns the stored plan without
    /// paying anything again.
    ///
    /// # Errors
    ///
    /// * `SettlementError::InvalidState` - Tournament is open or awaiting operator reset
    /// * `SettlementError::InProgress` - Another process holds the tournament in settling
    /// * `SettlementError::LockTimeout` - Another settlement here did not finish in time
    /// * `SettlementError::InsufficientData` - No entries, or malformed stacks
    /// * `SettlementError::InvalidFeeConfig` - Fees or payout curve can't be applied
    /// * `SettlementError::PartialCommit` - The commit failed; see `ambiguous`
    pub async fn settle(&self, tournament_id: TournamentId) -> SettlementResult<PayoutPlan> {
        let started = Instant::now();
        let _guard = self
            .locks
            .acquire(tournament_id, self.config.lock_timeout)
            .await
            .map_err(|waited| SettlementError::LockTimeout {
                tournament_id,
                waited,
            })?;

        let tournament = self
            .store
            .fetch_tournament(tournament_id)
            .await
            .map_err(|e| precondition_error(tournament_id, e))?;

        match tournament.status {
            TournamentStatus::Closed => {}
            TournamentStatus::Settled => return self.replay(tournament_id).await,
            TournamentStatus::Settling => {
                return Err(SettlementError::InProgress { tournament_id });
            }
            actual @ (TournamentStatus::Open | TournamentStatus::SettlementFailed) => {
                return Err(SettlementError::InvalidState {
                    tournament_id,
                    actual,
                });
            }
        }

        let entries = self
            .store
            .fetch_entries(tournament_id)
            .await
            .map_err(|e| precondition_error(tournament_id, e))?;

        let ranked = resolve_ranking(&entries).map_err(|source| {
            SettlementError::InsufficientData {
                tournament_id,
                source,
            }
        })?;

        let plan = validate_creator(&tournament.fees, tournament.creator_id)
            .and_then(|()| {
                compute_payouts(
                    tournament.pot_cents,
                    &tournament.fees,
                    &tournament.payout_structure,
                    &ranked,
                )
            })
            .map_err(|source| SettlementError::InvalidFeeConfig {
                tournament_id,
                source,
            })?;
        let credits = credit_instructions(&tournament, &plan);

        if let Err(err) = self
            .store
            .transition(
                tournament_id,
                TournamentStatus::Closed,
                TournamentStatus::Settling,
            )
            .await
        {
            return match err {
                // Another process won the race between our read and the flip
                StoreError::InvalidTransition {
                    actual: TournamentStatus::Settling,
                    ..
                } => Err(SettlementError::InProgress { tournament_id }),
                StoreError::InvalidTransition {
                    actual: TournamentStatus::Settled,
                    ..
                } => self.replay(tournament_id).await,
                StoreError::InvalidTransition { actual, .. } => {
                    Err(SettlementError::InvalidState {
                        tournament_id,
                        actual,
                    })
                }
                other => Err(precondition_error(tournament_id, other)),
            };
        }

        // Only once the flip is ours; a lost race leaves no trail
        let started_event = AuditEvent::new(
            tournament_id,
            AuditKind::Started,
            format!(
                "pot={} entries={} credits={}",
                plan.pool_cents,
                entries.len(),
                credits.len()
            ),
        );
        if let Err(source) = self.store.record_audit(&started_event).await {
            self.release_settling(tournament_id).await;
            return Err(SettlementError::Store {
                tournament_id,
                stage: SettlementStage::Precondition,
                source,
            });
        }

        log::info!(
            "Settling tournament {}: pot={} platform={} creator={} net={} winners={}",
            tournament_id,
            plan.pool_cents,
            plan.platform_cents,
            plan.creator_cents,
            plan.net_pool_cents,
            plan.winners.len()
        );

        let commit = with_deadline(
            self.config.commit_timeout,
            self.store.commit_settlement(tournament_id, &plan, &credits),
            StoreError::Timeout,
        )
        .await;

        match commit {
            Ok(()) => {
                self.finish(tournament_id, &plan, started).await;
                Ok(plan)
            }
            Err(source) => self.recover(tournament_id, plan, source, started).await,
        }
    }

    /// Operator recovery: move a tournament from settlement_failed back to closed.
    ///
    /// Whoever calls this must first have reconciled the ledger against the
    /// tournament; the next `settle` pays out from scratch and relies on the
    /// ledger's idempotency keys to reject anything already credited.
    pub async fn reset_failed(&self, tournament_id: TournamentId) -> SettlementResult<()> {
        let _guard = self
            .locks
            .acquire(tournament_id, self.config.lock_timeout)
            .await
            .map_err(|waited| SettlementError::LockTimeout {
                tournament_id,
                waited,
            })?;

        self.store
            .transition(
                tournament_id,
                TournamentStatus::SettlementFailed,
                TournamentStatus::Closed,
            )
            .await
            .map_err(|err| match err {
                StoreError::NotFound(id) => SettlementError::NotFound(id),
                StoreError::InvalidTransition { actual, .. } => SettlementError::InvalidState {
                    tournament_id,
                    actual,
                },
                other => SettlementError::Store {
                    tournament_id,
                    stage: SettlementStage::Recovery,
                    source: other,
                },
            })?;

        log::warn!(
            "Tournament {} reset from settlement_failed to closed by operator",
            tournament_id
        );
        self.audit(AuditEvent::new(
            tournament_id,
            AuditKind::Reset,
            "settlement_failed -> closed",
        ))
        .await;
        Ok(())
    }

    /// Operator recovery: give up on a tournament left in settling.
    ///
    /// A process that dies between the flip to settling and its commit leaves
    /// the tournament there, and every later `settle` answers `InProgress`.
    /// This moves it to settlement_failed so it can be reconciled and then
    /// `reset_failed`. It waits for this process's lock first, so it never
    /// cuts off a settlement running here; the operator must make sure no
    /// other process is still settling the tournament.
    ///
    /// # Errors
    ///
    /// * `SettlementError::InvalidState` - Tournament is not in settling
    /// * `SettlementError::LockTimeout` - A settlement here is still running
    pub async fn mark_stuck_failed(&self, tournament_id: TournamentId) -> SettlementResult<()> {
        let _guard = self
            .locks
            .acquire(tournament_id, self.config.lock_timeout)
            .await
            .map_err(|waited| SettlementError::LockTimeout {
                tournament_id,
                waited,
            })?;

        self.store
            .transition(
                tournament_id,
                TournamentStatus::Settling,
                TournamentStatus::SettlementFailed,
            )
            .await
            .map_err(|err| match err {
                StoreError::NotFound(id) => SettlementError::NotFound(id),
                StoreError::InvalidTransition { actual, .. } => SettlementError::InvalidState {
                    tournament_id,
                    actual,
                },
                other => SettlementError::Store {
                    tournament_id,
                    stage: SettlementStage::Recovery,
                    source: other,
                },
            })?;

        log::warn!(
            "Tournament {} moved from settling to settlement_failed by operator",
            tournament_id
        );
        self.audit(AuditEvent::new(
            tournament_id,
            AuditKind::Failed,
            "settling -> settlement_failed by operator",
        ))
        .await;
        Ok(())
    }

    /// Plan persisted by a completed settlement, or `None` if not settled yet
    pub async fn settlement_plan(
        &self,
        tournament_id: TournamentId,
    ) -> SettlementResult<Option<PayoutPlan>> {
        self.store
            .fetch_settled_plan(tournament_id)
            .await
            .map_err(|e| precondition_error(tournament_id, e))
    }

    async fn replay(&self, tournament_id: TournamentId) -> SettlementResult<PayoutPlan> {
        let plan = self
            .store
            .fetch_settled_plan(tournament_id)
            .await
            .map_err(|e| precondition_error(tournament_id, e))?
            .ok_or_else(|| SettlementError::Store {
                tournament_id,
                stage: SettlementStage::Precondition,
                source: StoreError::Corrupt(format!(
                    "tournament {tournament_id} reported settled without a plan"
                )),
            })?;

        log::info!(
            "Tournament {} already settled; returning stored plan",
            tournament_id
        );
        self.audit(AuditEvent::new(
            tournament_id,
            AuditKind::Replayed,
            "returned stored plan",
        ))
        .await;
        Ok(plan)
    }

    async fn finish(&self, tournament_id: TournamentId, plan: &PayoutPlan, started: Instant) {
        if plan.unallocated_cents > 0 {
            log::warn!(
                "Tournament {} left {} cents unallocated; reverting to platform",
                tournament_id,
                plan.unallocated_cents
            );
        }

        log::info!(
            "Settled tournament {} in {:?}: paid {} winners, unallocated {}",
            tournament_id,
            started.elapsed(),
            plan.winners.len(),
            plan.unallocated_cents
        );

        self.audit(AuditEvent::new(
            tournament_id,
            AuditKind::Settled,
            format!(
                "distributed={} platform={} creator={} unallocated={}",
                plan.distributed_cents(),
                plan.platform_cents,
                plan.creator_cents,
                plan.unallocated_cents
            ),
        ))
        .await;
    }

    /// Decide what a failed commit left behind
    async fn recover(
        &self,
        tournament_id: TournamentId,
        plan: PayoutPlan,
        source: StoreError,
        started: Instant,
    ) -> SettlementResult<PayoutPlan> {
        let ambiguous = source.is_ambiguous();
        let target = if ambiguous {
            TournamentStatus::SettlementFailed
        } else {
            TournamentStatus::Closed
        };

        match self
            .store
            .transition(tournament_id, TournamentStatus::Settling, target)
            .await
        {
            Ok(()) => {}
            // The commit landed; only its acknowledgement was lost
            Err(StoreError::InvalidTransition {
                actual: TournamentStatus::Settled,
                ..
            }) if ambiguous => {
                log::warn!(
                    "Tournament {} commit reported '{}' but is recorded as settled",
                    tournament_id,
                    source
                );
                self.finish(tournament_id, &plan, started).await;
                return Ok(plan);
            }
            Err(err) if ambiguous => {
                // Credits may have landed; that outweighs the failed status write
                log::error!(
                    "Tournament {} stuck in settling: commit outcome unknown ({}) and moving to {} failed ({})",
                    tournament_id,
                    source,
                    target,
                    err
                );
                return Err(SettlementError::PartialCommit {
                    tournament_id,
                    ambiguous: true,
                    source,
                });
            }
            Err(err) => {
                log::error!(
                    "Tournament {} stuck in settling: commit rolled back ({}) and moving to {} failed ({})",
                    tournament_id,
                    source,
                    target,
                    err
                );
                return Err(SettlementError::Store {
                    tournament_id,
                    stage: SettlementStage::Recovery,
                    source: err,
                });
            }
        }

        log::error!(
            "Settlement of tournament {} failed (ambiguous: {}), now {}: {}",
            tournament_id,
            ambiguous,
            target,
            source
        );
        self.audit(AuditEvent::new(
            tournament_id,
            AuditKind::Failed,
            format!("{target}: {source}"),
        ))
        .await;

        Err(SettlementError::PartialCommit {
            tournament_id,
            ambiguous,
            source,
        })
    }

    /// Undo our own flip to settling before anything was committed
    async fn release_settling(&self, tournament_id: TournamentId) {
        if let Err(e) = self
            .store
            .transition(
                tournament_id,
                TournamentStatus::Settling,
                TournamentStatus::Closed,
            )
            .await
        {
            log::error!(
                "Tournament {} left in settling: reverting to closed failed: {}",
                tournament_id,
                e
            );
        }
    }

    /// Record an audit event after the fact; failures are logged, never surfaced
    async fn audit(&self, event: AuditEvent) {
        if let Err(e) = self.store.record_audit(&event).await {
            log::error!(
                "Failed to record {} audit event for tournament {}: {}",
                event.kind,
                event.tournament_id,
                e
            );
        }
    }
}

fn precondition_error(tournament_id: TournamentId, err: StoreError) -> SettlementError {
    match err {
        StoreError::NotFound(id) => SettlementError::NotFound(id),
        source => SettlementError::Store {
            tournament_id,
            stage: SettlementStage::Precondition,
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payout::{FeeConfig, PayoutStructure};
    use crate::settlement::memory::{CommitFault, InMemorySettlementStore};
    use crate::settlement::store::StoreResult;
    use crate::tournament::{Entry, TournamentConfig};
    use crate::wallet::EntryType;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    const TID: TournamentId = 7;

    fn podium() -> PayoutStructure {
        PayoutStructure::new([(1, 70), (2, 20), (3, 10)]).unwrap()
    }

    /// Closed tournament with pot 1000, no fees, three distinct stacks
    fn store_with(stacks: &[(i64, i64)], status: TournamentStatus) -> Arc<InMemorySettlementStore> {
        let store = Arc::new(InMemorySettlementStore::new());
        let config = TournamentConfig {
            name: "Weekend Cup".to_string(),
            fees: FeeConfig::zero(),
            payout_structure: podium(),
            creator_id: None,
        };
        store.insert_tournament(Tournament::from_config(TID, config, 1000).with_status(status));
        for &(user_id, stack) in stacks {
            store.insert_entry(Entry::new(TID, user_id, stack));
            store.open_wallet(user_id, 0);
        }
        store
    }

    fn coordinator(store: Arc<InMemorySettlementStore>) -> SettlementCoordinator {
        SettlementCoordinator::new(store, SettlementConfig::default())
    }

    #[tokio::test]
    async fn test_settle_pays_winners() {
        let store = store_with(&[(1, 500), (2, 300), (3, 100)], TournamentStatus::Closed);
        let plan = coordinator(store.clone()).settle(TID).await.unwrap();

        assert_eq!(plan.payout_for(1), Some(700));
        assert_eq!(plan.payout_for(2), Some(200));
        assert_eq!(plan.payout_for(3), Some(100));
        assert_eq!(store.balance(1), Some(700));
        assert_eq!(store.balance(3), Some(100));
        assert_eq!(store.status(TID), Some(TournamentStatus::Settled));

        let kinds: Vec<_> = store.audit_events(TID).iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![AuditKind::Started, AuditKind::Settled]);
    }

    #[tokio::test]
    async fn test_settle_twice_pays_once() {
        let store = store_with(&[(1, 500), (2, 300), (3, 100)], TournamentStatus::Closed);
        let coordinator = coordinator(store.clone());

        let first = coordinator.settle(TID).await.unwrap();
        let second = coordinator.settle(TID).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.ledger().len(), 3);
        assert_eq!(store.balance(1), Some(700));
        assert_eq!(
            store.audit_events(TID).last().map(|e| e.kind),
            Some(AuditKind::Replayed)
        );
    }

    #[tokio::test]
    async fn test_concurrent_settles_credit_once() {
        let store = store_with(&[(1, 500), (2, 300), (3, 100)], TournamentStatus::Closed);
        let coordinator = Arc::new(coordinator(store.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.settle(TID).await })
            })
            .collect();

        for handle in handles {
            let plan = handle.await.unwrap().unwrap();
            assert_eq!(plan.payout_for(1), Some(700));
        }
        assert_eq!(store.ledger().len(), 3);
        assert_eq!(store.balance(2), Some(200));
    }

    #[tokio::test]
    async fn test_open_tournament_rejected_without_mutation() {
        let store = store_with(&[(1, 500), (2, 300)], TournamentStatus::Open);
        let err = coordinator(store.clone()).settle(TID).await.unwrap_err();

        assert!(matches!(
            err,
            SettlementError::InvalidState {
                actual: TournamentStatus::Open,
                ..
            }
        ));
        assert!(!err.mutation_possible());
        assert_eq!(store.status(TID), Some(TournamentStatus::Open));
        assert!(store.ledger().is_empty());
        assert!(store.audit_events(TID).is_empty());
    }

    #[tokio::test]
    async fn test_missing_tournament() {
        let store = Arc::new(InMemorySettlementStore::new());
        let err = coordinator(store).settle(404).await.unwrap_err();
        assert!(matches!(err, SettlementError::NotFound(404)));
    }

    #[tokio::test]
    async fn test_no_entries_is_insufficient_data() {
        let store = store_with(&[], TournamentStatus::Closed);
        let err = coordinator(store.clone()).settle(TID).await.unwrap_err();

        assert!(matches!(err, SettlementError::InsufficientData { .. }));
        assert_eq!(err.stage(), SettlementStage::Ranking);
        assert_eq!(store.status(TID), Some(TournamentStatus::Closed));
    }

    #[tokio::test]
    async fn test_negative_pot_is_invalid_config() {
        let store = store_with(&[(1, 10)], TournamentStatus::Closed);
        let mut tournament = store.fetch_tournament(TID).await.unwrap();
        tournament.pot_cents = -5;
        store.insert_tournament(tournament);

        let err = coordinator(store.clone()).settle(TID).await.unwrap_err();
        assert!(matches!(err, SettlementError::InvalidFeeConfig { .. }));
        assert_eq!(store.status(TID), Some(TournamentStatus::Closed));
    }

    #[tokio::test]
    async fn test_creator_fee_is_credited() {
        let store = store_with(&[(1, 500), (2, 300), (3, 100)], TournamentStatus::Closed);
        let config = TournamentConfig::podium(
            "Creator Cup".to_string(),
            FeeConfig::new(10, 5).unwrap(),
            Some(42),
        );
        store.insert_tournament(
            Tournament::from_config(TID, config, 1000).with_status(TournamentStatus::Closed),
        );
        store.open_wallet(42, 0);

        let plan = coordinator(store.clone()).settle(TID).await.unwrap();
        assert_eq!(plan.platform_cents, 100);
        assert_eq!(plan.creator_cents, 50);
        assert_eq!(store.balance(42), Some(50));
        assert!(
            store
                .ledger()
                .iter()
                .any(|e| e.user_id == 42 && e.entry_type == EntryType::CreatorFee)
        );
    }

    #[tokio::test]
    async fn test_credit_failure_rolls_back_to_closed() {
        let store = store_with(&[(1, 500), (2, 300), (3, 100)], TournamentStatus::Closed);
        store.remove_wallet(3);

        let err = coordinator(store.clone()).settle(TID).await.unwrap_err();
        assert!(matches!(
            err,
            SettlementError::PartialCommit {
                ambiguous: false,
                ..
            }
        ));
        assert!(!err.mutation_possible());
        assert_eq!(store.status(TID), Some(TournamentStatus::Closed));
        assert_eq!(store.balance(1), Some(0));
        assert!(store.ledger().is_empty());

        // Fix the wallet and retry
        store.open_wallet(3, 0);
        let plan = coordinator(store.clone()).settle(TID).await.unwrap();
        assert_eq!(plan.payout_for(3), Some(100));
        assert_eq!(store.ledger().len(), 3);
    }

    #[tokio::test]
    async fn test_ambiguous_commit_needs_operator_reset() {
        let store = store_with(&[(1, 500), (2, 300), (3, 100)], TournamentStatus::Closed);
        let coordinator = coordinator(store.clone());
        store.fail_next_commit(CommitFault::LostBeforeApply);

        let err = coordinator.settle(TID).await.unwrap_err();
        assert!(matches!(
            err,
            SettlementError::PartialCommit {
                ambiguous: true,
                ..
            }
        ));
        assert!(err.mutation_possible());
        assert_eq!(store.status(TID), Some(TournamentStatus::SettlementFailed));

        // Not retried automatically
        let err = coordinator.settle(TID).await.unwrap_err();
        assert!(matches!(
            err,
            SettlementError::InvalidState {
                actual: TournamentStatus::SettlementFailed,
                ..
            }
        ));

        coordinator.reset_failed(TID).await.unwrap();
        assert_eq!(store.status(TID), Some(TournamentStatus::Closed));

        let plan = coordinator.settle(TID).await.unwrap();
        assert_eq!(plan.payout_for(1), Some(700));
        assert_eq!(store.ledger().len(), 3);
    }

    #[tokio::test]
    async fn test_lost_acknowledgement_resolves_to_settled() {
        let store = store_with(&[(1, 500), (2, 300), (3, 100)], TournamentStatus::Closed);
        store.fail_next_commit(CommitFault::LostAfterApply);

        let plan = coordinator(store.clone()).settle(TID).await.unwrap();
        assert_eq!(plan.payout_for(1), Some(700));
        assert_eq!(store.status(TID), Some(TournamentStatus::Settled));
        assert_eq!(store.ledger().len(), 3);
    }

    #[tokio::test]
    async fn test_commit_timeout_is_ambiguous() {
        let store = store_with(&[(1, 500)], TournamentStatus::Closed);
        store.set_commit_delay(Some(Duration::from_millis(200)));
        let coordinator = SettlementCoordinator::new(
            store.clone(),
            SettlementConfig {
                lock_timeout: Duration::from_secs(1),
                commit_timeout: Duration::from_millis(20),
            },
        );

        let err = coordinator.settle(TID).await.unwrap_err();
        assert!(matches!(
            err,
            SettlementError::PartialCommit {
                ambiguous: true,
                source: StoreError::Timeout(_),
                ..
            }
        ));
        assert_eq!(store.status(TID), Some(TournamentStatus::SettlementFailed));
    }

    #[tokio::test]
    async fn test_lock_timeout_while_other_settlement_runs() {
        let store = store_with(&[(1, 500)], TournamentStatus::Closed);
        store.set_commit_delay(Some(Duration::from_millis(300)));
        let coordinator = Arc::new(SettlementCoordinator::new(
            store.clone(),
            SettlementConfig {
                lock_timeout: Duration::from_millis(20),
                commit_timeout: Duration::from_secs(2),
            },
        ));

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.settle(TID).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = coordinator.settle(TID).await.unwrap_err();
        assert!(matches!(err, SettlementError::LockTimeout { .. }));
        assert!(err.is_retryable());

        assert!(first.await.unwrap().is_ok());
        assert_eq!(store.ledger().len(), 1);
    }

    #[tokio::test]
    async fn test_settling_elsewhere_is_in_progress() {
        let store = store_with(&[(1, 500)], TournamentStatus::Settling);
        let err = coordinator(store).settle(TID).await.unwrap_err();
        assert!(matches!(err, SettlementError::InProgress { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_reset_requires_failed_state() {
        let store = store_with(&[(1, 500)], TournamentStatus::Closed);
        let err = coordinator(store).reset_failed(TID).await.unwrap_err();
        assert!(matches!(
            err,
            SettlementError::InvalidState {
                actual: TournamentStatus::Closed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unallocated_slot_recorded_in_plan() {
        let store = store_with(&[(1, 500), (2, 300)], TournamentStatus::Closed);
        let plan = coordinator(store.clone()).settle(TID).await.unwrap();

        assert_eq!(plan.unallocated_cents, 100);
        assert_eq!(plan.platform_total_cents(), 100);
        assert!(plan.is_balanced());
        let settled = store
            .audit_events(TID)
            .into_iter()
            .find(|e| e.kind == AuditKind::Settled)
            .unwrap();
        assert!(settled.detail.contains("unallocated=100"));
    }

    #[test]
    fn test_credit_instructions_skip_zero_amounts() {
        let config = TournamentConfig::podium("Cup".to_string(), FeeConfig::zero(), None);
        let tournament = Tournament::from_config(TID, config, 0);
        let plan = PayoutPlan {
            pool_cents: 0,
            platform_cents: 0,
            creator_cents: 0,
            net_pool_cents: 0,
            winners: vec![crate::payout::WinnerPayout {
                user_id: 1,
                rank: 1,
                amount_cents: 0,
            }],
            unallocated_cents: 0,
        };
        assert!(credit_instructions(&tournament, &plan).is_empty());
    }

    /// In-memory store whose status writes and audit writes can be made to fail
    struct FlakyStore {
        inner: Arc<InMemorySettlementStore>,
        fail_from_settling: AtomicBool,
        fail_audit: AtomicBool,
        report_closed: AtomicBool,
    }

    impl FlakyStore {
        fn wrap(inner: Arc<InMemorySettlementStore>) -> Arc<Self> {
            Arc::new(Self {
                inner,
                fail_from_settling: AtomicBool::new(false),
                fail_audit: AtomicBool::new(false),
                report_closed: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl SettlementStore for FlakyStore {
        async fn fetch_tournament(&self, tournament_id: TournamentId) -> StoreResult<Tournament> {
            let tournament = self.inner.fetch_tournament(tournament_id).await?;
            if self.report_closed.load(Ordering::SeqCst) {
                return Ok(tournament.with_status(TournamentStatus::Closed));
            }
            Ok(tournament)
        }

        async fn fetch_entries(
            &self,
            tournament_id: TournamentId,
        ) -> StoreResult<Vec<Entry>> {
            self.inner.fetch_entries(tournament_id).await
        }

        async fn transition(
            &self,
            tournament_id: TournamentId,
            from: TournamentStatus,
            to: TournamentStatus,
        ) -> StoreResult<()> {
            if from == TournamentStatus::Settling && self.fail_from_settling.load(Ordering::SeqCst)
            {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner.transition(tournament_id, from, to).await
        }

        async fn commit_settlement(
            &self,
            tournament_id: TournamentId,
            plan: &PayoutPlan,
            credits: &[CreditInstruction],
        ) -> StoreResult<()> {
            self.inner
                .commit_settlement(tournament_id, plan, credits)
                .await
        }

        async fn fetch_settled_plan(
            &self,
            tournament_id: TournamentId,
        ) -> StoreResult<Option<PayoutPlan>> {
            self.inner.fetch_settled_plan(tournament_id).await
        }

        async fn record_audit(&self, event: &AuditEvent) -> StoreResult<()> {
            if self.fail_audit.load(Ordering::SeqCst) {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner.record_audit(event).await
        }

        async fn health_check(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unconfirmed_commit_keeps_mutation_flag_when_status_write_fails() {
        let inner = store_with(&[(1, 500)], TournamentStatus::Closed);
        inner.fail_next_commit(CommitFault::LostAfterApply);
        let store = FlakyStore::wrap(inner.clone());
        store.fail_from_settling.store(true, Ordering::SeqCst);

        let err = SettlementCoordinator::new(store, SettlementConfig::default())
            .settle(TID)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SettlementError::PartialCommit {
                ambiguous: true,
                source: StoreError::CommitOutcomeUnknown(_),
                ..
            }
        ));
        assert!(err.mutation_possible());
        assert!(!err.is_retryable());
        assert_eq!(inner.balance(1), Some(700));
        assert_eq!(inner.status(TID), Some(TournamentStatus::Settled));
    }

    #[tokio::test]
    async fn test_rolled_back_commit_with_failed_revert_reports_no_mutation() {
        let inner = store_with(&[(1, 500), (2, 300)], TournamentStatus::Closed);
        inner.remove_wallet(2);
        let store = FlakyStore::wrap(inner.clone());
        store.fail_from_settling.store(true, Ordering::SeqCst);

        let err = SettlementCoordinator::new(store, SettlementConfig::default())
            .settle(TID)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SettlementError::Store {
                stage: SettlementStage::Recovery,
                ..
            }
        ));
        assert!(!err.mutation_possible());
        assert!(inner.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_stuck_settling_marked_failed_then_reset_and_settled() {
        let inner = store_with(&[(1, 500), (2, 300)], TournamentStatus::Closed);
        inner.fail_next_commit(CommitFault::LostBeforeApply);
        let store = FlakyStore::wrap(inner.clone());
        store.fail_from_settling.store(true, Ordering::SeqCst);
        let coordinator = SettlementCoordinator::new(store.clone(), SettlementConfig::default());

        let err = coordinator.settle(TID).await.unwrap_err();
        assert!(err.mutation_possible());
        assert_eq!(inner.status(TID), Some(TournamentStatus::Settling));

        let err = coordinator.settle(TID).await.unwrap_err();
        assert!(matches!(err, SettlementError::InProgress { .. }));
        assert!(err.to_string().contains("mark it failed"));

        // Database is back; the operator takes over
        store.fail_from_settling.store(false, Ordering::SeqCst);
        coordinator.mark_stuck_failed(TID).await.unwrap();
        assert_eq!(inner.status(TID), Some(TournamentStatus::SettlementFailed));

        coordinator.reset_failed(TID).await.unwrap();
        let plan = coordinator.settle(TID).await.unwrap();
        assert_eq!(plan.payout_for(1), Some(700));
        assert_eq!(inner.ledger().len(), 2);
    }

    #[tokio::test]
    async fn test_mark_stuck_failed_requires_settling() {
        let store = store_with(&[(1, 500)], TournamentStatus::Closed);
        let err = coordinator(store.clone())
            .mark_stuck_failed(TID)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SettlementError::InvalidState {
                actual: TournamentStatus::Closed,
                ..
            }
        ));
        assert_eq!(store.status(TID), Some(TournamentStatus::Closed));

        let err = coordinator(store).mark_stuck_failed(404).await.unwrap_err();
        assert!(matches!(err, SettlementError::NotFound(404)));
    }

    #[tokio::test]
    async fn test_mark_stuck_failed_waits_for_local_settlement() {
        let store = store_with(&[(1, 500)], TournamentStatus::Closed);
        store.set_commit_delay(Some(Duration::from_millis(300)));
        let coordinator = Arc::new(SettlementCoordinator::new(
            store.clone(),
            SettlementConfig {
                lock_timeout: Duration::from_millis(20),
                commit_timeout: Duration::from_secs(2),
            },
        ));

        let running = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.settle(TID).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = coordinator.mark_stuck_failed(TID).await.unwrap_err();
        assert!(matches!(err, SettlementError::LockTimeout { .. }));

        assert!(running.await.unwrap().is_ok());
        assert_eq!(store.status(TID), Some(TournamentStatus::Settled));
    }

    #[tokio::test]
    async fn test_lost_flip_race_leaves_no_started_record() {
        let inner = store_with(&[(1, 500)], TournamentStatus::Settling);
        let store = FlakyStore::wrap(inner.clone());
        store.report_closed.store(true, Ordering::SeqCst);

        let err = SettlementCoordinator::new(store, SettlementConfig::default())
            .settle(TID)
            .await
            .unwrap_err();

        assert!(matches!(err, SettlementError::InProgress { .. }));
        assert!(inner.audit_events(TID).is_empty());
    }

    #[tokio::test]
    async fn test_started_audit_failure_reverts_flip() {
        let inner = store_with(&[(1, 500)], TournamentStatus::Closed);
        let store = FlakyStore::wrap(inner.clone());
        store.fail_audit.store(true, Ordering::SeqCst);

        let err = SettlementCoordinator::new(store, SettlementConfig::default())
            .settle(TID)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SettlementError::Store {
                stage: SettlementStage::Precondition,
                ..
            }
        ));
        assert!(!err.mutation_possible());
        assert_eq!(inner.status(TID), Some(TournamentStatus::Closed));
        assert!(inner.ledger().is_empty());
    }
}
