//! Per-tournament settlement locks.

use crate::tournament::TournamentId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held for the whole span of one settlement; releases on drop
#[derive(Debug)]
pub struct SettlementGuard {
    tournament_id: TournamentId,
    _guard: OwnedMutexGuard<()>,
}

impl SettlementGuard {
    pub fn tournament_id(&self) -> TournamentId {
        self.tournament_id
    }
}

/// Exclusive lock per tournament id.
///
/// Different tournaments never contend. Lock slots nobody holds or waits on
/// are pruned on the next acquisition.
#[derive(Clone, Default)]
pub struct SettlementLocks {
    slots: Arc<Mutex<HashMap<TournamentId, Arc<AsyncMutex<()>>>>>,
}

impl SettlementLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait up to `timeout` for the tournament's lock
    ///
    /// # Errors
    ///
    /// Returns the time waited if the lock was not acquired in time
    pub async fn acquire(
        &self,
        tournament_id: TournamentId,
        timeout: Duration,
    ) -> Result<SettlementGuard, Duration> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // Only the map references an idle slot
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots.entry(tournament_id).or_default().clone()
        };

        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => Ok(SettlementGuard {
                tournament_id,
                _guard: guard,
            }),
            Err(_) => Err(timeout),
        }
    }

    /// Number of tournaments with a live lock slot
    pub fn active(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| Arc::strong_count(slot) > 1)
            .count()
    }
}
