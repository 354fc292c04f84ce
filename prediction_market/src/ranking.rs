//! Final standings for a closed tournament.
//!
//! Entries are ordered by stack, largest first. Equal stacks share a rank:
//! the best position the tied group occupies (`1, 1, 3`). Within a tie the
//! order is by user id so the output is deterministic. The shared rank only
//! feeds the payout curve lookup; the calculator splits pooled slots evenly.

use crate::tournament::models::{Entry, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ranking errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RankingError {
    #[error("Tournament has no entries")]
    NoEntries,

    #[error("Entry for user {user_id} has negative stack {stack}")]
    NegativeStack { user_id: UserId, stack: i64 },
}

/// An entry placed in the final standings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub user_id: UserId,
    pub stack_cents: i64,
    /// 1-based, shared among tied stacks
    pub rank: u32,
}

/// Order entries into final standings.
///
/// # Errors
///
/// * `RankingError::NoEntries` - Nothing to rank
/// * `RankingError::NegativeStack` - An entry carries a stack below zero
pub fn resolve_ranking(entries: &[Entry]) -> Result<Vec<RankedEntry>, RankingError> {
    if entries.is_empty() {
        return Err(RankingError::NoEntries);
    }

    if let Some(bad) = entries.iter().find(|e| e.current_stack < 0) {
        return Err(RankingError::NegativeStack {
            user_id: bad.user_id,
            stack: bad.current_stack,
        });
    }

    let mut sorted: Vec<&Entry> = entries.iter().collect();
    sorted.sort_by(|a, b| {
        b.current_stack
            .cmp(&a.current_stack)
            .then(a.user_id.cmp(&b.user_id))
    });

    let mut ranked: Vec<RankedEntry> = Vec::with_capacity(sorted.len());
    for (idx, entry) in sorted.into_iter().enumerate() {
        let rank = match ranked.last() {
            Some(prev) if prev.stack_cents == entry.current_stack => prev.rank,
            _ => idx as u32 + 1,
        };
        ranked.push(RankedEntry {
            user_id: entry.user_id,
            stack_cents: entry.current_stack,
            rank,
        });
    }

    Ok(ranked)
}
