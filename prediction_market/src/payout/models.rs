//! Fee configuration, payout curve, and payout plan models.

use super::errors::{PayoutError, PayoutResult};
use crate::tournament::models::UserId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Platform and creator fee percentages.
///
/// Only constructible through [`FeeConfig::new`] (or deserialization, which
/// goes through the same checks), so a value of this type is always valid:
/// each percentage is within 0..=100 and the two together never exceed 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFeeConfig", into = "RawFeeConfig")]
pub struct FeeConfig {
    platform_fee_percent: u8,
    creator_fee_percent: u8,
}

impl FeeConfig {
    /// Validate and build a fee configuration
    ///
    /// # Errors
    ///
    /// * `PayoutError::InvalidFeeConfig` - A percentage is negative, above 100,
    ///   or the two sum to more than 100
    pub fn new(platform_fee_percent: i64, creator_fee_percent: i64) -> PayoutResult<Self> {
        let in_range = |pct: i64| (0..=100).contains(&pct);

        if !in_range(platform_fee_percent)
            || !in_range(creator_fee_percent)
            || platform_fee_percent + creator_fee_percent > 100
        {
            return Err(PayoutError::InvalidFeeConfig {
                platform: platform_fee_percent,
                creator: creator_fee_percent,
            });
        }

        Ok(Self {
            platform_fee_percent: platform_fee_percent as u8,
            creator_fee_percent: creator_fee_percent as u8,
        })
    }

    /// No fees at all
    pub fn zero() -> Self {
        Self {
            platform_fee_percent: 0,
            creator_fee_percent: 0,
        }
    }

    pub fn platform_fee_percent(&self) -> u8 {
        self.platform_fee_percent
    }

    pub fn creator_fee_percent(&self) -> u8 {
        self.creator_fee_percent
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self::zero()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawFeeConfig {
    platform_fee_percent: i64,
    creator_fee_percent: i64,
}

impl TryFrom<RawFeeConfig> for FeeConfig {
    type Error = PayoutError;

    fn try_from(raw: RawFeeConfig) -> PayoutResult<Self> {
        Self::new(raw.platform_fee_percent, raw.creator_fee_percent)
    }
}

impl From<FeeConfig> for RawFeeConfig {
    fn from(fees: FeeConfig) -> Self {
        Self {
            platform_fee_percent: fees.platform_fee_percent as i64,
            creator_fee_percent: fees.creator_fee_percent as i64,
        }
    }
}

/// Payout curve: finishing rank (1-based) to percentage of the net pool.
///
/// Stored as a string-keyed JSON object (`{"1": 70, "2": 20, "3": 10}`) and
/// validated when loaded: ranks must be positive integers, each percentage
/// within 0..=100, and the percentages must total exactly 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, i64>",
    into = "BTreeMap<String, i64>"
)]
pub struct PayoutStructure {
    slots: BTreeMap<u32, u8>,
}

impl PayoutStructure {
    /// Build a payout structure from `(rank, percent)` pairs
    ///
    /// # Errors
    ///
    /// * `PayoutError::EmptyPayoutStructure` - No pairs given
    /// * `PayoutError::InvalidRank` - Rank is zero, negative or repeated
    /// * `PayoutError::InvalidPercent` - Percentage outside 0..=100
    /// * `PayoutError::InvalidPayoutTotal` - Percentages don't total 100
    pub fn new<I>(slots: I) -> PayoutResult<Self>
    where
        I: IntoIterator<Item = (i64, i64)>,
    {
        let mut validated = BTreeMap::new();
        let mut total = 0i64;

        for (rank, percent) in slots {
            let rank_u32 = u32::try_from(rank)
                .ok()
                .filter(|r| *r > 0)
                .ok_or_else(|| PayoutError::InvalidRank(rank.to_string()))?;

            if !(0..=100).contains(&percent) {
                return Err(PayoutError::InvalidPercent {
                    rank: rank_u32,
                    percent,
                });
            }

            if validated.insert(rank_u32, percent as u8).is_some() {
                return Err(PayoutError::InvalidRank(rank.to_string()));
            }
            total += percent;
        }

        if validated.is_empty() {
            return Err(PayoutError::EmptyPayoutStructure);
        }

        if total != 100 {
            return Err(PayoutError::InvalidPayoutTotal(total));
        }

        Ok(Self { slots: validated })
    }

    /// Whole net pool to rank 1
    pub fn winner_takes_all() -> Self {
        Self {
            slots: BTreeMap::from([(1, 100)]),
        }
    }

    /// Standard curve for a given field size
    ///
    /// - 1-5 entries: Winner takes all
    /// - 6-9 entries: 60/40 split
    /// - 10+ entries: 50/30/20 split
    pub fn standard(entry_count: usize) -> Self {
        let slots = match entry_count {
            0..=5 => BTreeMap::from([(1, 100)]),
            6..=9 => BTreeMap::from([(1, 60), (2, 40)]),
            _ => BTreeMap::from([(1, 50), (2, 30), (3, 20)]),
        };
        Self { slots }
    }

    /// Percentage for a 1-based position, if the curve pays it
    pub fn percent_for(&self, rank: u32) -> Option<u8> {
        self.slots.get(&rank).copied()
    }

    /// Iterate `(rank, percent)` in rank order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.slots.iter().map(|(rank, pct)| (*rank, *pct))
    }

    /// Number of paid ranks
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl TryFrom<BTreeMap<String, i64>> for PayoutStructure {
    type Error = PayoutError;

    fn try_from(raw: BTreeMap<String, i64>) -> PayoutResult<Self> {
        let mut pairs = Vec::with_capacity(raw.len());
        for (key, percent) in raw {
            let rank: i64 = key
                .trim()
                .parse()
                .map_err(|_| PayoutError::InvalidRank(key.clone()))?;
            pairs.push((rank, percent));
        }
        Self::new(pairs)
    }
}

impl From<PayoutStructure> for BTreeMap<String, i64> {
    fn from(structure: PayoutStructure) -> Self {
        structure
            .slots
            .into_iter()
            .map(|(rank, pct)| (rank.to_string(), pct as i64))
            .collect()
    }
}

/// One winner's share of the net pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerPayout {
    pub user_id: UserId,
    /// Finishing rank (shared by tied entries)
    pub rank: u32,
    pub amount_cents: i64,
}

/// Result of splitting a tournament pot.
///
/// `platform_cents + creator_cents + distributed + unallocated_cents` always
/// equals `pool_cents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutPlan {
    pub pool_cents: i64,
    pub platform_cents: i64,
    pub creator_cents: i64,
    pub net_pool_cents: i64,
    pub winners: Vec<WinnerPayout>,
    /// Net pool cents no winner could claim (empty payout slots)
    pub unallocated_cents: i64,
}

impl PayoutPlan {
    /// Total paid out to winners
    pub fn distributed_cents(&self) -> i64 {
        self.winners.iter().map(|w| w.amount_cents).sum()
    }

    /// Every cent of the pool is accounted for exactly once
    pub fn is_balanced(&self) -> bool {
        self.platform_cents + self.creator_cents + self.distributed_cents() + self.unallocated_cents
            == self.pool_cents
    }

    /// Amount won by a user, if they placed in the money
    pub fn payout_for(&self, user_id: UserId) -> Option<i64> {
        self.winners
            .iter()
            .find(|w| w.user_id == user_id)
            .map(|w| w.amount_cents)
    }

    /// Platform take once unclaimed cents revert to it
    pub fn platform_total_cents(&self) -> i64 {
        self.platform_cents + self.unallocated_cents
    }
}
