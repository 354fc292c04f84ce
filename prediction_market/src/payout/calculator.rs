//! Pot splitting: fees, net pool, and per-rank winner allocations.
//!
//! Everything here is integer cents with floor division as the only rounding
//! rule. Products are widened to `i128` before dividing, so any `i64` pot is
//! handled without overflow.

use super::{
    errors::{PayoutError, PayoutResult},
    models::{FeeConfig, PayoutPlan, PayoutStructure, WinnerPayout},
};
use crate::ranking::RankedEntry;

/// `floor(amount * percent / 100)`, never larger than `amount`
fn percent_of(amount: i64, percent: u8) -> i64 {
    (amount as i128 * percent as i128 / 100) as i64
}

/// Split a tournament pot into fees and winner payouts.
///
/// Ranked entries must be ordered best first, with tied entries sharing a
/// rank value and sitting next to each other (see [`crate::ranking`]).
///
/// A tie group occupying positions `p..p+k` pools the slot amounts of all
/// of those positions and splits them evenly. Rounding dust, including the
/// remainder of each even split, goes to the first winner in the list.
/// Slots for positions nobody occupies are reported as `unallocated_cents`,
/// as is the whole net pool when nobody wins anything.
///
/// # Errors
///
/// * `PayoutError::NegativePot` - `total_pot_cents` is below zero
/// * `PayoutError::NegativeNetPool` - Fees exceed the pot
pub fn compute_payouts(
    total_pot_cents: i64,
    fees: &FeeConfig,
    payout_structure: &PayoutStructure,
    ranked_entries: &[RankedEntry],
) -> PayoutResult<PayoutPlan> {
    if total_pot_cents < 0 {
        return Err(PayoutError::NegativePot(total_pot_cents));
    }

    let platform_cents = percent_of(total_pot_cents, fees.platform_fee_percent());
    let creator_cents = percent_of(total_pot_cents, fees.creator_fee_percent());

    let net_pool_cents = total_pot_cents - platform_cents - creator_cents;
    if net_pool_cents < 0 {
        return Err(PayoutError::NegativeNetPool {
            pot: total_pot_cents,
            fees: platform_cents + creator_cents,
        });
    }

    let field_size = ranked_entries.len();

    let mut slot_total = 0i64;
    let mut skipped = 0i64;
    for (rank, percent) in payout_structure.iter() {
        let amount = percent_of(net_pool_cents, percent);
        slot_total += amount;
        if rank as usize > field_size {
            skipped += amount;
        }
    }

    let mut winners = Vec::new();
    let mut dust = net_pool_cents - slot_total;

    let mut start = 0usize;
    for group in ranked_entries.chunk_by(|a, b| a.rank == b.rank) {
        let positions = (start + 1)..=(start + group.len());
        start += group.len();

        let mut paid_here = false;
        let mut pooled = 0i64;
        for position in positions {
            if let Some(percent) = payout_structure.percent_for(position as u32) {
                paid_here = true;
                pooled += percent_of(net_pool_cents, percent);
            }
        }

        if !paid_here {
            continue;
        }

        let share = pooled / group.len() as i64;
        dust += pooled % group.len() as i64;

        winners.extend(group.iter().map(|entry| WinnerPayout {
            user_id: entry.user_id,
            rank: entry.rank,
            amount_cents: share,
        }));
    }

    let unallocated_cents = match winners.first_mut() {
        Some(first) => {
            first.amount_cents += dust;
            skipped
        }
        None => net_pool_cents,
    };

    let plan = PayoutPlan {
        pool_cents: total_pot_cents,
        platform_cents,
        creator_cents,
        net_pool_cents,
        winners,
        unallocated_cents,
    };
    debug_assert!(plan.is_balanced());

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(stacks: &[(i64, i64)]) -> Vec<RankedEntry> {
        let entries: Vec<_> = stacks
            .iter()
            .map(|(user_id, stack)| crate::tournament::models::Entry::new(1, *user_id, *stack))
            .collect();
        crate::ranking::resolve_ranking(&entries).unwrap()
    }

    fn podium() -> PayoutStructure {
        PayoutStructure::new([(1, 70), (2, 20), (3, 10)]).unwrap()
    }

    #[test]
    fn test_exact_split_has_no_leftover() {
        let plan = compute_payouts(
            1000,
            &FeeConfig::zero(),
            &podium(),
            &ranked(&[(1, 300), (2, 200), (3, 100)]),
        )
        .unwrap();

        let amounts: Vec<_> = plan.winners.iter().map(|w| w.amount_cents).collect();
        assert_eq!(amounts, vec![700, 200, 100]);
        assert_eq!(plan.unallocated_cents, 0);
        assert!(plan.is_balanced());
    }

    #[test]
    fn test_leftover_cent_goes_to_first_place() {
        let plan = compute_payouts(
            1001,
            &FeeConfig::zero(),
            &podium(),
            &ranked(&[(1, 300), (2, 200), (3, 100)]),
        )
        .unwrap();

        let amounts: Vec<_> = plan.winners.iter().map(|w| w.amount_cents).collect();
        assert_eq!(amounts, vec![701, 200, 100]);
        assert_eq!(plan.unallocated_cents, 0);
    }

    #[test]
    fn test_fees_use_floor() {
        let fees = FeeConfig::new(5, 3).unwrap();
        let plan = compute_payouts(
            999,
            &fees,
            &PayoutStructure::winner_takes_all(),
            &ranked(&[(7, 10)]),
        )
        .unwrap();

        assert_eq!(plan.platform_cents, 49); // floor(49.95)
        assert_eq!(plan.creator_cents, 29); // floor(29.97)
        assert_eq!(plan.net_pool_cents, 921);
        assert_eq!(plan.payout_for(7), Some(921));
    }

    #[test]
    fn test_zero_fees_keep_whole_pot() {
        let plan = compute_payouts(
            12_345,
            &FeeConfig::zero(),
            &podium(),
            &ranked(&[(1, 5), (2, 4), (3, 3)]),
        )
        .unwrap();
        assert_eq!(plan.net_pool_cents, 12_345);
        assert_eq!(plan.platform_cents + plan.creator_cents, 0);
    }

    #[test]
    fn test_missing_slot_is_unallocated() {
        let plan = compute_payouts(
            1000,
            &FeeConfig::zero(),
            &podium(),
            &ranked(&[(1, 50), (2, 40)]),
        )
        .unwrap();

        assert_eq!(plan.winners.len(), 2);
        assert_eq!(plan.payout_for(1), Some(700));
        assert_eq!(plan.payout_for(2), Some(200));
        assert_eq!(plan.unallocated_cents, 100);
        assert!(plan.distributed_cents() < plan.net_pool_cents);
        assert!(plan.is_balanced());
    }

    #[test]
    fn test_tie_pools_and_splits_evenly() {
        let structure = PayoutStructure::new([(1, 70), (2, 20), (3, 10)]).unwrap();
        let plan = compute_payouts(
            1000,
            &FeeConfig::zero(),
            &structure,
            &ranked(&[(8, 500), (3, 500), (4, 100)]),
        )
        .unwrap();

        // Users 3 and 8 share positions 1 and 2: (700 + 200) / 2 each
        assert_eq!(plan.winners[0].user_id, 3);
        assert_eq!(plan.winners[0].rank, 1);
        assert_eq!(plan.winners[1].user_id, 8);
        assert_eq!(plan.winners[1].rank, 1);
        assert_eq!(plan.payout_for(3), Some(450));
        assert_eq!(plan.payout_for(8), Some(450));
        assert_eq!(plan.payout_for(4), Some(100));
        assert_eq!(plan.winners[2].rank, 3);
    }

    #[test]
    fn test_tie_split_remainder_goes_to_first_winner() {
        let plan = compute_payouts(
            101,
            &FeeConfig::zero(),
            &PayoutStructure::winner_takes_all(),
            &ranked(&[(1, 10), (2, 10)]),
        )
        .unwrap();

        assert_eq!(plan.payout_for(1), Some(51));
        assert_eq!(plan.payout_for(2), Some(50));
        assert!(plan.is_balanced());
    }

    #[test]
    fn test_tie_across_payout_boundary_shares_last_slot() {
        let structure = PayoutStructure::new([(1, 60), (2, 40)]).unwrap();
        let plan = compute_payouts(
            1000,
            &FeeConfig::zero(),
            &structure,
            &ranked(&[(1, 30), (2, 20), (3, 20), (4, 5)]),
        )
        .unwrap();

        assert_eq!(plan.payout_for(1), Some(600));
        assert_eq!(plan.payout_for(2), Some(200));
        assert_eq!(plan.payout_for(3), Some(200));
        assert_eq!(plan.payout_for(4), None);
    }

    #[test]
    fn test_no_winners_leaves_net_pool_unallocated() {
        let structure = PayoutStructure::new([(2, 100)]).unwrap();
        let fees = FeeConfig::new(10, 0).unwrap();
        let plan = compute_payouts(1000, &fees, &structure, &ranked(&[(1, 10)])).unwrap();

        assert!(plan.winners.is_empty());
        assert_eq!(plan.unallocated_cents, 900);
        assert_eq!(plan.platform_total_cents(), 1000);
        assert!(plan.is_balanced());
    }

    #[test]
    fn test_negative_pot_rejected() {
        let result = compute_payouts(
            -1,
            &FeeConfig::zero(),
            &podium(),
            &ranked(&[(1, 1)]),
        );
        assert_eq!(result, Err(PayoutError::NegativePot(-1)));
    }

    #[test]
    fn test_huge_pot_does_not_overflow() {
        let fees = FeeConfig::new(3, 2).unwrap();
        let plan = compute_payouts(
            i64::MAX,
            &fees,
            &podium(),
            &ranked(&[(1, 3), (2, 2), (3, 1)]),
        )
        .unwrap();
        assert!(plan.is_balanced());
    }
}
