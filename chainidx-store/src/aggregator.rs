//! Chain-wide running totals (spec.md §4.4 "Aggregator").
//!
//! Every operation here is a pure function over a [`ChainAggregatedFacts`]
//! value; nothing here touches `sled` directly. The object store calls
//! these functions while staging output/block writes into a [`WriteBatch`]
//! and persists the resulting facts once, at the end of the change
//! (spec.md §4.6). Because the estimator is recomputed from
//! `recent_blocks` rather than accumulated incrementally, reverting a
//! block is exactly "pop and recompute" — there is no separate inverse
//! formula to keep in sync with the forward one.

use chainidx_types::{ChainAggregatedFacts, Currency, Output, OutputKind, Target};
use num_bigint::BigUint;

/// Folds a newly-applied output's value into the running totals. Whether
/// the output counts as locked is decided by the caller (the lock
/// schedule already knows the answer by the time this runs).
pub fn apply_output(facts: &mut ChainAggregatedFacts, output: &Output, locked: bool) {
    adjust_output(facts, output, locked, true);
}

/// Inverse of [`apply_output`], used when reverting a block.
pub fn revert_output(facts: &mut ChainAggregatedFacts, output: &Output, locked: bool) {
    adjust_output(facts, output, locked, false);
}

fn adjust_output(facts: &mut ChainAggregatedFacts, output: &Output, locked: bool, adding: bool) {
    let total = if output.kind.is_block_stake() {
        &mut facts.total_block_stakes
    } else {
        &mut facts.total_coins
    };
    *total = if adding {
        &*total + &output.value
    } else {
        total.sub_or_panic(&output.value)
    };

    if locked {
        let locked_total = if output.kind.is_block_stake() {
            &mut facts.total_locked_block_stakes
        } else {
            &mut facts.total_locked_coins
        };
        *locked_total = if adding {
            &*locked_total + &output.value
        } else {
            locked_total.sub_or_panic(&output.value)
        };
    }
}

/// Called once an output's reference point is reached (it moves from the
/// locked total into the unlocked total) or, symmetrically, when a revert
/// re-locks it.
pub fn move_locked_total(facts: &mut ChainAggregatedFacts, output: &Output, locking: bool) {
    let locked_total = if output.kind.is_block_stake() {
        &mut facts.total_locked_block_stakes
    } else {
        &mut facts.total_locked_coins
    };
    *locked_total = if locking {
        &*locked_total + &output.value
    } else {
        locked_total.sub_or_panic(&output.value)
    };
}

/// Records a newly applied block's target/timestamp and refreshes the
/// active block-stake estimate (spec.md §4.4).
pub fn apply_block(facts: &mut ChainAggregatedFacts, target: Target, timestamp: u64, root_depth: u32) {
    facts.push_block(target, timestamp);
    recompute_estimate(facts, root_depth);
}

/// Removes the most recently applied block's sample and refreshes the
/// estimate. The caller is responsible for calling this in the same
/// height order the blocks were applied (spec.md §4.5 reverts blocks tip
/// first).
pub fn revert_block(facts: &mut ChainAggregatedFacts, root_depth: u32) {
    facts.pop_block();
    recompute_estimate(facts, root_depth);
}

/// Re-derives `estimated_active_block_stakes` from the recent-blocks window,
/// following spec.md §4.4's estimator formula literally: sum the window's
/// targets with the chain's target-addition operator, convert that sum to a
/// difficulty, then divide by the number of seconds the window spans
/// (floored at 1, since timestamps are not guaranteed strictly increasing).
/// An empty ring estimates zero.
fn recompute_estimate(facts: &mut ChainAggregatedFacts, root_depth: u32) {
    if facts.recent_blocks.is_empty() {
        facts.estimated_active_block_stakes = Currency::zero();
        return;
    }

    // push_block pushes new samples to the front, so front is the current
    // tip and back is the oldest sample still in the window.
    let current_timestamp = facts.recent_blocks.front().unwrap().1;
    let oldest_timestamp = facts.recent_blocks.back().unwrap().1;

    let mut target_total = Target::zero();
    for (target, _timestamp) in facts.recent_blocks.iter() {
        target_total = &target_total + target;
    }
    let difficulty = target_total.difficulty(root_depth);

    let secs = current_timestamp.saturating_sub(oldest_timestamp).max(1);
    let estimate = difficulty / BigUint::from(secs);
    facts.estimated_active_block_stakes = Currency::from_bytes_be(&estimate.to_bytes_be());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainidx_types::{Address, Condition, Hash256, ReferencePoint};

    fn coin_output(value: u64) -> Output {
        Output {
            id: Hash256([1u8; 32]),
            parent_id: Hash256([2u8; 32]),
            kind: OutputKind::Coin,
            value: Currency::from_u64(value),
            condition: Condition::UnlockHash(Address::new(Address::SINGLE_SIGNATURE, Hash256([3u8; 32]))),
            reference_point: ReferencePoint::ALWAYS_UNLOCKED,
            spenditure: None,
        }
    }

    #[test]
    fn apply_then_revert_output_is_identity() {
        let mut facts = ChainAggregatedFacts::default();
        let output = coin_output(500);
        apply_output(&mut facts, &output, false);
        assert_eq!(facts.total_coins, Currency::from_u64(500));
        revert_output(&mut facts, &output, false);
        assert_eq!(facts.total_coins, Currency::zero());
    }

    #[test]
    fn locked_output_feeds_both_totals() {
        let mut facts = ChainAggregatedFacts::default();
        let output = coin_output(100);
        apply_output(&mut facts, &output, true);
        assert_eq!(facts.total_coins, Currency::from_u64(100));
        assert_eq!(facts.total_locked_coins, Currency::from_u64(100));
        move_locked_total(&mut facts, &output, false);
        assert_eq!(facts.total_locked_coins, Currency::zero());
        assert_eq!(facts.total_coins, Currency::from_u64(100));
    }

    #[test]
    fn apply_then_revert_block_restores_window() {
        let mut facts = ChainAggregatedFacts::default();
        apply_block(&mut facts, Target(BigUint::from(4u32)), 1000, 16);
        assert_eq!(facts.recent_blocks.len(), 1);
        let estimate_after_apply = facts.estimated_active_block_stakes.clone();
        revert_block(&mut facts, 16);
        assert!(facts.recent_blocks.is_empty());
        assert_eq!(facts.estimated_active_block_stakes, Currency::zero());
        assert_ne!(estimate_after_apply, Currency::zero());
    }

    #[test]
    fn estimate_matches_summed_difficulty_over_elapsed_seconds() {
        let mut facts = ChainAggregatedFacts::default();
        // Two samples, target 4 and target 4, root_depth 16: difficulty of
        // a target-4 block is 2^16 / 4 = 16384, and target addition is
        // plain magnitude addition, so the summed target is 8 and its
        // difficulty is 2^16 / 8 = 8192. The window spans 1000..=1100, 100
        // seconds, so the estimate is 8192 / 100 = 81.
        apply_block(&mut facts, Target(BigUint::from(4u32)), 1000, 16);
        apply_block(&mut facts, Target(BigUint::from(4u32)), 1100, 16);
        assert_eq!(facts.estimated_active_block_stakes, Currency::from_u64(81));
    }

    #[test]
    fn single_timestamp_window_does_not_divide_by_zero() {
        let mut facts = ChainAggregatedFacts::default();
        apply_block(&mut facts, Target(BigUint::from(4u32)), 1000, 16);
        apply_block(&mut facts, Target(BigUint::from(4u32)), 1000, 16);
        assert_eq!(facts.estimated_active_block_stakes, Currency::from_u64(8192));
    }
}
