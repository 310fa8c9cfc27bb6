use crate::amount::Currency;
use crate::codec::{BinaryDecode, BinaryEncode, Result};
use crate::hash::BlockId;
use crate::target::Target;
use std::collections::VecDeque;
use std::io::{Read, Write};

/// The engine's cursor into consensus: exactly one per store, updated at
/// the tail of every applied change (spec.md §3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainContext {
    pub consensus_change_id: [u8; 32],
    pub height: u64,
    pub last_block_timestamp: u64,
    pub last_block_id: BlockId,
}

impl ChainContext {
    pub fn genesis() -> Self {
        ChainContext {
            consensus_change_id: [0u8; 32],
            height: 0,
            last_block_timestamp: 0,
            last_block_id: BlockId::zero(),
        }
    }
}

impl BinaryEncode for ChainContext {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.consensus_change_id.encode(writer)?;
        self.height.encode(writer)?;
        self.last_block_timestamp.encode(writer)?;
        self.last_block_id.encode(writer)
    }
}

impl BinaryDecode for ChainContext {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(ChainContext {
            consensus_change_id: <[u8; 32]>::decode(reader)?,
            height: u64::decode(reader)?,
            last_block_timestamp: u64::decode(reader)?,
            last_block_id: BlockId::decode(reader)?,
        })
    }
}

/// Maximum number of `(target, timestamp)` samples kept for the active
/// block-stake estimator (spec.md §3, §4.4).
pub const MAX_ESTIMATOR_WINDOW: usize = 500;

/// Chain-wide running totals plus the sliding window used to estimate
/// active block-stake (spec.md §3, §4.4).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ChainAggregatedFacts {
    pub total_coins: Currency,
    pub total_locked_coins: Currency,
    pub total_block_stakes: Currency,
    pub total_locked_block_stakes: Currency,
    pub estimated_active_block_stakes: Currency,
    /// Oldest entry at the back, most recent at the front. Bounded to
    /// [`MAX_ESTIMATOR_WINDOW`].
    pub recent_blocks: VecDeque<(Target, u64)>,
}

impl ChainAggregatedFacts {
    pub fn push_block(&mut self, target: Target, timestamp: u64) {
        self.recent_blocks.push_front((target, timestamp));
        while self.recent_blocks.len() > MAX_ESTIMATOR_WINDOW {
            self.recent_blocks.pop_back();
        }
    }

    pub fn pop_block(&mut self) -> Option<(Target, u64)> {
        self.recent_blocks.pop_front()
    }
}

impl BinaryEncode for ChainAggregatedFacts {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.total_coins.encode(writer)?;
        self.total_locked_coins.encode(writer)?;
        self.total_block_stakes.encode(writer)?;
        self.total_locked_block_stakes.encode(writer)?;
        self.estimated_active_block_stakes.encode(writer)?;

        crate::codec::write_len(writer, self.recent_blocks.len())?;
        for (target, timestamp) in self.recent_blocks.iter() {
            target.0.to_bytes_be().encode(writer)?;
            timestamp.encode(writer)?;
        }
        Ok(())
    }
}

impl BinaryDecode for ChainAggregatedFacts {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let total_coins = Currency::decode(reader)?;
        let total_locked_coins = Currency::decode(reader)?;
        let total_block_stakes = Currency::decode(reader)?;
        let total_locked_block_stakes = Currency::decode(reader)?;
        let estimated_active_block_stakes = Currency::decode(reader)?;

        let len = crate::codec::read_len(reader)?;
        let mut recent_blocks = VecDeque::with_capacity(std::cmp::min(len, MAX_ESTIMATOR_WINDOW));
        for _ in 0..len {
            let target_bytes = Vec::<u8>::decode(reader)?;
            let timestamp = u64::decode(reader)?;
            recent_blocks.push_back((Target::from_bytes_be(&target_bytes), timestamp));
        }
        Ok(ChainAggregatedFacts {
            total_coins,
            total_locked_coins,
            total_block_stakes,
            total_locked_block_stakes,
            estimated_active_block_stakes,
            recent_blocks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    #[test]
    fn chain_context_round_trips() {
        let ctx = ChainContext {
            consensus_change_id: [9u8; 32],
            height: 42,
            last_block_timestamp: 1_600_000_000,
            last_block_id: crate::hash::Hash256([1u8; 32]),
        };
        let bytes = ctx.encode_to_vec();
        assert_eq!(ChainContext::decode_from_slice(&bytes).unwrap(), ctx);
    }

    #[test]
    fn aggregated_facts_round_trip_with_window() {
        let mut facts = ChainAggregatedFacts::default();
        facts.push_block(Target(BigUint::from(10u32)), 1000);
        facts.push_block(Target(BigUint::from(20u32)), 1100);
        let bytes = facts.encode_to_vec();
        let decoded = ChainAggregatedFacts::decode_from_slice(&bytes).unwrap();
        assert_eq!(decoded, facts);
    }

    #[test]
    fn push_block_bounds_window_to_500() {
        let mut facts = ChainAggregatedFacts::default();
        for i in 0..600u64 {
            facts.push_block(Target(BigUint::from(i)), i);
        }
        assert_eq!(facts.recent_blocks.len(), MAX_ESTIMATOR_WINDOW);
        // Most recent stays at the front.
        assert_eq!(facts.recent_blocks.front().unwrap().1, 599);
    }
}
