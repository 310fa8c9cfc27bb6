use crate::amount::Currency;
use crate::codec::{BinaryDecode, BinaryEncode, Result};
use crate::hash::{BlockId, OutputId, TransactionId};
use crate::target::Target;
use std::io::{Read, Write};

/// An indexed block: header metadata plus the ordered ids of its payouts
/// and transactions (spec.md §3). The actual transaction/output payloads
/// live in the object store, keyed by these ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub parent_id: BlockId,
    pub height: u64,
    pub timestamp: u64,
    pub payouts: Vec<OutputId>,
    pub transactions: Vec<TransactionId>,
}

impl BinaryEncode for Block {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.id.encode(writer)?;
        self.parent_id.encode(writer)?;
        self.height.encode(writer)?;
        self.timestamp.encode(writer)?;
        self.payouts.encode(writer)?;
        self.transactions.encode(writer)
    }
}

impl BinaryDecode for Block {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Block {
            id: BlockId::decode(reader)?,
            parent_id: BlockId::decode(reader)?,
            height: u64::decode(reader)?,
            timestamp: u64::decode(reader)?,
            payouts: Vec::<OutputId>::decode(reader)?,
            transactions: Vec::<TransactionId>::decode(reader)?,
        })
    }
}

/// Per-block constants plus a snapshot of aggregated chain totals
/// immediately after this block applied. Immutable once written
/// (spec.md §3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockFacts {
    pub target: Target,
    pub difficulty: Currency,
    pub total_coins: Currency,
    pub total_locked_coins: Currency,
    pub total_block_stakes: Currency,
    pub total_locked_block_stakes: Currency,
    pub estimated_active_block_stakes: Currency,
}

impl BinaryEncode for BlockFacts {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.target.0.to_bytes_be().encode(writer)?;
        self.difficulty.encode(writer)?;
        self.total_coins.encode(writer)?;
        self.total_locked_coins.encode(writer)?;
        self.total_block_stakes.encode(writer)?;
        self.total_locked_block_stakes.encode(writer)?;
        self.estimated_active_block_stakes.encode(writer)
    }
}

impl BinaryDecode for BlockFacts {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let target_bytes = Vec::<u8>::decode(reader)?;
        Ok(BlockFacts {
            target: Target::from_bytes_be(&target_bytes),
            difficulty: Currency::decode(reader)?,
            total_coins: Currency::decode(reader)?,
            total_locked_coins: Currency::decode(reader)?,
            total_block_stakes: Currency::decode(reader)?,
            total_locked_block_stakes: Currency::decode(reader)?,
            estimated_active_block_stakes: Currency::decode(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash256;
    use num_bigint::BigUint;

    #[test]
    fn block_round_trips() {
        let block = Block {
            id: Hash256([1u8; 32]),
            parent_id: Hash256([0u8; 32]),
            height: 1,
            timestamp: 1_600_000_000,
            payouts: vec![Hash256([2u8; 32])],
            transactions: vec![Hash256([3u8; 32])],
        };
        let bytes = block.encode_to_vec();
        let decoded = Block::decode_from_slice(&bytes).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn block_facts_round_trips() {
        let facts = BlockFacts {
            target: Target(BigUint::from(12345u32)),
            difficulty: Currency::from_u64(99),
            total_coins: Currency::from_u64(150),
            total_locked_coins: Currency::from_u64(100),
            total_block_stakes: Currency::from_u64(1000),
            total_locked_block_stakes: Currency::zero(),
            estimated_active_block_stakes: Currency::from_u64(3),
        };
        let bytes = facts.encode_to_vec();
        let decoded = BlockFacts::decode_from_slice(&bytes).unwrap();
        assert_eq!(facts, decoded);
    }
}
