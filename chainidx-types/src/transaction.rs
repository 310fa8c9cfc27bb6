use crate::codec::{BinaryDecode, BinaryEncode, Result};
use crate::hash::{BlockId, OutputId, TransactionId};
use std::io::{Read, Write};

/// An indexed transaction: every field is already resolved to output/input
/// ids, never embedded values, so the object store is the single owner of
/// the actual `Output` payloads (spec.md §9 "Cross-entity back references").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,
    pub parent_block: BlockId,
    pub version: u8,
    pub coin_inputs: Vec<OutputId>,
    pub coin_outputs: Vec<OutputId>,
    pub block_stake_inputs: Vec<OutputId>,
    pub block_stake_outputs: Vec<OutputId>,
    /// The id of this transaction's fee payout output, if the block that
    /// contains it produced one (spec.md §9 open question, resolved in
    /// DESIGN.md: only a block's second payout is ever a fee payout).
    pub fee_payout: Option<OutputId>,
    pub arbitrary_data: Vec<u8>,
    /// Opaque upstream extension bytes this indexer does not interpret.
    pub extension_data: Vec<u8>,
}

impl BinaryEncode for Transaction {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.id.encode(writer)?;
        self.parent_block.encode(writer)?;
        self.version.encode(writer)?;
        self.coin_inputs.encode(writer)?;
        self.coin_outputs.encode(writer)?;
        self.block_stake_inputs.encode(writer)?;
        self.block_stake_outputs.encode(writer)?;
        self.fee_payout.encode(writer)?;
        self.arbitrary_data.encode(writer)?;
        self.extension_data.encode(writer)
    }
}

impl BinaryDecode for Transaction {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Transaction {
            id: TransactionId::decode(reader)?,
            parent_block: BlockId::decode(reader)?,
            version: u8::decode(reader)?,
            coin_inputs: Vec::<OutputId>::decode(reader)?,
            coin_outputs: Vec::<OutputId>::decode(reader)?,
            block_stake_inputs: Vec::<OutputId>::decode(reader)?,
            block_stake_outputs: Vec::<OutputId>::decode(reader)?,
            fee_payout: Option::<OutputId>::decode(reader)?,
            arbitrary_data: Vec::<u8>::decode(reader)?,
            extension_data: Vec::<u8>::decode(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash256;

    #[test]
    fn transaction_round_trips() {
        let tx = Transaction {
            id: Hash256([1u8; 32]),
            parent_block: Hash256([2u8; 32]),
            version: 1,
            coin_inputs: vec![Hash256([3u8; 32])],
            coin_outputs: vec![Hash256([4u8; 32])],
            block_stake_inputs: vec![],
            block_stake_outputs: vec![],
            fee_payout: Some(Hash256([5u8; 32])),
            arbitrary_data: vec![9, 9, 9],
            extension_data: vec![],
        };
        let bytes = tx.encode_to_vec();
        let decoded = Transaction::decode_from_slice(&bytes).unwrap();
        assert_eq!(tx, decoded);
    }
}
