use crate::amount::Currency;
use crate::codec::{BinaryDecode, BinaryEncode, Result};
use crate::condition::Condition;
use crate::fulfillment::Fulfillment;
use crate::hash::{Hash256, OutputId, TransactionId};
use std::io::{Read, Write};

/// What an output represents (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputKind {
    Coin,
    BlockStake,
    BlockCreationReward,
    TransactionFee,
}

impl OutputKind {
    pub fn is_coin(&self) -> bool {
        matches!(self, OutputKind::Coin | OutputKind::BlockCreationReward | OutputKind::TransactionFee)
    }

    pub fn is_block_stake(&self) -> bool {
        matches!(self, OutputKind::BlockStake)
    }
}

impl BinaryEncode for OutputKind {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let tag: u8 = match self {
            OutputKind::Coin => 0,
            OutputKind::BlockStake => 1,
            OutputKind::BlockCreationReward => 2,
            OutputKind::TransactionFee => 3,
        };
        tag.encode(writer)
    }
}

impl BinaryDecode for OutputKind {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let tag = u8::decode(reader)?;
        Ok(match tag {
            0 => OutputKind::Coin,
            1 => OutputKind::BlockStake,
            2 => OutputKind::BlockCreationReward,
            _ => OutputKind::TransactionFee,
        })
    }
}

/// A single integer that means "block height" below the chain's threshold
/// `C` and "unix timestamp" at or above it (spec.md GLOSSARY). `0` always
/// means "never locked".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReferencePoint(pub u64);

impl ReferencePoint {
    pub const ALWAYS_UNLOCKED: ReferencePoint = ReferencePoint(0);

    pub fn is_always_unlocked(&self) -> bool {
        self.0 == 0
    }

    pub fn is_height(&self, threshold: u64) -> bool {
        self.0 != 0 && self.0 < threshold
    }

    pub fn is_timestamp(&self, threshold: u64) -> bool {
        self.0 >= threshold
    }

    /// Whether this reference point has been reached at the given chain tip.
    pub fn reached(&self, height: u64, timestamp: u64, threshold: u64) -> bool {
        if self.is_always_unlocked() {
            true
        } else if self.is_height(threshold) {
            height >= self.0
        } else {
            timestamp >= self.0
        }
    }
}

impl BinaryEncode for ReferencePoint {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.encode(writer)
    }
}

impl BinaryDecode for ReferencePoint {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(ReferencePoint(u64::decode(reader)?))
    }
}

/// Evidence that an output has been spent: the fulfillment supplied and the
/// id of the transaction that consumed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spenditure {
    pub fulfillment: Fulfillment,
    pub spending_transaction: TransactionId,
}

impl BinaryEncode for Spenditure {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.fulfillment.encode(writer)?;
        self.spending_transaction.encode(writer)
    }
}

impl BinaryDecode for Spenditure {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Spenditure {
            fulfillment: Fulfillment::decode(reader)?,
            spending_transaction: TransactionId::decode(reader)?,
        })
    }
}

/// A chain output: a unit of value locked behind a spend condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    pub id: OutputId,
    /// The transaction or block that created this output.
    pub parent_id: Hash256,
    pub kind: OutputKind,
    pub value: Currency,
    pub condition: Condition,
    pub reference_point: ReferencePoint,
    pub spenditure: Option<Spenditure>,
}

impl Output {
    pub fn is_spent(&self) -> bool {
        self.spenditure.is_some()
    }

    pub fn is_locked(&self, height: u64, timestamp: u64, threshold: u64) -> bool {
        !self.reference_point.reached(height, timestamp, threshold)
    }
}

impl BinaryEncode for Output {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.id.encode(writer)?;
        self.parent_id.encode(writer)?;
        self.kind.encode(writer)?;
        self.value.encode(writer)?;
        self.condition.encode(writer)?;
        self.reference_point.encode(writer)?;
        self.spenditure.encode(writer)
    }
}

impl BinaryDecode for Output {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Output {
            id: OutputId::decode(reader)?,
            parent_id: Hash256::decode(reader)?,
            kind: OutputKind::decode(reader)?,
            value: Currency::decode(reader)?,
            condition: Condition::decode(reader)?,
            reference_point: ReferencePoint::decode(reader)?,
            spenditure: Option::<Spenditure>::decode(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Address;

    fn sample_output() -> Output {
        Output {
            id: Hash256([1u8; 32]),
            parent_id: Hash256([2u8; 32]),
            kind: OutputKind::Coin,
            value: Currency::from_u64(100),
            condition: Condition::UnlockHash(Address::new(Address::SINGLE_SIGNATURE, Hash256([3u8; 32]))),
            reference_point: ReferencePoint(0),
            spenditure: None,
        }
    }

    #[test]
    fn output_round_trips() {
        let output = sample_output();
        let bytes = output.encode_to_vec();
        let decoded = Output::decode_from_slice(&bytes).unwrap();
        assert_eq!(output, decoded);
    }

    #[test]
    fn reference_point_reached_semantics() {
        let threshold = 500_000_000u64;
        let height_locked = ReferencePoint(145);
        assert!(!height_locked.reached(144, 0, threshold));
        assert!(height_locked.reached(145, 0, threshold));

        let ts_locked = ReferencePoint(threshold + 1000);
        assert!(!ts_locked.reached(u64::MAX, threshold + 999, threshold));
        assert!(ts_locked.reached(0, threshold + 1000, threshold));

        assert!(ReferencePoint::ALWAYS_UNLOCKED.reached(0, 0, threshold));
    }
}
