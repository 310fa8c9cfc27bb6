use crate::amount::Currency;
use crate::codec::{BinaryDecode, BinaryEncode, Result};
use crate::fulfillment::Fulfillment;
use crate::hash::{Address, Hash256, OutputId, TransactionId};
use std::io::{Read, Write};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapSpenditure {
    pub fulfillment: Fulfillment,
    pub coin_output: OutputId,
}

impl BinaryEncode for SwapSpenditure {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.fulfillment.encode(writer)?;
        self.coin_output.encode(writer)
    }
}

impl BinaryDecode for SwapSpenditure {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(SwapSpenditure {
            fulfillment: Fulfillment::decode(reader)?,
            coin_output: OutputId::decode(reader)?,
        })
    }
}

/// An atomic-swap contract: funded coin value locked behind a
/// sender/receiver/hashed-secret/timelock condition (spec.md §3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtomicSwapContract {
    pub address: Address,
    pub value: Currency,
    pub sender: Address,
    pub receiver: Address,
    pub hashed_secret: Hash256,
    pub timelock: u64,
    /// Ids of every transaction that has touched this contract (creation,
    /// and eventually the claim/refund).
    pub relevant_transactions: Vec<TransactionId>,
    /// The coin input that funded the contract.
    pub funding_input: OutputId,
    pub spenditure: Option<SwapSpenditure>,
}

impl AtomicSwapContract {
    pub fn is_spent(&self) -> bool {
        self.spenditure.is_some()
    }
}

impl BinaryEncode for AtomicSwapContract {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.address.encode(writer)?;
        self.value.encode(writer)?;
        self.sender.encode(writer)?;
        self.receiver.encode(writer)?;
        self.hashed_secret.encode(writer)?;
        self.timelock.encode(writer)?;
        self.relevant_transactions.encode(writer)?;
        self.funding_input.encode(writer)?;
        self.spenditure.encode(writer)
    }
}

impl BinaryDecode for AtomicSwapContract {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(AtomicSwapContract {
            address: Address::decode(reader)?,
            value: Currency::decode(reader)?,
            sender: Address::decode(reader)?,
            receiver: Address::decode(reader)?,
            hashed_secret: Hash256::decode(reader)?,
            timelock: u64::decode(reader)?,
            relevant_transactions: Vec::<TransactionId>::decode(reader)?,
            funding_input: OutputId::decode(reader)?,
            spenditure: Option::<SwapSpenditure>::decode(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_round_trips() {
        let contract = AtomicSwapContract {
            address: Address::new(Address::ATOMIC_SWAP_CONTRACT, Hash256([1u8; 32])),
            value: Currency::from_u64(10),
            sender: Address::new(Address::SINGLE_SIGNATURE, Hash256([2u8; 32])),
            receiver: Address::new(Address::SINGLE_SIGNATURE, Hash256([3u8; 32])),
            hashed_secret: Hash256([4u8; 32]),
            timelock: 1_600_000_000,
            relevant_transactions: vec![Hash256([5u8; 32])],
            funding_input: Hash256([6u8; 32]),
            spenditure: None,
        };
        let bytes = contract.encode_to_vec();
        let decoded = AtomicSwapContract::decode_from_slice(&bytes).unwrap();
        assert_eq!(contract, decoded);
    }
}
