use crate::amount::Currency;
use crate::codec::{BinaryDecode, BinaryEncode, Result};
use crate::hash::Address;
use std::io::{Read, Write};

/// The locked/unlocked split for one value domain (coins or block-stakes).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Balance {
    pub unlocked: Currency,
    pub locked: Currency,
}

impl BinaryEncode for Balance {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.unlocked.encode(writer)?;
        self.locked.encode(writer)
    }
}

impl BinaryDecode for Balance {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Balance {
            unlocked: Currency::decode(reader)?,
            locked: Currency::decode(reader)?,
        })
    }
}

/// Every wallet variant carries coin and block-stake balances (spec.md §3).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Balances {
    pub coins: Balance,
    pub block_stakes: Balance,
}

impl BinaryEncode for Balances {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.coins.encode(writer)?;
        self.block_stakes.encode(writer)
    }
}

impl BinaryDecode for Balances {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Balances {
            coins: Balance::decode(reader)?,
            block_stakes: Balance::decode(reader)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Wallet {
    /// Unlock-type 0: anyone can spend, no extra fields.
    FreeForAll {
        address: Address,
        balances: Balances,
    },
    /// A single-signature wallet, plus the multi-signature wallets it
    /// co-owns (so a query for "what can this key spend" is a single
    /// lookup rather than a scan).
    SingleSignature {
        address: Address,
        balances: Balances,
        cosigned_wallets: Vec<Address>,
    },
    MultiSignature {
        address: Address,
        balances: Balances,
        owners: Vec<Address>,
        required_signatures: u64,
    },
}

impl Wallet {
    pub fn address(&self) -> Address {
        match self {
            Wallet::FreeForAll { address, .. } => *address,
            Wallet::SingleSignature { address, .. } => *address,
            Wallet::MultiSignature { address, .. } => *address,
        }
    }

    pub fn balances(&self) -> &Balances {
        match self {
            Wallet::FreeForAll { balances, .. } => balances,
            Wallet::SingleSignature { balances, .. } => balances,
            Wallet::MultiSignature { balances, .. } => balances,
        }
    }

    pub fn balances_mut(&mut self) -> &mut Balances {
        match self {
            Wallet::FreeForAll { balances, .. } => balances,
            Wallet::SingleSignature { balances, .. } => balances,
            Wallet::MultiSignature { balances, .. } => balances,
        }
    }
}

const TAG_FREE_FOR_ALL: u8 = 0;
const TAG_SINGLE_SIGNATURE: u8 = 1;
const TAG_MULTI_SIGNATURE: u8 = 2;

impl BinaryEncode for Wallet {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Wallet::FreeForAll { address, balances } => {
                TAG_FREE_FOR_ALL.encode(writer)?;
                address.encode(writer)?;
                balances.encode(writer)
            }
            Wallet::SingleSignature {
                address,
                balances,
                cosigned_wallets,
            } => {
                TAG_SINGLE_SIGNATURE.encode(writer)?;
                address.encode(writer)?;
                balances.encode(writer)?;
                cosigned_wallets.encode(writer)
            }
            Wallet::MultiSignature {
                address,
                balances,
                owners,
                required_signatures,
            } => {
                TAG_MULTI_SIGNATURE.encode(writer)?;
                address.encode(writer)?;
                balances.encode(writer)?;
                owners.encode(writer)?;
                required_signatures.encode(writer)
            }
        }
    }
}

impl BinaryDecode for Wallet {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let tag = u8::decode(reader)?;
        match tag {
            TAG_FREE_FOR_ALL => Ok(Wallet::FreeForAll {
                address: Address::decode(reader)?,
                balances: Balances::decode(reader)?,
            }),
            TAG_SINGLE_SIGNATURE => Ok(Wallet::SingleSignature {
                address: Address::decode(reader)?,
                balances: Balances::decode(reader)?,
                cosigned_wallets: Vec::<Address>::decode(reader)?,
            }),
            _ => Ok(Wallet::MultiSignature {
                address: Address::decode(reader)?,
                balances: Balances::decode(reader)?,
                owners: Vec::<Address>::decode(reader)?,
                required_signatures: u64::decode(reader)?,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash256;

    #[test]
    fn single_signature_wallet_round_trips() {
        let wallet = Wallet::SingleSignature {
            address: Address::new(Address::SINGLE_SIGNATURE, Hash256([1u8; 32])),
            balances: Balances {
                coins: Balance {
                    unlocked: Currency::from_u64(50),
                    locked: Currency::from_u64(100),
                },
                block_stakes: Balance::default(),
            },
            cosigned_wallets: vec![Address::new(Address::MULTI_SIGNATURE, Hash256([2u8; 32]))],
        };
        let bytes = wallet.encode_to_vec();
        let decoded = Wallet::decode_from_slice(&bytes).unwrap();
        assert_eq!(wallet, decoded);
    }
}
