use crate::codec::{BinaryDecode, BinaryEncode, CodecError, Result};
use std::fmt;
use std::io::{Read, Write};

/// A 32-byte object identifier: block ids, transaction ids, output ids,
/// public keys, contract ids, secrets. All share the same wire shape.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const fn zero() -> Self {
        Hash256([0u8; 32])
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", hex::encode(self.0))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl BinaryEncode for Hash256 {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.encode(writer)
    }
}

impl BinaryDecode for Hash256 {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Hash256(<[u8; 32]>::decode(reader)?))
    }
}

/// Identifies a block by its hash.
pub type BlockId = Hash256;
/// Identifies a transaction by its hash.
pub type TransactionId = Hash256;
/// Identifies an output by its derived id (see spec.md §4.5 on ordering).
pub type OutputId = Hash256;

/// The internal, monotonically increasing identifier used to key an
/// object's full payload in the object store (spec.md "Data id").
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataId(pub u64);

impl BinaryEncode for DataId {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.encode(writer)
    }
}

impl BinaryDecode for DataId {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(DataId(u64::decode(reader)?))
    }
}

/// A 1-byte type tag followed by a 32-byte hash, naming a spend condition
/// (spec.md GLOSSARY "Address / UnlockHash").
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    pub unlock_type: u8,
    pub hash: Hash256,
}

impl Address {
    pub const FREE_FOR_ALL: u8 = 0;
    pub const SINGLE_SIGNATURE: u8 = 1;
    pub const MULTI_SIGNATURE: u8 = 3;
    pub const ATOMIC_SWAP_CONTRACT: u8 = 2;

    pub fn new(unlock_type: u8, hash: Hash256) -> Self {
        Address { unlock_type, hash }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:02x}{})", self.unlock_type, hex::encode(self.hash.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{}", self.unlock_type, hex::encode(self.hash.0))
    }
}

impl BinaryEncode for Address {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.unlock_type.encode(writer)?;
        self.hash.encode(writer)
    }
}

impl BinaryDecode for Address {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let unlock_type = u8::decode(reader)?;
        let hash = Hash256::decode(reader)?;
        Ok(Address { unlock_type, hash })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_round_trips() {
        let addr = Address::new(Address::SINGLE_SIGNATURE, Hash256([7u8; 32]));
        let bytes = addr.encode_to_vec();
        assert_eq!(bytes.len(), 33);
        let decoded = Address::decode_from_slice(&bytes).unwrap();
        assert_eq!(addr, decoded);
    }

    #[test]
    fn hash_decode_rejects_truncated_input() {
        let err = Hash256::decode_from_slice(&[1, 2, 3]).unwrap_err();
        assert_eq!(err, CodecError::Truncated);
    }
}
