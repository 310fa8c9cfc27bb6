//! Polymorphic spend conditions (spec.md §4.1).
//!
//! Modeled as a tagged enum with an explicit `Unknown` arm instead of the
//! upstream's runtime type reflection (spec.md §9 "Required re-architecture"),
//! so that forward-compatible chain extensions round-trip bit-for-bit
//! without the codec knowing their shape.

use crate::codec::{BinaryDecode, BinaryEncode, CodecError, Result};
use crate::hash::{Address, Hash256};
use std::io::{Read, Write};

const TAG_NIL: u8 = 0;
const TAG_UNLOCK_HASH: u8 = 1;
const TAG_ATOMIC_SWAP: u8 = 2;
const TAG_TIME_LOCK: u8 = 3;
const TAG_MULTI_SIGNATURE: u8 = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    /// No spend restriction at all.
    Nil,
    /// Spendable by revealing a fulfillment matching this address.
    UnlockHash(Address),
    /// An atomic-swap contract condition.
    AtomicSwap {
        sender: Address,
        receiver: Address,
        hashed_secret: Hash256,
        timestamp: u64,
    },
    /// Wraps another condition, spendable only once `lock_time` is reached.
    /// Invariant: the nested condition is always `Nil`, `UnlockHash`, or
    /// `MultiSignature` (spec.md §4.1); enforced on construction and decode.
    TimeLock {
        lock_time: u64,
        condition: Box<Condition>,
    },
    MultiSignature {
        addresses: Vec<Address>,
        required_signatures: u64,
    },
    /// A condition tag this codec does not recognise. Preserved bit-for-bit
    /// via the fallback envelope so that unrecognised chain extensions never
    /// lose data passing through the indexer (spec.md §4.1, §6 "Format
    /// versioning").
    Unknown { tag: u8, raw: Vec<u8> },
}

impl Condition {
    pub fn time_lock(lock_time: u64, condition: Condition) -> Result<Condition> {
        if !Self::valid_time_lock_target(&condition) {
            return Err(CodecError::OutOfRange {
                value: "TimeLock may only wrap Nil, UnlockHash, or MultiSignature".into(),
            });
        }
        Ok(Condition::TimeLock {
            lock_time,
            condition: Box::new(condition),
        })
    }

    fn valid_time_lock_target(condition: &Condition) -> bool {
        matches!(
            condition,
            Condition::Nil | Condition::UnlockHash(_) | Condition::MultiSignature { .. }
        )
    }
}

impl BinaryEncode for Condition {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Condition::Nil => TAG_NIL.encode(writer),
            Condition::UnlockHash(addr) => {
                TAG_UNLOCK_HASH.encode(writer)?;
                addr.encode(writer)
            }
            Condition::AtomicSwap {
                sender,
                receiver,
                hashed_secret,
                timestamp,
            } => {
                TAG_ATOMIC_SWAP.encode(writer)?;
                sender.encode(writer)?;
                receiver.encode(writer)?;
                hashed_secret.encode(writer)?;
                timestamp.encode(writer)
            }
            Condition::TimeLock {
                lock_time,
                condition,
            } => {
                TAG_TIME_LOCK.encode(writer)?;
                lock_time.encode(writer)?;
                condition.encode(writer)
            }
            Condition::MultiSignature {
                addresses,
                required_signatures,
            } => {
                TAG_MULTI_SIGNATURE.encode(writer)?;
                addresses.encode(writer)?;
                required_signatures.encode(writer)
            }
            Condition::Unknown { tag, raw } => {
                tag.encode(writer)?;
                false.encode(writer)?;
                raw.encode(writer)
            }
        }
    }
}

impl BinaryDecode for Condition {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let tag = u8::decode(reader)?;
        match tag {
            TAG_NIL => Ok(Condition::Nil),
            TAG_UNLOCK_HASH => Ok(Condition::UnlockHash(Address::decode(reader)?)),
            TAG_ATOMIC_SWAP => Ok(Condition::AtomicSwap {
                sender: Address::decode(reader)?,
                receiver: Address::decode(reader)?,
                hashed_secret: Hash256::decode(reader)?,
                timestamp: u64::decode(reader)?,
            }),
            TAG_TIME_LOCK => {
                let lock_time = u64::decode(reader)?;
                let inner = Condition::decode(reader)?;
                Condition::time_lock(lock_time, inner)
            }
            TAG_MULTI_SIGNATURE => Ok(Condition::MultiSignature {
                addresses: Vec::<Address>::decode(reader)?,
                required_signatures: u64::decode(reader)?,
            }),
            unknown_tag => {
                let recognised = bool::decode(reader)?;
                debug_assert!(!recognised, "fallback envelope always marks recognised=false");
                let raw = Vec::<u8>::decode(reader)?;
                Ok(Condition::Unknown {
                    tag: unknown_tag,
                    raw,
                })
            }
        }
    }
}
