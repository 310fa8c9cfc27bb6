//! Polymorphic spend fulfillments, mirroring [`crate::condition::Condition`]
//! (spec.md §4.1).

use crate::codec::{BinaryDecode, BinaryEncode, CodecError, Result};
use std::io::{Read, Write};

const TAG_SINGLE_SIGNATURE: u8 = 1;
const TAG_MULTI_SIGNATURE: u8 = 2;
const TAG_ATOMIC_SWAP: u8 = 3;

/// Only Ed25519 is an accepted signature algorithm (spec.md §4.1).
const ALGORITHM_ED25519: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Algorithm;

impl BinaryEncode for Algorithm {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        ALGORITHM_ED25519.encode(writer)
    }
}

impl BinaryDecode for Algorithm {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let tag = u8::decode(reader)?;
        if tag != ALGORITHM_ED25519 {
            return Err(CodecError::OutOfRange {
                value: format!("unsupported signature algorithm {}", tag),
            });
        }
        Ok(Algorithm)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SignaturePair {
    pub algorithm: Algorithm,
    pub public_key: [u8; 32],
    pub signature: [u8; 64],
}

impl std::fmt::Debug for SignaturePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignaturePair")
            .field("public_key", &hex::encode(self.public_key))
            .finish()
    }
}

impl BinaryEncode for SignaturePair {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.algorithm.encode(writer)?;
        self.public_key.encode(writer)?;
        self.signature.encode(writer)
    }
}

impl BinaryDecode for SignaturePair {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(SignaturePair {
            algorithm: Algorithm::decode(reader)?,
            public_key: <[u8; 32]>::decode(reader)?,
            signature: <[u8; 64]>::decode(reader)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fulfillment {
    SingleSignature(SignaturePair),
    MultiSignature(Vec<SignaturePair>),
    AtomicSwap {
        pair: SignaturePair,
        /// The pre-image of the contract's hashed secret, revealed by the
        /// receiver to claim the contract. `None` when the sender reclaims
        /// after the timelock instead.
        secret: Option<[u8; 32]>,
    },
    Unknown {
        tag: u8,
        raw: Vec<u8>,
    },
}

impl BinaryEncode for Fulfillment {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Fulfillment::SingleSignature(pair) => {
                TAG_SINGLE_SIGNATURE.encode(writer)?;
                pair.encode(writer)
            }
            Fulfillment::MultiSignature(pairs) => {
                TAG_MULTI_SIGNATURE.encode(writer)?;
                pairs.encode(writer)
            }
            Fulfillment::AtomicSwap { pair, secret } => {
                TAG_ATOMIC_SWAP.encode(writer)?;
                pair.encode(writer)?;
                match secret {
                    Some(s) => s.to_vec().encode(writer),
                    None => Vec::<u8>::new().encode(writer),
                }
            }
            Fulfillment::Unknown { tag, raw } => {
                tag.encode(writer)?;
                false.encode(writer)?;
                raw.encode(writer)
            }
        }
    }
}

impl BinaryDecode for Fulfillment {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let tag = u8::decode(reader)?;
        match tag {
            TAG_SINGLE_SIGNATURE => Ok(Fulfillment::SingleSignature(SignaturePair::decode(reader)?)),
            TAG_MULTI_SIGNATURE => Ok(Fulfillment::MultiSignature(Vec::<SignaturePair>::decode(
                reader,
            )?)),
            TAG_ATOMIC_SWAP => {
                let pair = SignaturePair::decode(reader)?;
                let raw_secret = Vec::<u8>::decode(reader)?;
                let secret = match raw_secret.len() {
                    0 => None,
                    32 => {
                        let mut buf = [0u8; 32];
                        buf.copy_from_slice(&raw_secret);
                        Some(buf)
                    }
                    other => {
                        return Err(CodecError::LengthMismatch {
                            expected: 32,
                            actual: other,
                        })
                    }
                };
                Ok(Fulfillment::AtomicSwap { pair, secret })
            }
            unknown_tag => {
                let recognised = bool::decode(reader)?;
                debug_assert!(!recognised);
                let raw = Vec::<u8>::decode(reader)?;
                Ok(Fulfillment::Unknown {
                    tag: unknown_tag,
                    raw,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> SignaturePair {
        SignaturePair {
            algorithm: Algorithm,
            public_key: [1u8; 32],
            signature: [2u8; 64],
        }
    }

    fn round_trip(f: Fulfillment) {
        let bytes = f.encode_to_vec();
        let decoded = Fulfillment::decode_from_slice(&bytes).unwrap();
        assert_eq!(f, decoded);
    }

    #[test]
    fn single_signature_round_trips() {
        round_trip(Fulfillment::SingleSignature(pair()));
    }

    #[test]
    fn multi_signature_round_trips() {
        round_trip(Fulfillment::MultiSignature(vec![pair(), pair()]));
    }

    #[test]
    fn atomic_swap_without_secret_round_trips() {
        round_trip(Fulfillment::AtomicSwap {
            pair: pair(),
            secret: None,
        });
    }

    #[test]
    fn atomic_swap_with_secret_round_trips() {
        round_trip(Fulfillment::AtomicSwap {
            pair: pair(),
            secret: Some([9u8; 32]),
        });
    }

    #[test]
    fn unsupported_algorithm_is_rejected() {
        let mut bytes = vec![TAG_SINGLE_SIGNATURE, 2 /* unsupported algorithm */];
        bytes.extend_from_slice(&[1u8; 32]);
        bytes.extend_from_slice(&[2u8; 64]);
        let err = Fulfillment::decode_from_slice(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { .. }));
    }

    #[test]
    fn unknown_tag_round_trips_bit_for_bit() {
        round_trip(Fulfillment::Unknown {
            tag: 250,
            raw: vec![1, 2, 3],
        });
    }
}
