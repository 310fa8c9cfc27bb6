//! Unbounded non-negative integer values, used for output values and
//! chain-wide aggregated totals (spec.md §3, §4.1).
//!
//! Mirrors the shape of the teacher's `Amount<NonNegative>` (a phantom-typed
//! wrapper that makes "this integer is never negative" a construction-time
//! invariant) but backs it with `num_bigint::BigUint` since spec.md §4.1
//! requires unbounded width, unlike zebra's fixed `i64` amounts.

use crate::codec::{read_len, write_len, BinaryDecode, BinaryEncode, CodecError, Result};
use num_bigint::BigUint;
use num_traits::Zero;
use std::io::{Read, Write};
use std::ops::{Add, Sub};

/// An unbounded non-negative integer value (a coin or block-stake amount).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Currency(BigUint);

impl Currency {
    pub fn zero() -> Self {
        Currency(BigUint::zero())
    }

    pub fn from_u64(value: u64) -> Self {
        Currency(BigUint::from(value))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_sub(&self, other: &Currency) -> Option<Currency> {
        if self.0 < other.0 {
            None
        } else {
            Some(Currency(&self.0 - &other.0))
        }
    }

    /// Saturating subtraction: used defensively when reverting against a
    /// snapshot that should already guarantee `self >= other` (invariant 2
    /// of spec.md §3); panics in debug builds if the invariant is violated,
    /// so the bug surfaces in tests instead of producing a silently wrong
    /// aggregate.
    pub fn sub_or_panic(&self, other: &Currency) -> Currency {
        self.checked_sub(other)
            .unwrap_or_else(|| panic!("currency underflow: {:?} - {:?}", self, other))
    }

    pub fn to_bytes_be(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        Currency(BigUint::from_bytes_be(bytes))
    }
}

impl Add for &Currency {
    type Output = Currency;
    fn add(self, rhs: &Currency) -> Currency {
        Currency(&self.0 + &rhs.0)
    }
}

impl Sub for &Currency {
    type Output = Currency;
    fn sub(self, rhs: &Currency) -> Currency {
        self.sub_or_panic(rhs)
    }
}

impl From<u64> for Currency {
    fn from(value: u64) -> Self {
        Currency::from_u64(value)
    }
}

impl BinaryEncode for Currency {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let bytes = self.0.to_bytes_be();
        // BigUint::to_bytes_be() returns `[0]` for zero; preserve the
        // "minimal byte sequence" rule from spec.md §4.1 by collapsing
        // that case to a zero-length payload.
        let minimal: &[u8] = if bytes == [0u8] { &[] } else { &bytes };
        write_len(writer, minimal.len())?;
        writer.write_all(minimal)
    }
}

impl BinaryDecode for Currency {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let len = read_len(reader)?;
        const BLIND_ALLOC_LIMIT: usize = 1024;
        let mut buf = vec![0u8; std::cmp::min(len, BLIND_ALLOC_LIMIT)];
        reader.read_exact(&mut buf)?;
        let mut remaining = len.saturating_sub(buf.len());
        while remaining > 0 {
            let mut chunk = vec![0u8; std::cmp::min(remaining, BLIND_ALLOC_LIMIT)];
            reader.read_exact(&mut chunk)?;
            buf.extend_from_slice(&chunk);
            remaining -= chunk.len();
        }
        if !buf.is_empty() && buf[0] == 0 {
            return Err(CodecError::LengthMismatch {
                expected: buf.len(),
                actual: buf.len().saturating_sub(1),
            });
        }
        Ok(Currency(BigUint::from_bytes_be(&buf)))
    }
}
