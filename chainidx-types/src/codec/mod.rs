//! Deterministic, consensus-critical binary encoding for indexed chain objects.
//!
//! This is the one true on-disk format: every persisted object and every
//! cursor payload goes through [`BinaryEncode`]/[`BinaryDecode`], never
//! `serde`. Two traits mirror the read/write split the teacher uses for its
//! own wire format (`BitcoinSerialize`/`BitcoinDeserialize`): encoding is
//! infallible (writers only fail on I/O), decoding can fail with a
//! [`CodecError`].

mod error;

pub use error::CodecError;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub type Result<T> = std::result::Result<T, CodecError>;

/// Encodes `Self` into its canonical on-disk byte representation.
pub trait BinaryEncode {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()>;

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        // Encoding never touches the network or disk, so it cannot fail here.
        self.encode(&mut buf).expect("encoding to a Vec is infallible");
        buf
    }
}

/// Decodes `Self` from its canonical on-disk byte representation.
pub trait BinaryDecode: Sized {
    fn decode<R: Read>(reader: &mut R) -> Result<Self>;

    fn decode_from_slice(bytes: &[u8]) -> Result<Self> {
        let mut cursor = io::Cursor::new(bytes);
        let value = Self::decode(&mut cursor)?;
        Ok(value)
    }
}

/// Length and count prefixes use a fixed 8-byte little-endian `u64`.
///
/// The upstream format this codec mirrors has no varint; every
/// length-prefixed field (byte slices, strings, sequences) pays the same
/// fixed 8 bytes. See SPEC_FULL.md C1 for why this was chosen over a
/// Bitcoin-style `CompactSize`.
pub(crate) fn write_len<W: Write>(writer: &mut W, len: usize) -> io::Result<()> {
    writer.write_u64::<LittleEndian>(len as u64)
}

pub(crate) fn read_len<R: Read>(reader: &mut R) -> Result<usize> {
    Ok(reader.read_u64::<LittleEndian>()? as usize)
}

impl BinaryEncode for bool {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&[*self as u8])
    }
}

impl BinaryDecode for bool {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        match reader.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::OutOfRange {
                value: other.to_string(),
            }),
        }
    }
}

impl BinaryEncode for u8 {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&[*self])
    }
}

impl BinaryDecode for u8 {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_u8()?)
    }
}

macro_rules! impl_int_codec {
    ($t:ty, $write:ident, $read:ident) => {
        impl BinaryEncode for $t {
            fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
                writer.$write::<byteorder::BigEndian>(*self)
            }
        }
        impl BinaryDecode for $t {
            fn decode<R: Read>(reader: &mut R) -> Result<Self> {
                Ok(reader.$read::<byteorder::BigEndian>()?)
            }
        }
    };
}

impl_int_codec!(u16, write_u16, read_u16);
impl_int_codec!(u32, write_u32, read_u32);
impl_int_codec!(u64, write_u64, read_u64);
impl_int_codec!(i64, write_i64, read_i64);

impl<const N: usize> BinaryEncode for [u8; N] {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self)
    }
}

impl<const N: usize> BinaryDecode for [u8; N] {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; N];
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl BinaryEncode for Vec<u8> {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_len(writer, self.len())?;
        writer.write_all(self)
    }
}

impl BinaryDecode for Vec<u8> {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let len = read_len(reader)?;
        let mut buf = vec![0u8; std::cmp::min(len, BLIND_ALLOC_LIMIT)];
        reader.read_exact(&mut buf)?;
        let mut remaining = len.saturating_sub(buf.len());
        while remaining > 0 {
            let mut chunk = vec![0u8; std::cmp::min(remaining, BLIND_ALLOC_LIMIT)];
            reader.read_exact(&mut chunk)?;
            buf.extend_from_slice(&chunk);
            remaining -= chunk.len();
        }
        Ok(buf)
    }
}

/// Blind preallocation from an attacker-controlled length is a DOS vector;
/// cap the first chunk and grow incrementally, same defence zebra-chain's
/// `Vec<T>` deserializer uses.
const BLIND_ALLOC_LIMIT: usize = 1024 * 16;

impl<T: BinaryEncode> BinaryEncode for Vec<T> {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_len(writer, self.len())?;
        for item in self.iter() {
            item.encode(writer)?;
        }
        Ok(())
    }
}

impl<T: BinaryDecode> BinaryDecode for Vec<T> {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let len = read_len(reader)?;
        let mut out = Vec::with_capacity(std::cmp::min(len, BLIND_ALLOC_LIMIT));
        for _ in 0..len {
            out.push(T::decode(reader)?);
        }
        Ok(out)
    }
}

impl<T: BinaryEncode> BinaryEncode for Option<T> {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Some(value) => {
                true.encode(writer)?;
                value.encode(writer)
            }
            None => false.encode(writer),
        }
    }
}

impl<T: BinaryDecode> BinaryDecode for Option<T> {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        if bool::decode(reader)? {
            Ok(Some(T::decode(reader)?))
        } else {
            Ok(None)
        }
    }
}

impl<A: BinaryEncode, B: BinaryEncode> BinaryEncode for (A, B) {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.0.encode(writer)?;
        self.1.encode(writer)
    }
}

impl<A: BinaryDecode, B: BinaryDecode> BinaryDecode for (A, B) {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        Ok((A::decode(reader)?, B::decode(reader)?))
    }
}

impl BinaryEncode for String {
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_len(writer, self.len())?;
        writer.write_all(self.as_bytes())
    }
}

impl BinaryDecode for String {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let bytes = Vec::<u8>::decode(reader)?;
        String::from_utf8(bytes).map_err(|_| CodecError::OutOfRange {
            value: "invalid utf-8".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: BinaryEncode + BinaryDecode + PartialEq + std::fmt::Debug>(value: T) {
        let bytes = value.encode_to_vec();
        let decoded = T::decode_from_slice(&bytes).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn primitives_round_trip() {
        round_trip(true);
        round_trip(false);
        round_trip(0u8);
        round_trip(255u8);
        round_trip(12345u32);
        round_trip(u64::MAX);
        round_trip([1u8, 2, 3, 4]);
        round_trip(vec![1u32, 2, 3]);
        round_trip(Some(7u32));
        round_trip::<Option<u32>>(None);
        round_trip("hello chain".to_string());
        round_trip(vec![1u8, 2, 3, 4, 5]);
    }

    #[test]
    fn truncated_input_is_an_error() {
        let err = u32::decode_from_slice(&[1, 2]).unwrap_err();
        assert_eq!(err, CodecError::Truncated);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn u32_round_trips(value: u32) {
            prop_assert_eq!(value, u32::decode_from_slice(&value.encode_to_vec())?);
        }

        #[test]
        fn u64_round_trips(value: u64) {
            prop_assert_eq!(value, u64::decode_from_slice(&value.encode_to_vec())?);
        }

        #[test]
        fn bytes_round_trip(value: Vec<u8>) {
            prop_assert_eq!(value.clone(), Vec::<u8>::decode_from_slice(&value.encode_to_vec())?);
        }

        #[test]
        fn string_round_trips(value: String) {
            prop_assert_eq!(value.clone(), String::decode_from_slice(&value.encode_to_vec())?);
        }

        /// Any byte stream shorter than what a value's encoding demands must
        /// fail, never panic or silently produce a different value.
        #[test]
        fn truncating_an_encoded_u64_never_decodes_to_a_value(value: u64, cut: u8) {
            let bytes = value.encode_to_vec();
            let cut = (cut as usize % bytes.len()).max(1);
            prop_assert!(u64::decode_from_slice(&bytes[..bytes.len() - cut]).is_err());
        }
    }
}
