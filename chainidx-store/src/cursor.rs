//! Opaque pagination token (spec.md §4.7 "C7 Cursor protocol").
//!
//! A cursor is never interpreted by the caller: it is produced by one
//! `get_blocks` call and fed back into the next. Internally it is just a
//! version byte plus the height to resume after, binary-encoded and then
//! hex-encoded so it can travel through a JSON API untouched. The version
//! byte lets a future cursor shape change without breaking callers still
//! holding an old one in flight — they get a clear decode error instead of
//! silently wrong pagination.

use crate::error::{Result, StoreError};
use chainidx_types::{BinaryDecode, BinaryEncode};

const CURSOR_VERSION: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    /// Resume scanning strictly after this height.
    pub after_height: u64,
}

impl Cursor {
    pub fn after(height: u64) -> Self {
        Cursor { after_height: height }
    }

    pub fn encode(&self) -> String {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&CURSOR_VERSION.encode_to_vec());
        bytes.extend_from_slice(&self.after_height.encode_to_vec());
        hex::encode(bytes)
    }

    pub fn decode(token: &str) -> Result<Self> {
        let bytes = hex::decode(token).map_err(|_| StoreError::InvariantViolation("malformed cursor".into()))?;
        let mut cursor = std::io::Cursor::new(bytes.as_slice());
        let version = u8::decode(&mut cursor)?;
        if version != CURSOR_VERSION {
            return Err(StoreError::InvariantViolation(format!(
                "unsupported cursor version {}",
                version
            )));
        }
        let after_height = u64::decode(&mut cursor)?;
        Ok(Cursor { after_height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips_through_hex() {
        let cursor = Cursor::after(4200);
        let token = cursor.encode();
        assert_eq!(Cursor::decode(&token).unwrap(), cursor);
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(Cursor::decode("not hex at all").is_err());
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut bytes = vec![9u8];
        bytes.extend_from_slice(&100u64.encode_to_vec());
        let token = hex::encode(bytes);
        assert!(Cursor::decode(&token).is_err());
    }
}
