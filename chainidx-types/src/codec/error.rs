use displaydoc::Display;
use thiserror::Error;

/// An error produced while decoding a value from its canonical binary form.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// io error while decoding: {0}
    Io(String),
    /// unknown tag byte {tag} for this type
    UnknownTag { tag: u8 },
    /// input ended before a complete value could be decoded
    Truncated,
    /// length prefix {expected} did not match the {actual} bytes actually present
    LengthMismatch { expected: usize, actual: usize },
    /// value {value} is outside the accepted range for this field
    OutOfRange { value: String },
}

impl From<std::io::Error> for CodecError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => CodecError::Truncated,
            _ => CodecError::Io(e.to_string()),
        }
    }
}
