use chainidx_types::CodecError;
use displaydoc::Display;
use thiserror::Error;

/// The error kinds a store operation can surface (spec.md §7).
#[derive(Error, Display, Debug)]
pub enum StoreError {
    /// requested key was not found
    NotFound,
    /// object found under this id has unexpected type or version
    TypeMismatch,
    /// on-disk bytes could not be decoded: {0}
    Codec(#[from] CodecError),
    /// the engine detected a state the invariants forbid: {0}
    InvariantViolation(String),
    /// underlying store I/O error: {0}
    Backend(String),
    /// irrecoverable error; caller must stop consuming the change stream: {0}
    Fatal(String),
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Whether a caller applying a consensus change must stop the stream
    /// (spec.md §7: "All InvariantViolation inside an apply is classed
    /// Fatal").
    pub fn into_fatal(self) -> StoreError {
        match self {
            StoreError::InvariantViolation(msg) => StoreError::Fatal(msg),
            other @ StoreError::Fatal(_) => other,
            other => StoreError::Fatal(other.to_string()),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Fatal(_))
    }
}
