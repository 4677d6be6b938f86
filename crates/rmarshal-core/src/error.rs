//! Error types produced while decoding, encoding, or projecting Marshal data.

use thiserror::Error;

/// Errors that can occur while decoding, encoding, or projecting a Marshal
/// 4.8 document.
#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("bad signature: expected 04 08, got {0:02x} {1:02x}")]
    BadSignature(u8, u8),

    #[error("truncated input: expected {expected} more byte(s) at offset {offset}")]
    Truncated { offset: usize, expected: usize },

    #[error("unsupported tag byte {tag:#04x} ({tag_char}) at offset {offset}")]
    UnsupportedTag { tag: u8, tag_char: char, offset: usize },

    #[error("bad {kind} reference: index {index} out of range (have {len})")]
    BadRef { kind: RefKind, index: usize, len: usize },

    #[error("integer {0} is out of range for the Marshal 4.8 fixnum encoding")]
    OverLongInt(i64),

    #[error("unsupported string encoding: {reason}")]
    EncodingUnsupported { reason: String },

    #[error("projection failed for class {class_name}: {reason}")]
    ProjectionFailed { class_name: String, reason: String },

    #[error("unknown class: factory returned no object for {class_name}")]
    UnknownClass { class_name: String },

    #[error("recursion limit of {limit} exceeded while decoding")]
    RecursionLimit { limit: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Which reference table a [`MarshalError::BadRef`] was looking up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Symbol,
    Object,
}

impl std::fmt::Display for RefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Symbol => write!(f, "symbol"),
            Self::Object => write!(f, "object"),
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T, E = MarshalError> = std::result::Result<T, E>;
