//! Codec error types.

use crate::codes::ErdCode;

/// An ERD code string that could not be parsed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unparseable ERD code: {raw:?}")]
pub struct CodeParseError {
    raw: String,
}

impl CodeParseError {
    pub(crate) fn new(raw: &str) -> Self {
        Self { raw: raw.to_string() }
    }
}

/// A raw wire value that could not be decoded for a known property.
///
/// Decode errors are recoverable by design: the ingestion path logs them,
/// keeps the previous cached value, and moves on to the next entry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DecodeError {
    /// The raw value is not valid hex.
    #[error("invalid hex for {code}: {value:?}")]
    InvalidHex { code: ErdCode, value: String },

    /// The raw value decodes to fewer bytes than the property needs.
    #[error("value for {code} is too short: {value:?}")]
    Truncated { code: ErdCode, value: String },

    /// The decoded bytes are not valid for the property's type, e.g. a
    /// text property carrying non-ASCII bytes.
    #[error("malformed value for {code}: {reason}")]
    Malformed { code: ErdCode, reason: String },
}

/// A caller-supplied value outside the legal domain for a property.
///
/// Encode errors surface synchronously; nothing is put on the wire.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EncodeError {
    /// The value's variant does not match the property's catalog type.
    #[error("value {value} cannot encode for {code} ({expected})")]
    TypeMismatch {
        code: ErdCode,
        expected: &'static str,
        value: String,
    },

    /// The value is the right shape but outside the encodable range, e.g.
    /// a duration over the wire maximum or an unknown enum variant.
    #[error("value out of range for {code}: {reason}")]
    OutOfRange { code: ErdCode, reason: String },

    /// The property is decode-only; the vendor defines no wire encoding.
    #[error("{code} is a read-only property")]
    ReadOnly { code: ErdCode },
}
