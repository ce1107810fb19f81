//! Error types for protocol value validation.

use crate::request::AttributeId;
use thiserror::Error;

/// Result type for protocol value construction.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised when a protocol value would violate its wire invariants.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A GUID string could not be parsed.
    #[error("invalid GUID: {0}")]
    InvalidGuid(#[from] uuid::Error),

    /// Partial attribute set entries are out of order.
    #[error("partial attribute set not ascending at index {index}: {previous} then {next}")]
    UnsortedAttributeSet {
        /// Index of the offending entry.
        index: usize,
        /// Entry before the offending one.
        previous: AttributeId,
        /// The offending entry.
        next: AttributeId,
    },

    /// Partial attribute set contains the same attribute twice.
    #[error("partial attribute set contains {0} more than once")]
    DuplicateAttribute(AttributeId),

    /// Unknown partial attribute set version.
    #[error("unsupported partial attribute set version {0}")]
    UnsupportedAttributeSetVersion(u32),

    /// Unknown extended operation code.
    #[error("unknown extended operation code {0}")]
    UnknownExtendedOperation(u32),
}
