//! Extended operation codes.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};

/// Out-of-band variant of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ExtendedOperation {
    /// Ordinary naming-context pull.
    #[default]
    None,
    /// Request transfer of an FSMO role.
    FsmoRequestRole,
    /// Request a RID pool allocation.
    FsmoRidAllocation,
    /// Request the RID master role.
    FsmoRequestRidRole,
    /// Request the PDC role.
    FsmoRequestPdc,
    /// Abandon an FSMO role.
    FsmoAbandonRole,
    /// Replicate a single object.
    ReplicateObject,
    /// Replicate the secrets of a single object.
    ReplicateSecret,
}

impl ExtendedOperation {
    /// Converts to the wire code.
    pub fn to_code(&self) -> u32 {
        match self {
            ExtendedOperation::None => 0,
            ExtendedOperation::FsmoRequestRole => 1,
            ExtendedOperation::FsmoRidAllocation => 2,
            ExtendedOperation::FsmoRequestRidRole => 3,
            ExtendedOperation::FsmoRequestPdc => 4,
            ExtendedOperation::FsmoAbandonRole => 5,
            ExtendedOperation::ReplicateObject => 6,
            ExtendedOperation::ReplicateSecret => 7,
        }
    }

    /// Converts from a wire code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(ExtendedOperation::None),
            1 => Some(ExtendedOperation::FsmoRequestRole),
            2 => Some(ExtendedOperation::FsmoRidAllocation),
            3 => Some(ExtendedOperation::FsmoRequestRidRole),
            4 => Some(ExtendedOperation::FsmoRequestPdc),
            5 => Some(ExtendedOperation::FsmoAbandonRole),
            6 => Some(ExtendedOperation::ReplicateObject),
            7 => Some(ExtendedOperation::ReplicateSecret),
            _ => None,
        }
    }

    /// Returns true for anything other than an ordinary pull.
    pub fn is_extended(&self) -> bool {
        !matches!(self, ExtendedOperation::None)
    }
}

impl TryFrom<u32> for ExtendedOperation {
    type Error = ProtocolError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(ProtocolError::UnknownExtendedOperation(code))
    }
}

impl From<ExtendedOperation> for u32 {
    fn from(op: ExtendedOperation) -> Self {
        op.to_code()
    }
}
