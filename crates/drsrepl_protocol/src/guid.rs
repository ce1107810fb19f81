//! GUID identity type.

use crate::error::ProtocolResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A 128-bit directory identifier (DSA GUID, invocation id, object GUID).
///
/// The all-zero value is the "unset" sentinel; components that require a
/// real identity must reject it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(Uuid);

impl Guid {
    /// The all-zero GUID.
    pub const NIL: Guid = Guid(Uuid::nil());

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Builds a GUID from its 16 raw bytes (big-endian field order).
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Parses the `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` string form.
    pub fn parse(s: &str) -> ProtocolResult<Self> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Generates a random GUID.
    #[must_use]
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns true for the all-zero sentinel.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for Guid {
    type Err = crate::error::ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_detection() {
        assert!(Guid::NIL.is_nil());
        assert!(Guid::parse("00000000-0000-0000-0000-000000000000")
            .unwrap()
            .is_nil());
        assert!(!Guid::from_bytes([1u8; 16]).is_nil());
    }

    #[test]
    fn display_is_hyphenated_lowercase() {
        let guid: Guid = "E24D201A-4FD6-11D1-A3DA-0000F875AE0D".parse().unwrap();
        assert_eq!(guid.to_string(), "e24d201a-4fd6-11d1-a3da-0000f875ae0d");
    }

    #[test]
    fn rejects_garbage() {
        assert!(Guid::parse("not-a-guid").is_err());
    }

    #[test]
    fn serializes_as_string() {
        let guid = Guid::parse("e24d201a-4fd6-11d1-a3da-0000f875ae0d").unwrap();
        let json = serde_json::to_string(&guid).unwrap();
        assert_eq!(json, "\"e24d201a-4fd6-11d1-a3da-0000f875ae0d\"");
    }
}
