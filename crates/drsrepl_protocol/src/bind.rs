//! Bind handshake types: capability bitmask, bind info and session handle.

use crate::guid::Guid;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Interface identifier submitted with every bind call.
pub const DS_BIND_GUID: Guid = Guid::from_uuid(Uuid::from_u128(
    0xe24d_201a_4fd6_11d1_a3da_0000_f875_ae0d,
));

/// Length tag of the bind info block this client sends.
pub const BIND_INFO_LENGTH: u32 = 28;

bitflags! {
    /// Protocol capabilities advertised at bind time.
    ///
    /// `OFFERED` is what this client can speak. The server answers with the
    /// subset it agrees to, and only that answer drives later decisions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SupportedExtensions: u32 {
        /// Base protocol.
        const BASE = 0x0000_0001;
        /// Asynchronous replication.
        const ASYNC_REPLICATION = 0x0000_0002;
        /// DsRemoveDSServer / DsRemoveDSDomain.
        const REMOVEAPI = 0x0000_0004;
        /// DsMoveReq v2.
        const MOVEREQ_V2 = 0x0000_0008;
        /// Compressed change replies.
        const GETCHG_COMPRESS = 0x0000_0010;
        /// DsDomainControllerInfo level 1.
        const DCINFO_V1 = 0x0000_0020;
        /// USN restore optimization.
        const RESTORE_USN_OPTIMIZATION = 0x0000_0040;
        /// DsExecuteKCC.
        const KCC_EXECUTE = 0x0000_0100;
        /// DsAddEntry v2.
        const ADDENTRY_V2 = 0x0000_0200;
        /// Linked-value replication.
        const LINKED_VALUE_REPLICATION = 0x0000_0400;
        /// DsDomainControllerInfo level 2.
        const DCINFO_V2 = 0x0000_0800;
        /// instanceType not required on modify.
        const INSTANCE_TYPE_NOT_REQ_ON_MOD = 0x0000_1000;
        /// Secret attributes are bound to the session key.
        const CRYPTO_BIND = 0x0000_2000;
        /// DsReplicaGetInfo.
        const GET_REPL_INFO = 0x0000_4000;
        /// Strong encryption of secrets.
        const STRONG_ENCRYPTION = 0x0000_8000;
        /// DsDomainControllerInfo level 0xFFFFFFFF.
        const DCINFO_V01 = 0x0001_0000;
        /// Transitive membership evaluation.
        const TRANSITIVE_MEMBERSHIP = 0x0002_0000;
        /// DsAddSidHistory.
        const ADD_SID_HISTORY = 0x0004_0000;
        /// Post-beta3 behaviour.
        const POST_BETA3 = 0x0008_0000;
        /// DsGetMemberships2.
        const GET_MEMBERSHIPS2 = 0x0020_0000;
        /// DsGetNCChanges request v6.
        const GETCHGREQ_V6 = 0x0040_0000;
        /// Non-domain naming contexts.
        const NONDOMAIN_NCS = 0x0080_0000;
        /// DsGetNCChanges request v8.
        const GETCHGREQ_V8 = 0x0100_0000;
        /// DsGetNCChanges reply v5.
        const GETCHGREPLY_V5 = 0x0200_0000;
        /// DsGetNCChanges reply v6.
        const GETCHGREPLY_V6 = 0x0400_0000;
        /// DsAddEntry reply v3.
        const ADDENTRYREPLY_V3 = 0x0800_0000;
        /// DsGetNCChanges reply v7 (shares its bit with `ADDENTRYREPLY_V3`).
        const GETCHGREPLY_V7 = 0x0800_0000;
        /// DsReplicaVerifyObjects (shares its bit with `ADDENTRYREPLY_V3`).
        const VERIFY_OBJECT = 0x0800_0000;
        /// XPRESS compression.
        const XPRESS_COMPRESS = 0x1000_0000;
    }
}

impl SupportedExtensions {
    /// Every capability this client is able to speak.
    pub const OFFERED: Self = Self::BASE
        .union(Self::ASYNC_REPLICATION)
        .union(Self::REMOVEAPI)
        .union(Self::MOVEREQ_V2)
        .union(Self::GETCHG_COMPRESS)
        .union(Self::DCINFO_V1)
        .union(Self::RESTORE_USN_OPTIMIZATION)
        .union(Self::KCC_EXECUTE)
        .union(Self::ADDENTRY_V2)
        .union(Self::LINKED_VALUE_REPLICATION)
        .union(Self::DCINFO_V2)
        .union(Self::INSTANCE_TYPE_NOT_REQ_ON_MOD)
        .union(Self::CRYPTO_BIND)
        .union(Self::GET_REPL_INFO)
        .union(Self::STRONG_ENCRYPTION)
        .union(Self::DCINFO_V01)
        .union(Self::TRANSITIVE_MEMBERSHIP)
        .union(Self::ADD_SID_HISTORY)
        .union(Self::POST_BETA3)
        .union(Self::GET_MEMBERSHIPS2)
        .union(Self::GETCHGREQ_V6)
        .union(Self::NONDOMAIN_NCS)
        .union(Self::GETCHGREQ_V8)
        .union(Self::GETCHGREPLY_V5)
        .union(Self::GETCHGREPLY_V6)
        .union(Self::ADDENTRYREPLY_V3)
        .union(Self::GETCHGREPLY_V7)
        .union(Self::VERIFY_OBJECT);

    /// Returns true if the full v8 request shape may be used.
    #[must_use]
    pub fn supports_request_v8(&self) -> bool {
        self.contains(Self::GETCHGREQ_V8)
    }
}

/// Bind info block exchanged by the bind call (the 28-byte layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindInfo {
    /// Capability bitmask.
    pub supported_extensions: SupportedExtensions,
    /// Site of the caller.
    pub site_guid: Guid,
    /// Process id of the caller.
    pub pid: u32,
    /// Replication epoch.
    pub repl_epoch: u32,
}

impl BindInfo {
    /// Creates the bind info this client sends: the full offered mask.
    pub fn offered() -> Self {
        Self::with_extensions(SupportedExtensions::OFFERED)
    }

    /// Creates a bind info advertising the given capabilities.
    pub fn with_extensions(supported_extensions: SupportedExtensions) -> Self {
        Self {
            supported_extensions,
            site_guid: Guid::NIL,
            pid: 0,
            repl_epoch: 0,
        }
    }

    /// Length tag of this block.
    pub fn length(&self) -> u32 {
        BIND_INFO_LENGTH
    }
}

/// Opaque session handle returned by the bind call.
///
/// Valid only on the connection that produced it. Deliberately not
/// serializable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolicyHandle {
    /// Handle type tag.
    pub handle_type: u32,
    /// Handle identity.
    pub uuid: Guid,
}

impl PolicyHandle {
    /// Creates a handle.
    pub fn new(handle_type: u32, uuid: Guid) -> Self {
        Self { handle_type, uuid }
    }

    /// Returns true if this is the null handle.
    pub fn is_null(&self) -> bool {
        self.handle_type == 0 && self.uuid.is_nil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_guid_matches_interface() {
        assert_eq!(DS_BIND_GUID.to_string(), "e24d201a-4fd6-11d1-a3da-0000f875ae0d");
    }

    #[test]
    fn offered_mask_contents() {
        let offered = SupportedExtensions::OFFERED;
        assert!(offered.contains(SupportedExtensions::BASE));
        assert!(offered.contains(SupportedExtensions::GETCHGREQ_V8));
        assert!(offered.contains(SupportedExtensions::CRYPTO_BIND));
        assert!(offered.supports_request_v8());
        // Offered by nobody in this client.
        assert!(!offered.contains(SupportedExtensions::XPRESS_COMPRESS));
    }

    #[test]
    fn offered_mask_bits() {
        assert_eq!(SupportedExtensions::OFFERED.bits(), 0x0FEF_FF7F);
    }

    #[test]
    fn bind_info_defaults() {
        let info = BindInfo::offered();
        assert_eq!(info.length(), 28);
        assert_eq!(info.supported_extensions, SupportedExtensions::OFFERED);
        assert!(info.site_guid.is_nil());
    }

    #[test]
    fn null_handle() {
        assert!(PolicyHandle::new(0, Guid::NIL).is_null());
        assert!(!PolicyHandle::new(0, Guid::from_bytes([7u8; 16])).is_null());
    }
}
