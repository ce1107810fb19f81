//! Replica option flags and attribute-schema flag sets.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Replication option flags carried by pull and sync requests.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ReplicaFlags: u32 {
        /// Perform the operation asynchronously.
        const ASYNC_OP = 0x0000_0001;
        /// The destination is a writeable replica.
        const WRIT_REP = 0x0000_0010;
        /// Replicate at startup.
        const INIT_SYNC = 0x0000_0020;
        /// Replicate periodically.
        const PER_SYNC = 0x0000_0040;
        /// Replicate over mail-based transport.
        const MAIL_REP = 0x0000_0080;
        /// Asynchronous replica.
        const ASYNC_REP = 0x0000_0100;
        /// Two-way sync.
        const TWOWAY_SYNC = 0x0000_0200;
        /// Replicate only critical objects.
        const CRITICAL_ONLY = 0x0000_0400;
        /// Send parents before children.
        const GET_ANC = 0x0000_0800;
        /// Return naming context size estimates.
        const GET_NC_SIZE = 0x0000_1000;
        /// Partial replica that is not a global catalog.
        const NONGC_RO_REP = 0x0000_2000;
        /// Identify the source by name.
        const SYNC_BYNAME = 0x0000_4000;
        /// Restart from scratch.
        const FULL_SYNC_NOW = 0x0000_8000;
        /// A full sync is in progress.
        const FULL_SYNC_IN_PROGRESS = 0x0001_0000;
        /// Full sync packet.
        const FULL_SYNC_PACKET = 0x0002_0000;
        /// Requeued sync.
        const SYNC_REQUEUE = 0x0004_0000;
        /// Urgent sync.
        const SYNC_URGENT = 0x0008_0000;
        /// Never synced before.
        const NEVER_SYNCED = 0x0020_0000;
        /// Secret attributes are requested but must be withheld.
        const SPECIAL_SECRET_PROCESSING = 0x0040_0000;
        /// Initial sync now.
        const INIT_SYNC_NOW = 0x0080_0000;
        /// Preempted sync.
        const PREEMPTED = 0x0100_0000;
        /// Sync even when disabled.
        const SYNC_FORCED = 0x0200_0000;
        /// Automatic sync disabled.
        const DISABLE_AUTO_SYNC = 0x0400_0000;
        /// Periodic sync disabled.
        const DISABLE_PERIODIC_SYNC = 0x0800_0000;
        /// Compress replies.
        const USE_COMPRESSION = 0x1000_0000;
        /// Do not send change notifications.
        const NEVER_NOTIFY = 0x2000_0000;
        /// Partial attribute set expansion.
        const SYNC_PAS = 0x4000_0000;
        /// Return all group memberships.
        const GET_ALL_GROUP_MEMBERSHIP = 0x8000_0000;
    }
}

impl ReplicaFlags {
    /// Flags every full naming-context pull starts from.
    pub const FULL_PULL_BASE: Self = Self::INIT_SYNC
        .union(Self::PER_SYNC)
        .union(Self::GET_ANC)
        .union(Self::NEVER_SYNCED);
}

bitflags! {
    /// `systemFlags` values on attributeSchema objects.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SystemFlags: u32 {
        /// Never replicated.
        const NOT_REPLICATED = 0x0000_0001;
        /// Required member of the partial attribute set.
        const REQ_PARTIAL_SET_MEMBER = 0x0000_0002;
        /// Computed by the server, never stored.
        const IS_CONSTRUCTED = 0x0000_0004;
        /// Operational attribute.
        const IS_OPERATIONAL = 0x0000_0008;
        /// Part of the base schema.
        const SCHEMA_BASE_OBJECT = 0x0000_0010;
        /// Usable as an RDN.
        const IS_RDN = 0x0000_0020;
        /// Object cannot be deleted.
        const DISALLOW_DELETE = 0x8000_0000;
    }
}

impl SystemFlags {
    /// Attributes the server never transmits.
    pub const NEVER_SENT: Self = Self::NOT_REPLICATED.union(Self::IS_CONSTRUCTED);
}

bitflags! {
    /// `searchFlags` values on attributeSchema objects.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SearchFlags: u32 {
        /// Indexed.
        const INDEXED = 0x0000_0001;
        /// Container index.
        const CONTAINER_INDEXED = 0x0000_0002;
        /// Ambiguous name resolution.
        const ANR = 0x0000_0004;
        /// Kept on tombstones.
        const PRESERVE_ON_DELETE = 0x0000_0008;
        /// Copied on object copy.
        const COPY = 0x0000_0010;
        /// Tuple index.
        const TUPLE_INDEX = 0x0000_0020;
        /// Subtree index.
        const SUBTREE_INDEX = 0x0000_0040;
        /// Confidential.
        const CONFIDENTIAL = 0x0000_0080;
        /// Never audited.
        const NEVER_AUDIT = 0x0000_0100;
        /// Withheld from read-only replicas.
        const RODC_FILTERED = 0x0000_0200;
        /// Extended link tracking.
        const EXTENDED_LINK_TRACKING = 0x0000_0400;
        /// Base-scope only.
        const BASE_ONLY = 0x0000_0800;
        /// Partition secret.
        const PARTITION_SECRET = 0x0000_1000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_pull_base_bits() {
        assert_eq!(ReplicaFlags::FULL_PULL_BASE.bits(), 0x0020_0860);
        assert!(!ReplicaFlags::FULL_PULL_BASE.contains(ReplicaFlags::WRIT_REP));
    }

    #[test]
    fn never_sent_covers_both_exclusions() {
        assert!(SystemFlags::from_bits_retain(0x4).intersects(SystemFlags::NEVER_SENT));
        assert!(SystemFlags::from_bits_retain(0x1).intersects(SystemFlags::NEVER_SENT));
        assert!(!SystemFlags::from_bits_retain(0x10).intersects(SystemFlags::NEVER_SENT));
    }

    #[test]
    fn unknown_bits_are_retained() {
        let flags = ReplicaFlags::from_bits_retain(0x0010_0000);
        assert_eq!(flags.bits(), 0x0010_0000);
    }
}
