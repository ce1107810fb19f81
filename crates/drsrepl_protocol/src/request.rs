//! Pull request shapes.
//!
//! Two request layouts exist on the wire. The v8 layout is the full one and
//! is what this crate builds; servers that did not negotiate
//! `GETCHGREQ_V8` receive the reduced v5 layout, derived field-for-field
//! from the v8 request through [`From<&GetNcChangesRequest8>`].

use crate::error::{ProtocolError, ProtocolResult};
use crate::flags::ReplicaFlags;
use crate::guid::Guid;
use crate::operation::ExtendedOperation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default cap on objects per reply.
pub const DEFAULT_MAX_OBJECT_COUNT: u32 = 402;

/// Default cap on encoded reply size, in bytes.
pub const DEFAULT_MAX_NDR_SIZE: u32 = 402_116;

/// Numeric attribute identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeId(pub u32);

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Replication cursor for one naming context.
///
/// Starts at zero for every pull and is only ever advanced by copying the
/// server's `new_highwatermark`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct HighWatermark {
    /// Highest USN seen in the current cycle.
    pub tmp_highest_usn: u64,
    /// Reserved.
    pub reserved_usn: u64,
    /// Highest USN of the last completed cycle.
    pub highest_usn: u64,
}

impl HighWatermark {
    /// The starting cursor.
    pub const ZERO: HighWatermark = HighWatermark {
        tmp_highest_usn: 0,
        reserved_usn: 0,
        highest_usn: 0,
    };

    /// Creates a cursor.
    pub fn new(tmp_highest_usn: u64, reserved_usn: u64, highest_usn: u64) -> Self {
        Self {
            tmp_highest_usn,
            reserved_usn,
            highest_usn,
        }
    }

    /// Returns true if `next` does not move any component backwards.
    pub fn is_advanced_by(&self, next: &HighWatermark) -> bool {
        next.tmp_highest_usn >= self.tmp_highest_usn
            && next.reserved_usn >= self.reserved_usn
            && next.highest_usn >= self.highest_usn
    }
}

impl fmt::Display for HighWatermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.tmp_highest_usn, self.reserved_usn, self.highest_usn
        )
    }
}

/// Identifies a directory object, typically a naming context root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ObjectIdentifier {
    /// Object GUID, nil when addressing by name.
    pub guid: Guid,
    /// Distinguished name.
    pub dn: String,
}

impl ObjectIdentifier {
    /// Identifies an object by DN only.
    pub fn from_dn(dn: impl Into<String>) -> Self {
        Self {
            guid: Guid::NIL,
            dn: dn.into(),
        }
    }
}

/// Sorted, duplicate-free set of attributes a partial replica asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPartialAttributeSet")]
pub struct PartialAttributeSet {
    version: u32,
    attids: Vec<AttributeId>,
}

#[derive(Deserialize)]
struct RawPartialAttributeSet {
    version: u32,
    attids: Vec<AttributeId>,
}

impl TryFrom<RawPartialAttributeSet> for PartialAttributeSet {
    type Error = ProtocolError;

    fn try_from(raw: RawPartialAttributeSet) -> Result<Self, Self::Error> {
        if raw.version != PartialAttributeSet::VERSION {
            return Err(ProtocolError::UnsupportedAttributeSetVersion(raw.version));
        }
        Self::from_sorted(raw.attids)
    }
}

impl PartialAttributeSet {
    /// The only set version in use.
    pub const VERSION: u32 = 1;

    /// Builds a set from ids in any order, sorting and dropping duplicates.
    pub fn new(mut attids: Vec<AttributeId>) -> Self {
        attids.sort_unstable();
        attids.dedup();
        Self {
            version: Self::VERSION,
            attids,
        }
    }

    /// Builds a set from ids that must already be strictly ascending.
    pub fn from_sorted(attids: Vec<AttributeId>) -> ProtocolResult<Self> {
        for (index, pair) in attids.windows(2).enumerate() {
            if pair[0] == pair[1] {
                return Err(ProtocolError::DuplicateAttribute(pair[1]));
            }
            if pair[0] > pair[1] {
                return Err(ProtocolError::UnsortedAttributeSet {
                    index: index + 1,
                    previous: pair[0],
                    next: pair[1],
                });
            }
        }
        Ok(Self {
            version: Self::VERSION,
            attids,
        })
    }

    /// Set version tag.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The ids, ascending.
    pub fn attids(&self) -> &[AttributeId] {
        &self.attids
    }

    /// Number of ids.
    pub fn len(&self) -> usize {
        self.attids.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.attids.is_empty()
    }

    /// Returns true if `attid` is requested.
    pub fn contains(&self, attid: AttributeId) -> bool {
        self.attids.binary_search(&attid).is_ok()
    }
}

/// One entry of an up-to-dateness vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpToDateCursor {
    /// Originating replica.
    pub source_dsa_invocation_id: Guid,
    /// Highest USN already seen from it.
    pub highest_usn: u64,
}

/// Changes the destination has already seen, per originating replica.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpToDateVector {
    /// Cursors, one per originating replica.
    pub cursors: Vec<UpToDateCursor>,
}

/// Maps an attribute id prefix to an OID prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixMapping {
    /// High 16 bits of attribute ids using this prefix.
    pub id_prefix: u32,
    /// BER-encoded OID prefix.
    pub oid: Vec<u8>,
}

/// Full (v8) pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetNcChangesRequest8 {
    /// Destination DSA objectGUID.
    pub destination_dsa_guid: Guid,
    /// Source DSA invocation id.
    pub source_dsa_invocation_id: Guid,
    /// Naming context to pull.
    pub naming_context: ObjectIdentifier,
    /// Cursor.
    pub highwatermark: HighWatermark,
    /// Already-seen changes per originating replica.
    pub uptodateness_vector: Option<UpToDateVector>,
    /// Replication option flags.
    pub replica_flags: ReplicaFlags,
    /// Maximum objects per reply.
    pub max_object_count: u32,
    /// Maximum encoded reply size.
    pub max_ndr_size: u32,
    /// Extended operation.
    pub extended_op: ExtendedOperation,
    /// Extended operation argument.
    pub fsmo_info: u64,
    /// Attributes a partial replica wants.
    pub partial_attribute_set: Option<PartialAttributeSet>,
    /// Additional attributes for a partial replica.
    pub partial_attribute_set_ex: Option<PartialAttributeSet>,
    /// Prefix table used to interpret attribute ids.
    pub mapping_ctr: Vec<PrefixMapping>,
}

impl GetNcChangesRequest8 {
    /// Creates a request for `naming_context` starting at the zero cursor.
    pub fn new(
        naming_context: ObjectIdentifier,
        source_dsa_invocation_id: Guid,
        destination_dsa_guid: Guid,
    ) -> Self {
        Self {
            destination_dsa_guid,
            source_dsa_invocation_id,
            naming_context,
            highwatermark: HighWatermark::ZERO,
            uptodateness_vector: None,
            replica_flags: ReplicaFlags::empty(),
            max_object_count: DEFAULT_MAX_OBJECT_COUNT,
            max_ndr_size: DEFAULT_MAX_NDR_SIZE,
            extended_op: ExtendedOperation::None,
            fsmo_info: 0,
            partial_attribute_set: None,
            partial_attribute_set_ex: None,
            mapping_ctr: Vec::new(),
        }
    }
}

/// Reduced (v5) pull request for servers without v8 support.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetNcChangesRequest5 {
    /// Destination DSA objectGUID.
    pub destination_dsa_guid: Guid,
    /// Source DSA invocation id.
    pub source_dsa_invocation_id: Guid,
    /// Naming context to pull.
    pub naming_context: ObjectIdentifier,
    /// Cursor.
    pub highwatermark: HighWatermark,
    /// Already-seen changes per originating replica.
    pub uptodateness_vector: Option<UpToDateVector>,
    /// Replication option flags.
    pub replica_flags: ReplicaFlags,
    /// Maximum objects per reply.
    pub max_object_count: u32,
    /// Maximum encoded reply size.
    pub max_ndr_size: u32,
    /// Extended operation.
    pub extended_op: ExtendedOperation,
    /// Extended operation argument.
    pub fsmo_info: u64,
}

impl From<&GetNcChangesRequest8> for GetNcChangesRequest5 {
    fn from(req: &GetNcChangesRequest8) -> Self {
        // The partial attribute sets and the prefix table have no v5 slot.
        Self {
            destination_dsa_guid: req.destination_dsa_guid,
            source_dsa_invocation_id: req.source_dsa_invocation_id,
            naming_context: req.naming_context.clone(),
            highwatermark: req.highwatermark,
            uptodateness_vector: req.uptodateness_vector.clone(),
            replica_flags: req.replica_flags,
            max_object_count: req.max_object_count,
            max_ndr_size: req.max_ndr_size,
            extended_op: req.extended_op,
            fsmo_info: req.fsmo_info,
        }
    }
}

/// A pull request in whichever shape the negotiated capabilities allow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GetNcChangesRequest {
    /// Reduced layout.
    V5(GetNcChangesRequest5),
    /// Full layout.
    V8(GetNcChangesRequest8),
}

impl GetNcChangesRequest {
    /// Wire level of this request.
    pub fn level(&self) -> u32 {
        match self {
            GetNcChangesRequest::V5(_) => 5,
            GetNcChangesRequest::V8(_) => 8,
        }
    }

    /// Current cursor.
    pub fn highwatermark(&self) -> HighWatermark {
        match self {
            GetNcChangesRequest::V5(req) => req.highwatermark,
            GetNcChangesRequest::V8(req) => req.highwatermark,
        }
    }

    /// Replaces the cursor.
    pub fn set_highwatermark(&mut self, highwatermark: HighWatermark) {
        match self {
            GetNcChangesRequest::V5(req) => req.highwatermark = highwatermark,
            GetNcChangesRequest::V8(req) => req.highwatermark = highwatermark,
        }
    }

    /// Naming context being pulled.
    pub fn naming_context(&self) -> &ObjectIdentifier {
        match self {
            GetNcChangesRequest::V5(req) => &req.naming_context,
            GetNcChangesRequest::V8(req) => &req.naming_context,
        }
    }

    /// Replication option flags.
    pub fn replica_flags(&self) -> ReplicaFlags {
        match self {
            GetNcChangesRequest::V5(req) => req.replica_flags,
            GetNcChangesRequest::V8(req) => req.replica_flags,
        }
    }

    /// Extended operation.
    pub fn extended_op(&self) -> ExtendedOperation {
        match self {
            GetNcChangesRequest::V5(req) => req.extended_op,
            GetNcChangesRequest::V8(req) => req.extended_op,
        }
    }

    /// Maximum objects per reply.
    pub fn max_object_count(&self) -> u32 {
        match self {
            GetNcChangesRequest::V5(req) => req.max_object_count,
            GetNcChangesRequest::V8(req) => req.max_object_count,
        }
    }

    /// Partial attribute set, only carried by the v8 layout.
    pub fn partial_attribute_set(&self) -> Option<&PartialAttributeSet> {
        match self {
            GetNcChangesRequest::V5(_) => None,
            GetNcChangesRequest::V8(req) => req.partial_attribute_set.as_ref(),
        }
    }
}
