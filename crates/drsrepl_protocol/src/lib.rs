//! # drsrepl protocol
//!
//! Wire-level types for directory replication pull sessions.
//!
//! This crate provides:
//! - `Guid` and `PolicyHandle` identity types
//! - `SupportedExtensions`, the capability bitmask exchanged at bind time
//! - `ReplicaFlags`, `SystemFlags` and `SearchFlags` flag sets
//! - `ExtendedOperation` codes
//! - The two request shapes (`GetNcChangesRequest8`, `GetNcChangesRequest5`)
//!   and the explicit v8 → v5 field mapping
//! - `ChangeChunk`, the server reply carrying a linked list of objects
//! - Maintenance requests (`DsReplicaSync`, `DsRemoveDSServer`)
//!
//! This is a pure protocol crate with no I/O operations. Marshalling onto
//! the RPC wire belongs to the transport.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bind;
mod error;
mod flags;
mod guid;
mod maintenance;
mod operation;
mod reply;
mod request;

pub use bind::{BindInfo, PolicyHandle, SupportedExtensions, BIND_INFO_LENGTH, DS_BIND_GUID};
pub use error::{ProtocolError, ProtocolResult};
pub use flags::{ReplicaFlags, SearchFlags, SystemFlags};
pub use guid::Guid;
pub use maintenance::{RemoveDsServerRequest, RemoveDsServerResult, ReplicaSyncRequest};
pub use operation::ExtendedOperation;
pub use reply::{
    ChangeChunk, GetNcChangesReply, ObjectIter, ReplicaAttribute, ReplicaObject,
    ReplicatedObjectItem,
};
pub use request::{
    AttributeId, GetNcChangesRequest, GetNcChangesRequest5, GetNcChangesRequest8, HighWatermark,
    ObjectIdentifier, PartialAttributeSet, PrefixMapping, UpToDateCursor, UpToDateVector,
    DEFAULT_MAX_NDR_SIZE, DEFAULT_MAX_OBJECT_COUNT,
};
