//! # drsrepl engine
//!
//! Client side of a directory-replication pull session.
//!
//! This crate provides:
//! - Capability negotiation (the bind handshake) and bound connections
//! - The partial attribute set builder for read-only replicas
//! - The replication session driving the change-pull loop
//! - One-shot maintenance calls (replica sync, server removal)
//! - A scripted mock transport and an in-memory chunk applier
//!
//! ## Architecture
//!
//! The RPC transport, the schema search backend and the component that
//! stores replicated objects are collaborators behind traits
//! ([`DrsTransport`], [`SchemaSource`], [`ChunkApplier`]). This crate owns
//! only the protocol state: the session handle, the negotiated
//! capabilities and the per-call cursor.
//!
//! ## Key Invariants
//!
//! - Every protocol choice derives from the negotiated capabilities
//! - The cursor is fresh per `replicate` call and advanced only by the server
//! - A reply claiming objects without an object list is fatal
//! - Nothing is retried inside this crate

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod apply;
mod binding;
mod config;
mod error;
mod maintenance;
mod negotiator;
mod partial_set;
mod schema;
mod session;
mod transport;

pub use apply::{AppliedChunk, ApplyError, ChunkApplier, MemoryApplier};
pub use binding::BindingString;
pub use config::{Credentials, DrsConfig, DEFAULT_PROTOCOL, PRINT_LOG_LEVEL};
pub use error::{DrsError, DrsResult};
pub use maintenance::{remove_server, trigger_sync};
pub use negotiator::{ds_bind, DrsConnection};
pub use partial_set::{build_partial_attribute_set, ATTRIBUTE_SCHEMA_FILTER, PAS_SEARCH_ATTRIBUTES};
pub use schema::{SchemaError, SchemaSource, SearchEntry, SearchScope};
pub use session::{ReplicateOptions, ReplicationSession, ReplicationStats};
pub use transport::{
    Connector, DrsTransport, MockCall, MockTransport, TransportError, TransportResult,
};
