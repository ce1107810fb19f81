//! # drsrepl testkit
//!
//! Test utilities for the replication engine.
//!
//! This crate provides:
//! - `SimulatedDsa`, a stateful in-process directory server
//! - `MemorySchema`, a schema source loadable from JSON
//! - Fixtures: identities, naming contexts, the sample schema, test logging
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use drsrepl_testkit::prelude::*;
//!
//! #[test]
//! fn pulls_domain() {
//!     let dsa = populated_dsa(10);
//!     let applier = MemoryApplier::new();
//!     let mut session = session_for(&dsa, &applier);
//!     let options = ReplicateOptions::new();
//!     session.replicate(DOMAIN_NC, dsa.invocation_id(), LOCAL_DSA_GUID, &options).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod schema;
pub mod simulated;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::schema::*;
    pub use crate::simulated::*;
    pub use drsrepl_engine::{MemoryApplier, ReplicateOptions};
}

pub use fixtures::*;
pub use generators::*;
pub use schema::*;
pub use simulated::*;
