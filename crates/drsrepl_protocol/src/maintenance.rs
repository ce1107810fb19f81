//! One-shot maintenance requests.

use crate::flags::ReplicaFlags;
use crate::guid::Guid;
use crate::request::ObjectIdentifier;
use serde::{Deserialize, Serialize};

/// Asks a server to start replicating a naming context from a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSyncRequest {
    /// Naming context to sync.
    pub naming_context: ObjectIdentifier,
    /// Source DSA objectGUID.
    pub source_dsa_guid: Guid,
    /// Source DSA DNS name, when addressing by name.
    pub source_dsa_dns: Option<String>,
    /// Sync options.
    pub options: ReplicaFlags,
}

impl ReplicaSyncRequest {
    /// Wire level of this request.
    pub const LEVEL: u32 = 1;

    /// Creates a request addressing the source by GUID.
    pub fn new(
        source_dsa_guid: Guid,
        naming_context: impl Into<String>,
        options: ReplicaFlags,
    ) -> Self {
        Self {
            naming_context: ObjectIdentifier::from_dn(naming_context),
            source_dsa_guid,
            source_dsa_dns: None,
            options,
        }
    }
}

/// Asks a server to remove a DSA from a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveDsServerRequest {
    /// DN of the server object of the DSA being removed.
    pub server_dn: String,
    /// DN of its domain.
    pub domain_dn: String,
    /// Apply the removal rather than only validate it.
    pub commit: bool,
}

impl RemoveDsServerRequest {
    /// Wire level of this request.
    pub const LEVEL: u32 = 1;

    /// Creates a committing removal request.
    pub fn new(server_dn: impl Into<String>, domain_dn: impl Into<String>) -> Self {
        Self {
            server_dn: server_dn.into(),
            domain_dn: domain_dn.into(),
            commit: true,
        }
    }
}

/// Server answer to a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoveDsServerResult {
    /// Whether the removed DSA was the last one of its domain.
    pub last_dc_in_domain: bool,
}
