//! Shared fixtures: identities, naming contexts and a sample schema.

use crate::schema::MemorySchema;
use crate::simulated::SimulatedDsa;
use drsrepl_engine::{MemoryApplier, ReplicationSession};
use drsrepl_protocol::{AttributeId, Guid};
use tracing_subscriber::EnvFilter;

/// Domain naming context of the sample directory.
pub const DOMAIN_NC: &str = "DC=example,DC=com";

/// Configuration naming context.
pub const CONFIG_NC: &str = "CN=Configuration,DC=example,DC=com";

/// Schema naming context.
pub const SCHEMA_NC: &str = "CN=Schema,CN=Configuration,DC=example,DC=com";

/// Invocation id of the local replica.
pub const LOCAL_INVOCATION_ID: Guid = Guid::from_bytes([
    0x6b, 0x2f, 0x10, 0x9a, 0x3c, 0x4e, 0x41, 0x7d, 0x9e, 0x01, 0x55, 0x27, 0xa0, 0x3b, 0xc4, 0x19,
]);

/// objectGUID of the local DSA.
pub const LOCAL_DSA_GUID: Guid = Guid::from_bytes([
    0x0c, 0x81, 0x7e, 0x52, 0xd3, 0x90, 0x4b, 0x6a, 0x8f, 0x44, 0x12, 0xe9, 0x7b, 0x20, 0x5d, 0xa6,
]);

/// The sample schema JSON.
pub const SAMPLE_SCHEMA_JSON: &str = include_str!("../fixtures/schema.json");

/// Attribute ids the sample schema yields for a read-only replica.
pub fn sample_partial_attribute_ids() -> Vec<AttributeId> {
    [0, 3, 13, 31, 131_085, 589_825, 589_826, 589_832, 590_045]
        .into_iter()
        .map(AttributeId)
        .collect()
}

/// Loads the sample schema.
pub fn sample_schema() -> MemorySchema {
    MemorySchema::from_json(SAMPLE_SCHEMA_JSON).expect("sample schema fixture is valid JSON")
}

/// A modern server holding `objects` objects in the domain NC and a few
/// in the configuration and schema NCs.
pub fn populated_dsa(objects: usize) -> SimulatedDsa {
    let dsa = SimulatedDsa::modern();
    dsa.populate(DOMAIN_NC, objects);
    dsa.populate(CONFIG_NC, 3);
    dsa.populate(SCHEMA_NC, 2);
    dsa
}

/// A session bound to `dsa` that stores into `applier`.
pub fn session_for<'a>(
    dsa: &'a SimulatedDsa,
    applier: &'a MemoryApplier,
) -> ReplicationSession<&'a SimulatedDsa, &'a MemoryApplier, MemorySchema> {
    ReplicationSession::new(dsa, "dc1.example.com", LOCAL_INVOCATION_ID, applier, sample_schema())
        .expect("bind to simulated DSA")
}

/// Installs a test log subscriber filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
