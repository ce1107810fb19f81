//! Replication session: drives the change-pull loop for naming contexts.

use crate::apply::ChunkApplier;
use crate::config::{Credentials, DrsConfig};
use crate::error::{DrsError, DrsResult};
use crate::negotiator::DrsConnection;
use crate::partial_set::build_partial_attribute_set;
use crate::schema::SchemaSource;
use crate::transport::{Connector, DrsTransport};
use drsrepl_protocol::{
    ExtendedOperation, GetNcChangesRequest, GetNcChangesRequest5, GetNcChangesRequest8, Guid,
    HighWatermark, ObjectIdentifier, ReplicaFlags, SupportedExtensions,
};
use tracing::{debug, info};

/// Per-call options of [`ReplicationSession::replicate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicateOptions {
    /// Pulling the schema naming context.
    pub schema: bool,
    /// Extended operation.
    pub extended_op: ExtendedOperation,
    /// Destination is a read-only replica.
    pub rodc: bool,
    /// Replica flags to send verbatim instead of the computed ones.
    pub replica_flags: Option<ReplicaFlags>,
}

impl ReplicateOptions {
    /// Options for a full writeable pull.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the pull as a schema pull.
    pub fn schema(mut self, schema: bool) -> Self {
        self.schema = schema;
        self
    }

    /// Sets the extended operation.
    pub fn extended_op(mut self, op: ExtendedOperation) -> Self {
        self.extended_op = op;
        self
    }

    /// Marks the destination as a read-only replica.
    pub fn rodc(mut self, rodc: bool) -> Self {
        self.rodc = rodc;
        self
    }

    /// Overrides the replica flags.
    pub fn replica_flags(mut self, flags: ReplicaFlags) -> Self {
        self.replica_flags = Some(flags);
        self
    }

    /// Flags sent with the request.
    pub fn effective_replica_flags(&self) -> ReplicaFlags {
        if let Some(flags) = self.replica_flags {
            return flags;
        }
        if self.extended_op == ExtendedOperation::ReplicateSecret {
            return ReplicaFlags::empty();
        }
        let mut flags = ReplicaFlags::FULL_PULL_BASE;
        if self.rodc {
            flags |= ReplicaFlags::SPECIAL_SECRET_PROCESSING;
        } else {
            flags |= ReplicaFlags::WRIT_REP;
        }
        flags
    }
}

/// Summary of one `replicate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationStats {
    /// Request level used for every call.
    pub request_level: u32,
    /// Pull calls issued.
    pub chunks: u64,
    /// Objects handed to the applier.
    pub objects: u64,
    /// Cursor returned by the last reply.
    pub highwatermark: HighWatermark,
}

/// A bound session pulling naming contexts from one server.
///
/// Operations take `&mut self`: the handle and the in-flight cursor must
/// not be shared between concurrent pulls.
pub struct ReplicationSession<T: DrsTransport, A: ChunkApplier, S: SchemaSource> {
    connection: DrsConnection<T>,
    applier: A,
    schema: S,
    invocation_id: Guid,
    config: DrsConfig,
}

impl<T: DrsTransport, A: ChunkApplier, S: SchemaSource> ReplicationSession<T, A, S> {
    /// Binds `transport` and creates a session.
    ///
    /// `invocation_id` identifies this replica's change history and is
    /// checked before anything goes on the wire.
    pub fn new(
        transport: T,
        target: impl Into<String>,
        invocation_id: Guid,
        applier: A,
        schema: S,
    ) -> DrsResult<Self> {
        check_invocation_id(&invocation_id)?;
        let connection = DrsConnection::bind(transport, target)?;
        Ok(Self::from_connection(connection, invocation_id, applier, schema, DrsConfig::default()))
    }

    /// Opens a connection to `server`, binds it and creates a session.
    pub fn connect<C>(
        connector: &C,
        server: &str,
        credentials: &Credentials,
        config: DrsConfig,
        invocation_id: Guid,
        applier: A,
        schema: S,
    ) -> DrsResult<Self>
    where
        C: Connector<Transport = T>,
    {
        check_invocation_id(&invocation_id)?;
        let connection = DrsConnection::connect(connector, server, &config, credentials)?;
        Ok(Self::from_connection(connection, invocation_id, applier, schema, config))
    }

    fn from_connection(
        connection: DrsConnection<T>,
        invocation_id: Guid,
        applier: A,
        schema: S,
        config: DrsConfig,
    ) -> Self {
        Self {
            connection,
            applier,
            schema,
            invocation_id,
            config,
        }
    }

    /// Replaces the configuration used for later pulls.
    pub fn with_config(mut self, config: DrsConfig) -> Self {
        self.config = config;
        self
    }

    /// Negotiated capabilities.
    pub fn extensions(&self) -> SupportedExtensions {
        self.connection.extensions()
    }

    /// This replica's invocation id.
    pub fn invocation_id(&self) -> Guid {
        self.invocation_id
    }

    /// The bound connection.
    pub fn connection(&self) -> &DrsConnection<T> {
        &self.connection
    }

    /// The applier.
    pub fn applier(&self) -> &A {
        &self.applier
    }

    /// Pulls every pending change of naming context `dn`.
    ///
    /// Starts from a zero cursor, hands each reply to the applier and
    /// follows the server's cursor until it reports no more data.
    pub fn replicate(
        &mut self,
        dn: &str,
        source_dsa_invocation_id: Guid,
        destination_dsa_guid: Guid,
        options: &ReplicateOptions,
    ) -> DrsResult<ReplicationStats> {
        let mut request = self.build_request(
            dn,
            source_dsa_invocation_id,
            destination_dsa_guid,
            options,
        )?;
        let req_level = request.level();

        info!(
            naming_context = dn,
            req_level,
            replica_flags = format_args!("0x{:08x}", request.replica_flags().bits()),
            extended_op = ?options.extended_op,
            "starting replication"
        );

        let mut stats = ReplicationStats {
            request_level: req_level,
            chunks: 0,
            objects: 0,
            highwatermark: HighWatermark::ZERO,
        };

        loop {
            let reply = self
                .connection
                .transport()
                .get_nc_changes(self.connection.handle(), &request)
                .map_err(|source| DrsError::connection(self.connection.target(), source))?;
            let ctr = &reply.ctr;

            if ctr.is_missing_objects() {
                return Err(DrsError::ProtocolContract(format!(
                    "DsGetNCChanges: NULL first_object with object_count={}",
                    ctr.object_count
                )));
            }

            let cursor = request.highwatermark();
            if !cursor.is_advanced_by(&ctr.new_highwatermark) {
                return Err(DrsError::ProtocolContract(format!(
                    "DsGetNCChanges: highwatermark moved backwards from {} to {}",
                    cursor, ctr.new_highwatermark
                )));
            }

            self.applier
                .replicate_chunk(reply.level, ctr, options.schema, req_level, &request)?;

            stats.chunks += 1;
            stats.objects += u64::from(ctr.object_count);
            stats.highwatermark = ctr.new_highwatermark;

            debug!(
                naming_context = dn,
                level = reply.level,
                objects = ctr.object_count,
                more_data = ctr.more_data,
                highwatermark = %ctr.new_highwatermark,
                "applied chunk"
            );

            if !ctr.more_data {
                break;
            }
            request.set_highwatermark(ctr.new_highwatermark);
        }

        info!(
            naming_context = dn,
            chunks = stats.chunks,
            objects = stats.objects,
            "replication complete"
        );
        Ok(stats)
    }

    /// Builds the first request of a pull, in the shape the server accepts.
    fn build_request(
        &self,
        dn: &str,
        source_dsa_invocation_id: Guid,
        destination_dsa_guid: Guid,
        options: &ReplicateOptions,
    ) -> DrsResult<GetNcChangesRequest> {
        let mut req8 = GetNcChangesRequest8::new(
            ObjectIdentifier::from_dn(dn),
            source_dsa_invocation_id,
            destination_dsa_guid,
        );
        req8.replica_flags = options.effective_replica_flags();
        req8.max_object_count = self.config.max_object_count;
        req8.max_ndr_size = self.config.max_ndr_size;
        req8.extended_op = options.extended_op;

        if !options.schema && options.rodc {
            req8.partial_attribute_set = Some(build_partial_attribute_set(&self.schema)?);
        }

        if self.extensions().supports_request_v8() {
            Ok(GetNcChangesRequest::V8(req8))
        } else {
            Ok(GetNcChangesRequest::V5(GetNcChangesRequest5::from(&req8)))
        }
    }
}

fn check_invocation_id(invocation_id: &Guid) -> DrsResult<()> {
    if invocation_id.is_nil() {
        return Err(DrsError::InvalidArgument(format!(
            "must not use {} as invocation_id",
            invocation_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::{ApplyError, MemoryApplier};
    use crate::schema::{SchemaError, SearchEntry, SearchScope};
    use crate::transport::{MockCall, MockTransport, TransportError};
    use drsrepl_protocol::{
        AttributeId, ChangeChunk, GetNcChangesReply, ReplicaObject,
    };

    const NC: &str = "DC=example,DC=com";

    struct OneAttributeSchema;

    impl SchemaSource for OneAttributeSchema {
        fn schema_base_dn(&self) -> Result<String, SchemaError> {
            Ok("CN=Schema,CN=Configuration,DC=example,DC=com".into())
        }

        fn search(
            &self,
            _base: &str,
            _scope: SearchScope,
            _filter: &str,
            _attrs: &[&str],
        ) -> Result<Vec<SearchEntry>, SchemaError> {
            Ok(vec![
                SearchEntry::new("CN=Common-Name").with_attribute("lDAPDisplayName", "cn"),
                SearchEntry::new("CN=Unicode-Pwd")
                    .with_attribute("lDAPDisplayName", "unicodePwd")
                    .with_attribute("searchFlags", "512"),
            ])
        }

        fn attid_from_display_name(&self, name: &str) -> Result<AttributeId, SchemaError> {
            match name {
                "cn" => Ok(AttributeId(0x3)),
                "unicodePwd" => Ok(AttributeId(0x9005a)),
                other => Err(SchemaError::UnknownAttribute(other.into())),
            }
        }
    }

    fn invocation_id() -> Guid {
        Guid::from_bytes([0x11; 16])
    }

    fn session(
        transport: MockTransport,
        applier: &MemoryApplier,
    ) -> ReplicationSession<MockTransport, &MemoryApplier, OneAttributeSchema> {
        ReplicationSession::new(transport, "dc1", invocation_id(), applier, OneAttributeSchema)
            .unwrap()
    }

    fn object(dn: &str) -> ReplicaObject {
        ReplicaObject {
            identifier: ObjectIdentifier::from_dn(dn),
            flags: 0,
            attributes: Vec::new(),
        }
    }

    fn reply(
        old: HighWatermark,
        new: HighWatermark,
        dns: &[&str],
        more: bool,
    ) -> GetNcChangesReply {
        let objects = dns.iter().map(|dn| object(dn)).collect();
        let nc = ObjectIdentifier::from_dn(NC);
        GetNcChangesReply::new(6, ChangeChunk::from_objects(nc, old, new, objects, more))
    }

    fn session_transport<'a>(
        session: &'a ReplicationSession<MockTransport, &'a MemoryApplier, OneAttributeSchema>,
    ) -> &'a MockTransport {
        session.connection().transport()
    }

    #[test]
    fn nil_invocation_id_fails_before_bind() {
        let transport = MockTransport::new();
        let applier = MemoryApplier::new();
        let result =
            ReplicationSession::new(&transport, "dc1", Guid::NIL, &applier, OneAttributeSchema);

        assert!(matches!(result, Err(DrsError::InvalidArgument(_))));
        assert_eq!(transport.call_count(), 0);
    }

    #[test]
    fn construction_binds_once() {
        let applier = MemoryApplier::new();
        let session = session(MockTransport::new(), &applier);

        assert_eq!(session.extensions(), SupportedExtensions::OFFERED);
        assert_eq!(session.invocation_id(), invocation_id());
        assert_eq!(
            session_transport(&session).calls(),
            vec![MockCall::Bind(SupportedExtensions::OFFERED)]
        );
    }

    #[test]
    fn bind_failure_surfaces_connection_error() {
        let transport = MockTransport::new();
        transport.set_bind_error(TransportError::AccessDenied("bad password".into()));
        let applier = MemoryApplier::new();

        let result = ReplicationSession::new(
            transport,
            "dc1",
            invocation_id(),
            &applier,
            OneAttributeSchema,
        );
        assert!(matches!(result, Err(DrsError::Connection { .. })));
    }

    #[test]
    fn default_flags_for_writeable_pull() {
        let flags = ReplicateOptions::new().effective_replica_flags();
        assert_eq!(
            flags,
            ReplicaFlags::INIT_SYNC
                | ReplicaFlags::PER_SYNC
                | ReplicaFlags::GET_ANC
                | ReplicaFlags::NEVER_SYNCED
                | ReplicaFlags::WRIT_REP
        );
    }

    #[test]
    fn rodc_flags_use_secret_processing() {
        let flags = ReplicateOptions::new().rodc(true).effective_replica_flags();
        assert!(flags.contains(ReplicaFlags::SPECIAL_SECRET_PROCESSING));
        assert!(!flags.contains(ReplicaFlags::WRIT_REP));
        assert!(flags.contains(ReplicaFlags::FULL_PULL_BASE));
    }

    #[test]
    fn secret_exop_sends_no_flags() {
        let flags = ReplicateOptions::new()
            .rodc(true)
            .extended_op(ExtendedOperation::ReplicateSecret)
            .effective_replica_flags();
        assert_eq!(flags, ReplicaFlags::empty());
    }

    #[test]
    fn explicit_flags_win() {
        let flags = ReplicateOptions::new()
            .extended_op(ExtendedOperation::ReplicateSecret)
            .replica_flags(ReplicaFlags::ASYNC_OP)
            .effective_replica_flags();
        assert_eq!(flags, ReplicaFlags::ASYNC_OP);
    }

    #[test]
    fn rodc_request_carries_partial_attribute_set() {
        let applier = MemoryApplier::new();
        let session = session(MockTransport::new(), &applier);

        let request = session
            .build_request(NC, Guid::NIL, Guid::NIL, &ReplicateOptions::new().rodc(true))
            .unwrap();
        let pas = request.partial_attribute_set().unwrap();
        assert_eq!(pas.attids(), &[AttributeId(0x3)]);
    }

    #[test]
    fn schema_pull_skips_partial_attribute_set() {
        let applier = MemoryApplier::new();
        let session = session(MockTransport::new(), &applier);

        let options = ReplicateOptions::new().rodc(true).schema(true);
        let request = session.build_request(NC, Guid::NIL, Guid::NIL, &options).unwrap();
        assert!(request.partial_attribute_set().is_none());

        let request = session
            .build_request(NC, Guid::NIL, Guid::NIL, &ReplicateOptions::new())
            .unwrap();
        assert!(request.partial_attribute_set().is_none());
    }

    #[test]
    fn request_uses_configured_limits() {
        let applier = MemoryApplier::new();
        let session = session(MockTransport::new(), &applier)
            .with_config(DrsConfig::new().with_max_object_count(10));

        let request = session
            .build_request(NC, Guid::NIL, Guid::NIL, &ReplicateOptions::new())
            .unwrap();
        assert_eq!(request.max_object_count(), 10);
    }

    #[test]
    fn pull_loop_follows_cursor() {
        let transport = MockTransport::new();
        let first = HighWatermark::new(5, 0, 0);
        let second = HighWatermark::new(9, 0, 0);
        let last = HighWatermark::new(12, 0, 12);
        transport.push_reply(reply(HighWatermark::ZERO, first, &["CN=a", "CN=b"], true));
        transport.push_reply(reply(first, second, &["CN=c"], true));
        transport.push_reply(reply(second, last, &[], false));

        let applier = MemoryApplier::new();
        let mut session = session(transport, &applier);
        let (invocation, source) = (Guid::from_bytes([2; 16]), Guid::from_bytes([3; 16]));
        let stats = session
            .replicate(NC, invocation, source, &ReplicateOptions::new())
            .unwrap();

        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.objects, 3);
        assert_eq!(stats.request_level, 8);
        assert_eq!(stats.highwatermark, last);

        let cursors: Vec<_> = session_transport(&session)
            .pull_requests()
            .iter()
            .map(|r| r.highwatermark())
            .collect();
        assert_eq!(cursors, vec![HighWatermark::ZERO, first, second]);
        assert_eq!(applier.object_dns(), vec!["CN=a", "CN=b", "CN=c"]);
    }

    #[test]
    fn each_call_starts_from_zero() {
        let transport = MockTransport::new();
        let zero = HighWatermark::ZERO;
        transport.push_reply(reply(zero, HighWatermark::new(4, 0, 4), &["CN=a"], false));
        transport.push_reply(reply(zero, HighWatermark::new(7, 0, 7), &["CN=b"], false));

        let applier = MemoryApplier::new();
        let mut session = session(transport, &applier);
        let options = ReplicateOptions::new();
        session.replicate(NC, Guid::NIL, Guid::NIL, &options).unwrap();
        session
            .replicate("CN=Configuration,DC=example,DC=com", Guid::NIL, Guid::NIL, &options)
            .unwrap();

        let requests = session_transport(&session).pull_requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.highwatermark() == HighWatermark::ZERO));
        assert_eq!(requests[1].naming_context().dn, "CN=Configuration,DC=example,DC=com");
    }

    #[test]
    fn downgrades_without_v8() {
        let transport = MockTransport::with_extensions(SupportedExtensions::BASE);
        let mid = HighWatermark::new(1, 0, 0);
        transport.push_reply(reply(HighWatermark::ZERO, mid, &["CN=a"], true));
        transport.push_reply(reply(mid, HighWatermark::new(2, 0, 2), &["CN=b"], false));

        let applier = MemoryApplier::new();
        let mut session = session(transport, &applier);
        let stats = session
            .replicate(NC, Guid::NIL, Guid::NIL, &ReplicateOptions::new().rodc(true))
            .unwrap();

        assert_eq!(stats.request_level, 5);
        let requests = session_transport(&session).pull_requests();
        assert!(requests.iter().all(|r| matches!(r, GetNcChangesRequest::V5(_))));
        assert!(applier.chunks().iter().all(|c| c.req_level == 5));
    }

    #[test]
    fn missing_object_list_is_fatal() {
        let transport = MockTransport::new();
        let mut bad = reply(HighWatermark::ZERO, HighWatermark::new(3, 0, 0), &[], true);
        bad.ctr.object_count = 3;
        transport.push_reply(bad);

        let applier = MemoryApplier::new();
        let mut session = session(transport, &applier);
        let err = session
            .replicate(NC, Guid::NIL, Guid::NIL, &ReplicateOptions::new())
            .unwrap_err();

        assert!(
            matches!(err, DrsError::ProtocolContract(ref msg) if msg.contains("object_count=3"))
        );
        assert_eq!(applier.chunk_count(), 0);
        assert_eq!(session_transport(&session).pull_requests().len(), 1);
    }

    #[test]
    fn backwards_cursor_is_fatal() {
        let transport = MockTransport::new();
        let ahead = HighWatermark::new(10, 0, 0);
        transport.push_reply(reply(HighWatermark::ZERO, ahead, &["CN=a"], true));
        transport.push_reply(reply(ahead, HighWatermark::new(4, 0, 0), &["CN=b"], true));

        let applier = MemoryApplier::new();
        let mut session = session(transport, &applier);
        let err = session
            .replicate(NC, Guid::NIL, Guid::NIL, &ReplicateOptions::new())
            .unwrap_err();

        assert!(matches!(err, DrsError::ProtocolContract(_)));
        assert_eq!(applier.chunk_count(), 1);
    }

    #[test]
    fn transport_failure_aborts_without_retry() {
        let transport = MockTransport::new();
        transport.push_reply(reply(
            HighWatermark::ZERO,
            HighWatermark::new(1, 0, 0),
            &["CN=a"],
            true,
        ));
        transport.push_error(TransportError::Network("connection reset".into()));
        transport.push_reply(reply(HighWatermark::ZERO, HighWatermark::new(2, 0, 2), &[], false));

        let applier = MemoryApplier::new();
        let mut session = session(transport, &applier);
        let err = session
            .replicate(NC, Guid::NIL, Guid::NIL, &ReplicateOptions::new())
            .unwrap_err();

        match err {
            DrsError::Connection { target, source } => {
                assert_eq!(target, "dc1");
                assert_eq!(source, TransportError::Network("connection reset".into()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(session_transport(&session).pull_requests().len(), 2);
        assert_eq!(applier.chunk_count(), 1);
    }

    struct RefusingApplier;

    impl ChunkApplier for RefusingApplier {
        fn replicate_chunk(
            &self,
            _level: u32,
            _ctr: &ChangeChunk,
            _schema: bool,
            _req_level: u32,
            _request: &GetNcChangesRequest,
        ) -> Result<(), ApplyError> {
            Err(ApplyError::Storage("disk full".into()))
        }
    }

    #[test]
    fn apply_failure_propagates() {
        let transport = MockTransport::new();
        transport.push_reply(reply(
            HighWatermark::ZERO,
            HighWatermark::new(1, 0, 0),
            &["CN=a"],
            true,
        ));

        let mut session = ReplicationSession::new(
            transport,
            "dc1",
            invocation_id(),
            RefusingApplier,
            OneAttributeSchema,
        )
        .unwrap();
        let err = session
            .replicate(NC, Guid::NIL, Guid::NIL, &ReplicateOptions::new())
            .unwrap_err();

        assert!(matches!(err, DrsError::Apply(ApplyError::Storage(_))));
        assert_eq!(session.connection().transport().pull_requests().len(), 1);
    }

    #[test]
    fn schema_flag_reaches_applier() {
        let transport = MockTransport::new();
        transport.push_reply(reply(
            HighWatermark::ZERO,
            HighWatermark::new(1, 0, 1),
            &["CN=cn"],
            false,
        ));

        let applier = MemoryApplier::new();
        let mut session = session(transport, &applier);
        let schema_nc = "CN=Schema,CN=Configuration,DC=example,DC=com";
        session
            .replicate(schema_nc, Guid::NIL, Guid::NIL, &ReplicateOptions::new().schema(true))
            .unwrap();

        let chunks = applier.chunks();
        assert!(chunks[0].schema);
        assert_eq!(chunks[0].level, 6);
    }

    #[test]
    fn oversized_chunk_is_applied() {
        let transport = MockTransport::new();
        let dns: Vec<String> = (0..100_000).map(|i| format!("CN=o{i}")).collect();
        let names: Vec<&str> = dns.iter().map(String::as_str).collect();
        transport.push_reply(reply(
            HighWatermark::ZERO,
            HighWatermark::new(100_000, 0, 100_000),
            &names,
            false,
        ));

        let applier = MemoryApplier::new();
        let mut session = session(transport, &applier);
        let stats = session
            .replicate(NC, Guid::NIL, Guid::NIL, &ReplicateOptions::new())
            .unwrap();

        assert_eq!(stats.objects, 100_000);
        assert_eq!(applier.object_dns().len(), 100_000);
    }
}
