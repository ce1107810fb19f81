//! One-shot maintenance calls on a bound connection.
//!
//! Neither call touches replication state; both only need a handle.

use crate::error::{DrsError, DrsResult};
use crate::negotiator::DrsConnection;
use crate::transport::DrsTransport;
use drsrepl_protocol::{Guid, RemoveDsServerRequest, ReplicaFlags, ReplicaSyncRequest};
use tracing::{info, warn};

/// Asks the server to sync `naming_context` from `source_dsa_guid`.
pub fn trigger_sync<T: DrsTransport>(
    connection: &DrsConnection<T>,
    source_dsa_guid: Guid,
    naming_context: &str,
    options: ReplicaFlags,
) -> DrsResult<()> {
    let request = ReplicaSyncRequest::new(source_dsa_guid, naming_context, options);
    connection
        .transport()
        .replica_sync(connection.handle(), &request)
        .map_err(|source| DrsError::remote("DsReplicaSync", source))?;

    info!(
        target_server = connection.target(),
        naming_context,
        source_dsa = %source_dsa_guid,
        options = format_args!("0x{:08x}", options.bits()),
        "replica sync requested"
    );
    Ok(())
}

/// Removes the DSA `server_dsa_dn` from `domain_dn`. Always commits.
pub fn remove_server<T: DrsTransport>(
    connection: &DrsConnection<T>,
    server_dsa_dn: &str,
    domain_dn: &str,
) -> DrsResult<()> {
    let request = RemoveDsServerRequest::new(server_dsa_dn, domain_dn);
    let result = connection
        .transport()
        .remove_ds_server(connection.handle(), &request)
        .map_err(|source| DrsError::remote("DsRemoveDSServer", source))?;

    if result.last_dc_in_domain {
        warn!(server = server_dsa_dn, domain = domain_dn, "removed the last DC of the domain");
    } else {
        info!(server = server_dsa_dn, domain = domain_dn, "server removed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockCall, MockTransport, TransportError};

    fn connection() -> DrsConnection<MockTransport> {
        DrsConnection::bind(MockTransport::new(), "dc1").unwrap()
    }

    #[test]
    fn trigger_sync_sends_one_request() {
        let conn = connection();
        let source = Guid::from_bytes([7; 16]);

        trigger_sync(&conn, source, "DC=example,DC=com", ReplicaFlags::ASYNC_OP).unwrap();

        let calls = conn.transport().calls();
        assert_eq!(calls.len(), 2);
        match &calls[1] {
            MockCall::ReplicaSync(req) => {
                assert_eq!(req.source_dsa_guid, source);
                assert_eq!(req.naming_context.dn, "DC=example,DC=com");
                assert_eq!(req.options, ReplicaFlags::ASYNC_OP);
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[test]
    fn trigger_sync_failure_names_operation() {
        let conn = connection();
        conn.transport()
            .set_maintenance_error(TransportError::AccessDenied("not an admin".into()));

        let err = trigger_sync(&conn, Guid::NIL, "DC=example", ReplicaFlags::empty()).unwrap_err();
        assert!(matches!(err, DrsError::RemoteOperation { operation: "DsReplicaSync", .. }));
        assert!(err.to_string().starts_with("DsReplicaSync failed"));
    }

    #[test]
    fn remove_server_commits() {
        let conn = connection();
        remove_server(&conn, "CN=DC2,CN=Servers,CN=Site", "DC=example,DC=com").unwrap();

        match conn.transport().calls().last() {
            Some(MockCall::RemoveDsServer(req)) => {
                assert!(req.commit);
                assert_eq!(req.server_dn, "CN=DC2,CN=Servers,CN=Site");
                assert_eq!(req.domain_dn, "DC=example,DC=com");
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[test]
    fn remove_server_failure_names_operation() {
        let conn = connection();
        conn.transport().set_maintenance_error(TransportError::Fault {
            status: 0x2098,
            message: "insufficient rights".into(),
        });

        let err = remove_server(&conn, "CN=DC2", "DC=example").unwrap_err();
        assert!(matches!(err, DrsError::RemoteOperation { operation: "DsRemoveDSServer", .. }));
        assert!(err.is_retryable());
    }
}
