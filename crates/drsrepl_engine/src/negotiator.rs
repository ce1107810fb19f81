//! Capability negotiation and bound connections.

use crate::config::{Credentials, DrsConfig};
use crate::error::{DrsError, DrsResult};
use crate::transport::{Connector, DrsTransport};
use drsrepl_protocol::{BindInfo, PolicyHandle, SupportedExtensions, DS_BIND_GUID};
use tracing::{debug, info, warn};

/// Performs the bind handshake.
///
/// Offers [`SupportedExtensions::OFFERED`] and returns the session handle
/// together with the capabilities the server agreed to. Bits the server
/// reports but the client never offered are dropped, so the result is
/// always a subset of the offer.
pub fn ds_bind<T: DrsTransport + ?Sized>(
    transport: &T,
    target: &str,
) -> DrsResult<(PolicyHandle, SupportedExtensions)> {
    debug!(target_server = target, offered = ?SupportedExtensions::OFFERED, "binding");

    let (handle, reply) = transport
        .ds_bind(&DS_BIND_GUID, &BindInfo::offered())
        .map_err(|source| DrsError::connection(target, source))?;

    let server = reply.supported_extensions;
    let negotiated = server & SupportedExtensions::OFFERED;
    if negotiated != server {
        warn!(
            target_server = target,
            unexpected = ?(server - SupportedExtensions::OFFERED),
            "server reported capabilities that were never offered"
        );
    }

    info!(
        target_server = target,
        negotiated = format_args!("0x{:08x}", negotiated.bits()),
        request_v8 = negotiated.supports_request_v8(),
        "bind complete"
    );

    Ok((handle, negotiated))
}

/// A transport that has completed the bind handshake.
#[derive(Debug)]
pub struct DrsConnection<T: DrsTransport> {
    transport: T,
    handle: PolicyHandle,
    extensions: SupportedExtensions,
    target: String,
}

impl<T: DrsTransport> DrsConnection<T> {
    /// Binds an already-open transport.
    pub fn bind(transport: T, target: impl Into<String>) -> DrsResult<Self> {
        let target = target.into();
        let (handle, extensions) = ds_bind(&transport, &target)?;
        Ok(Self {
            transport,
            handle,
            extensions,
            target,
        })
    }

    /// Opens a transport to `server` and binds it.
    pub fn connect<C>(
        connector: &C,
        server: &str,
        config: &DrsConfig,
        credentials: &Credentials,
    ) -> DrsResult<Self>
    where
        C: Connector<Transport = T>,
    {
        let binding = config.binding_for(server);
        debug!(binding = %binding, "opening DRS connection");

        let transport = connector
            .open(&binding, credentials)
            .map_err(|source| DrsError::connection(server, source))?;

        Self::bind(transport, server)
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Session handle.
    pub fn handle(&self) -> &PolicyHandle {
        &self.handle
    }

    /// Negotiated capabilities.
    pub fn extensions(&self) -> SupportedExtensions {
        self.extensions
    }

    /// Server this connection talks to.
    pub fn target(&self) -> &str {
        &self.target
    }
}
