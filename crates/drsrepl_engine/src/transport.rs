//! Transport layer abstraction for DRS calls.

use crate::binding::BindingString;
use crate::config::Credentials;
use drsrepl_protocol::{
    BindInfo, GetNcChangesReply, GetNcChangesRequest, Guid, PolicyHandle, RemoveDsServerRequest,
    RemoveDsServerResult, ReplicaSyncRequest, SupportedExtensions,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

/// Result type for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Failures reported by the RPC transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Network failure.
    #[error("network failure: {0}")]
    Network(String),

    /// Authentication rejected.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Interface or protocol mismatch.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// The server returned a fault status.
    #[error("remote fault 0x{status:08x}: {message}")]
    Fault {
        /// Status code.
        status: u32,
        /// Description.
        message: String,
    },

    /// The connection is closed.
    #[error("connection closed")]
    Closed,
}

/// An open RPC connection to a directory server.
///
/// Every call blocks until the full reply has arrived. Timeouts and
/// cancellation are the transport's business.
pub trait DrsTransport {
    /// Performs the bind call, returning the session handle and the
    /// server's bind info.
    fn ds_bind(
        &self,
        bind_guid: &Guid,
        bind_info: &BindInfo,
    ) -> TransportResult<(PolicyHandle, BindInfo)>;

    /// Pulls one chunk of changes.
    fn get_nc_changes(
        &self,
        handle: &PolicyHandle,
        request: &GetNcChangesRequest,
    ) -> TransportResult<GetNcChangesReply>;

    /// Asks the server to sync a naming context from a source.
    fn replica_sync(
        &self,
        handle: &PolicyHandle,
        request: &ReplicaSyncRequest,
    ) -> TransportResult<()>;

    /// Asks the server to remove a DSA.
    fn remove_ds_server(
        &self,
        handle: &PolicyHandle,
        request: &RemoveDsServerRequest,
    ) -> TransportResult<RemoveDsServerResult>;
}

/// Opens transports from a binding string and credentials.
pub trait Connector {
    /// Transport type produced.
    type Transport: DrsTransport;

    /// Opens a connection.
    fn open(
        &self,
        binding: &BindingString,
        credentials: &Credentials,
    ) -> TransportResult<Self::Transport>;
}

/// A call recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    /// Bind with the offered capabilities.
    Bind(SupportedExtensions),
    /// Pull request as sent.
    GetNcChanges(GetNcChangesRequest),
    /// Replica sync request.
    ReplicaSync(ReplicaSyncRequest),
    /// Server removal request.
    RemoveDsServer(RemoveDsServerRequest),
}

/// A scripted transport for testing.
///
/// Bind answers with the configured server capabilities; pull calls pop
/// scripted replies in order. Every call is recorded.
#[derive(Debug)]
pub struct MockTransport {
    server_extensions: Mutex<SupportedExtensions>,
    bind_error: Mutex<Option<TransportError>>,
    pull_replies: Mutex<VecDeque<TransportResult<GetNcChangesReply>>>,
    maintenance_error: Mutex<Option<TransportError>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockTransport {
    /// Handle returned by every successful bind.
    pub const HANDLE: PolicyHandle = PolicyHandle {
        handle_type: 0,
        uuid: Guid::from_bytes([0x4d; 16]),
    };

    /// Creates a mock server supporting everything the client offers.
    pub fn new() -> Self {
        Self::with_extensions(SupportedExtensions::OFFERED)
    }

    /// Creates a mock server supporting `extensions`.
    pub fn with_extensions(extensions: SupportedExtensions) -> Self {
        Self {
            server_extensions: Mutex::new(extensions),
            bind_error: Mutex::new(None),
            pull_replies: Mutex::new(VecDeque::new()),
            maintenance_error: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Makes the next bind fail.
    pub fn set_bind_error(&self, error: TransportError) {
        *self.bind_error.lock() = Some(error);
    }

    /// Queues a pull reply.
    pub fn push_reply(&self, reply: GetNcChangesReply) {
        self.pull_replies.lock().push_back(Ok(reply));
    }

    /// Queues a pull failure.
    pub fn push_error(&self, error: TransportError) {
        self.pull_replies.lock().push_back(Err(error));
    }

    /// Makes maintenance calls fail.
    pub fn set_maintenance_error(&self, error: TransportError) {
        *self.maintenance_error.lock() = Some(error);
    }

    /// Returns every recorded call.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Returns the recorded pull requests.
    pub fn pull_requests(&self) -> Vec<GetNcChangesRequest> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                MockCall::GetNcChanges(req) => Some(req.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().push(call);
    }

    fn maintenance_result(&self) -> TransportResult<()> {
        match self.maintenance_error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl DrsTransport for MockTransport {
    fn ds_bind(
        &self,
        _bind_guid: &Guid,
        bind_info: &BindInfo,
    ) -> TransportResult<(PolicyHandle, BindInfo)> {
        self.record(MockCall::Bind(bind_info.supported_extensions));
        if let Some(err) = self.bind_error.lock().take() {
            return Err(err);
        }
        let reply = BindInfo::with_extensions(*self.server_extensions.lock());
        Ok((Self::HANDLE, reply))
    }

    fn get_nc_changes(
        &self,
        _handle: &PolicyHandle,
        request: &GetNcChangesRequest,
    ) -> TransportResult<GetNcChangesReply> {
        self.record(MockCall::GetNcChanges(request.clone()));
        self.pull_replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::Fault {
                    status: 0,
                    message: "no scripted pull reply".into(),
                })
            })
    }

    fn replica_sync(
        &self,
        _handle: &PolicyHandle,
        request: &ReplicaSyncRequest,
    ) -> TransportResult<()> {
        self.record(MockCall::ReplicaSync(request.clone()));
        self.maintenance_result()
    }

    fn remove_ds_server(
        &self,
        _handle: &PolicyHandle,
        request: &RemoveDsServerRequest,
    ) -> TransportResult<RemoveDsServerResult> {
        self.record(MockCall::RemoveDsServer(request.clone()));
        self.maintenance_result().map(|()| RemoveDsServerResult::default())
    }
}

impl<T: DrsTransport + ?Sized> DrsTransport for &T {
    fn ds_bind(
        &self,
        bind_guid: &Guid,
        bind_info: &BindInfo,
    ) -> TransportResult<(PolicyHandle, BindInfo)> {
        (**self).ds_bind(bind_guid, bind_info)
    }

    fn get_nc_changes(
        &self,
        handle: &PolicyHandle,
        request: &GetNcChangesRequest,
    ) -> TransportResult<GetNcChangesReply> {
        (**self).get_nc_changes(handle, request)
    }

    fn replica_sync(
        &self,
        handle: &PolicyHandle,
        request: &ReplicaSyncRequest,
    ) -> TransportResult<()> {
        (**self).replica_sync(handle, request)
    }

    fn remove_ds_server(
        &self,
        handle: &PolicyHandle,
        request: &RemoveDsServerRequest,
    ) -> TransportResult<RemoveDsServerResult> {
        (**self).remove_ds_server(handle, request)
    }
}

impl<T: DrsTransport + ?Sized> DrsTransport for Arc<T> {
    fn ds_bind(
        &self,
        bind_guid: &Guid,
        bind_info: &BindInfo,
    ) -> TransportResult<(PolicyHandle, BindInfo)> {
        (**self).ds_bind(bind_guid, bind_info)
    }

    fn get_nc_changes(
        &self,
        handle: &PolicyHandle,
        request: &GetNcChangesRequest,
    ) -> TransportResult<GetNcChangesReply> {
        (**self).get_nc_changes(handle, request)
    }

    fn replica_sync(
        &self,
        handle: &PolicyHandle,
        request: &ReplicaSyncRequest,
    ) -> TransportResult<()> {
        (**self).replica_sync(handle, request)
    }

    fn remove_ds_server(
        &self,
        handle: &PolicyHandle,
        request: &RemoveDsServerRequest,
    ) -> TransportResult<RemoveDsServerResult> {
        (**self).remove_ds_server(handle, request)
    }
}
