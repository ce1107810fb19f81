//! A simulated directory server.
//!
//! Keeps objects per naming context in USN order and pages them out the
//! way a real DSA does: each pull returns up to `max_object_count`
//! objects past the request cursor, with `more_data` set while anything
//! remains. Faults can be scripted per call.

use drsrepl_engine::{DrsTransport, TransportError, TransportResult};
use drsrepl_protocol::{
    AttributeId, BindInfo, ChangeChunk, GetNcChangesReply, GetNcChangesRequest, Guid,
    HighWatermark, ObjectIdentifier, PolicyHandle, RemoveDsServerRequest, RemoveDsServerResult,
    ReplicaAttribute, ReplicaObject, ReplicaSyncRequest, SupportedExtensions, DS_BIND_GUID,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};

/// Status returned for an unknown naming context.
pub const BAD_NC_STATUS: u32 = 0x0000_20f8;

/// Status returned for a bind with the wrong interface GUID.
pub const UNKNOWN_INTERFACE_STATUS: u32 = 0x0000_06d9;

/// Status returned when removing a server the domain does not list.
pub const NO_SUCH_DSA_STATUS: u32 = 0x0000_20e3;

/// Handle issued to every bound client.
pub const SIMULATED_HANDLE: PolicyHandle = PolicyHandle {
    handle_type: 0,
    uuid: Guid::from_bytes([0x5d; 16]),
};

/// An object stored on the simulated server.
#[derive(Debug, Clone)]
struct StoredObject {
    usn: u64,
    object: ReplicaObject,
}

/// A scripted misbehavior for one pull call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullFault {
    /// Fail the call with a transport error.
    Error(TransportError),
    /// Reply with a non-zero count but no object list.
    DropObjectList,
    /// Reply with a cursor lower than the one requested.
    RewindCursor,
}

/// A stateful in-process directory server.
pub struct SimulatedDsa {
    extensions: SupportedExtensions,
    invocation_id: Guid,
    dsa_guid: Guid,
    naming_contexts: RwLock<BTreeMap<String, Vec<StoredObject>>>,
    next_usn: RwLock<u64>,
    domain_controllers: RwLock<BTreeMap<String, Vec<String>>>,
    /// Faults keyed by the zero-based pull call index they fire on.
    faults: Mutex<BTreeMap<usize, PullFault>>,
    bind_errors: Mutex<VecDeque<TransportError>>,
    binds: Mutex<Vec<SupportedExtensions>>,
    pulls: Mutex<Vec<GetNcChangesRequest>>,
    syncs: Mutex<Vec<ReplicaSyncRequest>>,
    removals: Mutex<Vec<RemoveDsServerRequest>>,
}

impl SimulatedDsa {
    /// Creates a server supporting `extensions`.
    pub fn new(extensions: SupportedExtensions) -> Self {
        Self {
            extensions,
            invocation_id: Guid::from_bytes([0xa1; 16]),
            dsa_guid: Guid::from_bytes([0xd5; 16]),
            naming_contexts: RwLock::new(BTreeMap::new()),
            next_usn: RwLock::new(1),
            domain_controllers: RwLock::new(BTreeMap::new()),
            faults: Mutex::new(BTreeMap::new()),
            bind_errors: Mutex::new(VecDeque::new()),
            binds: Mutex::new(Vec::new()),
            pulls: Mutex::new(Vec::new()),
            syncs: Mutex::new(Vec::new()),
            removals: Mutex::new(Vec::new()),
        }
    }

    /// Creates a server supporting every offered capability.
    pub fn modern() -> Self {
        Self::new(SupportedExtensions::OFFERED)
    }

    /// Creates a server that only understands the v5 request.
    pub fn legacy() -> Self {
        Self::new(SupportedExtensions::OFFERED - SupportedExtensions::GETCHGREQ_V8)
    }

    /// Server invocation id, reported in every reply.
    pub fn invocation_id(&self) -> Guid {
        self.invocation_id
    }

    /// Server objectGUID, reported in every reply.
    pub fn dsa_guid(&self) -> Guid {
        self.dsa_guid
    }

    /// Registers an empty naming context.
    pub fn add_naming_context(&self, nc: &str) {
        self.naming_contexts.write().entry(nc.to_string()).or_default();
    }

    /// Stores an object under `nc`, returning its USN.
    pub fn add_object(&self, nc: &str, dn: &str) -> u64 {
        let mut next = self.next_usn.write();
        let usn = *next;
        *next += 1;

        let object = ReplicaObject {
            identifier: ObjectIdentifier {
                guid: Guid::new_random(),
                dn: dn.to_string(),
            },
            flags: 0,
            attributes: vec![ReplicaAttribute {
                attid: AttributeId(0x0009_0001),
                values: vec![dn.as_bytes().to_vec()],
            }],
        };
        self.naming_contexts
            .write()
            .entry(nc.to_string())
            .or_default()
            .push(StoredObject { usn, object });
        usn
    }

    /// Registers `nc` and stores `count` objects named `CN=obj<i>,<nc>`.
    pub fn populate(&self, nc: &str, count: usize) {
        self.add_naming_context(nc);
        for i in 0..count {
            self.add_object(nc, &format!("CN=obj{i},{nc}"));
        }
    }

    /// Lists `server_dn` as a domain controller of `domain_dn`.
    pub fn add_domain_controller(&self, domain_dn: &str, server_dn: &str) {
        self.domain_controllers
            .write()
            .entry(domain_dn.to_string())
            .or_default()
            .push(server_dn.to_string());
    }

    /// Domain controllers still listed for `domain_dn`.
    pub fn domain_controllers(&self, domain_dn: &str) -> Vec<String> {
        self.domain_controllers
            .read()
            .get(domain_dn)
            .cloned()
            .unwrap_or_default()
    }

    /// Highest USN assigned so far.
    pub fn highest_usn(&self) -> u64 {
        *self.next_usn.read() - 1
    }

    /// Makes pull call number `call` (zero-based) misbehave.
    pub fn inject_fault(&self, call: usize, fault: PullFault) {
        self.faults.lock().insert(call, fault);
    }

    /// Makes the next bind fail.
    pub fn fail_next_bind(&self, error: TransportError) {
        self.bind_errors.lock().push_back(error);
    }

    /// Capabilities offered by each bind.
    pub fn binds(&self) -> Vec<SupportedExtensions> {
        self.binds.lock().clone()
    }

    /// Pull requests received, in order.
    pub fn pull_requests(&self) -> Vec<GetNcChangesRequest> {
        self.pulls.lock().clone()
    }

    /// Sync requests received.
    pub fn sync_requests(&self) -> Vec<ReplicaSyncRequest> {
        self.syncs.lock().clone()
    }

    /// Removal requests received.
    pub fn removal_requests(&self) -> Vec<RemoveDsServerRequest> {
        self.removals.lock().clone()
    }

    fn check_handle(&self, handle: &PolicyHandle) -> TransportResult<()> {
        if *handle != SIMULATED_HANDLE {
            return Err(TransportError::Fault {
                status: 0x0000_0006,
                message: "invalid handle".into(),
            });
        }
        Ok(())
    }

    fn page(&self, request: &GetNcChangesRequest) -> TransportResult<ChangeChunk> {
        let nc = request.naming_context();
        let contexts = self.naming_contexts.read();
        let stored = contexts.get(&nc.dn).ok_or_else(|| TransportError::Fault {
            status: BAD_NC_STATUS,
            message: format!("naming context {} not found", nc.dn),
        })?;

        let cursor = request.highwatermark();
        let limit = request.max_object_count().max(1) as usize;
        let pending: Vec<&StoredObject> = stored
            .iter()
            .filter(|o| o.usn > cursor.tmp_highest_usn)
            .collect();
        let more_data = pending.len() > limit;
        let page = &pending[..pending.len().min(limit)];

        let last_usn = page.last().map_or(cursor.tmp_highest_usn, |o| o.usn);
        let new_highwatermark = if more_data {
            HighWatermark::new(last_usn, cursor.reserved_usn, cursor.highest_usn)
        } else {
            HighWatermark::new(last_usn, cursor.reserved_usn, last_usn.max(cursor.highest_usn))
        };

        let mut chunk = ChangeChunk::from_objects(
            nc.clone(),
            cursor,
            new_highwatermark,
            page.iter().map(|o| o.object.clone()).collect(),
            more_data,
        );
        chunk.source_dsa_guid = self.dsa_guid;
        chunk.source_dsa_invocation_id = self.invocation_id;
        Ok(chunk)
    }
}

impl Default for SimulatedDsa {
    fn default() -> Self {
        Self::modern()
    }
}

impl DrsTransport for SimulatedDsa {
    fn ds_bind(
        &self,
        bind_guid: &Guid,
        bind_info: &BindInfo,
    ) -> TransportResult<(PolicyHandle, BindInfo)> {
        self.binds.lock().push(bind_info.supported_extensions);
        if let Some(err) = self.bind_errors.lock().pop_front() {
            return Err(err);
        }
        if *bind_guid != DS_BIND_GUID {
            return Err(TransportError::Fault {
                status: UNKNOWN_INTERFACE_STATUS,
                message: format!("unknown bind guid {bind_guid}"),
            });
        }
        let agreed = bind_info.supported_extensions & self.extensions;
        Ok((SIMULATED_HANDLE, BindInfo::with_extensions(agreed)))
    }

    fn get_nc_changes(
        &self,
        handle: &PolicyHandle,
        request: &GetNcChangesRequest,
    ) -> TransportResult<GetNcChangesReply> {
        let call = {
            let mut pulls = self.pulls.lock();
            pulls.push(request.clone());
            pulls.len() - 1
        };
        self.check_handle(handle)?;

        let fault = self.faults.lock().remove(&call);
        if let Some(PullFault::Error(err)) = fault {
            return Err(err);
        }

        let mut chunk = self.page(request)?;
        match fault {
            Some(PullFault::DropObjectList) => {
                chunk.object_count = chunk.object_count.max(1);
                chunk.first_object = None;
            }
            Some(PullFault::RewindCursor) => {
                chunk.new_highwatermark = HighWatermark::ZERO;
            }
            _ => {}
        }

        let level = match request {
            GetNcChangesRequest::V8(_) => 6,
            GetNcChangesRequest::V5(_) => 1,
        };
        Ok(GetNcChangesReply::new(level, chunk))
    }

    fn replica_sync(
        &self,
        handle: &PolicyHandle,
        request: &ReplicaSyncRequest,
    ) -> TransportResult<()> {
        self.check_handle(handle)?;
        if !self.naming_contexts.read().contains_key(&request.naming_context.dn) {
            return Err(TransportError::Fault {
                status: BAD_NC_STATUS,
                message: format!("naming context {} not found", request.naming_context.dn),
            });
        }
        self.syncs.lock().push(request.clone());
        Ok(())
    }

    fn remove_ds_server(
        &self,
        handle: &PolicyHandle,
        request: &RemoveDsServerRequest,
    ) -> TransportResult<RemoveDsServerResult> {
        self.check_handle(handle)?;
        self.removals.lock().push(request.clone());

        let mut controllers = self.domain_controllers.write();
        let servers = controllers
            .get_mut(&request.domain_dn)
            .filter(|servers| servers.contains(&request.server_dn))
            .ok_or_else(|| TransportError::Fault {
                status: NO_SUCH_DSA_STATUS,
                message: format!("{} is not a server of {}", request.server_dn, request.domain_dn),
            })?;
        if request.commit {
            servers.retain(|s| s != &request.server_dn);
        }
        let last_dc_in_domain = servers.is_empty();
        Ok(RemoveDsServerResult { last_dc_in_domain })
    }
}
