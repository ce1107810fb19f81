//! Apply collaborator: stores the objects of each received chunk.

use drsrepl_protocol::{ChangeChunk, GetNcChangesRequest, HighWatermark};
use parking_lot::RwLock;
use thiserror::Error;

/// Failures reported by a chunk applier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// The chunk was refused.
    #[error("chunk rejected: {0}")]
    Rejected(String),

    /// Local storage failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Persists replicated objects.
///
/// Receives the reply level, the chunk, whether this is a schema pull, the
/// request level and the request as sent. It only ever sees shared
/// references, so it cannot disturb the session's cursor or handle.
pub trait ChunkApplier {
    /// Applies one chunk.
    fn replicate_chunk(
        &self,
        level: u32,
        ctr: &ChangeChunk,
        schema: bool,
        req_level: u32,
        request: &GetNcChangesRequest,
    ) -> Result<(), ApplyError>;
}

/// What [`MemoryApplier`] saw for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChunk {
    /// Reply level.
    pub level: u32,
    /// Request level.
    pub req_level: u32,
    /// Schema pull.
    pub schema: bool,
    /// Cursor of the request that produced the chunk.
    pub request_highwatermark: HighWatermark,
    /// Cursor returned by the server.
    pub new_highwatermark: HighWatermark,
    /// DNs of the objects, in list order.
    pub object_dns: Vec<String>,
}

/// An in-memory applier that records every chunk.
#[derive(Debug, Default)]
pub struct MemoryApplier {
    chunks: RwLock<Vec<AppliedChunk>>,
}

impl MemoryApplier {
    /// Creates an empty applier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every chunk applied so far.
    pub fn chunks(&self) -> Vec<AppliedChunk> {
        self.chunks.read().clone()
    }

    /// Number of chunks applied.
    pub fn chunk_count(&self) -> usize {
        self.chunks.read().len()
    }

    /// DNs of every object applied, in order.
    pub fn object_dns(&self) -> Vec<String> {
        self.chunks
            .read()
            .iter()
            .flat_map(|c| c.object_dns.iter().cloned())
            .collect()
    }
}

impl ChunkApplier for MemoryApplier {
    fn replicate_chunk(
        &self,
        level: u32,
        ctr: &ChangeChunk,
        schema: bool,
        req_level: u32,
        request: &GetNcChangesRequest,
    ) -> Result<(), ApplyError> {
        let object_dns: Vec<String> = ctr.objects().map(|o| o.identifier.dn.clone()).collect();
        if object_dns.len() != ctr.object_count as usize {
            return Err(ApplyError::Rejected(format!(
                "object list holds {} objects, count says {}",
                object_dns.len(),
                ctr.object_count
            )));
        }

        self.chunks.write().push(AppliedChunk {
            level,
            req_level,
            schema,
            request_highwatermark: request.highwatermark(),
            new_highwatermark: ctr.new_highwatermark,
            object_dns,
        });
        Ok(())
    }
}

impl<A: ChunkApplier + ?Sized> ChunkApplier for &A {
    fn replicate_chunk(
        &self,
        level: u32,
        ctr: &ChangeChunk,
        schema: bool,
        req_level: u32,
        request: &GetNcChangesRequest,
    ) -> Result<(), ApplyError> {
        (**self).replicate_chunk(level, ctr, schema, req_level, request)
    }
}
