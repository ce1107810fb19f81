//! Error types for the replication engine.

use crate::apply::ApplyError;
use crate::schema::SchemaError;
use crate::transport::TransportError;
use thiserror::Error;

/// Result type for engine operations.
pub type DrsResult<T> = Result<T, DrsError>;

/// Errors raised by the replication engine.
///
/// Nothing in this crate retries on any of these; that decision belongs to
/// the caller.
#[derive(Error, Debug)]
pub enum DrsError {
    /// Bind or transport failure.
    #[error("DRS connection to {target} failed: {source}")]
    Connection {
        /// Server the connection was made to.
        target: String,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// The server broke a documented reply invariant.
    #[error("protocol contract violated: {0}")]
    ProtocolContract(String),

    /// Misuse detected before any network activity.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A maintenance call failed.
    #[error("{operation} failed: {source}")]
    RemoteOperation {
        /// RPC name.
        operation: &'static str,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// The schema collaborator failed.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The apply collaborator failed.
    #[error("apply error: {0}")]
    Apply(#[from] ApplyError),
}

impl DrsError {
    /// Creates a connection error for `target`.
    pub fn connection(target: impl Into<String>, source: TransportError) -> Self {
        Self::Connection {
            target: target.into(),
            source,
        }
    }

    /// Creates a maintenance-call error.
    pub fn remote(operation: &'static str, source: TransportError) -> Self {
        Self::RemoteOperation { operation, source }
    }

    /// Returns true if a caller may try again with a fresh session.
    ///
    /// A partially applied pull is never resumed on the same session.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DrsError::Connection { .. } | DrsError::RemoteOperation { .. }
        )
    }
}
